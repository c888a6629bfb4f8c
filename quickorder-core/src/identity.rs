use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use quickorder_order::CartOwner;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

const MIN_PASSWORD_LEN: usize = 6;
const USER_SUBJECT_PREFIX: &str = "user:";
const GUEST_SUBJECT_PREFIX: &str = "guest-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Guest,
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "GUEST",
            Role::Customer => "CUSTOMER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GUEST" => Ok(Role::Guest),
            "CUSTOMER" => Ok(Role::Customer),
            "ADMIN" => Ok(Role::Admin),
            other => Err(CoreError::IdentityError(format!("unknown role {}", other))),
        }
    }
}

/// The verified caller of a request: who owns the cart, and what they may do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub owner: CartOwner,
    pub role: Role,
}

impl Principal {
    /// Rebuild the caller from a token subject (`user:<uuid>` or `guest-<uuid>`).
    pub fn from_subject(subject: &str, role: Role) -> CoreResult<Self> {
        let owner = if let Some(id) = subject.strip_prefix(USER_SUBJECT_PREFIX) {
            let id = Uuid::parse_str(id)
                .map_err(|e| CoreError::IdentityError(format!("bad user subject: {}", e)))?;
            CartOwner::User(id)
        } else if subject.starts_with(GUEST_SUBJECT_PREFIX) {
            CartOwner::Guest(subject.to_string())
        } else {
            return Err(CoreError::IdentityError(format!("unrecognised subject {}", subject)));
        };

        match (&owner, role) {
            (CartOwner::Guest(_), Role::Guest) | (CartOwner::User(_), Role::Customer | Role::Admin) => {
                Ok(Self { owner, role })
            }
            _ => Err(CoreError::IdentityError(format!("role {} does not match subject", role))),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.owner.user_id()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn user_subject(id: Uuid) -> String {
    format!("{}{}", USER_SUBJECT_PREFIX, id)
}

/// Fresh subject for an anonymous shopper; doubles as the guest session id.
pub fn guest_subject() -> String {
    format!("{}{}", GUEST_SUBJECT_PREFIX, Uuid::new_v4())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: &str, email: &str, password: &str) -> CoreResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::ValidationError("name is required".into()));
        }
        let email = normalize_email(email)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email,
            password_hash: hash_password(password)?,
            phone: None,
            address: None,
            is_admin: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn check_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }

    pub fn set_password(&mut self, password: &str) -> CoreResult<()> {
        self.password_hash = hash_password(password)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn role(&self) -> Role {
        if self.is_admin {
            Role::Admin
        } else {
            Role::Customer
        }
    }
}

/// Lowercased, trimmed email; rejects anything without a local part and domain.
pub fn normalize_email(email: &str) -> CoreResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(CoreError::ValidationError(format!("invalid email address: {}", email))),
    }
}

pub fn hash_password(password: &str) -> CoreResult<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::ValidationError(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CoreError::InternalError(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_round_trip() {
        let user = User::new("Administrator", "Admin@Example.com ", "admin123").unwrap();
        assert_eq!(user.email, "admin@example.com");
        assert!(user.password_hash.starts_with("$argon2"));
        assert!(user.check_password("admin123"));
        assert!(!user.check_password("admin124"));
        assert_eq!(user.role(), Role::Customer);
    }

    #[test]
    fn test_rejects_short_password_and_bad_email() {
        assert!(matches!(User::new("A", "a@b.co", "123"), Err(CoreError::ValidationError(_))));
        assert!(matches!(User::new("A", "not-an-email", "secret1"), Err(CoreError::ValidationError(_))));
        assert!(matches!(User::new(" ", "a@b.co", "secret1"), Err(CoreError::ValidationError(_))));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("Mei", "mei@example.com", "secret1").unwrap();
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "mei@example.com");
    }

    #[test]
    fn test_principal_from_subjects() {
        let id = Uuid::new_v4();
        let user = Principal::from_subject(&user_subject(id), Role::Admin).unwrap();
        assert_eq!(user.owner, CartOwner::User(id));
        assert!(user.is_admin());

        let guest_sub = guest_subject();
        let guest = Principal::from_subject(&guest_sub, Role::Guest).unwrap();
        assert_eq!(guest.owner, CartOwner::Guest(guest_sub.clone()));
        assert_eq!(guest.user_id(), None);

        // a guest token can never claim admin
        assert!(Principal::from_subject(&guest_sub, Role::Admin).is_err());
        assert!(Principal::from_subject(&user_subject(id), Role::Guest).is_err());
        assert!(Principal::from_subject("user:nope", Role::Customer).is_err());
        assert!(Principal::from_subject("someone", Role::Customer).is_err());
    }
}
