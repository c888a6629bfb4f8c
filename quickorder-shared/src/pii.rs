use serde::{Serialize, Deserialize, Serializer};
use std::fmt;

/// Wraps customer contact data (phone, email) so it never reaches logs verbatim.
///
/// `Debug` and `Display` print a redacted form; serialization writes the real
/// value because API responses and the database need it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    /// Redacted form keeping the last three characters, e.g. `*******678`.
    pub fn redacted(&self) -> String {
        let value = self.0.as_ref();
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= 3 {
            return "*".repeat(chars.len());
        }
        let keep = chars.len() - 3;
        let mut out = "*".repeat(keep);
        out.extend(&chars[keep..]);
        out
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Masked({})", self.redacted())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_hides_all_but_tail() {
        let phone = Masked("0912345678".to_string());
        assert_eq!(phone.to_string(), "*******678");
        assert_eq!(format!("{:?}", phone), "Masked(*******678)");
    }

    #[test]
    fn test_short_values_fully_hidden() {
        assert_eq!(Masked("abc").to_string(), "***");
    }

    #[test]
    fn test_serializes_real_value() {
        let email = Masked("guest@example.com".to_string());
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"guest@example.com\"");
    }
}
