pub mod identity;
pub mod repository;

pub use identity::{Principal, Role, User};
pub use repository::{
    CartRepository, OrderRepository, ProductRepository, RepoResult, StoreRepository,
    UserRepository,
};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error("Identity verification failed: {0}")]
    IdentityError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Failure reported by any repository backend.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    /// A cart change broke a cart rule once applied to the stored cart.
    #[error(transparent)]
    Rejected(#[from] quickorder_order::CartError),
    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}
