pub mod models;
pub mod pii;

pub use models::events::{OrderEvent, OrderEventKind};
pub use pii::Masked;
