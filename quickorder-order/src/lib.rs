pub mod models;
pub mod cart;
pub mod manager;

pub use models::{CustomerDetails, Order, OrderItem, OrderStatus, PaymentStatus};
pub use cart::{Cart, CartError, CartItem, CartOwner, MAX_QUANTITY_PER_LINE};
pub use manager::{apply_status, checkout, OrderError};
