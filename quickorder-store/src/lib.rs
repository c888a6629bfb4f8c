pub mod app_config;
pub mod cart_repo;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod order_repo;
pub mod seed;
pub mod store_repo;
pub mod user_repo;

pub use cart_repo::PgCartRepository;
pub use catalog_repo::PgProductRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use order_repo::PgOrderRepository;
pub use store_repo::PgStoreRepository;
pub use user_repo::PgUserRepository;
