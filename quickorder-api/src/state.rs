use std::sync::Arc;
use quickorder_core::repository::{
    CartRepository, OrderRepository, ProductRepository, StoreRepository, UserRepository,
};
use quickorder_shared::OrderEvent;
use quickorder_store::{
    DbClient, MemoryStore, PgCartRepository, PgOrderRepository, PgProductRepository,
    PgStoreRepository, PgUserRepository,
};
use tokio::sync::broadcast;

/// Capacity of the admin order feed; slow subscribers skip what they miss.
const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub products: Arc<dyn ProductRepository>,
    pub stores: Arc<dyn StoreRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub users: Arc<dyn UserRepository>,
    pub events_tx: broadcast::Sender<OrderEvent>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn postgres(db: &DbClient, auth: AuthConfig) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            products: Arc::new(PgProductRepository::new(db.pool.clone())),
            stores: Arc::new(PgStoreRepository::new(db.pool.clone())),
            carts: Arc::new(PgCartRepository::new(db.pool.clone())),
            orders: Arc::new(PgOrderRepository::new(db.pool.clone())),
            users: Arc::new(PgUserRepository::new(db.pool.clone())),
            events_tx,
            auth,
        }
    }

    pub fn in_memory(auth: AuthConfig) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Arc::new(MemoryStore::new());
        Self {
            products: store.clone(),
            stores: store.clone(),
            carts: store.clone(),
            orders: store.clone(),
            users: store,
            events_tx,
            auth,
        }
    }

    /// Fan an order event out to whoever is listening. No listeners is fine.
    pub fn publish(&self, event: OrderEvent) {
        if self.events_tx.send(event).is_err() {
            tracing::trace!("No order feed subscribers");
        }
    }
}
