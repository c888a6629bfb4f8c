use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical shop front. Products are linked many-to-many.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Store {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub work_time: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            work_time: None,
            address: None,
            phone: None,
            is_active: true,
            product_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the linked products, dropping duplicates but keeping order.
    pub fn link_products(&mut self, product_ids: impl IntoIterator<Item = Uuid>) {
        self.product_ids.clear();
        for id in product_ids {
            if !self.product_ids.contains(&id) {
                self.product_ids.push(id);
            }
        }
        self.updated_at = Utc::now();
    }

    pub fn carries(&self, product_id: Uuid) -> bool {
        self.product_ids.contains(&product_id)
    }
}
