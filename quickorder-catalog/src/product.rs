use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Serving temperature chosen for a drink line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Cold,
    Hot,
    #[default]
    Normal,
}

impl Temperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Temperature::Cold => "cold",
            Temperature::Hot => "hot",
            Temperature::Normal => "normal",
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Temperature {
    type Err = ProductError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cold" => Ok(Temperature::Cold),
            "hot" => Ok(Temperature::Hot),
            "normal" => Ok(Temperature::Normal),
            other => Err(ProductError::UnknownTemperature(other.to_string())),
        }
    }
}

/// The four price fields of a product. `regular` is mandatory, the others are
/// overrides that only apply when strictly positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PriceTiers {
    pub regular: Decimal,
    pub special: Decimal,
    pub cold: Decimal,
    pub hot: Decimal,
}

impl PriceTiers {
    pub fn regular(price: Decimal) -> Self {
        Self {
            regular: price,
            ..Self::default()
        }
    }
}

/// Add-on a customer can pick for a product (milk, syrup, pearls...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Ingredient {
    pub fn new(product_id: Uuid, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            name: name.into(),
            price,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Core product structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub special_price: Decimal,
    pub cold_price: Decimal,
    pub hot_price: Decimal,
    pub is_active: bool,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            price,
            special_price: Decimal::ZERO,
            cold_price: Decimal::ZERO,
            hot_price: Decimal::ZERO,
            is_active: true,
            ingredients: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tiers(&self) -> PriceTiers {
        PriceTiers {
            regular: self.price,
            special: self.special_price,
            cold: self.cold_price,
            hot: self.hot_price,
        }
    }

    pub fn set_tiers(&mut self, tiers: PriceTiers) {
        self.price = tiers.regular;
        self.special_price = tiers.special;
        self.cold_price = tiers.cold;
        self.hot_price = tiers.hot;
        self.updated_at = Utc::now();
    }

    pub fn ingredient(&self, id: Uuid) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    pub fn active_ingredients(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.iter().filter(|i| i.is_active)
    }

    /// Admin-side checks before a product is written.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() {
            return Err(ProductError::MissingName);
        }
        let tiers = self.tiers();
        for (field, value) in [
            ("price", tiers.regular),
            ("special_price", tiers.special),
            ("cold_price", tiers.cold),
            ("hot_price", tiers.hot),
        ] {
            if value < Decimal::ZERO {
                return Err(ProductError::NegativePrice(field));
            }
        }
        Ok(())
    }
}

/// Product-related errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("Product name is required")]
    MissingName,

    #[error("{0} must not be negative")]
    NegativePrice(&'static str),

    #[error("Unknown temperature: {0}")]
    UnknownTemperature(String),
}
