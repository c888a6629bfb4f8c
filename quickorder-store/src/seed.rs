use quickorder_catalog::{Ingredient, Product};
use quickorder_core::identity::User;
use quickorder_core::repository::{ProductRepository, UserRepository};
use quickorder_core::{CoreError, RepositoryError};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::app_config::BootstrapConfig;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Invalid bootstrap account: {0}")]
    Account(#[from] CoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Money literal with two decimal places, e.g. `money(2500)` is 25.00.
fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Make sure the configured administrator exists and is an active admin.
///
/// Does nothing when no admin credentials are configured.
pub async fn ensure_admin(users: &dyn UserRepository, cfg: &BootstrapConfig) -> Result<(), SeedError> {
    let (Some(email), Some(password)) = (cfg.admin_email.as_deref(), cfg.admin_password.as_deref())
    else {
        warn!("No bootstrap admin configured; skipping");
        return Ok(());
    };

    if let Some(mut existing) = users.find_by_email(email).await? {
        if !existing.is_admin || !existing.is_active {
            existing.is_admin = true;
            existing.is_active = true;
            users.update_user(&existing).await?;
            info!(email = %existing.email, "Promoted bootstrap account to admin");
        }
        return Ok(());
    }

    let mut admin = User::new(&cfg.admin_name, email, password)?;
    admin.is_admin = true;
    users.create_user(&admin).await?;
    info!(email = %admin.email, "Created bootstrap admin account");
    Ok(())
}

/// The demo menu: two drinks with add-ons and one dessert.
pub fn sample_catalog() -> Vec<Product> {
    let mut coffee = Product::new("Americano Coffee", money(2500));
    coffee.cold_price = money(2700);
    coffee.hot_price = money(2500);
    coffee.description = Some("Classic Americano coffee, rich and mellow".to_string());
    coffee.ingredients = [
        ("Sugar", 0),
        ("Milk", 300),
        ("Oat Milk", 500),
        ("Coconut Milk", 500),
        ("Vanilla Syrup", 400),
        ("Caramel Syrup", 400),
    ]
    .into_iter()
    .map(|(name, cents)| Ingredient::new(coffee.id, name, money(cents)))
    .collect();

    let mut tea = Product::new("Oolong Tea", money(2000));
    tea.cold_price = money(2200);
    tea.hot_price = money(2000);
    tea.description = Some("Fragrant oolong tea with long-lasting sweetness".to_string());
    tea.ingredients = [("Sugar", 0), ("Lemon", 200), ("Honey", 300), ("Tapioca Pearls", 400)]
        .into_iter()
        .map(|(name, cents)| Ingredient::new(tea.id, name, money(cents)))
        .collect();

    let mut cheesecake = Product::new("Cheesecake", money(3500));
    cheesecake.special_price = money(3000);
    cheesecake.description = Some("Rich cheesecake that melts in your mouth".to_string());

    vec![coffee, tea, cheesecake]
}

/// Seed the demo menu, but only into an empty catalog.
pub async fn seed_sample_catalog(products: &dyn ProductRepository) -> Result<usize, SeedError> {
    if products.count_products().await? > 0 {
        return Ok(0);
    }
    let catalog = sample_catalog();
    for product in &catalog {
        products.create_product(product).await?;
    }
    info!(count = catalog.len(), "Seeded sample catalog");
    Ok(catalog.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use quickorder_catalog::{resolve_unit_price, Temperature};
    use rust_decimal_macros::dec;

    fn bootstrap() -> BootstrapConfig {
        BootstrapConfig {
            admin_email: Some("admin@example.com".into()),
            admin_password: Some("admin123".into()),
            admin_name: "Administrator".into(),
            sample_catalog: true,
        }
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let store = MemoryStore::new();
        ensure_admin(&store, &bootstrap()).await.unwrap();
        ensure_admin(&store, &bootstrap()).await.unwrap();

        assert_eq!(store.count_users().await.unwrap(), 1);
        let admin = store.find_by_email("admin@example.com").await.unwrap().unwrap();
        assert!(admin.is_admin);
        assert!(admin.check_password("admin123"));
    }

    #[tokio::test]
    async fn test_ensure_admin_skips_without_credentials() {
        let store = MemoryStore::new();
        ensure_admin(&store, &BootstrapConfig::default()).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sample_catalog_seeds_once() {
        let store = MemoryStore::new();
        assert_eq!(seed_sample_catalog(&store).await.unwrap(), 3);
        assert_eq!(seed_sample_catalog(&store).await.unwrap(), 0);
        assert_eq!(store.count_products().await.unwrap(), 3);
    }

    #[test]
    fn test_sample_prices() {
        let catalog = sample_catalog();
        let coffee = &catalog[0];
        assert_eq!(resolve_unit_price(&coffee.tiers(), Temperature::Cold), dec!(27.00));
        assert_eq!(resolve_unit_price(&coffee.tiers(), Temperature::Normal), dec!(25.00));
        assert_eq!(coffee.ingredients.len(), 6);
        assert!(coffee.ingredients.iter().all(|i| i.product_id == coffee.id));

        let cheesecake = &catalog[2];
        assert_eq!(resolve_unit_price(&cheesecake.tiers(), Temperature::Normal), dec!(30.00));
        assert!(catalog.iter().all(|p| p.validate().is_ok()));
    }
}
