use quickorder_catalog::{order_snapshot, IngredientIndex, Product};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::cart::Cart;
use crate::models::{CustomerDetails, Order, OrderStatus};

/// Convert a cart into a pending order.
///
/// Every line is priced against `products` as they are right now and frozen
/// into the order; later catalog edits never touch the result.
pub fn checkout(
    cart: &Cart,
    products: &[Product],
    customer: CustomerDetails,
) -> Result<Order, OrderError> {
    if cart.is_empty() {
        return Err(OrderError::EmptyCart);
    }
    customer.validate()?;

    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();
    let index = IngredientIndex::from_products(products.iter());

    let mut order = Order::new(&cart.owner, customer);
    for line in &cart.items {
        let product = by_id
            .get(&line.product_id)
            .filter(|p| p.is_active)
            .ok_or(OrderError::ProductUnavailable(line.product_id))?;
        let snapshot = order_snapshot(&line.priced(product), &product.name, &index);
        debug!(
            product = %product.name,
            quantity = snapshot.quantity,
            line_total = %snapshot.line_total,
            "snapshotted cart line"
        );
        order.add_item(snapshot);
    }

    Ok(order)
}

/// Administrator status change. Any move is allowed until the order reaches
/// `completed` or `cancelled`; re-applying the current status is a no-op.
///
/// Returns the previous status.
pub fn apply_status(order: &mut Order, to: OrderStatus) -> Result<OrderStatus, OrderError> {
    let from = order.status;
    if from == to {
        return Ok(from);
    }
    if from.is_terminal() {
        return Err(OrderError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    order.status = to;
    order.updated_at = chrono::Utc::now();
    Ok(from)
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Missing required field: {0}")]
    MissingCustomerDetails(&'static str),

    #[error("Product is no longer available: {0}")]
    ProductUnavailable(Uuid),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::CartOwner;
    use quickorder_catalog::{Ingredient, IngredientSelection, Temperature};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Mei".to_string(),
            phone: "0912345678".to_string(),
            email: Some("mei@example.com".to_string()),
            delivery_address: None,
            payment_method: Some("card".to_string()),
            notes: Some("less ice".to_string()),
        }
    }

    fn americano() -> Product {
        let mut product = Product::new("Americano Coffee", dec!(25.00));
        product.hot_price = dec!(25.00);
        product.cold_price = dec!(27.00);
        product.ingredients = vec![Ingredient::new(product.id, "Milk", dec!(3.00))];
        product
    }

    fn pending_order() -> Order {
        Order::new(&CartOwner::Guest("s".into()), customer())
    }

    #[test]
    fn test_checkout_snapshots_lines() {
        let product = americano();
        let milk = product.ingredients[0].id;
        let mut cart = Cart::new(CartOwner::User(Uuid::new_v4()));
        cart.add_item(product.id, 2, Temperature::Cold, vec![IngredientSelection::Reference(milk)])
            .unwrap();
        cart.add_item(product.id, 1, Temperature::Normal, vec![]).unwrap();

        let order = checkout(&cart, std::slice::from_ref(&product), customer()).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].product_name, "Americano Coffee");
        assert_eq!(order.items[0].unit_price, dec!(30.00));
        assert_eq!(order.items[0].line_total, dec!(60.00));
        assert_eq!(order.items[1].line_total, dec!(25.00));
        assert_eq!(order.total_amount, dec!(85.00));
        assert_eq!(order.total_amount, order.calculate_total());
        assert_eq!(order.item_count(), 3);
        assert_eq!(order.payment_method, "card");
    }

    #[test]
    fn test_order_unaffected_by_later_price_change() {
        let mut product = americano();
        let mut cart = Cart::new(CartOwner::Guest("s".into()));
        cart.add_item(product.id, 2, Temperature::Cold, vec![]).unwrap();

        let order = checkout(&cart, std::slice::from_ref(&product), customer()).unwrap();
        let stored_total = order.items[0].line_total;

        product.cold_price = dec!(40.00);
        product.ingredients[0].price = dec!(9.00);

        assert_eq!(order.items[0].line_total, stored_total);
        assert_eq!(order.items[0].line_total, dec!(54.00));
        // the live cart now prices differently
        let repriced = checkout(&cart, std::slice::from_ref(&product), customer()).unwrap();
        assert_eq!(repriced.total_amount, dec!(80.00));
    }

    #[test]
    fn test_checkout_rejects_empty_cart() {
        let cart = Cart::new(CartOwner::Guest("s".into()));
        assert!(matches!(checkout(&cart, &[], customer()), Err(OrderError::EmptyCart)));
    }

    #[test]
    fn test_checkout_rejects_inactive_product() {
        let mut product = americano();
        product.is_active = false;
        let mut cart = Cart::new(CartOwner::Guest("s".into()));
        cart.add_item(product.id, 1, Temperature::Normal, vec![]).unwrap();
        assert!(matches!(
            checkout(&cart, std::slice::from_ref(&product), customer()),
            Err(OrderError::ProductUnavailable(id)) if id == product.id
        ));
    }

    #[test]
    fn test_checkout_requires_contact() {
        let product = americano();
        let mut cart = Cart::new(CartOwner::Guest("s".into()));
        cart.add_item(product.id, 1, Temperature::Normal, vec![]).unwrap();
        let mut details = customer();
        details.name = String::new();
        assert!(matches!(
            checkout(&cart, std::slice::from_ref(&product), details),
            Err(OrderError::MissingCustomerDetails("customer_name"))
        ));
    }

    #[test]
    fn test_order_lifecycle() {
        let mut order = pending_order();
        for next in [
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Completed,
        ] {
            let previous = order.status;
            assert_eq!(apply_status(&mut order, next).unwrap(), previous);
            assert_eq!(order.status, next);
        }
    }

    #[test]
    fn test_non_terminal_accepts_any_target() {
        for from in OrderStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            for to in OrderStatus::ALL {
                let mut order = pending_order();
                order.status = from;
                assert!(apply_status(&mut order, to).is_ok(), "{} -> {}", from, to);
                assert_eq!(order.status, to);
            }
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for to in OrderStatus::ALL.into_iter().filter(|s| *s != terminal) {
                let mut order = pending_order();
                order.status = terminal;
                assert!(matches!(
                    apply_status(&mut order, to),
                    Err(OrderError::InvalidTransition { .. })
                ));
                assert_eq!(order.status, terminal);
            }
            let mut order = pending_order();
            order.status = terminal;
            assert_eq!(apply_status(&mut order, terminal).unwrap(), terminal);
        }
    }

    #[test]
    fn test_empty_order_total_is_zero() {
        assert_eq!(pending_order().calculate_total(), Decimal::ZERO);
    }
}
