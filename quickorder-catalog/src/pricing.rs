use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::product::{Ingredient, PriceTiers, Product, Temperature};

/// Picks the single applicable unit price. First match wins:
/// cold override, hot override, special price, regular price.
pub fn resolve_unit_price(tiers: &PriceTiers, temperature: Temperature) -> Decimal {
    if temperature == Temperature::Cold && tiers.cold > Decimal::ZERO {
        tiers.cold
    } else if temperature == Temperature::Hot && tiers.hot > Decimal::ZERO {
        tiers.hot
    } else if tiers.special > Decimal::ZERO {
        tiers.special
    } else {
        tiers.regular
    }
}

/// One ingredient choice attached to a cart or order line.
///
/// Stored as JSON: an object carrying its own `price` is an inline record,
/// a bare id string references a live ingredient of the same product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum IngredientSelection {
    Inline {
        id: Option<Uuid>,
        name: Option<String>,
        price: Decimal,
    },
    Reference(Uuid),
}

impl IngredientSelection {
    /// Surcharge contributed by this selection. Never negative.
    pub fn surcharge(&self, product_id: Uuid, index: &IngredientIndex) -> Decimal {
        let price = match self {
            IngredientSelection::Inline { price, .. } => *price,
            IngredientSelection::Reference(id) => index
                .lookup(product_id, *id)
                .map(|ingredient| ingredient.price)
                .unwrap_or(Decimal::ZERO),
        };
        price.max(Decimal::ZERO)
    }

    /// Inline copy of this selection with the price it has right now.
    pub fn freeze(&self, product_id: Uuid, index: &IngredientIndex) -> IngredientSelection {
        match self {
            IngredientSelection::Inline { id, name, .. } => IngredientSelection::Inline {
                id: *id,
                name: name.clone(),
                price: self.surcharge(product_id, index),
            },
            IngredientSelection::Reference(id) => IngredientSelection::Inline {
                id: Some(*id),
                name: index.lookup(product_id, *id).map(|i| i.name.clone()),
                price: self.surcharge(product_id, index),
            },
        }
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

impl From<Value> for IngredientSelection {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => IngredientSelection::Inline {
                id: map
                    .get("id")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok()),
                name: map.get("name").and_then(Value::as_str).map(str::to_string),
                price: map
                    .get("price")
                    .and_then(decimal_from_value)
                    .unwrap_or(Decimal::ZERO),
            },
            Value::String(s) => match Uuid::parse_str(&s) {
                Ok(id) => IngredientSelection::Reference(id),
                Err(_) => IngredientSelection::Inline {
                    id: None,
                    name: None,
                    price: Decimal::ZERO,
                },
            },
            // anything else is malformed and prices at zero
            _ => IngredientSelection::Inline {
                id: None,
                name: None,
                price: Decimal::ZERO,
            },
        }
    }
}

impl From<IngredientSelection> for Value {
    fn from(selection: IngredientSelection) -> Self {
        match selection {
            IngredientSelection::Inline { id, name, price } => {
                let mut map = Map::new();
                if let Some(id) = id {
                    map.insert("id".into(), Value::String(id.to_string()));
                }
                if let Some(name) = name {
                    map.insert("name".into(), Value::String(name));
                }
                map.insert("price".into(), Value::String(price.to_string()));
                Value::Object(map)
            }
            IngredientSelection::Reference(id) => Value::String(id.to_string()),
        }
    }
}

/// Ingredient id → ingredient record, handed to every pricing call.
#[derive(Debug, Clone, Default)]
pub struct IngredientIndex {
    by_id: HashMap<Uuid, Ingredient>,
}

impl IngredientIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_products<'a>(products: impl IntoIterator<Item = &'a Product>) -> Self {
        products
            .into_iter()
            .flat_map(|p| p.ingredients.iter().cloned())
            .collect()
    }

    pub fn insert(&mut self, ingredient: Ingredient) {
        self.by_id.insert(ingredient.id, ingredient);
    }

    /// Finds an ingredient only if it belongs to `product_id`.
    pub fn lookup(&self, product_id: Uuid, id: Uuid) -> Option<&Ingredient> {
        self.by_id.get(&id).filter(|i| i.product_id == product_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl FromIterator<Ingredient> for IngredientIndex {
    fn from_iter<I: IntoIterator<Item = Ingredient>>(iter: I) -> Self {
        Self {
            by_id: iter.into_iter().map(|i| (i.id, i)).collect(),
        }
    }
}

/// Everything needed to price one line.
#[derive(Debug, Clone)]
pub struct PricedItem {
    pub product_id: Uuid,
    pub tiers: PriceTiers,
    pub temperature: Temperature,
    pub quantity: u32,
    pub selections: Vec<IngredientSelection>,
}

impl PricedItem {
    pub fn for_product(
        product: &Product,
        temperature: Temperature,
        quantity: u32,
        selections: Vec<IngredientSelection>,
    ) -> Self {
        Self {
            product_id: product.id,
            tiers: product.tiers(),
            temperature,
            quantity,
            selections,
        }
    }
}

/// Resolved base price plus all ingredient surcharges, for a single unit.
pub fn unit_price(item: &PricedItem, index: &IngredientIndex) -> Decimal {
    let surcharges: Decimal = item
        .selections
        .iter()
        .map(|s| s.surcharge(item.product_id, index))
        .sum();
    resolve_unit_price(&item.tiers, item.temperature) + surcharges
}

pub fn price_line(item: &PricedItem, index: &IngredientIndex) -> Decimal {
    unit_price(item, index) * Decimal::from(item.quantity)
}

pub fn aggregate_total<'a>(
    items: impl IntoIterator<Item = &'a PricedItem>,
    index: &IngredientIndex,
) -> Decimal {
    items.into_iter().map(|item| price_line(item, index)).sum()
}

/// Prices frozen when a cart line becomes an order line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineSnapshot {
    pub product_id: Uuid,
    pub product_name: String,
    pub temperature: Temperature,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub ingredients: Vec<IngredientSelection>,
}

pub fn order_snapshot(
    item: &PricedItem,
    product_name: &str,
    index: &IngredientIndex,
) -> LineSnapshot {
    let unit = unit_price(item, index);
    LineSnapshot {
        product_id: item.product_id,
        product_name: product_name.to_string(),
        temperature: item.temperature,
        quantity: item.quantity,
        unit_price: unit,
        line_total: unit * Decimal::from(item.quantity),
        ingredients: item
            .selections
            .iter()
            .map(|s| s.freeze(item.product_id, index))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn americano() -> Product {
        let mut product = Product::new("Americano Coffee", dec!(25.00));
        product.hot_price = dec!(25.00);
        product.cold_price = dec!(27.00);
        product.ingredients = vec![
            Ingredient::new(product.id, "Milk", dec!(3.00)),
            Ingredient::new(product.id, "Oat Milk", dec!(5.00)),
        ];
        product
    }

    #[test]
    fn test_resolution_order() {
        let tiers = PriceTiers {
            regular: dec!(35),
            special: dec!(30),
            cold: dec!(37),
            hot: dec!(0),
        };
        assert_eq!(resolve_unit_price(&tiers, Temperature::Cold), dec!(37));
        // hot override is zero, falls through to special
        assert_eq!(resolve_unit_price(&tiers, Temperature::Hot), dec!(30));
        assert_eq!(resolve_unit_price(&tiers, Temperature::Normal), dec!(30));

        let plain = PriceTiers::regular(dec!(20));
        for t in [Temperature::Cold, Temperature::Hot, Temperature::Normal] {
            assert_eq!(resolve_unit_price(&plain, t), dec!(20));
        }
    }

    #[test]
    fn test_resolution_exhaustive_grid() {
        let values = [dec!(-1), dec!(0), dec!(4.5)];
        for &special in &values {
            for &cold in &values {
                for &hot in &values {
                    let tiers = PriceTiers { regular: dec!(10), special, cold, hot };
                    for t in [Temperature::Cold, Temperature::Hot, Temperature::Normal] {
                        let expected = if t == Temperature::Cold && cold > Decimal::ZERO {
                            cold
                        } else if t == Temperature::Hot && hot > Decimal::ZERO {
                            hot
                        } else if special > Decimal::ZERO {
                            special
                        } else {
                            dec!(10)
                        };
                        assert_eq!(resolve_unit_price(&tiers, t), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_cold_line_with_inline_ingredient() {
        let product = americano();
        let item = PricedItem::for_product(
            &product,
            Temperature::Cold,
            2,
            vec![IngredientSelection::Inline { id: None, name: None, price: dec!(3.00) }],
        );
        let index = IngredientIndex::new();
        assert_eq!(unit_price(&item, &index), dec!(30.00));
        assert_eq!(price_line(&item, &index), dec!(60.00));
    }

    #[test]
    fn test_normal_line_without_ingredients() {
        let product = americano();
        let item = PricedItem::for_product(&product, Temperature::Normal, 1, vec![]);
        assert_eq!(price_line(&item, &IngredientIndex::new()), dec!(25.00));
    }

    #[test]
    fn test_inline_and_reference_agree() {
        let product = americano();
        let index = IngredientIndex::from_products([&product]);
        let milk = &product.ingredients[0];

        let by_ref = PricedItem::for_product(
            &product,
            Temperature::Hot,
            3,
            vec![IngredientSelection::Reference(milk.id)],
        );
        let inline = PricedItem::for_product(
            &product,
            Temperature::Hot,
            3,
            vec![IngredientSelection::Inline {
                id: Some(milk.id),
                name: Some(milk.name.clone()),
                price: milk.price,
            }],
        );
        assert_eq!(price_line(&by_ref, &index), price_line(&inline, &index));
        assert_eq!(price_line(&by_ref, &index), dec!(84.00));
    }

    #[test]
    fn test_unknown_or_foreign_reference_is_free() {
        let product = americano();
        let other = americano();
        let index = IngredientIndex::from_products([&product, &other]);

        let item = PricedItem::for_product(
            &product,
            Temperature::Normal,
            1,
            vec![
                IngredientSelection::Reference(Uuid::new_v4()),
                // belongs to a different product
                IngredientSelection::Reference(other.ingredients[1].id),
            ],
        );
        assert_eq!(price_line(&item, &index), dec!(25.00));
    }

    #[test]
    fn test_negative_inline_price_is_free() {
        let product = americano();
        let item = PricedItem::for_product(
            &product,
            Temperature::Normal,
            1,
            vec![IngredientSelection::Inline { id: None, name: None, price: dec!(-5) }],
        );
        assert_eq!(price_line(&item, &IngredientIndex::new()), dec!(25.00));
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        let items: Vec<PricedItem> = Vec::new();
        assert_eq!(aggregate_total(&items, &IngredientIndex::new()), Decimal::ZERO);
    }

    #[test]
    fn test_aggregate_is_permutation_invariant() {
        let product = americano();
        let index = IngredientIndex::from_products([&product]);
        let oat = product.ingredients[1].id;
        let mut items = vec![
            PricedItem::for_product(&product, Temperature::Cold, 1, vec![IngredientSelection::Reference(oat)]),
            PricedItem::for_product(&product, Temperature::Hot, 4, vec![]),
            PricedItem::for_product(
                &product,
                Temperature::Normal,
                7,
                vec![IngredientSelection::Inline { id: None, name: None, price: dec!(0.10) }],
            ),
        ];
        let expected = aggregate_total(&items, &index);
        assert_eq!(expected, dec!(32) + dec!(100) + dec!(175.70));

        for _ in 0..items.len() {
            items.rotate_left(1);
            assert_eq!(aggregate_total(&items, &index), expected);
        }
        items.reverse();
        assert_eq!(aggregate_total(&items, &index), expected);
    }

    #[test]
    fn test_repeated_cents_do_not_drift() {
        let product = Product::new("Sugar", dec!(0.10));
        let items: Vec<PricedItem> = (0..1000)
            .map(|_| PricedItem::for_product(&product, Temperature::Normal, 1, vec![]))
            .collect();
        assert_eq!(aggregate_total(&items, &IngredientIndex::new()), dec!(100.00));
    }

    #[test]
    fn test_selection_json_forms() {
        let id = Uuid::new_v4();
        let parsed: Vec<IngredientSelection> = serde_json::from_value(serde_json::json!([
            id.to_string(),
            {"id": id.to_string(), "name": "Milk", "price": 3.0},
            {"name": "Honey", "price": "3.00"},
            {"name": "Broken"},
            42,
            "not-an-id"
        ]))
        .unwrap();

        assert_eq!(parsed[0], IngredientSelection::Reference(id));
        assert_eq!(
            parsed[1],
            IngredientSelection::Inline { id: Some(id), name: Some("Milk".into()), price: dec!(3) }
        );
        assert_eq!(
            parsed[2],
            IngredientSelection::Inline { id: None, name: Some("Honey".into()), price: dec!(3.00) }
        );
        for malformed in &parsed[3..] {
            assert_eq!(malformed.surcharge(Uuid::new_v4(), &IngredientIndex::new()), Decimal::ZERO);
        }

        let json = serde_json::to_value(&parsed[1]).unwrap();
        assert_eq!(json["price"], "3.0");
        assert_eq!(serde_json::to_value(&parsed[0]).unwrap(), serde_json::json!(id.to_string()));
    }

    #[test]
    fn test_snapshot_freezes_reference_prices() {
        let mut product = americano();
        let milk = product.ingredients[0].id;
        let item = PricedItem::for_product(
            &product,
            Temperature::Cold,
            2,
            vec![IngredientSelection::Reference(milk)],
        );
        let snapshot = order_snapshot(&item, &product.name, &IngredientIndex::from_products([&product]));
        assert_eq!(snapshot.unit_price, dec!(30.00));
        assert_eq!(snapshot.line_total, dec!(60.00));
        assert_eq!(
            snapshot.ingredients,
            vec![IngredientSelection::Inline { id: Some(milk), name: Some("Milk".into()), price: dec!(3.00) }]
        );

        // catalog edits after the fact leave the snapshot alone
        product.cold_price = dec!(99);
        product.ingredients[0].price = dec!(10);
        let index = IngredientIndex::from_products([&product]);
        let repriced = PricedItem {
            tiers: product.tiers(),
            selections: snapshot.ingredients.clone(),
            ..item
        };
        assert_eq!(snapshot.line_total, dec!(60.00));
        assert_eq!(price_line(&repriced, &index), dec!(204));
    }
}
