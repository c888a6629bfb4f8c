pub mod product;
pub mod pricing;
pub mod store;

pub use product::{Ingredient, PriceTiers, Product, ProductError, Temperature};
pub use pricing::{
    aggregate_total, order_snapshot, price_line, resolve_unit_price, unit_price,
    IngredientIndex, IngredientSelection, LineSnapshot, PricedItem,
};
pub use store::Store;
