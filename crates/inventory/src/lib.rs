//! Inventory domain module (items, categories, stock levels).
//!
//! Pure domain logic: records, form validation and stock rules. Persistence is
//! the backend's concern.

pub mod category;
pub mod item;

pub use category::{Category, CategoryId, CreateCategory, UpdateCategory, ensure_unique_name};
pub use item::{
    AdjustStock, CreateItem, Item, ItemId, StockStatus, UpdateItem, low_stock,
};
