use async_trait::async_trait;
use shared::{
    CatalogItem, CoreResult, InventoryRecord, NewOrder, Order, OrderStatus, StatusChange,
};
use uuid::Uuid;

use crate::catalog::MenuSeed;

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Persistence handle shared by every component of the service.
///
/// Each method is one atomic unit: multi-row writes either commit together
/// or leave every touched row as it was.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts the default menu, options and stock rows if the catalog is
    /// empty. Returns whether anything was inserted.
    async fn seed_catalog(&self, seed: &[MenuSeed]) -> CoreResult<bool>;

    async fn list_menus(&self) -> CoreResult<Vec<CatalogItem>>;

    async fn find_menu(&self, menu_id: i32) -> CoreResult<Option<CatalogItem>>;

    /// Writes the order, its lines and their option rows in one transaction.
    async fn insert_order(&self, order: NewOrder) -> CoreResult<Order>;

    /// Newest first.
    async fn list_orders(&self) -> CoreResult<Vec<Order>>;

    /// Locks the order, records `status`, and deducts stock when
    /// [`OrderStatus::triggers_stock_decrement`] holds for the prior status.
    async fn transition_status(&self, order_id: Uuid, status: OrderStatus) -> CoreResult<StatusChange>;

    /// Order counts grouped by stored status.
    async fn status_counts(&self) -> CoreResult<Vec<(OrderStatus, i64)>>;

    async fn list_inventory(&self) -> CoreResult<Vec<InventoryRecord>>;

    /// `None` when the menu id has no inventory row.
    async fn decrement_stock(&self, menu_id: i32, amount: i32) -> CoreResult<Option<InventoryRecord>>;

    async fn set_stock(&self, menu_id: i32, stock: i32) -> CoreResult<Option<InventoryRecord>>;
}
