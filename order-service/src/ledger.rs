use shared::{CoreError, CoreResult, InventoryRecord};
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::OrderStore;

/// Stock per menu item. Decrements floor at zero instead of failing, so a
/// shortage shows up afterwards as a zero reading.
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn OrderStore>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> CoreResult<Vec<InventoryRecord>> {
        self.store.list_inventory().await
    }

    pub async fn decrement(&self, menu_id: i32, amount: i32) -> CoreResult<InventoryRecord> {
        if amount < 0 {
            return Err(CoreError::Validation(format!(
                "decrement amount must not be negative, got {}",
                amount
            )));
        }
        let record = self
            .store
            .decrement_stock(menu_id, amount)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("inventory for menu {}", menu_id)))?;

        if record.stock == 0 {
            warn!("Menu {} ({}) is out of stock", menu_id, record.menu_name);
        }
        info!("Menu {} stock decremented by {} to {}", menu_id, amount, record.stock);
        Ok(record)
    }

    /// Administrative overwrite.
    pub async fn set_stock(&self, menu_id: i32, stock: i32) -> CoreResult<InventoryRecord> {
        if stock < 0 {
            return Err(CoreError::Validation(format!("stock must be 0 or more, got {}", stock)));
        }
        let record = self
            .store
            .set_stock(menu_id, stock)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("inventory for menu {}", menu_id)))?;

        info!("Menu {} stock set to {}", menu_id, record.stock);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_menu;
    use crate::store::InMemoryStore;

    async fn ledger() -> InventoryLedger {
        let store = Arc::new(InMemoryStore::new());
        store.seed_catalog(&default_menu()).await.unwrap();
        InventoryLedger::new(store)
    }

    #[tokio::test]
    async fn decrement_clamps_at_zero() {
        let ledger = ledger().await;
        ledger.set_stock(4, 3).await.unwrap();

        let record = ledger.decrement(4, 5).await.unwrap();
        assert_eq!(record.stock, 0);
        assert_eq!(record.menu_name, "Cappuccino");

        assert_eq!(ledger.decrement(4, i32::MAX).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn decrement_within_stock_subtracts() {
        let ledger = ledger().await;
        assert_eq!(ledger.decrement(1, 4).await.unwrap().stock, 6);
        assert_eq!(ledger.decrement(1, 0).await.unwrap().stock, 6);
    }

    #[tokio::test]
    async fn negative_values_are_rejected() {
        let ledger = ledger().await;
        assert!(matches!(ledger.set_stock(1, -1).await, Err(CoreError::Validation(_))));
        assert!(matches!(ledger.decrement(1, -2).await, Err(CoreError::Validation(_))));
        assert_eq!(ledger.list().await.unwrap()[0].stock, 10);
    }

    #[tokio::test]
    async fn missing_rows_are_not_found() {
        let ledger = ledger().await;
        assert!(matches!(ledger.set_stock(77, 5).await, Err(CoreError::NotFound(_))));
        assert!(matches!(ledger.decrement(77, 1).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn set_stock_overwrites_unconditionally() {
        let ledger = ledger().await;
        ledger.decrement(2, 10).await.unwrap();
        let record = ledger.set_stock(2, 25).await.unwrap();
        assert_eq!(record.stock, 25);
        assert_eq!(ledger.set_stock(2, 0).await.unwrap().stock, 0);
    }
}
