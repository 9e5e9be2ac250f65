use async_trait::async_trait;
use shared::{
    floor_decrement, stock_deductions, CatalogItem, CatalogOption, CoreError, CoreResult,
    InventoryRecord, NewOrder, Order, OrderLine, OrderStatus, OrderSummary, StatusChange,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::OrderStore;
use crate::catalog::MenuSeed;

#[derive(Debug, Default)]
struct MemoryState {
    menus: Vec<CatalogItem>,
    inventory: BTreeMap<i32, i32>,
    orders: Vec<Order>,
}

impl MemoryState {
    fn record(&self, menu_id: i32) -> Option<InventoryRecord> {
        let stock = *self.inventory.get(&menu_id)?;
        let menu_name = self
            .menus
            .iter()
            .find(|m| m.id == menu_id)
            .map(|m| m.name.clone())
            .unwrap_or_default();
        Some(InventoryRecord { menu_id, menu_name, stock })
    }
}

/// Store kept entirely in process memory.
///
/// Every operation holds one lock for its whole duration, so each call is
/// atomic and calls are serialized. Used by tests and `--in-memory` runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| CoreError::Persistence("lock poisoned".to_string()))
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn seed_catalog(&self, seed: &[MenuSeed]) -> CoreResult<bool> {
        let mut state = self.lock()?;
        let inserted = state.menus.is_empty();

        if inserted {
            let mut option_id = 0;
            for (idx, menu) in seed.iter().enumerate() {
                let menu_id = idx as i32 + 1;
                let options = menu
                    .options
                    .iter()
                    .map(|(name, price)| {
                        option_id += 1;
                        CatalogOption { id: option_id, name: name.to_string(), price: *price }
                    })
                    .collect();
                state.menus.push(CatalogItem {
                    id: menu_id,
                    name: menu.name.to_string(),
                    price: menu.price,
                    description: Some(menu.description.to_string()),
                    image: None,
                    options,
                });
                state.inventory.insert(menu_id, menu.stock);
            }
        }

        for menu in seed.iter().filter(|m| m.image.is_some()) {
            for item in state.menus.iter_mut().filter(|item| item.name == menu.name) {
                item.image = menu.image.map(str::to_string);
            }
        }

        Ok(inserted)
    }

    async fn list_menus(&self) -> CoreResult<Vec<CatalogItem>> {
        Ok(self.lock()?.menus.clone())
    }

    async fn find_menu(&self, menu_id: i32) -> CoreResult<Option<CatalogItem>> {
        Ok(self.lock()?.menus.iter().find(|m| m.id == menu_id).cloned())
    }

    async fn insert_order(&self, order: NewOrder) -> CoreResult<Order> {
        let mut state = self.lock()?;

        // Same guarantee as the order_items foreign key: nothing is written
        // unless every line points at a catalog item.
        if let Some(line) = order
            .lines
            .iter()
            .find(|line| !state.menus.iter().any(|m| m.id == line.menu_id))
        {
            return Err(CoreError::Persistence(format!(
                "order line references unknown menu {}",
                line.menu_id
            )));
        }

        let stored = Order {
            id: order.id,
            items: order
                .lines
                .into_iter()
                .map(|line| OrderLine {
                    id: line.id,
                    menu_id: line.menu_id,
                    menu_name: line.menu_name,
                    quantity: line.quantity,
                    price: line.price,
                    options: line.options,
                })
                .collect(),
            total_amount: order.total_amount,
            order_date: order.order_date,
            status: OrderStatus::Pending,
        };
        state.orders.push(stored.clone());
        Ok(stored)
    }

    async fn list_orders(&self) -> CoreResult<Vec<Order>> {
        let mut orders = self.lock()?.orders.clone();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn transition_status(&self, order_id: Uuid, status: OrderStatus) -> CoreResult<StatusChange> {
        let mut state = self.lock()?;
        let MemoryState { inventory, orders, .. } = &mut *state;

        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
        let prior = order.status;
        order.status = status;

        let mut decremented = Vec::new();
        if OrderStatus::triggers_stock_decrement(prior, status) {
            let lines = order.items.iter().map(|line| (line.menu_id, line.quantity));
            for (menu_id, quantity) in stock_deductions(lines) {
                if let Some(stock) = inventory.get_mut(&menu_id) {
                    *stock = floor_decrement(*stock, quantity);
                    decremented.push((menu_id, quantity));
                }
            }
        }

        Ok(StatusChange {
            prior,
            summary: OrderSummary::from(&*order),
            decremented,
        })
    }

    async fn status_counts(&self) -> CoreResult<Vec<(OrderStatus, i64)>> {
        let state = self.lock()?;
        let mut counts: HashMap<OrderStatus, i64> = HashMap::new();
        for order in &state.orders {
            *counts.entry(order.status).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn list_inventory(&self) -> CoreResult<Vec<InventoryRecord>> {
        let state = self.lock()?;
        Ok(state.inventory.keys().filter_map(|id| state.record(*id)).collect())
    }

    async fn decrement_stock(&self, menu_id: i32, amount: i32) -> CoreResult<Option<InventoryRecord>> {
        let mut state = self.lock()?;
        let Some(stock) = state.inventory.get_mut(&menu_id) else {
            return Ok(None);
        };
        *stock = floor_decrement(*stock, amount);
        Ok(state.record(menu_id))
    }

    async fn set_stock(&self, menu_id: i32, stock: i32) -> CoreResult<Option<InventoryRecord>> {
        let mut state = self.lock()?;
        let Some(current) = state.inventory.get_mut(&menu_id) else {
            return Ok(None);
        };
        *current = stock;
        Ok(state.record(menu_id))
    }
}
