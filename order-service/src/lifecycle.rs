use chrono::Utc;
use shared::{CoreResult, CreateOrderRequest, NewOrder, Order, OrderStatus, OrderSummary};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::store::OrderStore;

/// Creates orders and moves them through `pending → received → inProgress →
/// completed`.
///
/// Transitions are deliberately unguarded: any of the four statuses may
/// follow any other. Entering `completed` from any other status deducts the
/// order's quantities from stock exactly once, in the same transaction as
/// the status write.
#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
}

impl OrderLifecycle {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn create_order(&self, request: CreateOrderRequest) -> CoreResult<Order> {
        let draft = NewOrder::from_request(request, Utc::now())?;
        let order = self.store.insert_order(draft).await?;

        info!(
            "Order {} created with {} line(s), total {}",
            order.id,
            order.items.len(),
            order.total_amount
        );
        Ok(order)
    }

    pub async fn list_orders(&self) -> CoreResult<Vec<Order>> {
        self.store.list_orders().await
    }

    pub async fn set_order_status(&self, order_id: Uuid, status: &str) -> CoreResult<OrderSummary> {
        let status = status.parse::<OrderStatus>()?;
        let change = self.store.transition_status(order_id, status).await?;

        info!("Order {} status {} -> {}", order_id, change.prior, status);
        for (menu_id, quantity) in &change.decremented {
            info!("Order {} fulfilled: deducted {} from menu {} stock", order_id, quantity, menu_id);
        }
        Ok(change.summary)
    }
}
