use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

mod error;

pub use error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    Pending,
    Received,
    InProgress,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Received,
        OrderStatus::InProgress,
        OrderStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Received => "received",
            OrderStatus::InProgress => "inProgress",
            OrderStatus::Completed => "completed",
        }
    }

    /// Any status may follow any other; the only ordering-sensitive effect is
    /// that first entry into `completed` deducts stock for the order's lines.
    pub fn triggers_stock_decrement(prior: OrderStatus, requested: OrderStatus) -> bool {
        requested == OrderStatus::Completed && prior != OrderStatus::Completed
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStatus(format!("'{}' is not an order status", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogOption {
    pub id: i32,
    pub name: String,
    pub price: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i32,
    pub name: String,
    pub price: i32,
    pub description: Option<String>,
    pub image: Option<String>,
    pub options: Vec<CatalogOption>,
}

/// One requested line as sent by the counter UI. Name and price are the
/// caller's snapshot and are stored as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub menu_id: i32,
    pub menu_name: String,
    pub quantity: i32,
    pub price: i32,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub total_amount: serde_json::Value,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
}

/// A validated order ready to be written in one transaction.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub total_amount: i32,
    pub order_date: DateTime<Utc>,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub id: Uuid,
    pub menu_id: i32,
    pub menu_name: String,
    pub quantity: i32,
    pub price: i32,
    pub options: Vec<String>,
}

impl NewOrder {
    /// Checks the request without touching storage. The total is trusted as
    /// supplied and never reconciled against line prices.
    pub fn from_request(request: CreateOrderRequest, now: DateTime<Utc>) -> CoreResult<Self> {
        if request.items.is_empty() {
            return Err(CoreError::Validation("order must contain at least one item".to_string()));
        }
        let total_amount = whole_number(&request.total_amount, "totalAmount")?;

        let mut lines = Vec::with_capacity(request.items.len());
        for (idx, item) in request.items.into_iter().enumerate() {
            if item.quantity < 1 {
                return Err(CoreError::Validation(format!(
                    "item {} quantity must be at least 1, got {}",
                    idx, item.quantity
                )));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = item.options.iter().find(|name| !seen.insert(name.as_str())) {
                return Err(CoreError::Validation(format!(
                    "item {} lists option '{}' more than once",
                    idx, dup
                )));
            }
            lines.push(NewOrderLine {
                id: Uuid::new_v4(),
                menu_id: item.menu_id,
                menu_name: item.menu_name,
                quantity: item.quantity,
                price: item.price,
                options: item.options,
            });
        }

        Ok(Self {
            id: Uuid::new_v4(),
            total_amount,
            order_date: request.order_date.unwrap_or(now),
            lines,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub id: Uuid,
    pub menu_id: i32,
    pub menu_name: String,
    pub quantity: i32,
    pub price: i32,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub items: Vec<OrderLine>,
    pub total_amount: i32,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub total_amount: i32,
    pub order_date: DateTime<Utc>,
    pub status: OrderStatus,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            total_amount: order.total_amount,
            order_date: order.order_date,
            status: order.status,
        }
    }
}

/// Outcome of a status write, including what it did to stock.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub prior: OrderStatus,
    pub summary: OrderSummary,
    /// `(menu_id, quantity)` pairs deducted in this transition; empty unless
    /// the order entered `completed`.
    pub decremented: Vec<(i32, i32)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub menu_id: i32,
    pub menu_name: String,
    pub stock: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    pub total: i64,
    /// `pending` and `received` orders share this bucket.
    pub received: i64,
    pub in_progress: i64,
    pub completed: i64,
}

impl OrderStatistics {
    pub fn tally<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (OrderStatus, i64)>,
    {
        let mut stats = Self::default();
        for (status, count) in counts {
            stats.total += count;
            match status {
                OrderStatus::Pending | OrderStatus::Received => stats.received += count,
                OrderStatus::InProgress => stats.in_progress += count,
                OrderStatus::Completed => stats.completed += count,
            }
        }
        stats
    }
}

/// Stock left after taking `amount`, floored at zero.
pub fn floor_decrement(stock: i32, amount: i32) -> i32 {
    stock.saturating_sub(amount).max(0)
}

/// Per-item deductions for a set of order lines: quantities summed per menu
/// id, ascending by menu id so concurrent fulfillments lock rows in the same
/// order.
pub fn stock_deductions<I>(lines: I) -> Vec<(i32, i32)>
where
    I: IntoIterator<Item = (i32, i32)>,
{
    let mut totals: BTreeMap<i32, i32> = BTreeMap::new();
    for (menu_id, quantity) in lines {
        let entry = totals.entry(menu_id).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }
    totals.into_iter().collect()
}

/// Reads a JSON number as a 32-bit integer, rounding fractions the way an
/// integer column cast does.
pub fn whole_number(value: &serde_json::Value, field: &str) -> CoreResult<i32> {
    let number = value
        .as_f64()
        .ok_or_else(|| CoreError::Validation(format!("{} must be a number", field)))?;
    let rounded = if let Some(n) = value.as_i64() { n as f64 } else { number.round() };
    if !rounded.is_finite() || rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return Err(CoreError::Validation(format!("{} is out of range", field)));
    }
    Ok(rounded as i32)
}
