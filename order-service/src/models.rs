use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::{CatalogOption, CoreError, CoreResult, NewOrder, OrderStatus, OrderSummary};
use uuid::Uuid;

#[derive(Debug, Clone, Queryable)]
pub struct MenuRow {
    pub id: i32,
    pub name: String,
    pub price: i32,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::menus)]
pub struct NewMenu<'a> {
    pub name: &'a str,
    pub price: i32,
    pub description: Option<&'a str>,
    pub image: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable)]
pub struct MenuOptionRow {
    pub id: i32,
    pub menu_id: i32,
    pub name: String,
    pub price: i32,
}

impl From<MenuOptionRow> for CatalogOption {
    fn from(row: MenuOptionRow) -> Self {
        Self { id: row.id, name: row.name, price: row.price }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::menu_options)]
pub struct NewMenuOption<'a> {
    pub menu_id: i32,
    pub name: &'a str,
    pub price: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::inventory)]
pub struct NewInventory {
    pub menu_id: i32,
    pub stock: i32,
}

#[derive(Debug, Clone, Queryable)]
pub struct OrderRow {
    pub id: Uuid,
    pub total_amount: i32,
    pub order_date: DateTime<Utc>,
    pub status: String,
}

impl TryFrom<OrderRow> for OrderSummary {
    type Error = CoreError;

    fn try_from(row: OrderRow) -> CoreResult<Self> {
        let status = row
            .status
            .parse::<OrderStatus>()
            .map_err(|_| CoreError::Persistence(format!("order {} has stored status '{}'", row.id, row.status)))?;
        Ok(Self {
            id: row.id,
            total_amount: row.total_amount,
            order_date: row.order_date,
            status,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub total_amount: i32,
    pub order_date: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub menu_id: i32,
    pub menu_name: String,
    pub quantity: i32,
    pub price: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub position: i32,
    pub menu_id: i32,
    pub menu_name: String,
    pub quantity: i32,
    pub price: i32,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::order_item_options)]
pub struct OrderItemOptionRow {
    pub order_item_id: Uuid,
    pub option_name: String,
    pub position: i32,
}

/// Splits a validated order into the rows written by one insert transaction.
pub fn order_rows(order: &NewOrder) -> (NewOrderRow, Vec<NewOrderItemRow>, Vec<OrderItemOptionRow>) {
    let header = NewOrderRow {
        id: order.id,
        total_amount: order.total_amount,
        order_date: order.order_date,
        status: OrderStatus::Pending.as_str().to_string(),
    };

    let mut items = Vec::with_capacity(order.lines.len());
    let mut options = Vec::new();
    for (position, line) in order.lines.iter().enumerate() {
        items.push(NewOrderItemRow {
            id: line.id,
            order_id: order.id,
            position: position as i32,
            menu_id: line.menu_id,
            menu_name: line.menu_name.clone(),
            quantity: line.quantity,
            price: line.price,
        });
        options.extend(line.options.iter().enumerate().map(|(idx, name)| OrderItemOptionRow {
            order_item_id: line.id,
            option_name: name.clone(),
            position: idx as i32,
        }));
    }

    (header, items, options)
}
