use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel_async::{pooled_connection::bb8::Pool, AsyncConnection, AsyncPgConnection, RunQueryDsl};
use shared::{
    stock_deductions, CatalogItem, CatalogOption, CoreError, CoreResult, InventoryRecord, NewOrder,
    Order, OrderLine, OrderStatus, OrderSummary, StatusChange,
};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use super::OrderStore;
use crate::catalog::MenuSeed;
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

diesel::sql_function!(fn greatest(a: Integer, b: Integer) -> Integer);

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn pool_error(err: impl std::fmt::Display) -> CoreError {
    CoreError::Persistence(format!("connection pool: {}", err))
}

fn parse_status(order_id: Uuid, raw: &str) -> CoreResult<OrderStatus> {
    raw.parse::<OrderStatus>()
        .map_err(|_| CoreError::Persistence(format!("order {} has stored status '{}'", order_id, raw)))
}

/// `stock = GREATEST(stock - amount, 0)` on the row for `menu_id`, evaluated
/// under the row lock the update takes.
async fn guarded_decrement(conn: &mut AsyncPgConnection, menu_id: i32, amount: i32) -> CoreResult<Option<i32>> {
    let stock = diesel::update(inventory::table.find(menu_id))
        .set(inventory::stock.eq(greatest(inventory::stock - amount, 0)))
        .returning(inventory::stock)
        .get_result::<i32>(conn)
        .await
        .optional()?;
    Ok(stock)
}

async fn inventory_record(conn: &mut AsyncPgConnection, menu_id: i32) -> CoreResult<Option<InventoryRecord>> {
    let row = inventory::table
        .inner_join(menus::table)
        .filter(inventory::menu_id.eq(menu_id))
        .select((inventory::menu_id, menus::name, inventory::stock))
        .first::<(i32, String, i32)>(conn)
        .await
        .optional()?;
    Ok(row.map(|(menu_id, menu_name, stock)| InventoryRecord { menu_id, menu_name, stock }))
}

async fn load_options(conn: &mut AsyncPgConnection, menu_ids: Vec<i32>) -> CoreResult<HashMap<i32, Vec<CatalogOption>>> {
    let rows = menu_options::table
        .filter(menu_options::menu_id.eq_any(menu_ids))
        .order(menu_options::id.asc())
        .load::<MenuOptionRow>(conn)
        .await?;

    let mut by_menu: HashMap<i32, Vec<CatalogOption>> = HashMap::new();
    for row in rows {
        by_menu.entry(row.menu_id).or_default().push(row.into());
    }
    Ok(by_menu)
}

fn catalog_item(menu: MenuRow, options: &mut HashMap<i32, Vec<CatalogOption>>) -> CatalogItem {
    CatalogItem {
        options: options.remove(&menu.id).unwrap_or_default(),
        id: menu.id,
        name: menu.name,
        price: menu.price,
        description: menu.description,
        image: menu.image,
    }
}

/// Loads orders newest first, optionally restricted to one id, with lines in
/// position order and options in the order they were chosen.
async fn load_orders(conn: &mut AsyncPgConnection, only: Option<Uuid>) -> CoreResult<Vec<Order>> {
    let mut query = orders::table.order(orders::order_date.desc()).into_boxed();
    if let Some(id) = only {
        query = query.filter(orders::id.eq(id));
    }
    let headers = query.load::<OrderRow>(conn).await?;
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<Uuid> = headers.iter().map(|o| o.id).collect();
    let items = order_items::table
        .filter(order_items::order_id.eq_any(order_ids))
        .order((order_items::order_id.asc(), order_items::position.asc()))
        .select(OrderItemRow::as_select())
        .load(conn)
        .await?;

    let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let option_rows = order_item_options::table
        .filter(order_item_options::order_item_id.eq_any(item_ids))
        .order((order_item_options::order_item_id.asc(), order_item_options::position.asc()))
        .load::<OrderItemOptionRow>(conn)
        .await?;

    let mut options_by_item: HashMap<Uuid, Vec<String>> = HashMap::new();
    for row in option_rows {
        options_by_item.entry(row.order_item_id).or_default().push(row.option_name);
    }

    let mut lines_by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for item in items {
        lines_by_order.entry(item.order_id).or_default().push(OrderLine {
            options: options_by_item.remove(&item.id).unwrap_or_default(),
            id: item.id,
            menu_id: item.menu_id,
            menu_name: item.menu_name,
            quantity: item.quantity,
            price: item.price,
        });
    }

    headers
        .into_iter()
        .map(|row| {
            let items = lines_by_order.remove(&row.id).unwrap_or_default();
            let summary = OrderSummary::try_from(row)?;
            Ok(Order {
                id: summary.id,
                items,
                total_amount: summary.total_amount,
                order_date: summary.order_date,
                status: summary.status,
            })
        })
        .collect()
}

#[async_trait]
impl OrderStore for PgStore {
    async fn seed_catalog(&self, seed: &[MenuSeed]) -> CoreResult<bool> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        let seed = seed.to_vec();

        conn.transaction::<_, CoreError, _>(|conn| {
            Box::pin(async move {
                let existing = menus::table.count().get_result::<i64>(conn).await?;
                let inserted = existing == 0;

                if inserted {
                    let new_menus: Vec<NewMenu<'_>> = seed
                        .iter()
                        .map(|m| NewMenu {
                            name: m.name,
                            price: m.price,
                            description: Some(m.description),
                            image: None,
                        })
                        .collect();
                    let ids = diesel::insert_into(menus::table)
                        .values(&new_menus)
                        .returning(menus::id)
                        .get_results::<i32>(conn)
                        .await?;

                    let mut options = Vec::new();
                    let mut stock = Vec::with_capacity(ids.len());
                    for (menu_id, menu) in ids.iter().copied().zip(seed.iter()) {
                        options.extend(menu.options.iter().map(|(name, price)| NewMenuOption {
                            menu_id,
                            name: *name,
                            price: *price,
                        }));
                        stock.push(NewInventory { menu_id, stock: menu.stock });
                    }

                    if !options.is_empty() {
                        diesel::insert_into(menu_options::table)
                            .values(&options)
                            .execute(conn)
                            .await?;
                    }
                    diesel::insert_into(inventory::table)
                        .values(&stock)
                        .execute(conn)
                        .await?;
                }

                for menu in seed.iter().filter(|m| m.image.is_some()) {
                    diesel::update(menus::table.filter(menus::name.eq(menu.name)))
                        .set(menus::image.eq(menu.image))
                        .execute(conn)
                        .await?;
                }

                Ok(inserted)
            })
        })
        .await
    }

    async fn list_menus(&self) -> CoreResult<Vec<CatalogItem>> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let rows = menus::table.order(menus::id.asc()).load::<MenuRow>(conn).await?;
        let mut options = load_options(conn, rows.iter().map(|m| m.id).collect()).await?;
        Ok(rows.into_iter().map(|m| catalog_item(m, &mut options)).collect())
    }

    async fn find_menu(&self, menu_id: i32) -> CoreResult<Option<CatalogItem>> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let Some(row) = menus::table.find(menu_id).first::<MenuRow>(conn).await.optional()? else {
            return Ok(None);
        };
        let mut options = load_options(conn, vec![menu_id]).await?;
        Ok(Some(catalog_item(row, &mut options)))
    }

    async fn insert_order(&self, order: NewOrder) -> CoreResult<Order> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;
        let order_id = order.id;
        let (header, items, options) = order_rows(&order);

        conn.transaction::<_, CoreError, _>(|conn| {
            Box::pin(async move {
                diesel::insert_into(orders::table)
                    .values(&header)
                    .execute(conn)
                    .await?;

                diesel::insert_into(order_items::table)
                    .values(&items)
                    .execute(conn)
                    .await?;

                if !options.is_empty() {
                    diesel::insert_into(order_item_options::table)
                        .values(&options)
                        .execute(conn)
                        .await?;
                }

                load_orders(conn, Some(order_id))
                    .await?
                    .pop()
                    .ok_or_else(|| CoreError::Persistence(format!("order {} vanished after insert", order_id)))
            })
        })
        .await
    }

    async fn list_orders(&self) -> CoreResult<Vec<Order>> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        load_orders(&mut pooled, None).await
    }

    async fn transition_status(&self, order_id: Uuid, status: OrderStatus) -> CoreResult<StatusChange> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<_, CoreError, _>(|conn| {
            Box::pin(async move {
                // FOR UPDATE makes a concurrent transition of the same order wait
                // here and then read the committed status.
                let prior = orders::table
                    .find(order_id)
                    .select(orders::status)
                    .for_update()
                    .first::<String>(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| CoreError::NotFound(format!("order {}", order_id)))?;
                let prior = parse_status(order_id, &prior)?;

                let row = diesel::update(orders::table.find(order_id))
                    .set(orders::status.eq(status.as_str()))
                    .get_result::<OrderRow>(conn)
                    .await?;

                let mut decremented = Vec::new();
                if OrderStatus::triggers_stock_decrement(prior, status) {
                    let lines = order_items::table
                        .filter(order_items::order_id.eq(order_id))
                        .select((order_items::menu_id, order_items::quantity))
                        .load::<(i32, i32)>(conn)
                        .await?;
                    for (menu_id, quantity) in stock_deductions(lines) {
                        match guarded_decrement(conn, menu_id, quantity).await? {
                            Some(stock) => {
                                debug!("menu {} stock now {}", menu_id, stock);
                                decremented.push((menu_id, quantity));
                            }
                            None => debug!("menu {} has no inventory row, nothing to deduct", menu_id),
                        }
                    }
                }

                Ok(StatusChange {
                    prior,
                    summary: OrderSummary::try_from(row)?,
                    decremented,
                })
            })
        })
        .await
    }

    async fn status_counts(&self) -> CoreResult<Vec<(OrderStatus, i64)>> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let rows = orders::table
            .group_by(orders::status)
            .select((orders::status, diesel::dsl::count_star()))
            .load::<(String, i64)>(conn)
            .await?;

        rows.into_iter()
            .map(|(raw, count)| {
                let status = raw
                    .parse::<OrderStatus>()
                    .map_err(|_| CoreError::Persistence(format!("orders table holds status '{}'", raw)))?;
                Ok((status, count))
            })
            .collect()
    }

    async fn list_inventory(&self) -> CoreResult<Vec<InventoryRecord>> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        let rows = inventory::table
            .inner_join(menus::table)
            .select((inventory::menu_id, menus::name, inventory::stock))
            .order(inventory::menu_id.asc())
            .load::<(i32, String, i32)>(conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(menu_id, menu_name, stock)| InventoryRecord { menu_id, menu_name, stock })
            .collect())
    }

    async fn decrement_stock(&self, menu_id: i32, amount: i32) -> CoreResult<Option<InventoryRecord>> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<_, CoreError, _>(|conn| {
            Box::pin(async move {
                if guarded_decrement(conn, menu_id, amount).await?.is_none() {
                    return Ok(None);
                }
                inventory_record(conn, menu_id).await
            })
        })
        .await
    }

    async fn set_stock(&self, menu_id: i32, stock: i32) -> CoreResult<Option<InventoryRecord>> {
        let mut pooled = self.pool.get().await.map_err(pool_error)?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<_, CoreError, _>(|conn| {
            Box::pin(async move {
                let updated = diesel::update(inventory::table.find(menu_id))
                    .set(inventory::stock.eq(stock))
                    .execute(conn)
                    .await?;
                if updated == 0 {
                    return Ok(None);
                }
                inventory_record(conn, menu_id).await
            })
        })
        .await
    }
}
