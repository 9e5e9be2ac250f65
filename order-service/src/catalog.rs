use shared::{CatalogItem, CoreError, CoreResult};
use std::sync::Arc;
use tracing::info;

use crate::store::OrderStore;

/// A default menu entry written on first start.
#[derive(Debug, Clone, Copy)]
pub struct MenuSeed {
    pub name: &'static str,
    pub price: i32,
    pub description: &'static str,
    pub image: Option<&'static str>,
    pub options: &'static [(&'static str, i32)],
    pub stock: i32,
}

const DRINK_OPTIONS: &[(&str, i32)] = &[("Extra shot", 500), ("Syrup", 0)];
const INITIAL_STOCK: i32 = 10;

fn drink(name: &'static str, price: i32, description: &'static str, image: Option<&'static str>) -> MenuSeed {
    MenuSeed {
        name,
        price,
        description,
        image,
        options: DRINK_OPTIONS,
        stock: INITIAL_STOCK,
    }
}

pub fn default_menu() -> Vec<MenuSeed> {
    vec![
        drink("Americano (Ice)", 4000, "Crisp, refreshing iced americano", Some("/americano-ice.jpg")),
        drink("Americano (Hot)", 4000, "Rich, hot americano", Some("/americano-hot.jpg")),
        drink("Caffe Latte", 5000, "Espresso balanced with smooth milk", Some("/caffe-latte.jpg")),
        drink("Cappuccino", 5000, "Classic cappuccino topped with milk foam", None),
        drink("Caramel Macchiato", 6000, "Sweet caramel meets espresso", None),
        drink("Vanilla Latte", 5500, "Latte with a soft vanilla aroma", None),
    ]
}

/// Read-only view of the menu used to shape orders.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn OrderStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn seed_defaults(&self) -> CoreResult<()> {
        if self.store.seed_catalog(&default_menu()).await? {
            info!("Seeded default menu, options and stock");
        }
        Ok(())
    }

    pub async fn list(&self) -> CoreResult<Vec<CatalogItem>> {
        self.store.list_menus().await
    }

    pub async fn lookup(&self, menu_id: i32) -> CoreResult<CatalogItem> {
        self.store
            .find_menu(menu_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("menu {}", menu_id)))
    }
}
