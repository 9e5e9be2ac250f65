use shared::{CoreResult, OrderStatistics};
use std::sync::Arc;

use crate::store::OrderStore;

/// Counts orders per status bucket straight from the store on every call.
#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn OrderStore>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn current(&self) -> CoreResult<OrderStatistics> {
        let counts = self.store.status_counts().await?;
        Ok(OrderStatistics::tally(counts))
    }
}
