//! Touchpoint feed: the read-only boundary to the event tracking pipeline.
//!
//! The engine accepts a `&dyn TouchpointSource` (or an `Arc` of one for
//! batch work) and never writes through it.

use dashmap::DashMap;
use tracing::debug;

use crate::error::{AttributionError, CoreResult};
use crate::types::{DateRange, Touchpoint};

/// Ordered per-customer event feed plus the customer existence check.
pub trait TouchpointSource: Send + Sync {
    fn customer_exists(&self, customer_id: &str) -> bool;

    /// Full chronological history. Equal timestamps keep recording order.
    fn history(&self, customer_id: &str) -> CoreResult<Vec<Touchpoint>>;

    /// Customers with at least one conversion inside `range`, sorted by id.
    fn customers_with_conversions(&self, range: &DateRange) -> CoreResult<Vec<String>>;
}

/// In-memory feed for tests, the CLI, and callers that preload snapshots.
#[derive(Debug, Default)]
pub struct InMemoryTouchpointSource {
    histories: DashMap<String, Vec<Touchpoint>>,
}

impl InMemoryTouchpointSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a customer known without any events.
    pub fn register_customer(&self, customer_id: impl Into<String>) {
        self.histories.entry(customer_id.into()).or_default();
    }

    /// Append an event, keeping the history chronological.
    pub fn record(&self, customer_id: impl Into<String>, touchpoint: Touchpoint) {
        let mut history = self.histories.entry(customer_id.into()).or_default();
        let at = history.partition_point(|t| t.timestamp <= touchpoint.timestamp);
        history.insert(at, touchpoint);
    }

    pub fn record_all(
        &self,
        customer_id: impl Into<String>,
        touchpoints: impl IntoIterator<Item = Touchpoint>,
    ) {
        let customer_id = customer_id.into();
        self.register_customer(customer_id.clone());
        for touchpoint in touchpoints {
            self.record(customer_id.clone(), touchpoint);
        }
    }

    pub fn customer_count(&self) -> usize {
        self.histories.len()
    }
}

impl TouchpointSource for InMemoryTouchpointSource {
    fn customer_exists(&self, customer_id: &str) -> bool {
        self.histories.contains_key(customer_id)
    }

    fn history(&self, customer_id: &str) -> CoreResult<Vec<Touchpoint>> {
        let history = self
            .histories
            .get(customer_id)
            .ok_or_else(|| AttributionError::CustomerNotFound(customer_id.to_string()))?;
        debug!(customer_id, events = history.len(), "Loaded touchpoint history");
        Ok(history.clone())
    }

    fn customers_with_conversions(&self, range: &DateRange) -> CoreResult<Vec<String>> {
        let mut customers: Vec<String> = self
            .histories
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .iter()
                    .any(|t| t.is_conversion && range.contains(t.timestamp))
            })
            .map(|entry| entry.key().clone())
            .collect();
        customers.sort();
        Ok(customers)
    }
}
