//! Batch map-reduce over many conversions.
//!
//! Work is partitioned by customer so each history is fetched once. Every
//! partition folds its conversions into a [`BatchPartial`]; partials merge by
//! plain addition and are combined in partition order, so sequential and
//! parallel runs produce identical output.

use std::collections::BTreeMap;
use std::sync::Arc;

use attribution_core::{
    AttributionModel, BatchConfig, CoreResult, DateRange, TouchpointSource,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::comparison::ModelComparison;
use crate::engine::{AttributionEngine, AttributionResult};
use crate::models::TouchPosition;
use crate::report::ChannelReport;

/// Running per-channel totals for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelTally {
    pub attributed_value: Decimal,
    pub attributed_conversions: Decimal,
    pub touchpoints: u64,
    /// Conversions in which the channel had at least one eligible touch.
    pub conversions: u64,
    pub first_touch_conversions: u64,
    pub last_touch_conversions: u64,
    pub assisted_conversions: u64,
}

impl ChannelTally {
    fn merge(&mut self, other: &ChannelTally) {
        self.attributed_value += other.attributed_value;
        self.attributed_conversions += other.attributed_conversions;
        self.touchpoints += other.touchpoints;
        self.conversions += other.conversions;
        self.first_touch_conversions += other.first_touch_conversions;
        self.last_touch_conversions += other.last_touch_conversions;
        self.assisted_conversions += other.assisted_conversions;
    }
}

/// Credited value and conversions under a source or campaign label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakdownTally {
    pub attributed_value: Decimal,
    pub attributed_conversions: Decimal,
}

impl BreakdownTally {
    fn add(&mut self, value: Decimal, conversions: Decimal) {
        self.attributed_value += value;
        self.attributed_conversions += conversions;
    }
}

/// Channel, source and campaign totals for one model across many conversions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelAccumulator {
    pub total_attributed: Decimal,
    pub channels: BTreeMap<String, ChannelTally>,
    pub sources: BTreeMap<String, BreakdownTally>,
    pub campaigns: BTreeMap<String, BreakdownTally>,
}

impl ModelAccumulator {
    pub fn absorb(&mut self, result: &AttributionResult) {
        self.total_attributed += result.total_attributed;

        for (channel, credit) in &result.channels {
            let tally = self.channels.entry(channel.clone()).or_default();
            tally.attributed_value += credit.attributed_value;
            tally.attributed_conversions += credit.attributed_conversions;
            tally.touchpoints += credit.touch_count;
            tally.conversions += 1;

            let held = |position: TouchPosition| {
                result
                    .credits
                    .iter()
                    .any(|c| &c.channel == channel && c.position == position)
            };
            if held(TouchPosition::First) {
                tally.first_touch_conversions += 1;
            }
            if held(TouchPosition::Last) {
                tally.last_touch_conversions += 1;
            }
            if held(TouchPosition::Middle) {
                tally.assisted_conversions += 1;
            }
        }

        for credit in &result.credits {
            self.sources
                .entry(credit.source.clone())
                .or_default()
                .add(credit.attributed_value, credit.conversion_credit);
            self.campaigns
                .entry(credit.campaign.clone())
                .or_default()
                .add(credit.attributed_value, credit.conversion_credit);
        }
    }

    pub fn merge(&mut self, other: &ModelAccumulator) {
        self.total_attributed += other.total_attributed;
        for (channel, tally) in &other.channels {
            self.channels.entry(channel.clone()).or_default().merge(tally);
        }
        for (source, tally) in &other.sources {
            self.sources
                .entry(source.clone())
                .or_default()
                .add(tally.attributed_value, tally.attributed_conversions);
        }
        for (campaign, tally) in &other.campaigns {
            self.campaigns
                .entry(campaign.clone())
                .or_default()
                .add(tally.attributed_value, tally.attributed_conversions);
        }
    }
}

/// A conversion (or whole customer) the batch had to skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionFailure {
    pub customer_id: String,
    pub conversion_id: Option<Uuid>,
    pub reason: String,
}

/// Reduced state of one partition of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchPartial {
    pub total_conversions: u64,
    pub total_value: Decimal,
    pub models: BTreeMap<AttributionModel, ModelAccumulator>,
    pub failures: Vec<ConversionFailure>,
}

impl BatchPartial {
    fn new(models: &[AttributionModel]) -> Self {
        Self {
            models: models
                .iter()
                .map(|m| (*m, ModelAccumulator::default()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: BatchPartial) {
        self.total_conversions += other.total_conversions;
        self.total_value += other.total_value;
        for (model, accumulator) in &other.models {
            self.models.entry(*model).or_default().merge(accumulator);
        }
        self.failures.extend(other.failures);
    }

    fn fail(&mut self, customer_id: &str, conversion_id: Option<Uuid>, reason: String) {
        warn!(customer_id, ?conversion_id, %reason, "Skipping conversion in batch");
        metrics::counter!("attribution.conversion_failures").increment(1);
        self.failures.push(ConversionFailure {
            customer_id: customer_id.to_string(),
            conversion_id,
            reason,
        });
    }
}

impl AttributionEngine {
    /// Attribute every in-range conversion of `customers` under each model.
    pub fn collect_partial(
        &self,
        source: &dyn TouchpointSource,
        customers: &[String],
        range: &DateRange,
        models: &[AttributionModel],
    ) -> BatchPartial {
        let mut partial = BatchPartial::new(models);

        for customer_id in customers {
            let history = match source.history(customer_id) {
                Ok(history) => history,
                Err(e) => {
                    partial.fail(customer_id, None, e.to_string());
                    continue;
                }
            };

            'conversions: for conversion in history
                .iter()
                .filter(|t| t.is_conversion && range.contains(t.timestamp))
            {
                let value = match self.rounded_value(conversion) {
                    Ok(value) => value,
                    Err(e) => {
                        partial.fail(customer_id, Some(conversion.id), e.to_string());
                        continue;
                    }
                };

                let mut results = Vec::with_capacity(models.len());
                for model in models {
                    match self.attribute_conversion(&history, conversion, *model) {
                        Ok(result) => results.push(result),
                        Err(e) => {
                            partial.fail(customer_id, Some(conversion.id), e.to_string());
                            continue 'conversions;
                        }
                    }
                }

                partial.total_conversions += 1;
                partial.total_value += value;
                for result in &results {
                    partial.models.entry(result.model).or_default().absorb(result);
                }
                metrics::counter!("attribution.conversions_processed").increment(1);
            }
        }

        partial
    }

    /// Sequential batch over every converting customer in `range`.
    pub fn run_batch(
        &self,
        source: &dyn TouchpointSource,
        range: &DateRange,
        models: &[AttributionModel],
    ) -> CoreResult<BatchPartial> {
        let customers = source.customers_with_conversions(range)?;
        Ok(self.collect_partial(source, &customers, range, models))
    }
}

/// Runs batch reports on the blocking pool, `workers` partitions at a time.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    engine: Arc<AttributionEngine>,
    config: BatchConfig,
}

impl BatchRunner {
    pub fn new(engine: AttributionEngine, config: BatchConfig) -> CoreResult<Self> {
        config.validate()?;
        info!(
            workers = config.workers,
            partition_size = config.partition_size,
            "Batch runner initialized"
        );
        Ok(Self {
            engine: Arc::new(engine),
            config,
        })
    }

    pub fn engine(&self) -> &AttributionEngine {
        &self.engine
    }

    pub async fn compare_models(
        &self,
        source: Arc<dyn TouchpointSource>,
        range: DateRange,
    ) -> CoreResult<ModelComparison> {
        let partial = self.run(source, range, AttributionModel::ALL.to_vec()).await?;
        Ok(ModelComparison::from_partial(self.engine.config(), range, partial))
    }

    pub async fn channel_report(
        &self,
        source: Arc<dyn TouchpointSource>,
        range: DateRange,
        model: Option<AttributionModel>,
    ) -> CoreResult<ChannelReport> {
        let model = model.unwrap_or(self.engine.config().model);
        let partial = self.run(source, range, vec![model]).await?;
        Ok(ChannelReport::from_partial(model, range, partial))
    }

    async fn run(
        &self,
        source: Arc<dyn TouchpointSource>,
        range: DateRange,
        models: Vec<AttributionModel>,
    ) -> CoreResult<BatchPartial> {
        let customers = source.customers_with_conversions(&range)?;
        let partitions: Vec<Vec<String>> = customers
            .chunks(self.config.partition_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        info!(
            customers = customers.len(),
            partitions = partitions.len(),
            "Starting attribution batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();
        for (index, partition) in partitions.into_iter().enumerate() {
            tasks.spawn(run_partition(
                index,
                partition,
                Arc::clone(&self.engine),
                Arc::clone(&source),
                range,
                models.clone(),
                Arc::clone(&semaphore),
            ));
        }

        let mut partials = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            partials.push(joined.map_err(anyhow::Error::from)??);
        }
        partials.sort_by_key(|(index, _)| *index);

        let mut merged = BatchPartial::new(&models);
        for (_, partial) in partials {
            merged.merge(partial);
        }
        info!(
            conversions = merged.total_conversions,
            failures = merged.failures.len(),
            "Attribution batch complete"
        );
        Ok(merged)
    }
}

async fn run_partition(
    index: usize,
    partition: Vec<String>,
    engine: Arc<AttributionEngine>,
    source: Arc<dyn TouchpointSource>,
    range: DateRange,
    models: Vec<AttributionModel>,
    semaphore: Arc<Semaphore>,
) -> CoreResult<(usize, BatchPartial)> {
    let _permit = semaphore
        .acquire_owned()
        .await
        .map_err(anyhow::Error::from)?;
    let partial = tokio::task::spawn_blocking(move || {
        engine.collect_partial(source.as_ref(), &partition, &range, &models)
    })
    .await
    .map_err(anyhow::Error::from)?;
    Ok((index, partial))
}
