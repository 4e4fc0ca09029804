//! Model comparison: every model over the same conversions, side by side.

use std::collections::BTreeMap;

use attribution_core::{AttributionConfig, AttributionModel, CoreResult, DateRange, TouchpointSource};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::{BatchPartial, BreakdownTally, ChannelTally, ConversionFailure};
use crate::engine::AttributionEngine;

/// Spread above which a channel is flagged as model-sensitive in every case.
const HIGH_VARIANCE_PCT: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub model_name: String,
    pub total_attributed: Decimal,
    pub channels: BTreeMap<String, ChannelTally>,
    /// Keyed by traffic source, `direct` when untracked.
    pub sources: BTreeMap<String, BreakdownTally>,
    /// Keyed by campaign, `none` when untagged.
    pub campaigns: BTreeMap<String, BreakdownTally>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonInsight {
    pub channel: String,
    pub variance_pct: f64,
    pub message: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSensitivity {
    /// Value each model assigned to each channel.
    pub channel_variance: BTreeMap<String, BTreeMap<AttributionModel, Decimal>>,
    pub insights: Vec<ComparisonInsight>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub date_range: DateRange,
    pub attribution_window_days: u32,
    pub total_conversions: u64,
    pub total_value: Decimal,
    pub models: BTreeMap<AttributionModel, ModelSummary>,
    pub comparison: ModelSensitivity,
    pub failures: Vec<ConversionFailure>,
}

impl ModelComparison {
    pub fn from_partial(config: &AttributionConfig, range: DateRange, partial: BatchPartial) -> Self {
        let models: BTreeMap<AttributionModel, ModelSummary> = partial
            .models
            .into_iter()
            .map(|(model, accumulator)| {
                let summary = ModelSummary {
                    model_name: model.display_name().to_string(),
                    total_attributed: accumulator.total_attributed,
                    channels: accumulator.channels,
                    sources: accumulator.sources,
                    campaigns: accumulator.campaigns,
                };
                (model, summary)
            })
            .collect();
        let comparison = sensitivity(&models, config.variance_threshold_pct);

        Self {
            date_range: range,
            attribution_window_days: config.attribution_window_days,
            total_conversions: partial.total_conversions,
            total_value: partial.total_value,
            models,
            comparison,
            failures: partial.failures,
        }
    }

    /// Attributed value of `channel` under `model`, zero if absent.
    pub fn channel_value(&self, model: AttributionModel, channel: &str) -> Decimal {
        self.models
            .get(&model)
            .and_then(|m| m.channels.get(channel))
            .map(|c| c.attributed_value)
            .unwrap_or(Decimal::ZERO)
    }
}

fn sensitivity(
    models: &BTreeMap<AttributionModel, ModelSummary>,
    threshold_pct: f64,
) -> ModelSensitivity {
    let mut channel_variance: BTreeMap<String, BTreeMap<AttributionModel, Decimal>> =
        BTreeMap::new();
    for (model, summary) in models {
        for (channel, tally) in &summary.channels {
            channel_variance
                .entry(channel.clone())
                .or_default()
                .insert(*model, tally.attributed_value);
        }
    }

    let mut insights = Vec::new();
    for (channel, values) in &channel_variance {
        if values.len() < 2 {
            continue;
        }
        let (Some(min), Some(max)) = (values.values().min(), values.values().max()) else {
            continue;
        };
        if max.is_zero() {
            continue;
        }
        let spread = ((*max - *min) / *max).to_f64().unwrap_or(0.0) * 100.0;
        if spread > threshold_pct {
            let variance_pct = (spread * 10.0).round() / 10.0;
            let recommendation = if spread > HIGH_VARIANCE_PCT {
                "Consider using multiple models for budgeting decisions"
            } else {
                "Models are relatively consistent"
            };
            insights.push(ComparisonInsight {
                channel: channel.clone(),
                variance_pct,
                message: format!(
                    "Channel '{}' shows {}% variance between attribution models",
                    channel, variance_pct
                ),
                recommendation: recommendation.to_string(),
            });
        }
    }

    ModelSensitivity {
        channel_variance,
        insights,
    }
}

impl AttributionEngine {
    /// Run every model over each conversion in `range` and compare.
    pub fn compare_models(
        &self,
        source: &dyn TouchpointSource,
        range: DateRange,
    ) -> CoreResult<ModelComparison> {
        let partial = self.run_batch(source, &range, &AttributionModel::ALL)?;
        info!(
            conversions = partial.total_conversions,
            failures = partial.failures.len(),
            "Model comparison computed"
        );
        Ok(ModelComparison::from_partial(self.config(), range, partial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_core::{InMemoryTouchpointSource, Touchpoint};
    use chrono::{Duration, Utc};

    fn engine() -> AttributionEngine {
        AttributionEngine::new(AttributionConfig::default()).unwrap()
    }

    #[test]
    fn test_first_and_last_touch_side_by_side() {
        let source = InMemoryTouchpointSource::new();
        let now = Utc::now();
        for customer in ["a", "b"] {
            source.record_all(
                customer,
                vec![
                    Touchpoint::new("google", now - Duration::days(3)),
                    Touchpoint::new("facebook", now - Duration::days(2)),
                    Touchpoint::new("email", now - Duration::days(1)),
                    Touchpoint::conversion("checkout", now, Decimal::from(90)),
                ],
            );
        }
        let range = DateRange::new(now - Duration::days(1), now).unwrap();
        let comparison = engine().compare_models(&source, range).unwrap();

        assert_eq!(comparison.total_conversions, 2);
        assert_eq!(comparison.total_value, Decimal::from(180));
        assert_eq!(comparison.models.len(), 5);
        for summary in comparison.models.values() {
            assert_eq!(summary.total_attributed, Decimal::from(180));
        }
        assert_eq!(
            comparison.channel_value(AttributionModel::FirstTouch, "google"),
            Decimal::from(180)
        );
        assert_eq!(
            comparison.channel_value(AttributionModel::LastTouch, "google"),
            Decimal::ZERO
        );
        assert_eq!(
            comparison.channel_value(AttributionModel::Linear, "facebook"),
            Decimal::from(60)
        );
        assert_eq!(
            comparison.models[&AttributionModel::PositionBased].model_name,
            "Position Based (U-Shaped)"
        );

        let google = comparison
            .comparison
            .insights
            .iter()
            .find(|i| i.channel == "google")
            .unwrap();
        assert_eq!(google.variance_pct, 100.0);
        assert_eq!(
            google.recommendation,
            "Consider using multiple models for budgeting decisions"
        );
    }

    #[test]
    fn test_consistent_channel_has_no_insight() {
        let source = InMemoryTouchpointSource::new();
        let now = Utc::now();
        source.record_all(
            "solo",
            vec![
                Touchpoint::new("email", now - Duration::days(2)),
                Touchpoint::conversion("checkout", now, Decimal::from(25)),
            ],
        );
        let range = DateRange::new(now - Duration::days(1), now).unwrap();
        let comparison = engine().compare_models(&source, range).unwrap();

        assert!(comparison.comparison.insights.is_empty());
        assert_eq!(comparison.comparison.channel_variance["email"].len(), 5);
    }

    #[test]
    fn test_models_serialize_by_identifier() {
        let source = InMemoryTouchpointSource::new();
        let now = Utc::now();
        let range = DateRange::new(now - Duration::days(1), now).unwrap();
        let comparison = engine().compare_models(&source, range).unwrap();

        let json = serde_json::to_value(&comparison).unwrap();
        assert!(json["models"]["time_decay"].is_object());
        assert_eq!(json["total_conversions"], 0);
    }

    fn summary_with(channel: &str, value: Decimal) -> ModelSummary {
        ModelSummary {
            model_name: String::new(),
            total_attributed: value,
            channels: BTreeMap::from([(
                channel.to_string(),
                ChannelTally {
                    attributed_value: value,
                    ..ChannelTally::default()
                },
            )]),
            sources: BTreeMap::new(),
            campaigns: BTreeMap::new(),
        }
    }

    #[test]
    fn test_threshold_compares_unrounded_spread() {
        // 20.04% displays as 20.0 but is still above a 20% threshold
        let models = BTreeMap::from([
            (AttributionModel::FirstTouch, summary_with("email", Decimal::new(10_000, 2))),
            (AttributionModel::LastTouch, summary_with("email", Decimal::new(7_996, 2))),
        ]);
        let result = sensitivity(&models, 20.0);
        assert_eq!(result.insights.len(), 1);
        assert_eq!(result.insights[0].variance_pct, 20.0);
        assert_eq!(result.insights[0].recommendation, "Models are relatively consistent");

        // 50.04% displays as 50.0 but crosses the high-variance line
        let models = BTreeMap::from([
            (AttributionModel::FirstTouch, summary_with("email", Decimal::new(10_000, 2))),
            (AttributionModel::LastTouch, summary_with("email", Decimal::new(4_996, 2))),
        ]);
        let result = sensitivity(&models, 20.0);
        assert_eq!(result.insights[0].variance_pct, 50.0);
        assert_eq!(
            result.insights[0].recommendation,
            "Consider using multiple models for budgeting decisions"
        );
    }

    #[test]
    fn test_source_and_campaign_breakdowns() {
        let source = InMemoryTouchpointSource::new();
        let now = Utc::now();
        source.record_all(
            "a",
            vec![
                Touchpoint::new("google", now - Duration::days(2)).with_source("google"),
                Touchpoint::new("email", now - Duration::days(1))
                    .with_source("mailchimp")
                    .with_campaign("spring"),
                Touchpoint::conversion("checkout", now, Decimal::from(100)),
            ],
        );
        let range = DateRange::new(now - Duration::days(1), now).unwrap();
        let comparison = engine().compare_models(&source, range).unwrap();

        let linear = &comparison.models[&AttributionModel::Linear];
        assert_eq!(linear.sources["google"].attributed_value, Decimal::from(50));
        assert_eq!(linear.sources["mailchimp"].attributed_value, Decimal::from(50));
        assert_eq!(linear.campaigns["spring"].attributed_value, Decimal::from(50));
        assert_eq!(linear.campaigns["none"].attributed_value, Decimal::from(50));
        assert_eq!(linear.campaigns["spring"].attributed_conversions, Decimal::new(5, 1));

        let last = &comparison.models[&AttributionModel::LastTouch];
        assert_eq!(last.campaigns["spring"].attributed_value, Decimal::from(100));
        assert_eq!(last.campaigns["none"].attributed_value, Decimal::ZERO);
    }
}
