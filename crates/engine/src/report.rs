//! Channel attribution report: one model, dashboard-shaped rows.

use attribution_core::{AttributionModel, CoreResult, DateRange, TouchpointSource};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::batch::{BatchPartial, ChannelTally, ConversionFailure};
use crate::engine::AttributionEngine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReportRow {
    pub channel: String,
    pub attributed_value: Decimal,
    pub conversions: u64,
    pub attributed_conversions: Decimal,
    pub touchpoints: u64,
    pub first_touch_conversions: u64,
    pub last_touch_conversions: u64,
    pub assisted_conversions: u64,
    pub avg_touchpoints_per_conversion: f64,
    /// Attributed value per credited touchpoint, 2 dp.
    pub roas: Decimal,
}

impl ChannelReportRow {
    fn from_tally(channel: String, tally: ChannelTally) -> Self {
        let avg = if tally.conversions > 0 {
            let raw = tally.touchpoints as f64 / tally.conversions as f64;
            (raw * 100.0).round() / 100.0
        } else {
            0.0
        };
        let roas = if tally.attributed_value > Decimal::ZERO {
            (tally.attributed_value / Decimal::from(tally.touchpoints.max(1))).round_dp(2)
        } else {
            Decimal::ZERO
        };
        Self {
            channel,
            attributed_value: tally.attributed_value,
            conversions: tally.conversions,
            attributed_conversions: tally.attributed_conversions,
            touchpoints: tally.touchpoints,
            first_touch_conversions: tally.first_touch_conversions,
            last_touch_conversions: tally.last_touch_conversions,
            assisted_conversions: tally.assisted_conversions,
            avg_touchpoints_per_conversion: avg,
            roas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub model: AttributionModel,
    pub model_name: String,
    pub date_range: DateRange,
    pub total_conversions: u64,
    pub total_value: Decimal,
    /// Highest attributed value first.
    pub channels: Vec<ChannelReportRow>,
    pub failures: Vec<ConversionFailure>,
}

impl ChannelReport {
    pub fn from_partial(model: AttributionModel, range: DateRange, mut partial: BatchPartial) -> Self {
        let accumulator = partial.models.remove(&model).unwrap_or_default();
        let mut channels: Vec<ChannelReportRow> = accumulator
            .channels
            .into_iter()
            .map(|(channel, tally)| ChannelReportRow::from_tally(channel, tally))
            .collect();
        channels.sort_by(|a, b| {
            b.attributed_value
                .cmp(&a.attributed_value)
                .then_with(|| a.channel.cmp(&b.channel))
        });

        Self {
            model,
            model_name: model.display_name().to_string(),
            date_range: range,
            total_conversions: partial.total_conversions,
            total_value: partial.total_value,
            channels,
            failures: partial.failures,
        }
    }

    pub fn row(&self, channel: &str) -> Option<&ChannelReportRow> {
        self.channels.iter().find(|r| r.channel == channel)
    }
}

impl AttributionEngine {
    /// Channel report for one model; `None` uses the configured default.
    pub fn channel_report(
        &self,
        source: &dyn TouchpointSource,
        range: DateRange,
        model: Option<AttributionModel>,
    ) -> CoreResult<ChannelReport> {
        let model = model.unwrap_or(self.config().model);
        let partial = self.run_batch(source, &range, &[model])?;
        info!(
            %model,
            conversions = partial.total_conversions,
            "Channel report computed"
        );
        Ok(ChannelReport::from_partial(model, range, partial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_core::{AttributionConfig, InMemoryTouchpointSource, Touchpoint};
    use chrono::{Duration, Utc};

    fn seeded() -> (InMemoryTouchpointSource, DateRange) {
        let source = InMemoryTouchpointSource::new();
        let now = Utc::now();
        source.record_all(
            "a",
            vec![
                Touchpoint::new("google", now - Duration::days(4)),
                Touchpoint::new("facebook", now - Duration::days(3)),
                Touchpoint::new("instagram", now - Duration::days(2)),
                Touchpoint::new("email", now - Duration::days(1)),
                Touchpoint::conversion("checkout", now, Decimal::from(100)),
            ],
        );
        source.record_all(
            "b",
            vec![
                Touchpoint::new("email", now - Duration::days(2)),
                Touchpoint::conversion("checkout", now - Duration::hours(2), Decimal::from(20)),
            ],
        );
        (source, DateRange::new(now - Duration::days(1), now).unwrap())
    }

    #[test]
    fn test_position_based_rows() {
        let (source, range) = seeded();
        let engine = AttributionEngine::new(AttributionConfig::default()).unwrap();
        let report = engine
            .channel_report(&source, range, Some(AttributionModel::PositionBased))
            .unwrap();

        assert_eq!(report.total_conversions, 2);
        assert_eq!(report.total_value, Decimal::from(120));
        assert_eq!(report.model_name, "Position Based (U-Shaped)");

        let email = report.row("email").unwrap();
        assert_eq!(email.attributed_value, Decimal::from(60));
        assert_eq!(email.conversions, 2);
        assert_eq!(email.touchpoints, 2);
        assert_eq!(email.last_touch_conversions, 1);
        assert_eq!(email.first_touch_conversions, 1);
        assert_eq!(email.avg_touchpoints_per_conversion, 1.0);
        assert_eq!(email.roas, Decimal::from(30));

        assert_eq!(report.row("google").unwrap().attributed_value, Decimal::from(40));
        assert_eq!(report.row("facebook").unwrap().attributed_value, Decimal::from(10));
        assert_eq!(report.row("instagram").unwrap().assisted_conversions, 1);

        let order: Vec<_> = report.channels.iter().map(|r| r.channel.as_str()).collect();
        assert_eq!(order, vec!["email", "google", "facebook", "instagram"]);
    }

    #[test]
    fn test_defaults_to_configured_model() {
        let (source, range) = seeded();
        let engine = AttributionEngine::new(
            AttributionConfig::default().with_model(AttributionModel::LastTouch),
        )
        .unwrap();
        let report = engine.channel_report(&source, range, None).unwrap();

        assert_eq!(report.model, AttributionModel::LastTouch);
        assert_eq!(report.row("email").unwrap().attributed_value, Decimal::from(120));
        assert_eq!(report.row("google").unwrap().attributed_value, Decimal::ZERO);
        assert_eq!(report.row("google").unwrap().roas, Decimal::ZERO);
    }

    #[test]
    fn test_roas_is_value_per_touchpoint() {
        let tally = ChannelTally {
            attributed_value: Decimal::from(100),
            touchpoints: 3,
            conversions: 1,
            ..ChannelTally::default()
        };
        let row = ChannelReportRow::from_tally("email".to_string(), tally);
        assert_eq!(row.roas, Decimal::new(3333, 2));
        assert_eq!(row.avg_touchpoints_per_conversion, 3.0);
    }

    #[test]
    fn test_report_agrees_with_comparison() {
        let (source, range) = seeded();
        let engine = AttributionEngine::new(AttributionConfig::default()).unwrap();
        let comparison = engine.compare_models(&source, range).unwrap();

        for model in AttributionModel::ALL {
            let report = engine.channel_report(&source, range, Some(model)).unwrap();
            for row in &report.channels {
                assert_eq!(row.attributed_value, comparison.channel_value(model, &row.channel));
            }
        }
    }
}
