//! Journey analysis: descriptive statistics over a customer's whole history.

use std::collections::BTreeMap;

use attribution_core::{Touchpoint, TouchpointSource};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CUSTOMER_NOT_FOUND: &str = "customer not found";

/// One step on the journey path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyStep {
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    pub campaign: Option<String>,
    pub is_conversion: bool,
    pub value: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyAnalysis {
    pub customer_id: String,
    pub total_touchpoints: u64,
    pub total_conversions: u64,
    pub total_revenue: Decimal,
    /// Channel labels in chronological order.
    pub journey_path: Vec<String>,
    pub journey_steps: Vec<JourneyStep>,
    pub first_touch: Option<JourneyStep>,
    pub last_touch: Option<JourneyStep>,
    pub channel_distribution: BTreeMap<String, u64>,
    /// Counts of `"from -> to"` changes between consecutive touches.
    pub channel_transitions: BTreeMap<String, u64>,
    /// Hours from the first touch to the first conversion.
    pub hours_to_first_conversion: Option<f64>,
}

/// Either an analysis or a structured error, never a panic or `Err`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JourneyOutcome {
    Analysis(JourneyAnalysis),
    Error { error: String },
}

impl JourneyOutcome {
    pub fn analysis(&self) -> Option<&JourneyAnalysis> {
        match self {
            JourneyOutcome::Analysis(analysis) => Some(analysis),
            JourneyOutcome::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, JourneyOutcome::Error { .. })
    }
}

/// Analyze the full history of `customer_id`.
pub fn analyze_journey(source: &dyn TouchpointSource, customer_id: &str) -> JourneyOutcome {
    if !source.customer_exists(customer_id) {
        return JourneyOutcome::Error {
            error: CUSTOMER_NOT_FOUND.to_string(),
        };
    }

    match source.history(customer_id) {
        Ok(mut history) => {
            history.sort_by_key(|t| t.timestamp);
            JourneyOutcome::Analysis(summarize(customer_id, &history))
        }
        Err(e) => {
            warn!(customer_id, error = %e, "Failed to load journey history");
            JourneyOutcome::Error {
                error: e.to_string(),
            }
        }
    }
}

fn step(t: &Touchpoint) -> JourneyStep {
    JourneyStep {
        timestamp: t.timestamp,
        channel: t.channel_label().to_string(),
        campaign: t.campaign.clone(),
        is_conversion: t.is_conversion,
        value: t.is_conversion.then(|| t.value()),
    }
}

fn summarize(customer_id: &str, history: &[Touchpoint]) -> JourneyAnalysis {
    let journey_steps: Vec<JourneyStep> = history.iter().map(step).collect();
    let journey_path: Vec<String> = journey_steps.iter().map(|s| s.channel.clone()).collect();

    let mut channel_distribution: BTreeMap<String, u64> = BTreeMap::new();
    for channel in &journey_path {
        *channel_distribution.entry(channel.clone()).or_insert(0) += 1;
    }

    let mut channel_transitions: BTreeMap<String, u64> = BTreeMap::new();
    for pair in journey_path.windows(2) {
        if pair[0] != pair[1] {
            *channel_transitions
                .entry(format!("{} -> {}", pair[0], pair[1]))
                .or_insert(0) += 1;
        }
    }

    let conversions: Vec<&Touchpoint> = history.iter().filter(|t| t.is_conversion).collect();
    let total_revenue: Decimal = conversions.iter().map(|t| t.value()).sum();

    let hours_to_first_conversion = match (history.first(), conversions.first()) {
        (Some(first), Some(conversion)) => {
            let ms = (conversion.timestamp - first.timestamp).num_milliseconds();
            Some(ms as f64 / 3_600_000.0)
        }
        _ => None,
    };

    JourneyAnalysis {
        customer_id: customer_id.to_string(),
        total_touchpoints: history.len() as u64,
        total_conversions: conversions.len() as u64,
        total_revenue,
        first_touch: journey_steps.first().cloned(),
        last_touch: journey_steps.last().cloned(),
        journey_path,
        journey_steps,
        channel_distribution,
        channel_transitions,
        hours_to_first_conversion,
    }
}
