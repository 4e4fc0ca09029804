//! Credit weighting rules, one per [`AttributionModel`] variant.
//!
//! Every rule maps an ordered, windowed touchpoint list to weights in
//! `[0, 1]` summing to 1. An empty list yields no weights.

use attribution_core::{AttributionModel, Touchpoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Share of a U-shaped journey given to each of the first and last touch.
pub const POSITION_ENDPOINT_WEIGHT: f64 = 0.4;
/// Share of a U-shaped journey split across the middle touches.
pub const POSITION_MIDDLE_SHARE: f64 = 0.2;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Where a touch sits in the windowed journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchPosition {
    First,
    Middle,
    Last,
}

impl TouchPosition {
    /// A single-touch journey reports its only touch as `First`.
    pub fn of(index: usize, count: usize) -> Self {
        if index == 0 {
            TouchPosition::First
        } else if index + 1 == count {
            TouchPosition::Last
        } else {
            TouchPosition::Middle
        }
    }
}

/// Weighting behaviour attached to each attribution model.
pub trait CreditWeights {
    fn weights(
        &self,
        touchpoints: &[&Touchpoint],
        conversion_at: DateTime<Utc>,
        half_life_days: f64,
    ) -> Vec<f64>;
}

impl CreditWeights for AttributionModel {
    fn weights(
        &self,
        touchpoints: &[&Touchpoint],
        conversion_at: DateTime<Utc>,
        half_life_days: f64,
    ) -> Vec<f64> {
        let n = touchpoints.len();
        if n == 0 {
            return Vec::new();
        }
        match self {
            AttributionModel::FirstTouch => single_touch(n, 0),
            AttributionModel::LastTouch => single_touch(n, n - 1),
            AttributionModel::Linear => vec![1.0 / n as f64; n],
            AttributionModel::TimeDecay => time_decay(touchpoints, conversion_at, half_life_days),
            AttributionModel::PositionBased => position_based(n),
        }
    }
}

fn single_touch(n: usize, credited: usize) -> Vec<f64> {
    let mut weights = vec![0.0; n];
    weights[credited] = 1.0;
    weights
}

fn time_decay(
    touchpoints: &[&Touchpoint],
    conversion_at: DateTime<Utc>,
    half_life_days: f64,
) -> Vec<f64> {
    let half_life_secs = half_life_days * SECONDS_PER_DAY;
    let ages: Vec<f64> = touchpoints
        .iter()
        .map(|t| {
            let age_ms = (conversion_at - t.timestamp).num_milliseconds().max(0);
            age_ms as f64 / 1000.0
        })
        .collect();

    // Measure decay from the freshest touch so the largest raw weight is 1.
    let freshest = ages.iter().copied().fold(f64::INFINITY, f64::min);
    let raw: Vec<f64> = ages
        .iter()
        .map(|age| (-(age - freshest) / half_life_secs).exp2())
        .collect();
    let total: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / total).collect()
}

fn position_based(n: usize) -> Vec<f64> {
    match n {
        1 => vec![1.0],
        2 => vec![0.5, 0.5],
        _ => {
            let middle = POSITION_MIDDLE_SHARE / (n - 2) as f64;
            let mut weights = vec![middle; n];
            weights[0] = POSITION_ENDPOINT_WEIGHT;
            weights[n - 1] = POSITION_ENDPOINT_WEIGHT;
            weights
        }
    }
}
