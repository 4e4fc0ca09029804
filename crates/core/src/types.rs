use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AttributionError, CoreResult};

/// Channel label used when a touchpoint carries no source information.
pub const DIRECT_CHANNEL: &str = "direct";

/// Campaign label for touchpoints outside any campaign.
pub const NO_CAMPAIGN: &str = "none";

// ─── Touchpoints ────────────────────────────────────────────────────────

/// One recorded customer interaction. Conversions carry a monetary value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Touchpoint {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    /// Traffic source, e.g. the `utm_source` tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub is_conversion: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_value: Option<Decimal>,
}

impl Touchpoint {
    /// A non-converting exposure on `channel`.
    pub fn new(channel: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            channel: channel.into(),
            campaign: None,
            source: None,
            is_conversion: false,
            conversion_value: None,
        }
    }

    /// A conversion event worth `value`.
    pub fn conversion(
        channel: impl Into<String>,
        timestamp: DateTime<Utc>,
        value: Decimal,
    ) -> Self {
        Self {
            is_conversion: true,
            conversion_value: Some(value),
            ..Self::new(channel, timestamp)
        }
    }

    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = Some(campaign.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Channel label with blank labels folded into [`DIRECT_CHANNEL`].
    pub fn channel_label(&self) -> &str {
        non_blank(Some(self.channel.as_str())).unwrap_or(DIRECT_CHANNEL)
    }

    /// Source label, `direct` when untracked.
    pub fn source_label(&self) -> &str {
        non_blank(self.source.as_deref()).unwrap_or(DIRECT_CHANNEL)
    }

    /// Campaign label, [`NO_CAMPAIGN`] when untagged.
    pub fn campaign_label(&self) -> &str {
        non_blank(self.campaign.as_deref()).unwrap_or(NO_CAMPAIGN)
    }

    /// Monetary value of the event; zero for non-conversions.
    pub fn value(&self) -> Decimal {
        if self.is_conversion {
            self.conversion_value.unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }

    /// Rejects conversions that cannot be attributed.
    pub fn validate_conversion(&self) -> CoreResult<()> {
        if !self.is_conversion {
            return Err(AttributionError::Validation(format!(
                "event {} is not a conversion",
                self.id
            )));
        }
        if self.value() < Decimal::ZERO {
            return Err(AttributionError::Validation(format!(
                "conversion {} has negative value {}",
                self.id,
                self.value()
            )));
        }
        Ok(())
    }
}

fn non_blank(label: Option<&str>) -> Option<&str> {
    label.map(str::trim).filter(|l| !l.is_empty())
}

// ─── Attribution Models ─────────────────────────────────────────────────

/// The closed set of credit-weighting rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModel {
    FirstTouch,
    LastTouch,
    Linear,
    TimeDecay,
    PositionBased,
}

impl AttributionModel {
    pub const ALL: [AttributionModel; 5] = [
        AttributionModel::FirstTouch,
        AttributionModel::LastTouch,
        AttributionModel::Linear,
        AttributionModel::TimeDecay,
        AttributionModel::PositionBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributionModel::FirstTouch => "first_touch",
            AttributionModel::LastTouch => "last_touch",
            AttributionModel::Linear => "linear",
            AttributionModel::TimeDecay => "time_decay",
            AttributionModel::PositionBased => "position_based",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AttributionModel::FirstTouch => "First Touch",
            AttributionModel::LastTouch => "Last Touch",
            AttributionModel::Linear => "Linear",
            AttributionModel::TimeDecay => "Time Decay",
            AttributionModel::PositionBased => "Position Based (U-Shaped)",
        }
    }
}

impl fmt::Display for AttributionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributionModel {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttributionModel::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| AttributionError::InvalidModel(s.to_string()))
    }
}

// ─── Date Ranges ────────────────────────────────────────────────────────

/// Inclusive time range used to select conversions for batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if start > end {
            return Err(AttributionError::Validation(format!(
                "date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}
