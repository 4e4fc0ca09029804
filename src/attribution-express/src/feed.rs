//! JSON touchpoint feed loaded into an in-memory source.

use std::path::Path;

use anyhow::Context;
use attribution_core::channels::TrackingParams;
use attribution_core::{InMemoryTouchpointSource, Touchpoint, DIRECT_CHANNEL};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct FeedFile {
    pub customers: Vec<FeedCustomer>,
}

#[derive(Debug, Deserialize)]
pub struct FeedCustomer {
    pub customer_id: String,
    #[serde(default)]
    pub touchpoints: Vec<FeedTouchpoint>,
}

/// A feed event. `channel` wins over `tracking` when both are present.
#[derive(Debug, Deserialize)]
pub struct FeedTouchpoint {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub tracking: Option<TrackingParams>,
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub is_conversion: bool,
    #[serde(default)]
    pub conversion_value: Option<Decimal>,
}

impl FeedTouchpoint {
    fn into_touchpoint(self) -> Touchpoint {
        let tracked = self.tracking.as_ref().map(|t| t.touchpoint(self.timestamp));
        let channel = self
            .channel
            .or_else(|| tracked.as_ref().map(|t| t.channel.clone()))
            .unwrap_or_else(|| DIRECT_CHANNEL.to_string());
        let campaign = self
            .campaign
            .or_else(|| tracked.as_ref().and_then(|t| t.campaign.clone()));
        let source = self.source.or_else(|| tracked.and_then(|t| t.source));

        Touchpoint {
            id: self.id,
            timestamp: self.timestamp,
            channel,
            campaign,
            source,
            is_conversion: self.is_conversion,
            conversion_value: self.conversion_value,
        }
    }
}

impl FeedFile {
    pub fn into_source(self) -> InMemoryTouchpointSource {
        let source = InMemoryTouchpointSource::new();
        for customer in self.customers {
            source.record_all(
                customer.customer_id,
                customer
                    .touchpoints
                    .into_iter()
                    .map(FeedTouchpoint::into_touchpoint),
            );
        }
        source
    }
}

pub fn load(path: &Path) -> anyhow::Result<InMemoryTouchpointSource> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading feed {}", path.display()))?;
    let feed: FeedFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing feed {}", path.display()))?;
    let source = feed.into_source();
    info!(path = %path.display(), customers = source.customer_count(), "Touchpoint feed loaded");
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use attribution_core::TouchpointSource;

    #[test]
    fn test_feed_resolves_channels() {
        let feed: FeedFile = serde_json::from_str(
            r#"{
                "customers": [{
                    "customer_id": "c1",
                    "touchpoints": [
                        {"timestamp": "2025-06-01T10:00:00Z", "channel": "google"},
                        {"timestamp": "2025-06-02T10:00:00Z",
                         "tracking": {"utm_source": "mailchimp", "utm_medium": "email",
                                      "utm_campaign": "june"}},
                        {"timestamp": "2025-06-03T10:00:00Z"},
                        {"timestamp": "2025-06-04T10:00:00Z", "channel": "direct",
                         "is_conversion": true, "conversion_value": 49.5}
                    ]
                }]
            }"#,
        )
        .unwrap();

        let source = feed.into_source();
        let history = source.history("c1").unwrap();
        let channels: Vec<_> = history.iter().map(|t| t.channel.as_str()).collect();
        assert_eq!(channels, vec!["google", "email", "direct", "direct"]);
        assert_eq!(history[1].campaign.as_deref(), Some("june"));
        assert_eq!(history[1].source.as_deref(), Some("mailchimp"));
        assert_eq!(history[0].source, None);
        assert!(history[3].is_conversion);
        assert_eq!(history[3].value(), Decimal::new(495, 1));
    }

    #[test]
    fn test_customer_without_events_is_known() {
        let feed: FeedFile =
            serde_json::from_str(r#"{"customers": [{"customer_id": "quiet"}]}"#).unwrap();
        let source = feed.into_source();
        assert!(source.customer_exists("quiet"));
    }
}
