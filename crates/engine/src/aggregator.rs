//! Channel aggregation: the grouping reduction shared by every model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TouchPosition;

/// Credit assigned to one eligible touchpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchpointCredit {
    pub touchpoint_id: Uuid,
    pub channel: String,
    pub source: String,
    pub campaign: String,
    pub timestamp: DateTime<Utc>,
    pub position: TouchPosition,
    pub weight: f64,
    pub attributed_value: Decimal,
    /// Fractional share of the conversion itself.
    pub conversion_credit: Decimal,
}

/// Per-channel totals for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelCredit {
    pub touch_count: u64,
    pub attributed_value: Decimal,
    pub attributed_conversions: Decimal,
}

/// Group credits by channel. `touch_count` is a plain tally.
pub fn aggregate_by_channel(credits: &[TouchpointCredit]) -> BTreeMap<String, ChannelCredit> {
    let mut channels: BTreeMap<String, ChannelCredit> = BTreeMap::new();
    for credit in credits {
        let entry = channels.entry(credit.channel.clone()).or_default();
        entry.touch_count += 1;
        entry.attributed_value += credit.attributed_value;
        entry.attributed_conversions += credit.conversion_credit;
    }
    channels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credit(channel: &str, value: i64, position: TouchPosition) -> TouchpointCredit {
        TouchpointCredit {
            touchpoint_id: Uuid::new_v4(),
            channel: channel.to_string(),
            source: "direct".to_string(),
            campaign: "none".to_string(),
            timestamp: Utc::now(),
            position,
            weight: 0.0,
            attributed_value: Decimal::from(value),
            conversion_credit: Decimal::new(25, 2),
        }
    }

    #[test]
    fn test_repeat_channel_is_summed() {
        let credits = vec![
            credit("google", 40, TouchPosition::First),
            credit("email", 10, TouchPosition::Middle),
            credit("google", 10, TouchPosition::Middle),
            credit("email", 40, TouchPosition::Last),
        ];
        let channels = aggregate_by_channel(&credits);

        assert_eq!(channels.len(), 2);
        assert_eq!(channels["google"].touch_count, 2);
        assert_eq!(channels["google"].attributed_value, Decimal::from(50));
        assert_eq!(channels["email"].attributed_conversions, Decimal::new(50, 2));
    }

    #[test]
    fn test_zero_credit_still_counts_touch() {
        let channels = aggregate_by_channel(&[credit("facebook", 0, TouchPosition::Middle)]);
        assert_eq!(channels["facebook"].touch_count, 1);
        assert_eq!(channels["facebook"].attributed_value, Decimal::ZERO);
    }

    #[test]
    fn test_empty_credits() {
        assert!(aggregate_by_channel(&[]).is_empty());
    }
}
