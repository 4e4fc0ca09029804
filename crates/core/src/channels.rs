//! Channel classification from raw tracking parameters.
//!
//! Ad-platform click identifiers take precedence over UTM tags, which take
//! precedence over the referrer. Anything left over is `direct`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Touchpoint, DIRECT_CHANNEL};

const ORGANIC_SOCIAL_SOURCES: [&str; 5] = ["facebook", "twitter", "instagram", "linkedin", "tiktok"];

/// Raw tracking parameters captured alongside an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingParams {
    pub gclid: Option<String>,
    pub fbclid: Option<String>,
    pub ttclid: Option<String>,
    pub li_fat_id: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub referrer: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn lowered(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().trim().to_lowercase()
}

impl TrackingParams {
    /// Derive the channel label for these parameters.
    pub fn classify(&self) -> &'static str {
        if present(&self.gclid) {
            return "google_ads";
        }
        if present(&self.fbclid) {
            return "facebook_ads";
        }
        if present(&self.ttclid) {
            return "tiktok_ads";
        }
        if present(&self.li_fat_id) {
            return "linkedin_ads";
        }

        let source = lowered(&self.utm_source);
        let medium = lowered(&self.utm_medium);

        if medium.contains("email") {
            return "email";
        }
        if medium.contains("cpc") || medium.contains("paid") {
            return "paid_search";
        }
        if source.contains("google") && medium == "organic" {
            return "organic_search";
        }
        if ORGANIC_SOCIAL_SOURCES.contains(&source.as_str()) {
            return "organic_social";
        }
        if present(&self.referrer) {
            return "referral";
        }

        DIRECT_CHANNEL
    }

    /// Build a non-converting touchpoint labelled by [`Self::classify`],
    /// carrying the UTM source and campaign when present.
    pub fn touchpoint(&self, timestamp: DateTime<Utc>) -> Touchpoint {
        let mut touchpoint = Touchpoint::new(self.classify(), timestamp);
        if present(&self.utm_source) {
            touchpoint.source = self.utm_source.as_deref().map(|s| s.trim().to_string());
        }
        if present(&self.utm_campaign) {
            touchpoint.campaign = self.utm_campaign.as_deref().map(|c| c.trim().to_string());
        }
        touchpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TrackingParams {
        TrackingParams::default()
    }

    #[test]
    fn test_click_ids_win() {
        let p = TrackingParams {
            gclid: Some("abc".into()),
            fbclid: Some("def".into()),
            utm_medium: Some("email".into()),
            ..params()
        };
        assert_eq!(p.classify(), "google_ads");

        let p = TrackingParams {
            li_fat_id: Some("x".into()),
            ..params()
        };
        assert_eq!(p.classify(), "linkedin_ads");
    }

    #[test]
    fn test_utm_rules() {
        let email = TrackingParams {
            utm_medium: Some("Newsletter-Email".into()),
            ..params()
        };
        assert_eq!(email.classify(), "email");

        let paid = TrackingParams {
            utm_source: Some("bing".into()),
            utm_medium: Some("cpc".into()),
            ..params()
        };
        assert_eq!(paid.classify(), "paid_search");

        let organic = TrackingParams {
            utm_source: Some("Google".into()),
            utm_medium: Some("organic".into()),
            ..params()
        };
        assert_eq!(organic.classify(), "organic_search");

        let social = TrackingParams {
            utm_source: Some("Instagram".into()),
            ..params()
        };
        assert_eq!(social.classify(), "organic_social");
    }

    #[test]
    fn test_referrer_then_direct() {
        let referral = TrackingParams {
            referrer: Some("https://blog.example.com".into()),
            ..params()
        };
        assert_eq!(referral.classify(), "referral");

        let blank = TrackingParams {
            gclid: Some("  ".into()),
            ..params()
        };
        assert_eq!(blank.classify(), DIRECT_CHANNEL);
    }

    #[test]
    fn test_touchpoint_carries_campaign() {
        let p = TrackingParams {
            utm_source: Some("mailchimp".into()),
            utm_medium: Some("email".into()),
            utm_campaign: Some("spring-sale".into()),
            ..params()
        };
        let tp = p.touchpoint(Utc::now());
        assert_eq!(tp.channel, "email");
        assert_eq!(tp.campaign.as_deref(), Some("spring-sale"));
        assert_eq!(tp.source.as_deref(), Some("mailchimp"));
        assert!(!tp.is_conversion);

        let untagged = params().touchpoint(Utc::now());
        assert_eq!(untagged.source, None);
        assert_eq!(untagged.campaign, None);
    }
}
