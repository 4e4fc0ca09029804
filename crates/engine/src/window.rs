//! Attribution window: which touchpoints may earn credit for a conversion.

use attribution_core::Touchpoint;
use chrono::{DateTime, Duration, Utc};

/// Touchpoints inside `[conversion - window, conversion]`, oldest first.
///
/// The conversion event itself is never part of its own credit pool. Earlier
/// conversions of the same customer stay eligible. The sort is stable, so
/// touches sharing a timestamp keep their feed order. A window reaching past
/// the earliest representable instant is clamped to it.
pub fn eligible_touchpoints<'a>(
    history: &'a [Touchpoint],
    conversion: &Touchpoint,
    window: Duration,
) -> Vec<&'a Touchpoint> {
    let window_start = conversion
        .timestamp
        .checked_sub_signed(window)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut eligible: Vec<&Touchpoint> = history
        .iter()
        .filter(|t| t.id != conversion.id)
        .filter(|t| t.timestamp >= window_start && t.timestamp <= conversion.timestamp)
        .collect();
    eligible.sort_by_key(|t| t.timestamp);
    eligible
}
