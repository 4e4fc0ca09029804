//! Largest-remainder allocation of money in currency minor units.

use attribution_core::{AttributionError, CoreResult};
use rust_decimal::{Decimal, RoundingStrategy};

/// Largest amount, in minor units, that [`allocate`] splits exactly.
///
/// Every integer up to 2^53 is representable as an `f64`, so per-share
/// quotas stay within one unit of their exact value.
pub const MAX_ALLOCATABLE_UNITS: i64 = 1 << 53;

/// Round `value` to `digits` decimal places and return it as minor units.
pub fn to_minor_units(value: Decimal, digits: u32) -> CoreResult<i64> {
    let mut rounded = value.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(digits);
    let units = rounded.mantissa();
    if units.abs() > i128::from(MAX_ALLOCATABLE_UNITS) {
        return Err(AttributionError::Validation(format!(
            "amount {} exceeds {} minor units",
            value, MAX_ALLOCATABLE_UNITS
        )));
    }
    i64::try_from(units).map_err(|_| {
        AttributionError::Validation(format!("amount {} is out of range", value))
    })
}

pub fn from_minor_units(units: i64, digits: u32) -> Decimal {
    Decimal::new(units, digits)
}

/// Split `total` units across `weights` so the parts sum to `total` exactly.
///
/// Each share gets the floor of its exact quota; leftover units go to the
/// largest fractional remainders, earlier positions winning ties. A zero
/// weight always receives zero units.
pub fn allocate(total: i64, weights: &[f64]) -> CoreResult<Vec<i64>> {
    if !(0..=MAX_ALLOCATABLE_UNITS).contains(&total) {
        return Err(AttributionError::Validation(format!(
            "cannot allocate {} units, expected 0..={}",
            total, MAX_ALLOCATABLE_UNITS
        )));
    }
    if weights.is_empty() {
        return Ok(Vec::new());
    }

    let quotas: Vec<f64> = weights.iter().map(|w| w.max(0.0) * total as f64).collect();
    let mut shares: Vec<i64> = quotas.iter().map(|q| q.floor() as i64).collect();

    let mut ranking: Vec<usize> = (0..quotas.len()).filter(|&i| weights[i] > 0.0).collect();
    ranking.sort_by(|&a, &b| {
        let ra = quotas[a] - quotas[a].floor();
        let rb = quotas[b] - quotas[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });

    let allocated: i128 = shares.iter().map(|s| i128::from(*s)).sum();
    let mut remaining = i128::from(total) - allocated;
    // Float drift can leave us a unit over; reclaim from the smallest remainders.
    while remaining < 0 {
        match ranking.iter().rev().find(|&&i| shares[i] > 0) {
            Some(&i) => {
                shares[i] -= 1;
                remaining += 1;
            }
            None => break,
        }
    }
    for &i in ranking.iter().cycle() {
        if remaining <= 0 {
            break;
        }
        shares[i] += 1;
        remaining -= 1;
    }
    Ok(shares)
}
