use std::collections::BTreeMap;

use attribution_core::{
    AttributionConfig, AttributionError, AttributionModel, CoreResult, Touchpoint,
    TouchpointSource,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::aggregator::{aggregate_by_channel, ChannelCredit, TouchpointCredit};
use crate::allocation::{allocate, from_minor_units, to_minor_units};
use crate::models::{CreditWeights, TouchPosition};
use crate::window::eligible_touchpoints;

/// Decimal places used for fractional conversion credit.
pub const CONVERSION_CREDIT_DIGITS: u32 = 4;

/// Outcome of one model run for one conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub conversion_id: Uuid,
    pub model: AttributionModel,
    pub conversion_value: Decimal,
    pub channels: BTreeMap<String, ChannelCredit>,
    pub total_attributed: Decimal,
    pub credits: Vec<TouchpointCredit>,
}

/// Stateless attribution pipeline: window, weights, allocation, aggregation.
#[derive(Debug, Clone)]
pub struct AttributionEngine {
    config: AttributionConfig,
}

impl AttributionEngine {
    pub fn new(config: AttributionConfig) -> CoreResult<Self> {
        config.validate()?;
        info!(
            window_days = config.attribution_window_days,
            half_life_days = config.time_decay_half_life_days,
            default_model = %config.model,
            "Attribution engine initialized"
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    /// Conversion value rounded to currency minor units.
    pub fn rounded_value(&self, conversion: &Touchpoint) -> CoreResult<Decimal> {
        let digits = self.config.currency_minor_digits;
        Ok(from_minor_units(to_minor_units(conversion.value(), digits)?, digits))
    }

    /// Attribute `conversion` across the eligible part of `history`.
    pub fn attribute_conversion(
        &self,
        history: &[Touchpoint],
        conversion: &Touchpoint,
        model: AttributionModel,
    ) -> CoreResult<AttributionResult> {
        conversion.validate_conversion()?;

        let digits = self.config.currency_minor_digits;
        let value_units = to_minor_units(conversion.value(), digits)?;
        let eligible = eligible_touchpoints(history, conversion, self.config.window());
        let weights = model.weights(
            &eligible,
            conversion.timestamp,
            self.config.time_decay_half_life_days,
        );

        let value_shares = allocate(value_units, &weights)?;
        let credit_shares = allocate(10_i64.pow(CONVERSION_CREDIT_DIGITS), &weights)?;

        let count = eligible.len();
        let credits: Vec<TouchpointCredit> = eligible
            .iter()
            .enumerate()
            .map(|(i, t)| TouchpointCredit {
                touchpoint_id: t.id,
                channel: t.channel_label().to_string(),
                source: t.source_label().to_string(),
                campaign: t.campaign_label().to_string(),
                timestamp: t.timestamp,
                position: TouchPosition::of(i, count),
                weight: weights[i],
                attributed_value: from_minor_units(value_shares[i], digits),
                conversion_credit: from_minor_units(credit_shares[i], CONVERSION_CREDIT_DIGITS),
            })
            .collect();

        let channels = aggregate_by_channel(&credits);
        let total_attributed = from_minor_units(value_shares.iter().sum(), digits);

        debug!(
            conversion_id = %conversion.id,
            %model,
            touchpoints = count,
            %total_attributed,
            "Attributed conversion"
        );

        Ok(AttributionResult {
            conversion_id: conversion.id,
            model,
            conversion_value: from_minor_units(value_units, digits),
            channels,
            total_attributed,
            credits,
        })
    }

    /// Look up a conversion in the source and attribute it.
    pub fn attribute(
        &self,
        source: &dyn TouchpointSource,
        customer_id: &str,
        conversion_id: Uuid,
        model: AttributionModel,
    ) -> CoreResult<AttributionResult> {
        let history = source.history(customer_id)?;
        let conversion = history
            .iter()
            .find(|t| t.id == conversion_id && t.is_conversion)
            .ok_or_else(|| AttributionError::ConversionNotFound {
                customer_id: customer_id.to_string(),
                conversion_id,
            })?;
        self.attribute_conversion(&history, conversion, model)
    }
}
