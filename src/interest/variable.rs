use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::context::LoanContext;
use crate::decimal::Rate;
use crate::errors::Result;
use crate::interest::InterestRate;
use crate::reamortization::ReamortizationCondition;
use crate::types::ReamortizationReason;

pub const PARAM_VARIABLE_INTEREST_RATE: &str = "variable_interest_rate";
pub const PARAM_VARIABLE_RATE_ADJUSTMENT: &str = "variable_rate_adjustment";
pub const PARAM_ANNUAL_INTEREST_RATE_CAP: &str = "annual_interest_rate_cap";
pub const PARAM_ANNUAL_INTEREST_RATE_FLOOR: &str = "annual_interest_rate_floor";

/// base rate plus adjustment, clamped to the optional floor and cap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariableRate;

impl InterestRate for VariableRate {
    fn annual_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        let base = ctx.get_decimal(PARAM_VARIABLE_INTEREST_RATE, Some(at))?;
        let adjustment = ctx.get_decimal_or(PARAM_VARIABLE_RATE_ADJUSTMENT, Some(at), Decimal::ZERO)?;
        let cap = ctx.get_optional_decimal(PARAM_ANNUAL_INTEREST_RATE_CAP, Some(at))?;
        let floor = ctx.get_optional_decimal(PARAM_ANNUAL_INTEREST_RATE_FLOOR, Some(at))?;

        let mut annual = base + adjustment;
        if let Some(cap) = cap {
            annual = annual.min(cap);
        }
        if let Some(floor) = floor {
            annual = annual.max(floor);
        }
        Ok(Rate::from_decimal(annual))
    }
}

impl ReamortizationCondition for VariableRate {
    fn reason(&self) -> ReamortizationReason {
        ReamortizationReason::RateChanged
    }

    /// the monthly rate moved between the two due events
    fn should_trigger(
        &self,
        ctx: &LoanContext<'_>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        _elapsed_term: u32,
    ) -> Result<bool> {
        let before = self.monthly_rate(ctx, period_start)?;
        let after = self.monthly_rate(ctx, period_end)?;
        if before != after {
            tracing::debug!(%before, %after, "monthly rate changed within period");
        }
        Ok(before != after)
    }
}
