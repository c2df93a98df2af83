use chrono::{DateTime, Utc};

use crate::context::LoanContext;
use crate::decimal::Rate;
use crate::errors::Result;
use crate::interest::InterestRate;
use crate::reamortization::ReamortizationCondition;
use crate::types::ReamortizationReason;

pub const PARAM_FIXED_INTEREST_RATE: &str = "fixed_interest_rate";

/// per-loan rate that only changes if ops edit the parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedRate;

impl InterestRate for FixedRate {
    fn annual_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        Ok(Rate::from_decimal(ctx.get_decimal(PARAM_FIXED_INTEREST_RATE, Some(at))?))
    }
}

impl ReamortizationCondition for FixedRate {
    fn reason(&self) -> ReamortizationReason {
        ReamortizationReason::RateChanged
    }

    fn should_trigger(
        &self,
        _ctx: &LoanContext<'_>,
        _period_start: DateTime<Utc>,
        _period_end: DateTime<Utc>,
        _elapsed_term: u32,
    ) -> Result<bool> {
        Ok(false)
    }
}
