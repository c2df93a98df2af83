use chrono::{DateTime, Utc};

use crate::context::LoanContext;
use crate::errors::Result;
use crate::reamortization::ReamortizationCondition;
use crate::types::{HolidayImpactPreference, ReamortizationReason};

pub const DEFAULT_BLOCKING_FLAG: &str = "REPAYMENT_HOLIDAY";
pub const PARAM_DUE_AMOUNT_CALCULATION_BLOCKING_FLAGS: &str = "due_amount_calculation_blocking_flags";
pub const PARAM_REPAYMENT_HOLIDAY_IMPACT_PREFERENCE: &str = "repayment_holiday_impact_preference";

/// flags that suspend due amount calculation, a json list parameter
pub fn due_amount_calculation_blocking_flags(ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Vec<String>> {
    Ok(ctx
        .get_json::<Vec<String>>(PARAM_DUE_AMOUNT_CALCULATION_BLOCKING_FLAGS, Some(at))?
        .unwrap_or_else(|| vec![DEFAULT_BLOCKING_FLAG.to_string()]))
}

pub fn is_due_amount_calculation_blocked(ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<bool> {
    let flags = due_amount_calculation_blocking_flags(ctx, at)?;
    Ok(flags.iter().any(|flag| ctx.history.is_flag_active(flag, at)))
}

pub fn impact_preference(ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<HolidayImpactPreference> {
    match ctx.get_optional_text(PARAM_REPAYMENT_HOLIDAY_IMPACT_PREFERENCE, Some(at))? {
        Some(value) => Ok(HolidayImpactPreference::parse_or_increase_term(&value)),
        None => Ok(HolidayImpactPreference::IncreaseEmi),
    }
}

/// blocked when the period started and no longer blocked when it ends
pub fn has_repayment_holiday_ended(
    ctx: &LoanContext<'_>,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> Result<bool> {
    Ok(is_due_amount_calculation_blocked(ctx, period_start)?
        && !is_due_amount_calculation_blocked(ctx, period_end)?)
}

/// reamortizes once a repayment holiday is over
///
/// with `respect_impact_preference` only loans preferring a higher
/// instalment are reamortized; `increase_term` loans keep their instalment
/// and the frozen counter stretches the term instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaymentHolidayCondition {
    pub respect_impact_preference: bool,
}

impl RepaymentHolidayCondition {
    pub fn with_preference() -> Self {
        Self {
            respect_impact_preference: true,
        }
    }

    pub fn without_preference() -> Self {
        Self {
            respect_impact_preference: false,
        }
    }
}

impl Default for RepaymentHolidayCondition {
    fn default() -> Self {
        Self::with_preference()
    }
}

impl ReamortizationCondition for RepaymentHolidayCondition {
    fn reason(&self) -> ReamortizationReason {
        ReamortizationReason::HolidayEnded
    }

    fn should_trigger(
        &self,
        ctx: &LoanContext<'_>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        _elapsed_term: u32,
    ) -> Result<bool> {
        if self.respect_impact_preference
            && impact_preference(ctx, period_end)? != HolidayImpactPreference::IncreaseEmi
        {
            return Ok(false);
        }
        has_repayment_holiday_ended(ctx, period_start, period_end)
    }
}
