pub mod application;
pub mod fixed;
pub mod fixed_to_variable;
pub mod variable;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::LoanContext;
use crate::decimal::Rate;
use crate::errors::Result;
use crate::reamortization::ReamortizationCondition;
use crate::types::{DaysInYear, ReamortizationReason};

pub use application::{
    accrue_daily_interest, AccruedInterestApplication, FlatInterestApplication, InterestAmounts,
    InterestApplication,
};
pub use fixed::FixedRate;
pub use fixed_to_variable::FixedToVariableRate;
pub use variable::VariableRate;

pub const PARAM_DAYS_IN_YEAR: &str = "days_in_year";

/// rate resolved at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    pub annual: Rate,
    pub monthly: Rate,
    pub daily: Rate,
}

/// source of a loan's interest rate over time
pub trait InterestRate {
    fn annual_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate>;

    fn monthly_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        Ok(yearly_to_monthly_rate(self.annual_rate(ctx, at)?))
    }

    fn daily_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        let annual = self.annual_rate(ctx, at)?;
        Ok(yearly_to_daily_rate(at, annual, days_in_year(ctx, at)?))
    }

    fn resolve(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<ResolvedRate> {
        Ok(ResolvedRate {
            annual: self.annual_rate(ctx, at)?,
            monthly: self.monthly_rate(ctx, at)?,
            daily: self.daily_rate(ctx, at)?,
        })
    }
}

pub fn yearly_to_monthly_rate(annual: Rate) -> Rate {
    annual.to_monthly()
}

pub fn yearly_to_daily_rate(at: DateTime<Utc>, annual: Rate, days_in_year: DaysInYear) -> Rate {
    annual.to_daily(days_in_year.days(at))
}

/// configured day count, `Actual` when unset or unsupported
pub fn days_in_year(ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<DaysInYear> {
    Ok(ctx
        .get_optional_text(PARAM_DAYS_IN_YEAR, Some(at))?
        .map(|value| DaysInYear::parse_or_actual(&value))
        .unwrap_or_default())
}

/// the three rate regimes behind one type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestRateFeature {
    Fixed(FixedRate),
    Variable(VariableRate),
    FixedToVariable(FixedToVariableRate),
}

impl InterestRateFeature {
    /// pick the regime implied by the configured parameters
    pub fn from_parameters(ctx: &LoanContext<'_>) -> Result<Self> {
        let has_variable = ctx
            .parameters
            .parameter(variable::PARAM_VARIABLE_INTEREST_RATE, None)?
            .is_some();
        let has_fixed = ctx.parameters.parameter(fixed::PARAM_FIXED_INTEREST_RATE, None)?.is_some();
        let fixed_term = ctx.get_int_or(fixed_to_variable::PARAM_FIXED_INTEREST_TERM, None, 0)?;

        Ok(match (has_fixed, has_variable) {
            (true, true) if fixed_term > 0 => InterestRateFeature::FixedToVariable(FixedToVariableRate),
            (_, true) => InterestRateFeature::Variable(VariableRate),
            _ => InterestRateFeature::Fixed(FixedRate),
        })
    }
}

impl InterestRate for InterestRateFeature {
    fn annual_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        match self {
            InterestRateFeature::Fixed(rate) => rate.annual_rate(ctx, at),
            InterestRateFeature::Variable(rate) => rate.annual_rate(ctx, at),
            InterestRateFeature::FixedToVariable(rate) => rate.annual_rate(ctx, at),
        }
    }

    fn monthly_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        match self {
            InterestRateFeature::Fixed(rate) => rate.monthly_rate(ctx, at),
            InterestRateFeature::Variable(rate) => rate.monthly_rate(ctx, at),
            InterestRateFeature::FixedToVariable(rate) => rate.monthly_rate(ctx, at),
        }
    }

    fn daily_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        match self {
            InterestRateFeature::Fixed(rate) => rate.daily_rate(ctx, at),
            InterestRateFeature::Variable(rate) => rate.daily_rate(ctx, at),
            InterestRateFeature::FixedToVariable(rate) => rate.daily_rate(ctx, at),
        }
    }
}

impl ReamortizationCondition for InterestRateFeature {
    fn reason(&self) -> ReamortizationReason {
        match self {
            InterestRateFeature::Fixed(rate) => rate.reason(),
            InterestRateFeature::Variable(rate) => rate.reason(),
            InterestRateFeature::FixedToVariable(rate) => rate.reason(),
        }
    }

    fn should_trigger(
        &self,
        ctx: &LoanContext<'_>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        elapsed_term: u32,
    ) -> Result<bool> {
        match self {
            InterestRateFeature::Fixed(rate) => rate.should_trigger(ctx, period_start, period_end, elapsed_term),
            InterestRateFeature::Variable(rate) => rate.should_trigger(ctx, period_start, period_end, elapsed_term),
            InterestRateFeature::FixedToVariable(rate) => {
                rate.should_trigger(ctx, period_start, period_end, elapsed_term)
            }
        }
    }
}
