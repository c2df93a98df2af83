use chrono::{DateTime, Utc};

use crate::context::LoanContext;
use crate::decimal::Rate;
use crate::errors::Result;
use crate::interest::{FixedRate, InterestRate, VariableRate};
use crate::reamortization::ReamortizationCondition;
use crate::term::calculate_elapsed_term;
use crate::types::ReamortizationReason;

pub const PARAM_FIXED_INTEREST_TERM: &str = "fixed_interest_term";

/// fixed rate for the first `fixed_interest_term` periods, variable afterwards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedToVariableRate;

impl FixedToVariableRate {
    /// a fixed term of 0 means the loan is never on the fixed rate
    pub fn is_within_fixed_rate_term(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<bool> {
        let fixed_term = fixed_interest_term(ctx)?;
        if fixed_term == 0 {
            return Ok(false);
        }
        let elapsed = if at == ctx.creation_datetime() {
            0
        } else {
            calculate_elapsed_term(ctx, Some(at))?
        };
        Ok(elapsed < fixed_term)
    }
}

fn fixed_interest_term(ctx: &LoanContext<'_>) -> Result<u32> {
    let term = ctx.get_int_or(PARAM_FIXED_INTEREST_TERM, None, 0)?;
    Ok(u32::try_from(term).unwrap_or(0))
}

impl InterestRate for FixedToVariableRate {
    fn annual_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        if self.is_within_fixed_rate_term(ctx, at)? {
            FixedRate.annual_rate(ctx, at)
        } else {
            VariableRate.annual_rate(ctx, at)
        }
    }

    fn monthly_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        if self.is_within_fixed_rate_term(ctx, at)? {
            FixedRate.monthly_rate(ctx, at)
        } else {
            VariableRate.monthly_rate(ctx, at)
        }
    }

    fn daily_rate(&self, ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Rate> {
        if self.is_within_fixed_rate_term(ctx, at)? {
            FixedRate.daily_rate(ctx, at)
        } else {
            VariableRate.daily_rate(ctx, at)
        }
    }
}

impl ReamortizationCondition for FixedToVariableRate {
    fn reason(&self) -> ReamortizationReason {
        ReamortizationReason::RegimeTransition
    }

    fn should_trigger(
        &self,
        ctx: &LoanContext<'_>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        elapsed_term: u32,
    ) -> Result<bool> {
        if self.is_within_fixed_rate_term(ctx, period_end)? {
            return Ok(false);
        }
        // elapsed only equals the fixed term on the first variable period
        if elapsed_term == fixed_interest_term(ctx)? {
            let variable = VariableRate.annual_rate(ctx, period_end)?;
            let fixed = FixedRate.annual_rate(ctx, period_end)?;
            tracing::debug!(%fixed, %variable, "fixed rate term ended");
            return Ok(variable != fixed);
        }
        VariableRate.should_trigger(ctx, period_start, period_end, elapsed_term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interest::fixed::PARAM_FIXED_INTEREST_RATE;
    use crate::interest::variable::PARAM_VARIABLE_INTEREST_RATE;
    use crate::ledger::{create_postings, CustomInstruction, DUE_CALCULATION_EVENT_COUNTER, INTERNAL_CONTRA};
    use crate::memory::InMemoryAccount;
    use crate::decimal::Money;
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn account(fixed_term: u32, elapsed: i64) -> InMemoryAccount {
        let mut account = InMemoryAccount::new("loan", created());
        account.set_parameter("denomination", "GBP", created());
        account.set_parameter(PARAM_FIXED_INTEREST_RATE, dec!(0.03), created());
        account.set_parameter(PARAM_VARIABLE_INTEREST_RATE, dec!(0.06), created());
        account.set_parameter(PARAM_FIXED_INTEREST_TERM, Decimal::from(fixed_term), created());
        if elapsed > 0 {
            let counter = CustomInstruction::new(
                create_postings(
                    Money::from_major(elapsed),
                    "loan",
                    DUE_CALCULATION_EVENT_COUNTER,
                    "loan",
                    INTERNAL_CONTRA,
                    "GBP",
                ),
                BTreeMap::new(),
            );
            account.apply(&[counter], created() + Duration::days(1)).unwrap();
        }
        account
    }

    #[test]
    fn test_fixed_then_variable() {
        let later = created() + Duration::days(200);

        let in_fixed = account(6, 5);
        assert_eq!(
            FixedToVariableRate.annual_rate(&in_fixed.context(), later).unwrap().as_decimal(),
            dec!(0.03)
        );

        let after_fixed = account(6, 6);
        assert_eq!(
            FixedToVariableRate.annual_rate(&after_fixed.context(), later).unwrap().as_decimal(),
            dec!(0.06)
        );
    }

    #[test]
    fn test_zero_fixed_term_is_never_fixed() {
        let account = account(0, 0);
        let ctx = account.context();
        assert!(!FixedToVariableRate.is_within_fixed_rate_term(&ctx, created()).unwrap());
        assert_eq!(FixedToVariableRate.annual_rate(&ctx, created()).unwrap().as_decimal(), dec!(0.06));
    }

    #[test]
    fn test_activation_instant_counts_as_fixed() {
        let account = account(6, 0);
        assert!(FixedToVariableRate
            .is_within_fixed_rate_term(&account.context(), created())
            .unwrap());
    }

    #[test]
    fn test_transition_boundary() {
        let start = created() + Duration::days(150);
        let end = created() + Duration::days(181);

        let still_fixed = account(6, 5);
        assert!(!FixedToVariableRate.should_trigger(&still_fixed.context(), start, end, 5).unwrap());

        let boundary = account(6, 6);
        assert!(FixedToVariableRate.should_trigger(&boundary.context(), start, end, 6).unwrap());

        // identical rates at the boundary need no new instalment
        let mut same_rates = account(6, 6);
        same_rates.set_parameter(PARAM_VARIABLE_INTEREST_RATE, dec!(0.03), created());
        assert!(!FixedToVariableRate.should_trigger(&same_rates.context(), start, end, 6).unwrap());
    }

    #[test]
    fn test_after_boundary_delegates_to_rate_change() {
        let start = created() + Duration::days(200);
        let end = created() + Duration::days(231);

        let mut account = account(6, 7);
        assert!(!FixedToVariableRate.should_trigger(&account.context(), start, end, 7).unwrap());

        account.set_parameter(PARAM_VARIABLE_INTEREST_RATE, dec!(0.07), start + Duration::days(5));
        assert!(FixedToVariableRate.should_trigger(&account.context(), start, end, 7).unwrap());
    }
}
