use crate::amortization::declining_principal::apply_declining_principal_formula;
use crate::amortization::{Amortization, AmortizationInputs};
use crate::balloon::{PARAM_BALLOON_EMI_AMOUNT, PARAM_BALLOON_PAYMENT_AMOUNT};
use crate::context::LoanContext;
use crate::decimal::Money;
use crate::errors::Result;
use crate::term::{calculate_elapsed_term, original_total_term};
use crate::types::{AmortizationMethod, TermDetails};

/// reduced instalments leaving a lump sum for the balloon event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MinimumRepayment;

impl MinimumRepayment {
    /// instalment configured directly, bypassing the formula
    pub fn static_emi(&self, ctx: &LoanContext<'_>) -> Result<Option<Money>> {
        Ok(ctx
            .get_optional_decimal(PARAM_BALLOON_EMI_AMOUNT, None)?
            .filter(|emi| !emi.is_zero())
            .map(Money::from_decimal))
    }
}

impl Amortization for MinimumRepayment {
    fn method(&self) -> AmortizationMethod {
        AmortizationMethod::MinimumRepaymentWithBalloonPayment
    }

    fn override_final_event(&self) -> bool {
        true
    }

    fn calculate_emi(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<Money> {
        if let Some(emi) = self.static_emi(ctx)? {
            return Ok(emi);
        }

        let lump_sum = ctx
            .get_optional_decimal(PARAM_BALLOON_PAYMENT_AMOUNT, None)?
            .map(Money::from_decimal);
        let rate = inputs.monthly_rate(ctx)?;
        let principal = inputs.adjusted_principal(ctx)?;
        let term = self.term_details(ctx, inputs)?;
        apply_declining_principal_formula(principal, rate, term.remaining, lump_sum)
    }

    fn term_details(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<TermDetails> {
        let total = original_total_term(ctx)?;
        if inputs.effective == ctx.creation_datetime() {
            return Ok(TermDetails::new(0, total));
        }
        let elapsed = calculate_elapsed_term(ctx, Some(inputs.effective))?;
        Ok(TermDetails::new(elapsed, total.saturating_sub(elapsed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::DecliningPrincipal;
    use crate::config::{PARAM_DENOMINATION, PARAM_PRINCIPAL, PARAM_TOTAL_REPAYMENT_COUNT};
    use crate::interest::fixed::PARAM_FIXED_INTEREST_RATE;
    use crate::interest::FixedRate;
    use crate::ledger::{create_postings, CustomInstruction, DUE_CALCULATION_EVENT_COUNTER, INTERNAL_CONTRA};
    use crate::memory::InMemoryAccount;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn account() -> InMemoryAccount {
        let mut account = InMemoryAccount::new("loan", created());
        account.set_parameter(PARAM_DENOMINATION, "GBP", created());
        account.set_parameter(PARAM_PRINCIPAL, dec!(10000), created());
        account.set_parameter(PARAM_TOTAL_REPAYMENT_COUNT, dec!(24), created());
        account.set_parameter(PARAM_FIXED_INTEREST_RATE, dec!(0.12), created());
        account
    }

    #[test]
    fn test_balloon_amount_reduces_instalment() {
        let mut account = account();
        account.set_parameter(PARAM_BALLOON_PAYMENT_AMOUNT, dec!(2000), created());
        let ctx = account.context();
        let inputs = AmortizationInputs::at(created()).interest_rate(&FixedRate);

        let minimum = MinimumRepayment.calculate_emi(&ctx, &inputs).unwrap();
        let declining = DecliningPrincipal.calculate_emi(&ctx, &inputs).unwrap();
        assert_eq!(minimum, Money::from_decimal(dec!(396.59)));
        assert_eq!(declining, Money::from_decimal(dec!(470.73)));
    }

    #[test]
    fn test_static_emi_bypasses_formula() {
        let mut account = account();
        account.set_parameter(PARAM_BALLOON_EMI_AMOUNT, dec!(250), created());
        account.set_parameter(PARAM_BALLOON_PAYMENT_AMOUNT, dec!(2000), created());
        let inputs = AmortizationInputs::at(created()).interest_rate(&FixedRate);
        assert_eq!(
            MinimumRepayment.calculate_emi(&account.context(), &inputs).unwrap(),
            Money::from_major(250)
        );
    }

    #[test]
    fn test_zero_balloon_matches_declining_principal() {
        let account = account();
        let ctx = account.context();
        let inputs = AmortizationInputs::at(created()).interest_rate(&FixedRate);
        assert_eq!(
            MinimumRepayment.calculate_emi(&ctx, &inputs).unwrap(),
            DecliningPrincipal.calculate_emi(&ctx, &inputs).unwrap()
        );
    }

    #[test]
    fn test_term_ignores_principal_balance() {
        let mut account = account();
        let counter = create_postings(
            Money::from_major(24),
            "loan",
            DUE_CALCULATION_EVENT_COUNTER,
            "loan",
            INTERNAL_CONTRA,
            "GBP",
        );
        account
            .apply(&[CustomInstruction::new(counter, BTreeMap::new())], created() + Duration::days(1))
            .unwrap();
        let inputs = AmortizationInputs::at(created() + Duration::days(2));
        assert_eq!(
            MinimumRepayment.term_details(&account.context(), &inputs).unwrap(),
            TermDetails::new(24, 0)
        );
    }
}
