use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::amortization::{Amortization, AmortizationInputs};
use crate::context::LoanContext;
use crate::decimal::{discount_factor, log_base, round_half_up, Money, Rate, FULFILLMENT_PRECISION};
use crate::errors::{LoanError, Result};
use crate::ledger::{EMI, PRINCIPAL};
use crate::term::{calculate_elapsed_term, original_total_term};
use crate::types::{AmortizationMethod, TermDetails};

/// equal instalments with interest charged on the declining balance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecliningPrincipal;

/// instalment that repays `remaining_principal` down to `lump_sum` over `remaining_term` periods
///
/// `EMI = (P - L/(1+R)^N) * R * (1+R)^N / ((1+R)^N - 1)`, rounded half up
/// to fulfillment precision. With L = 0 this is the standard annuity.
pub fn apply_declining_principal_formula(
    remaining_principal: Money,
    monthly_rate: Rate,
    remaining_term: u32,
    lump_sum: Option<Money>,
) -> Result<Money> {
    if remaining_term == 0 {
        return Ok(remaining_principal);
    }

    let principal = remaining_principal.as_decimal();
    let rate = monthly_rate.as_decimal();
    if rate.is_zero() {
        return Ok(Money::from_decimal(round_half_up(
            principal / Decimal::from(remaining_term),
            FULFILLMENT_PRECISION,
        )));
    }

    // divided through by (1+R)^N so large terms at high rates tend to P*R
    let lump_sum = lump_sum.unwrap_or(Money::ZERO).as_decimal();
    let discount = discount_factor(rate, remaining_term);
    let emi = (principal - lump_sum * discount) * rate / (Decimal::ONE - discount);
    Ok(Money::from_decimal(round_half_up(emi, FULFILLMENT_PRECISION)))
}

/// periods an instalment needs to repay the principal, partial periods counted whole
///
/// inverts the annuity formula: `N = log(EMI / (EMI - P*R), 1+R)`.
pub fn calculate_remaining_term(emi: Money, remaining_principal: Money, monthly_rate: Rate) -> Result<u32> {
    if emi.is_zero() {
        return Ok(0);
    }

    let emi_value = emi.as_decimal();
    let principal = remaining_principal.as_decimal();
    let rate = monthly_rate.as_decimal();
    let term = if rate > Decimal::ZERO {
        let interest = principal * rate;
        if emi_value <= interest {
            return Err(LoanError::NonAmortizingEmi {
                emi,
                interest: Money::from_decimal(interest),
            });
        }
        log_base(emi_value / (emi_value - interest), Decimal::ONE + rate)?
    } else {
        principal / emi_value
    };

    let term = round_half_up(term, FULFILLMENT_PRECISION).ceil();
    term.max(Decimal::ZERO).to_u32().ok_or_else(|| LoanError::CalculationError {
        message: format!("remaining term {term} out of range"),
    })
}

impl DecliningPrincipal {
    /// expected term, or the term the current instalment actually needs when that is shorter
    pub fn remaining_term(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<TermDetails> {
        let total = original_total_term(ctx)?;
        if inputs.effective == ctx.creation_datetime() {
            return Ok(TermDetails::new(0, total));
        }

        let denomination = ctx.denomination()?;
        let at = Some(inputs.effective);
        let principal = ctx.balance(PRINCIPAL, &denomination, at)?;
        let elapsed = calculate_elapsed_term(ctx, at)?;
        let expected = if principal.is_positive() {
            total.saturating_sub(elapsed)
        } else {
            0
        };
        if inputs.use_expected_term {
            return Ok(TermDetails::new(elapsed, expected));
        }

        let emi = ctx.balance(EMI, &denomination, at)?;
        if emi.is_zero() {
            return Ok(TermDetails::new(elapsed, expected));
        }
        let adjusted = principal + inputs.total_adjustment(ctx, &denomination)?;
        let derived = calculate_remaining_term(emi, adjusted, inputs.monthly_rate(ctx)?)?;
        tracing::debug!(elapsed, expected, derived, "remaining term derived from emi");
        Ok(TermDetails::new(elapsed, derived.min(expected)))
    }
}

impl Amortization for DecliningPrincipal {
    fn method(&self) -> AmortizationMethod {
        AmortizationMethod::DecliningPrincipal
    }

    fn override_final_event(&self) -> bool {
        false
    }

    fn calculate_emi(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<Money> {
        let principal = inputs.adjusted_principal(ctx)?;
        let rate = inputs.monthly_rate(ctx)?;
        let term = self.remaining_term(ctx, inputs)?;
        apply_declining_principal_formula(principal, rate, term.remaining, None)
    }

    fn term_details(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<TermDetails> {
        self.remaining_term(ctx, inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PARAM_DENOMINATION, PARAM_PRINCIPAL, PARAM_TOTAL_REPAYMENT_COUNT};
    use crate::interest::fixed::PARAM_FIXED_INTEREST_RATE;
    use crate::interest::FixedRate;
    use crate::ledger::{create_postings, CustomInstruction, DUE_CALCULATION_EVENT_COUNTER, INTERNAL_CONTRA};
    use crate::memory::InMemoryAccount;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn money(d: Decimal) -> Money {
        Money::from_decimal(d)
    }

    #[test]
    fn test_standard_annuity() {
        let emi = apply_declining_principal_formula(money(dec!(12000)), Rate::from_decimal(dec!(0.01)), 12, None).unwrap();
        assert_eq!(emi, money(dec!(1066.19)));
    }

    #[test]
    fn test_zero_rate_divides_evenly() {
        let emi = apply_declining_principal_formula(money(dec!(1200)), Rate::ZERO, 12, None).unwrap();
        assert_eq!(emi, money(dec!(100.00)));

        let uneven = apply_declining_principal_formula(money(dec!(1000)), Rate::ZERO, 3, None).unwrap();
        assert_eq!(uneven, money(dec!(333.33)));
    }

    #[test]
    fn test_no_remaining_term_returns_principal() {
        let emi = apply_declining_principal_formula(money(dec!(523.17)), Rate::from_decimal(dec!(0.01)), 0, None).unwrap();
        assert_eq!(emi, money(dec!(523.17)));
    }

    #[test]
    fn test_lump_sum_lowers_instalment() {
        let rate = Rate::from_decimal(dec!(0.01));
        let with_balloon = apply_declining_principal_formula(money(dec!(10000)), rate, 24, Some(money(dec!(2000)))).unwrap();
        let without = apply_declining_principal_formula(money(dec!(10000)), rate, 24, None).unwrap();
        assert_eq!(with_balloon, money(dec!(396.59)));
        assert_eq!(without, money(dec!(470.73)));
        assert!(with_balloon < without);
    }

    #[test]
    fn test_long_term_at_high_rate_tends_to_interest_only() {
        let emi = apply_declining_principal_formula(money(dec!(1000)), Rate::from_decimal(dec!(0.9)), 120, None).unwrap();
        assert_eq!(emi, money(dec!(900.00)));

        let emi = apply_declining_principal_formula(money(dec!(1000)), Rate::from_decimal(dec!(0.99)), 360, None).unwrap();
        assert_eq!(emi, money(dec!(990.00)));

        let with_balloon =
            apply_declining_principal_formula(money(dec!(1000)), Rate::from_decimal(dec!(0.9)), 120, Some(money(dec!(500))))
                .unwrap();
        assert_eq!(with_balloon, money(dec!(900.00)));
    }

    #[test]
    fn test_remaining_term_inverts_the_formula() {
        let rate = Rate::from_decimal(dec!(0.01));
        assert_eq!(calculate_remaining_term(money(dec!(1066.19)), money(dec!(12000)), rate).unwrap(), 12);

        for (principal, monthly, term) in [
            (dec!(250000), dec!(0.0041666667), 300u32),
            (dec!(5000), dec!(0.015), 36),
            (dec!(999.99), dec!(0.002), 7),
            (dec!(1500), dec!(0), 10),
        ] {
            let rate = Rate::from_decimal(monthly);
            let emi = apply_declining_principal_formula(money(principal), rate, term, None).unwrap();
            let derived = calculate_remaining_term(emi, money(principal), rate).unwrap();
            assert!(derived.abs_diff(term) <= 1, "{principal} at {monthly}: {derived} vs {term}");
        }
    }

    #[test]
    fn test_remaining_term_edge_cases() {
        assert_eq!(calculate_remaining_term(Money::ZERO, money(dec!(100)), Rate::ZERO).unwrap(), 0);
        // 16.4 periods at zero rate still needs 17 payments
        assert_eq!(calculate_remaining_term(money(dec!(100)), money(dec!(1640)), Rate::ZERO).unwrap(), 17);

        let err = calculate_remaining_term(money(dec!(10)), money(dec!(1000)), Rate::from_decimal(dec!(0.01))).unwrap_err();
        assert!(matches!(err, LoanError::NonAmortizingEmi { .. }));
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn account() -> InMemoryAccount {
        let mut account = InMemoryAccount::new("loan", created());
        account.set_parameter(PARAM_DENOMINATION, "GBP", created());
        account.set_parameter(PARAM_PRINCIPAL, dec!(12000), created());
        account.set_parameter(PARAM_TOTAL_REPAYMENT_COUNT, dec!(12), created());
        account.set_parameter(PARAM_FIXED_INTEREST_RATE, dec!(0.12), created());
        account
    }

    fn book(account: &mut InMemoryAccount, address: &str, amount: Decimal, at: DateTime<Utc>) {
        let postings = create_postings(money(amount), "loan", address, "loan", INTERNAL_CONTRA, "GBP");
        account.apply(&[CustomInstruction::new(postings, BTreeMap::new())], at).unwrap();
    }

    #[test]
    fn test_emi_at_activation() {
        let account = account();
        let inputs = AmortizationInputs::at(created()).interest_rate(&FixedRate);
        assert_eq!(
            DecliningPrincipal.calculate_emi(&account.context(), &inputs).unwrap(),
            money(dec!(1066.19))
        );
    }

    #[test]
    fn test_overpayment_shortens_derived_term() {
        let mut account = account();
        book(&mut account, PRINCIPAL, dec!(6000), created());
        book(&mut account, EMI, dec!(1066.19), created());
        book(&mut account, DUE_CALCULATION_EVENT_COUNTER, dec!(2), created() + Duration::days(59));

        let at = created() + Duration::days(61);
        let ctx = account.context();
        let expected = AmortizationInputs::at(at).interest_rate(&FixedRate);
        assert_eq!(DecliningPrincipal.term_details(&ctx, &expected).unwrap(), TermDetails::new(2, 10));

        let derived = expected.use_expected_term(false);
        let details = DecliningPrincipal.term_details(&ctx, &derived).unwrap();
        assert_eq!(details.elapsed, 2);
        assert_eq!(details.remaining, 6);
    }
}
