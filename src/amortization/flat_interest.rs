use rust_decimal::Decimal;

use crate::amortization::{Amortization, AmortizationInputs};
use crate::context::LoanContext;
use crate::decimal::{round_half_up, Money, Rate, FULFILLMENT_PRECISION};
use crate::errors::Result;
use crate::term::term_details_from_counter;
use crate::types::{AmortizationMethod, TermDetails};

/// interest fixed up front on the original principal and spread evenly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlatInterest;

/// total interest over the life of the loan, `P * (annual / 12) * N`
pub fn calculate_non_accruing_loan_total_interest(
    original_principal: Money,
    annual_rate: Rate,
    total_term: u32,
    precision: u32,
) -> Money {
    let monthly = annual_rate.to_monthly().as_decimal();
    Money::from_decimal(round_half_up(
        original_principal.as_decimal() * monthly * Decimal::from(total_term),
        precision,
    ))
}

/// interest due for one period; the final period absorbs the rounding remainder
pub fn calculate_interest_due(total_interest: Money, total_term: u32, remaining_term: u32, precision: u32) -> Money {
    if total_term == 0 {
        return total_interest;
    }
    let monthly_due = Money::from_decimal(round_half_up(
        total_interest.as_decimal() / Decimal::from(total_term),
        precision,
    ));
    if remaining_term == 1 {
        total_interest - monthly_due * Decimal::from(total_term - remaining_term)
    } else {
        monthly_due
    }
}

impl Amortization for FlatInterest {
    fn method(&self) -> AmortizationMethod {
        AmortizationMethod::FlatInterest
    }

    fn override_final_event(&self) -> bool {
        false
    }

    fn calculate_emi(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<Money> {
        let annual = match inputs.interest_rate {
            Some(rate) => rate.annual_rate(ctx, inputs.effective)?,
            None => Rate::ZERO,
        };
        let total_term = crate::term::original_total_term(ctx)?;
        let principal = inputs.adjusted_principal(ctx)?;
        if total_term == 0 {
            return Ok(principal);
        }

        let total_interest = calculate_non_accruing_loan_total_interest(principal, annual, total_term, FULFILLMENT_PRECISION);
        Ok(Money::from_decimal(round_half_up(
            (principal + total_interest).as_decimal() / Decimal::from(total_term),
            FULFILLMENT_PRECISION,
        )))
    }

    fn term_details(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<TermDetails> {
        term_details_from_counter(ctx, inputs.effective)
    }
}
