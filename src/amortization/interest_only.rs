use crate::amortization::{Amortization, AmortizationInputs};
use crate::context::LoanContext;
use crate::decimal::Money;
use crate::errors::Result;
use crate::term::term_details_from_counter;
use crate::types::{AmortizationMethod, TermDetails};

/// only interest falls due; the principal is settled by the balloon event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterestOnly;

impl Amortization for InterestOnly {
    fn method(&self) -> AmortizationMethod {
        AmortizationMethod::InterestOnly
    }

    fn override_final_event(&self) -> bool {
        true
    }

    fn calculate_emi(&self, _ctx: &LoanContext<'_>, _inputs: &AmortizationInputs<'_>) -> Result<Money> {
        Ok(Money::ZERO)
    }

    fn term_details(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<TermDetails> {
        term_details_from_counter(ctx, inputs.effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PARAM_PRINCIPAL, PARAM_TOTAL_REPAYMENT_COUNT};
    use crate::memory::InMemoryAccount;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_interest_only_has_no_instalment() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut account = InMemoryAccount::new("loan", at);
        account.set_parameter(PARAM_PRINCIPAL, dec!(50000), at);
        account.set_parameter(PARAM_TOTAL_REPAYMENT_COUNT, dec!(24), at);

        let ctx = account.context();
        let inputs = AmortizationInputs::at(at);
        assert_eq!(InterestOnly.calculate_emi(&ctx, &inputs).unwrap(), Money::ZERO);
        assert_eq!(InterestOnly.term_details(&ctx, &inputs).unwrap(), TermDetails::new(0, 24));
    }
}
