use chrono::{DateTime, Duration, Utc};

use crate::amortization::{Amortization, AmortizationInputs};
use crate::balloon::PARAM_BALLOON_PAYMENT_DAYS_DELTA;
use crate::context::LoanContext;
use crate::decimal::Money;
use crate::errors::Result;
use crate::schedule::add_months;
use crate::term::{calendar_term_details, original_total_term};
use crate::types::{AmortizationMethod, TermDetails};

/// nothing is due before the balloon event at term end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRepayment;

impl Amortization for NoRepayment {
    fn method(&self) -> AmortizationMethod {
        AmortizationMethod::NoRepayment
    }

    fn override_final_event(&self) -> bool {
        true
    }

    fn calculate_emi(&self, _ctx: &LoanContext<'_>, _inputs: &AmortizationInputs<'_>) -> Result<Money> {
        Ok(Money::ZERO)
    }

    fn term_details(&self, ctx: &LoanContext<'_>, inputs: &AmortizationInputs<'_>) -> Result<TermDetails> {
        calendar_term_details(ctx, inputs.effective)
    }
}

/// creation plus the full term plus the configured day offset
pub fn balloon_payment_datetime(ctx: &LoanContext<'_>) -> Result<DateTime<Utc>> {
    let total = original_total_term(ctx)?;
    let days_delta = ctx.get_int_or(PARAM_BALLOON_PAYMENT_DAYS_DELTA, None, 0)?;
    let months = i32::try_from(total).unwrap_or(i32::MAX);
    Ok(add_months(ctx.creation_datetime(), months)? + Duration::days(days_delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PARAM_TOTAL_REPAYMENT_COUNT;
    use crate::memory::InMemoryAccount;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_calendar_term_and_balloon_date() {
        let created = Utc.with_ymd_and_hms(2024, 1, 31, 9, 30, 0).unwrap();
        let mut account = InMemoryAccount::new("loan", created);
        account.set_parameter(PARAM_TOTAL_REPAYMENT_COUNT, dec!(13), created);

        let ctx = account.context();
        assert_eq!(
            balloon_payment_datetime(&ctx).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 28, 9, 30, 0).unwrap()
        );

        account.set_parameter(PARAM_BALLOON_PAYMENT_DAYS_DELTA, dec!(5), created);
        let ctx = account.context();
        assert_eq!(
            balloon_payment_datetime(&ctx).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 5, 9, 30, 0).unwrap()
        );

        let mid_term = Utc.with_ymd_and_hms(2024, 7, 31, 9, 30, 0).unwrap();
        let inputs = AmortizationInputs::at(mid_term);
        assert_eq!(NoRepayment.term_details(&ctx, &inputs).unwrap(), TermDetails::new(6, 7));
        assert_eq!(NoRepayment.calculate_emi(&ctx, &inputs).unwrap(), Money::ZERO);
    }
}
