use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amortization::{Amortization, AmortizationFeature, AmortizationInputs};
use crate::balloon::{expected_balloon_payment_amount, BALLOON_PAYMENT_EVENT, PARAM_EXPECTED_BALLOON_PAYMENT_AMOUNT};
use crate::closure::CLOSE_LOAN_EVENT;
use crate::context::{LoanContext, ParameterValue};
use crate::decimal::Money;
use crate::due_amount::{actual_next_repayment_date, PARAM_NEXT_REPAYMENT_DATE};
use crate::emi::{get_emi, PARAM_EQUATED_INSTALMENT_AMOUNT};
use crate::errors::Result;
use crate::interest::InterestRateFeature;
use crate::ledger::{ACCRUED_INTEREST_RECEIVABLE, DUE_CALCULATION_EVENT_COUNTER, EMI, INTEREST_DUE, PRINCIPAL, PRINCIPAL_DUE};
use crate::types::{AccountId, AmortizationMethod, LoanPhase, TermDetails};

impl LoanPhase {
    /// phase implied by the balances and schedule history as of `at`
    pub fn derive(ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Self> {
        if ctx.last_execution_datetime(CLOSE_LOAN_EVENT).is_some_and(|closed| closed <= at) {
            return Ok(LoanPhase::Closed);
        }

        let denomination = ctx.denomination()?;
        let balance = |address: &str| ctx.balance(address, &denomination, Some(at));
        let principal = balance(PRINCIPAL)?;
        let has_due = !balance(PRINCIPAL_DUE)?.is_zero() || !balance(INTEREST_DUE)?.is_zero();

        if principal.is_positive() {
            return Ok(if has_due { LoanPhase::DuePosted } else { LoanPhase::Accruing });
        }

        let balloon_ran = ctx.last_execution_datetime(BALLOON_PAYMENT_EVENT).is_some_and(|ran| ran <= at);
        if has_due || balloon_ran || balance(DUE_CALCULATION_EVENT_COUNTER)?.is_positive() {
            return Ok(LoanPhase::FinalDuePosted);
        }
        Ok(LoanPhase::PreActivation)
    }
}

/// read-only view of a loan at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSnapshot {
    pub account_id: AccountId,
    pub at: DateTime<Utc>,
    pub method: AmortizationMethod,
    pub phase: LoanPhase,

    // balances
    pub principal: Money,
    pub principal_due: Money,
    pub interest_due: Money,
    pub accrued_interest: Money,
    pub emi: Money,

    // schedule
    pub term: TermDetails,
    pub next_repayment_date: Option<DateTime<Utc>>,
}

impl LoanSnapshot {
    pub fn capture(ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<Self> {
        let denomination = ctx.denomination()?;
        let balance = |address: &str| ctx.balance(address, &denomination, Some(at));

        let strategy = AmortizationFeature::from_parameters(ctx)?;
        let phase = LoanPhase::derive(ctx, at)?;
        let term = strategy.term_details(ctx, &AmortizationInputs::at(at))?;
        let next_repayment_date = match phase {
            LoanPhase::Accruing | LoanPhase::DuePosted
                if strategy.method() != AmortizationMethod::NoRepayment && term.remaining > 0 =>
            {
                Some(actual_next_repayment_date(ctx, at, term.elapsed, term.remaining)?)
            }
            _ => None,
        };

        Ok(Self {
            account_id: ctx.account_id.to_string(),
            at,
            method: strategy.method(),
            phase,
            principal: balance(PRINCIPAL)?,
            principal_due: balance(PRINCIPAL_DUE)?,
            interest_due: balance(INTEREST_DUE)?,
            accrued_interest: balance(ACCRUED_INTEREST_RECEIVABLE)?,
            emi: balance(EMI)?,
            term,
            next_repayment_date,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// read-only parameters derived from the account state
pub fn derived_parameters(ctx: &LoanContext<'_>, at: DateTime<Utc>) -> Result<BTreeMap<String, ParameterValue>> {
    let snapshot = LoanSnapshot::capture(ctx, at)?;
    let mut derived = BTreeMap::new();
    derived.insert(
        PARAM_EQUATED_INSTALMENT_AMOUNT.to_string(),
        ParameterValue::Number(get_emi(ctx, Some(at))?.as_decimal()),
    );
    if let Some(next) = snapshot.next_repayment_date {
        derived.insert(PARAM_NEXT_REPAYMENT_DATE.to_string(), ParameterValue::Date(next));
    }
    if snapshot.method.is_balloon() {
        let rate = InterestRateFeature::from_parameters(ctx)?;
        let expected = expected_balloon_payment_amount(ctx, at, Some(&rate))?;
        derived.insert(
            PARAM_EXPECTED_BALLOON_PAYMENT_AMOUNT.to_string(),
            ParameterValue::Number(expected.as_decimal()),
        );
    }
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoanParameters;
    use crate::ledger::{create_postings, CustomInstruction, INTERNAL_CONTRA};
    use crate::memory::InMemoryAccount;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, month, day, 0, 0, 0).unwrap()
    }

    fn move_balance(account: &mut InMemoryAccount, amount: i64, debit: &str, credit: &str, when: DateTime<Utc>) {
        let postings = create_postings(Money::from_major(amount), "loan", debit, "loan", credit, "GBP");
        account
            .apply(&[CustomInstruction::new(postings, Default::default())], when)
            .unwrap();
    }

    #[test]
    fn test_phases_follow_the_loan() {
        let mut account = InMemoryAccount::from_parameters("loan", at(1, 1), &LoanParameters::default()).unwrap();
        assert_eq!(LoanPhase::derive(&account.context(), at(1, 1)).unwrap(), LoanPhase::PreActivation);

        move_balance(&mut account, 1000, PRINCIPAL, INTERNAL_CONTRA, at(1, 1));
        assert_eq!(LoanPhase::derive(&account.context(), at(1, 2)).unwrap(), LoanPhase::Accruing);

        move_balance(&mut account, 100, PRINCIPAL_DUE, PRINCIPAL, at(2, 28));
        move_balance(&mut account, 1, DUE_CALCULATION_EVENT_COUNTER, INTERNAL_CONTRA, at(2, 28));
        assert_eq!(LoanPhase::derive(&account.context(), at(2, 28)).unwrap(), LoanPhase::DuePosted);
        // historic view
        assert_eq!(LoanPhase::derive(&account.context(), at(2, 1)).unwrap(), LoanPhase::Accruing);

        move_balance(&mut account, 900, PRINCIPAL_DUE, PRINCIPAL, at(3, 28));
        assert_eq!(LoanPhase::derive(&account.context(), at(3, 28)).unwrap(), LoanPhase::FinalDuePosted);

        account.timeline.record_execution(CLOSE_LOAN_EVENT, at(4, 1));
        assert_eq!(LoanPhase::derive(&account.context(), at(4, 1)).unwrap(), LoanPhase::Closed);
    }

    #[test]
    fn test_snapshot_of_an_active_loan() {
        let mut account = InMemoryAccount::from_parameters("loan", at(1, 1), &LoanParameters::default()).unwrap();
        move_balance(&mut account, 10_000, PRINCIPAL, INTERNAL_CONTRA, at(1, 1));
        move_balance(&mut account, 856, EMI, INTERNAL_CONTRA, at(1, 1));

        let snapshot = LoanSnapshot::capture(&account.context(), at(1, 10)).unwrap();
        assert_eq!(snapshot.phase, LoanPhase::Accruing);
        assert_eq!(snapshot.method, AmortizationMethod::DecliningPrincipal);
        assert_eq!(snapshot.principal, Money::from_major(10_000));
        assert_eq!(snapshot.emi, Money::from_major(856));
        assert_eq!(snapshot.term, TermDetails::new(0, 12));
        assert_eq!(snapshot.next_repayment_date, Some(at(2, 28)));

        let json = snapshot.to_json_pretty().unwrap();
        assert!(json.contains("\"phase\": \"Accruing\""));

        let derived = derived_parameters(&account.context(), at(1, 10)).unwrap();
        assert_eq!(
            derived.get(PARAM_EQUATED_INSTALMENT_AMOUNT),
            Some(&ParameterValue::Number(Money::from_major(856).as_decimal()))
        );
        assert_eq!(derived.get(PARAM_NEXT_REPAYMENT_DATE), Some(&ParameterValue::Date(at(2, 28))));
        assert!(!derived.contains_key(PARAM_EXPECTED_BALLOON_PAYMENT_AMOUNT));
    }
}
