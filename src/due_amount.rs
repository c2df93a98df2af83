use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::amortization::{Amortization, AmortizationInputs, PrincipalAdjustment};
use crate::balloon::update_balloon_payment_schedule;
use crate::config::DEFAULT_DUE_AMOUNT_CALCULATION_DAY;
use crate::context::{LoanContext, ParameterValue};
use crate::decimal::Money;
use crate::emi::update_emi;
use crate::errors::{LoanError, Result};
use crate::interest::{InterestApplication, InterestRate};
use crate::ledger::{
    create_postings, standard_instruction_details, CustomInstruction, Posting, DUE_CALCULATION_EVENT_COUNTER,
    EMI, INTERNAL_CONTRA, PRINCIPAL, PRINCIPAL_DUE,
};
use crate::reamortization::{ReamortizationCondition, ReamortizationRules};
use crate::schedule::{add_months, midnight, monthly_scheduled_event, with_day_clamped, with_time, ScheduleDirective, ScheduledEvent};
use crate::types::{ReamortizationDecision, TermDetails};

pub const DUE_AMOUNT_CALCULATION_EVENT: &str = "DUE_AMOUNT_CALCULATION";
pub const DUE_AMOUNT_CALCULATION_PREFIX: &str = "due_amount_calculation";
pub const PARAM_DUE_AMOUNT_CALCULATION_DAY: &str = "due_amount_calculation_day";

/// derived parameter exposing the next repayment date
pub const PARAM_NEXT_REPAYMENT_DATE: &str = "next_repayment_date";

pub const DEFAULT_ACCOUNT_TYPE: &str = "LOAN";

/// everything one due amount calculation produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueAmountOutcome {
    pub instructions: Vec<CustomInstruction>,
    /// schedule changes for the host, set on the final period of balloon loans
    pub schedule_directives: Vec<ScheduleDirective>,
    pub term: TermDetails,
    pub decision: ReamortizationDecision,
    pub previous_emi: Money,
    pub emi: Money,
    pub principal_due: Money,
    pub interest_applied: Money,
}

/// orchestrates the monthly due amount calculation of one loan
pub struct DueAmountScheduler<'a> {
    amortization: &'a dyn Amortization,
    interest_application: Option<&'a dyn InterestApplication>,
    interest_rate: Option<&'a dyn InterestRate>,
    reamortization: ReamortizationRules<'a>,
    adjustments: &'a [&'a dyn PrincipalAdjustment],
    account_type: String,
}

impl<'a> DueAmountScheduler<'a> {
    pub fn new(amortization: &'a dyn Amortization) -> Self {
        Self {
            amortization,
            interest_application: None,
            interest_rate: None,
            reamortization: ReamortizationRules::new(),
            adjustments: &[],
            account_type: DEFAULT_ACCOUNT_TYPE.to_string(),
        }
    }

    pub fn with_interest_application(mut self, application: &'a dyn InterestApplication) -> Self {
        self.interest_application = Some(application);
        self
    }

    pub fn with_interest_rate(mut self, rate: &'a dyn InterestRate) -> Self {
        self.interest_rate = Some(rate);
        self
    }

    pub fn with_reamortization(mut self, condition: &'a dyn ReamortizationCondition) -> Self {
        self.reamortization = self.reamortization.with(condition);
        self
    }

    pub fn with_adjustments(mut self, adjustments: &'a [&'a dyn PrincipalAdjustment]) -> Self {
        self.adjustments = adjustments;
        self
    }

    pub fn with_account_type(mut self, account_type: &str) -> Self {
        self.account_type = account_type.to_string();
        self
    }

    fn inputs(&self, effective: DateTime<Utc>) -> AmortizationInputs<'a> {
        let inputs = AmortizationInputs::at(effective).adjustments(self.adjustments);
        match self.interest_rate {
            Some(rate) => inputs.interest_rate(rate),
            None => inputs,
        }
    }

    /// calculate the amounts falling due at `effective`
    ///
    /// balances are read as of `effective` before any of the returned
    /// instructions are applied. The instructions must be applied as one
    /// batch so the principal transfer and the counter never diverge.
    pub fn schedule_logic(&self, ctx: &LoanContext<'_>, effective: DateTime<Utc>) -> Result<DueAmountOutcome> {
        let denomination = ctx.denomination()?;
        let principal = get_principal(ctx, &denomination, effective)?;
        let inputs = self.inputs(effective).principal(principal);
        let term = self.amortization.term_details(ctx, &inputs)?;

        let period_start = if term.elapsed == 0 {
            ctx.creation_datetime()
        } else {
            ctx.last_execution_datetime(DUE_AMOUNT_CALCULATION_EVENT)
                .unwrap_or_else(|| ctx.creation_datetime())
        };

        let mut postings = Vec::new();
        let (emi_interest, interest_applied) = match self.interest_application {
            Some(application) => {
                let amounts = application.interest_to_apply(ctx, effective, period_start)?;
                postings.extend(application.apply_interest(ctx, effective, period_start)?);
                (amounts.total_rounded - amounts.non_emi_rounded_accrued, amounts.total_rounded)
            }
            None => (Money::ZERO, Money::ZERO),
        };

        let decision = self.reamortization.evaluate(ctx, period_start, effective, term.elapsed)?;
        let previous_emi = ctx.balance(EMI, &denomination, Some(effective))?;
        let emi = if decision.should_trigger {
            let updated = self.amortization.calculate_emi(ctx, &inputs)?;
            postings.extend(update_emi(ctx.account_id, &denomination, previous_emi, updated));
            updated
        } else {
            previous_emi
        };

        let is_final_due_event = term.is_final_period() && !self.amortization.override_final_event();
        let principal_due = calculate_due_principal(principal, emi_interest, emi, is_final_due_event);
        postings.extend(transfer_principal_due(ctx.account_id, principal_due, &denomination));
        postings.extend(update_due_amount_calculation_counter(ctx.account_id, &denomination));

        let schedule_directives = if term.is_final_period() && self.amortization.override_final_event() {
            update_balloon_payment_schedule(ctx, effective)?
        } else {
            Vec::new()
        };

        tracing::debug!(
            %effective,
            elapsed = term.elapsed,
            remaining = term.remaining,
            %emi,
            %principal_due,
            interest = %interest_applied,
            "due amounts calculated"
        );

        let instructions = vec![CustomInstruction::new(
            postings,
            standard_instruction_details("Updating due balances", DUE_AMOUNT_CALCULATION_EVENT, true, &self.account_type),
        )
        .overriding_restrictions()];

        Ok(DueAmountOutcome {
            instructions,
            schedule_directives,
            term,
            decision,
            previous_emi,
            emi,
            principal_due: principal_due.max(Money::ZERO),
            interest_applied,
        })
    }
}

/// principal portion of the instalment
///
/// the final due event takes whatever principal is left so the transfers
/// always add up to the amount lent.
pub fn calculate_due_principal(
    remaining_principal: Money,
    emi_interest_to_apply: Money,
    emi: Money,
    is_final_due_event: bool,
) -> Money {
    if emi.is_zero() {
        return Money::ZERO;
    }
    if is_final_due_event {
        return remaining_principal;
    }
    (emi - emi_interest_to_apply).min(remaining_principal)
}

pub fn transfer_principal_due(account_id: &str, principal_due: Money, denomination: &str) -> Vec<Posting> {
    create_postings(principal_due, account_id, PRINCIPAL_DUE, account_id, PRINCIPAL, denomination)
}

pub fn update_due_amount_calculation_counter(account_id: &str, denomination: &str) -> Vec<Posting> {
    create_postings(
        Money::ONE,
        account_id,
        DUE_CALCULATION_EVENT_COUNTER,
        account_id,
        INTERNAL_CONTRA,
        denomination,
    )
}

pub fn get_principal(ctx: &LoanContext<'_>, denomination: &str, at: DateTime<Utc>) -> Result<Money> {
    ctx.balance(PRINCIPAL, denomination, Some(at))
}

/// monthly schedule starting one month after opening day midnight
pub fn scheduled_events(
    ctx: &LoanContext<'_>,
    account_opening: DateTime<Utc>,
) -> Result<BTreeMap<String, ScheduledEvent>> {
    let start = add_months(midnight(account_opening)?, 1)?;
    let event = monthly_scheduled_event(ctx, start, DUE_AMOUNT_CALCULATION_PREFIX, DEFAULT_DUE_AMOUNT_CALCULATION_DAY)?;
    Ok(BTreeMap::from([(DUE_AMOUNT_CALCULATION_EVENT.to_string(), event)]))
}

/// the due day can only move once the first calculation has run
pub fn validate_due_amount_calculation_day_change(ctx: &LoanContext<'_>) -> Result<()> {
    match ctx.last_execution_datetime(DUE_AMOUNT_CALCULATION_EVENT) {
        Some(_) => Ok(()),
        None => Err(LoanError::DueDayChangeRejected {
            message: "It is not possible to change the monthly repayment day if the first repayment date has not passed."
                .to_string(),
        }),
    }
}

fn due_day_from_value(value: &ParameterValue) -> Result<u32> {
    let day = match value {
        ParameterValue::Number(d) => d.to_u32(),
        ParameterValue::Text(s) => s.trim().parse::<u32>().ok(),
        ParameterValue::Date(_) => None,
    };
    day.filter(|d| (1..=31).contains(d))
        .ok_or_else(|| LoanError::InvalidParameter {
            name: PARAM_DUE_AMOUNT_CALCULATION_DAY.to_string(),
            message: format!("{value:?} is not a day of the month"),
        })
}

pub fn due_amount_calculation_day(ctx: &LoanContext<'_>) -> Result<u32> {
    match ctx.parameters.parameter(PARAM_DUE_AMOUNT_CALCULATION_DAY, None)? {
        Some(value) => due_day_from_value(&value),
        None => Ok(DEFAULT_DUE_AMOUNT_CALCULATION_DAY),
    }
}

/// first due date: the due day at least one month after opening day midnight
pub fn first_due_amount_calculation_datetime(ctx: &LoanContext<'_>) -> Result<DateTime<Utc>> {
    let creation = ctx.creation_datetime();
    next_due_datetime(ctx, due_amount_calculation_day(ctx)?, creation, None)
}

/// next due date as of `effective`
///
/// `due_day` overrides the current due day parameter.
pub fn next_due_amount_calculation_datetime(
    ctx: &LoanContext<'_>,
    effective: DateTime<Utc>,
    elapsed_term: u32,
    remaining_term: u32,
    due_day: Option<u32>,
) -> Result<DateTime<Utc>> {
    if elapsed_term == 0 {
        return first_due_amount_calculation_datetime(ctx);
    }
    let last_execution = ctx.last_execution_datetime(DUE_AMOUNT_CALCULATION_EVENT);
    if remaining_term == 0 {
        if let Some(last) = last_execution {
            return Ok(last);
        }
        return first_due_amount_calculation_datetime(ctx);
    }

    let due_day = match due_day {
        Some(day) => day,
        None => due_amount_calculation_day(ctx)?,
    };
    // historic queries ignore executions after the effective instant
    let last_execution = last_execution.filter(|last| *last <= effective);
    next_due_datetime(ctx, due_day, effective, last_execution)
}

fn next_due_datetime(
    ctx: &LoanContext<'_>,
    due_day: u32,
    effective: DateTime<Utc>,
    last_execution: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>> {
    let (hour, minute, second) = ctx.schedule_time(DUE_AMOUNT_CALCULATION_PREFIX)?;

    let next = match last_execution {
        None => {
            let opening_midnight = midnight(ctx.creation_datetime())?;
            let earliest = add_months(opening_midnight, 1)?;
            let mut next = with_day_clamped(add_months(opening_midnight, 1)?, due_day)?;
            while earliest > next || next < effective {
                next = add_months(next, 1)?;
            }
            next
        }
        Some(last) if last.day() != due_day && (last.month() == effective.month() || due_day > effective.day()) => {
            with_day_clamped(add_months(last, 1)?, due_day)?
        }
        Some(last) => add_months(last, 1)?,
    };
    with_time(next, hour, minute, second)
}

/// next repayment date, allowing for due day changes since the last calculation
///
/// while the candidate is already in the past and is the plain monthly
/// successor of the last calculation, earlier values of the due day set
/// after that calculation are tried, newest first. The scan stops at the
/// first value set on or before the last calculation.
pub fn actual_next_repayment_date(
    ctx: &LoanContext<'_>,
    effective: DateTime<Utc>,
    elapsed_term: u32,
    remaining_term: u32,
) -> Result<DateTime<Utc>> {
    let mut next = next_due_amount_calculation_datetime(ctx, effective, elapsed_term, remaining_term, None)?;
    let Some(last_execution) = ctx.last_execution_datetime(DUE_AMOUNT_CALCULATION_EVENT) else {
        return Ok(next);
    };

    let timeseries = ctx.parameters.parameter_timeseries(PARAM_DUE_AMOUNT_CALCULATION_DAY)?;
    let mut count = 0usize;
    while next < effective && next == add_months(last_execution, 1)? {
        count += 1;
        let Some((changed_at, value)) = timeseries.len().checked_sub(count + 1).map(|i| &timeseries[i]) else {
            return Ok(next);
        };
        if *changed_at <= last_execution {
            return Ok(next);
        }
        let previous_day = due_day_from_value(value)?;
        next = next_due_amount_calculation_datetime(ctx, effective, elapsed_term, remaining_term, Some(previous_day))?;
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amortization::declining_principal::apply_declining_principal_formula;
    use crate::amortization::{DecliningPrincipal, MinimumRepayment};
    use crate::balloon::{BALLOON_PAYMENT_EVENT, PARAM_BALLOON_PAYMENT_DAYS_DELTA};
    use crate::config::{DueScheduleConfig, LoanParameters};
    use crate::emi::{amortise, ACCOUNT_ACTIVATION_EVENT};
    use crate::interest::variable::PARAM_VARIABLE_INTEREST_RATE;
    use crate::interest::{AccruedInterestApplication, VariableRate};
    use crate::ledger::{ACCRUED_INTEREST_RECEIVABLE, INTEREST_DUE};
    use crate::memory::InMemoryAccount;
    use crate::schedule::ScheduleExpression;
    use crate::types::ReamortizationReason;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn dt(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn money(d: Decimal) -> Money {
        Money::from_decimal(d)
    }

    fn book(account: &mut InMemoryAccount, address: &str, amount: Money, at: DateTime<Utc>) {
        let postings = create_postings(amount, "loan", address, "loan", INTERNAL_CONTRA, "GBP");
        account
            .apply(&[CustomInstruction::new(postings, Default::default())], at)
            .unwrap();
    }

    fn activated_loan(params: &LoanParameters) -> InMemoryAccount {
        let created = dt(2024, 1, 1);
        let mut account = InMemoryAccount::from_parameters("loan", created, params).unwrap();
        book(&mut account, PRINCIPAL, params.principal, created);
        let inputs = AmortizationInputs::at(created).interest_rate(&crate::interest::FixedRate);
        let strategy = crate::amortization::AmortizationFeature::for_method(params.amortisation_method);
        let emi = amortise(&account.context(), &strategy, &inputs, false, ACCOUNT_ACTIVATION_EVENT).unwrap();
        account.apply(&emi, created).unwrap();
        account
    }

    #[test]
    fn test_first_due_event_moves_principal_and_interest() {
        let params = LoanParameters::declining_principal(Money::from_major(12000), dec!(0.12), 12);
        let mut account = activated_loan(&params);
        book(&mut account, ACCRUED_INTEREST_RECEIVABLE, money(dec!(120.004)), dt(2024, 1, 31));

        let effective = dt(2024, 2, 28);
        let scheduler = DueAmountScheduler::new(&DecliningPrincipal)
            .with_interest_rate(&crate::interest::FixedRate)
            .with_interest_application(&AccruedInterestApplication);
        let outcome = scheduler.schedule_logic(&account.context(), effective).unwrap();

        assert_eq!(outcome.term, TermDetails::new(0, 12));
        assert_eq!(outcome.decision, ReamortizationDecision::none());
        assert_eq!(outcome.emi, money(dec!(1066.19)));
        assert_eq!(outcome.interest_applied, money(dec!(120.00)));
        assert_eq!(outcome.principal_due, money(dec!(946.19)));
        assert!(outcome.schedule_directives.is_empty());

        let instruction = &outcome.instructions[0];
        assert_eq!(instruction.description(), Some("Updating due balances"));
        assert!(instruction.override_all_restrictions);

        account.apply(&outcome.instructions, effective).unwrap();
        let ctx = account.context();
        assert_eq!(ctx.balance(PRINCIPAL, "GBP", None).unwrap(), money(dec!(11053.81)));
        assert_eq!(ctx.balance(PRINCIPAL_DUE, "GBP", None).unwrap(), money(dec!(946.19)));
        assert_eq!(ctx.balance(INTEREST_DUE, "GBP", None).unwrap(), money(dec!(120.00)));
        assert_eq!(ctx.balance(ACCRUED_INTEREST_RECEIVABLE, "GBP", None).unwrap(), Money::ZERO);
        assert_eq!(ctx.balance(DUE_CALCULATION_EVENT_COUNTER, "GBP", None).unwrap(), Money::ONE);
    }

    #[test]
    fn test_final_period_absorbs_remaining_principal() {
        assert_eq!(
            calculate_due_principal(money(dec!(100.23)), money(dec!(1.50)), money(dec!(150.00)), true),
            money(dec!(100.23))
        );
        assert_eq!(
            calculate_due_principal(money(dec!(1000)), money(dec!(20)), money(dec!(150)), false),
            money(dec!(130))
        );
        assert_eq!(
            calculate_due_principal(money(dec!(100.23)), Money::ZERO, money(dec!(150)), false),
            money(dec!(100.23))
        );
        assert_eq!(calculate_due_principal(money(dec!(500)), Money::ZERO, Money::ZERO, true), Money::ZERO);
    }

    fn loan_in_final_period(params: &LoanParameters) -> InMemoryAccount {
        let created = dt(2024, 1, 1);
        let mut account = InMemoryAccount::from_parameters("loan", created, params).unwrap();
        book(&mut account, PRINCIPAL, Money::from_major(500), created);
        book(&mut account, EMI, Money::from_major(150), created);
        book(&mut account, DUE_CALCULATION_EVENT_COUNTER, Money::from_major(11), dt(2024, 11, 28));
        account.timeline.record_execution(DUE_AMOUNT_CALCULATION_EVENT, dt(2024, 11, 28));
        account
    }

    #[test]
    fn test_final_event_for_repayment_loan() {
        let params = LoanParameters::declining_principal(Money::from_major(1500), dec!(0.12), 12);
        let account = loan_in_final_period(&params);
        let outcome = DueAmountScheduler::new(&DecliningPrincipal)
            .schedule_logic(&account.context(), dt(2024, 12, 28))
            .unwrap();

        assert_eq!(outcome.term, TermDetails::new(11, 1));
        assert_eq!(outcome.principal_due, Money::from_major(500));
        assert!(outcome.schedule_directives.is_empty());
    }

    #[test]
    fn test_final_event_for_balloon_loan_arms_the_balloon() {
        let params = LoanParameters::minimum_repayment(Money::from_major(1500), dec!(0.12), 12, Default::default());
        let mut account = loan_in_final_period(&params);
        account.set_parameter(PARAM_BALLOON_PAYMENT_DAYS_DELTA, dec!(3), dt(2024, 1, 1));
        let effective = dt(2024, 12, 28);

        let outcome = DueAmountScheduler::new(&MinimumRepayment)
            .schedule_logic(&account.context(), effective)
            .unwrap();

        assert_eq!(outcome.principal_due, Money::from_major(150));
        assert_eq!(
            outcome.schedule_directives,
            vec![
                ScheduleDirective {
                    event_type: BALLOON_PAYMENT_EVENT.to_string(),
                    expression: ScheduleExpression::OneOff(dt(2024, 12, 31)),
                    skip: false,
                },
                ScheduleDirective {
                    event_type: DUE_AMOUNT_CALCULATION_EVENT.to_string(),
                    expression: ScheduleExpression::EndOfTime,
                    skip: true,
                },
            ]
        );
    }

    #[test]
    fn test_rate_change_reamortizes() {
        let params = LoanParameters::declining_principal(Money::from_major(12000), dec!(0.12), 12)
            .with_variable_rate(dec!(0.12), 0);
        let created = dt(2024, 1, 1);
        let mut account = InMemoryAccount::from_parameters("loan", created, &params).unwrap();
        book(&mut account, PRINCIPAL, Money::from_major(11000), created);
        book(&mut account, EMI, money(dec!(1066.19)), created);
        book(&mut account, DUE_CALCULATION_EVENT_COUNTER, Money::from_major(1), dt(2024, 1, 28));
        account.timeline.record_execution(DUE_AMOUNT_CALCULATION_EVENT, dt(2024, 1, 28));
        account.set_parameter(PARAM_VARIABLE_INTEREST_RATE, dec!(0.18), dt(2024, 2, 10));

        let effective = dt(2024, 2, 28);
        let scheduler = DueAmountScheduler::new(&DecliningPrincipal)
            .with_interest_rate(&VariableRate)
            .with_reamortization(&VariableRate);
        let outcome = scheduler.schedule_logic(&account.context(), effective).unwrap();

        let expected = apply_declining_principal_formula(
            Money::from_major(11000),
            crate::decimal::Rate::from_decimal(dec!(0.015)),
            11,
            None,
        )
        .unwrap();
        assert_eq!(outcome.decision, ReamortizationDecision::triggered(ReamortizationReason::RateChanged));
        assert_eq!(outcome.previous_emi, money(dec!(1066.19)));
        assert_eq!(outcome.emi, expected);
        assert_eq!(outcome.principal_due, expected);

        // running the check again for the same period gives the same instalment
        let again = scheduler.schedule_logic(&account.context(), effective).unwrap();
        assert_eq!(again.emi, outcome.emi);
    }

    fn schedule_account(day: u32) -> InMemoryAccount {
        let created = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let params = LoanParameters::default().with_due_schedule(DueScheduleConfig {
            day,
            hour: 9,
            minute: 30,
            second: 0,
        });
        InMemoryAccount::from_parameters("loan", created, &params).unwrap()
    }

    fn at_schedule_time(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_first_due_date() {
        let account = schedule_account(28);
        assert_eq!(
            first_due_amount_calculation_datetime(&account.context()).unwrap(),
            at_schedule_time(2024, 2, 28)
        );

        // the due day must be at least a month after opening
        let account = schedule_account(5);
        assert_eq!(
            first_due_amount_calculation_datetime(&account.context()).unwrap(),
            at_schedule_time(2024, 3, 5)
        );
    }

    #[test]
    fn test_scheduled_event_starts_a_month_after_opening() {
        let account = schedule_account(28);
        let ctx = account.context();
        let events = scheduled_events(&ctx, ctx.creation_datetime()).unwrap();
        let event = &events[DUE_AMOUNT_CALCULATION_EVENT];
        assert_eq!(event.start, Some(dt(2024, 2, 15)));
        assert_eq!(
            event.expression,
            ScheduleExpression::Monthly {
                day: 28,
                hour: 9,
                minute: 30,
                second: 0
            }
        );
    }

    #[test]
    fn test_next_due_date() {
        let mut account = schedule_account(28);
        let ctx = account.context();
        assert_eq!(
            next_due_amount_calculation_datetime(&ctx, dt(2024, 2, 1), 0, 12, None).unwrap(),
            at_schedule_time(2024, 2, 28)
        );

        account
            .timeline
            .record_execution(DUE_AMOUNT_CALCULATION_EVENT, at_schedule_time(2024, 2, 28));
        let ctx = account.context();
        assert_eq!(
            next_due_amount_calculation_datetime(&ctx, dt(2024, 3, 1), 1, 11, None).unwrap(),
            at_schedule_time(2024, 3, 28)
        );
        // a fully repaid loan reports its last calculation
        assert_eq!(
            next_due_amount_calculation_datetime(&ctx, dt(2024, 3, 1), 1, 0, None).unwrap(),
            at_schedule_time(2024, 2, 28)
        );
        // later due day still ahead this month
        assert_eq!(
            next_due_amount_calculation_datetime(&ctx, dt(2024, 3, 5), 1, 11, Some(10)).unwrap(),
            at_schedule_time(2024, 3, 10)
        );
        // earlier due day already passed this month keeps the current cycle
        assert_eq!(
            next_due_amount_calculation_datetime(&ctx, dt(2024, 3, 5), 1, 11, Some(3)).unwrap(),
            at_schedule_time(2024, 3, 28)
        );
        // historic query before the last calculation
        assert_eq!(
            next_due_amount_calculation_datetime(&ctx, dt(2024, 2, 20), 1, 11, None).unwrap(),
            at_schedule_time(2024, 2, 28)
        );
    }

    #[test]
    fn test_due_day_change_in_month_of_last_calculation() {
        let mut account = schedule_account(28);
        account
            .timeline
            .record_execution(DUE_AMOUNT_CALCULATION_EVENT, at_schedule_time(2024, 3, 28));
        assert_eq!(
            next_due_amount_calculation_datetime(&account.context(), dt(2024, 3, 30), 2, 10, Some(15)).unwrap(),
            at_schedule_time(2024, 4, 15)
        );
    }

    #[test]
    fn test_due_day_change_validation() {
        let mut account = schedule_account(28);
        let err = validate_due_amount_calculation_day_change(&account.context()).unwrap_err();
        assert!(matches!(err, LoanError::DueDayChangeRejected { .. }));

        account
            .timeline
            .record_execution(DUE_AMOUNT_CALCULATION_EVENT, at_schedule_time(2024, 2, 28));
        assert!(validate_due_amount_calculation_day_change(&account.context()).is_ok());
    }

    #[test]
    fn test_actual_next_repayment_date_single_change() {
        let mut account = schedule_account(28);
        account
            .timeline
            .record_execution(DUE_AMOUNT_CALCULATION_EVENT, at_schedule_time(2024, 2, 28));
        account.set_parameter(PARAM_DUE_AMOUNT_CALCULATION_DAY, dec!(5), dt(2024, 3, 2));

        let ctx = account.context();
        // the new day is only picked up from the following cycle
        assert_eq!(
            actual_next_repayment_date(&ctx, dt(2024, 3, 20), 1, 11).unwrap(),
            at_schedule_time(2024, 3, 28)
        );
        // once overdue the scan stops at the value in force at the last calculation
        assert_eq!(
            actual_next_repayment_date(&ctx, dt(2024, 3, 29), 1, 11).unwrap(),
            at_schedule_time(2024, 3, 28)
        );
    }

    #[test]
    fn test_actual_next_repayment_date_multiple_changes_in_one_period() {
        let mut account = schedule_account(28);
        account
            .timeline
            .record_execution(DUE_AMOUNT_CALCULATION_EVENT, at_schedule_time(2024, 2, 28));
        account.set_parameter(PARAM_DUE_AMOUNT_CALCULATION_DAY, dec!(30), dt(2024, 3, 1));
        account.set_parameter(PARAM_DUE_AMOUNT_CALCULATION_DAY, dec!(5), dt(2024, 3, 2));

        // the overdue candidate falls back to the earlier change to day 30
        assert_eq!(
            actual_next_repayment_date(&account.context(), dt(2024, 3, 29), 1, 11).unwrap(),
            at_schedule_time(2024, 3, 30)
        );
    }
}
