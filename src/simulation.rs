use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use hourglass_rs::SafeTimeProvider;

use crate::amortization::{Amortization, AmortizationFeature, AmortizationInputs};
use crate::balloon::{self, BalloonOutcome, BALLOON_PAYMENT_EVENT};
use crate::closure::{close_loan, CLOSE_LOAN_EVENT};
use crate::config::{LoanParameters, PARAM_PRINCIPAL};
use crate::decimal::Money;
use crate::due_amount::{self, next_due_amount_calculation_datetime, DueAmountOutcome, DueAmountScheduler, DUE_AMOUNT_CALCULATION_EVENT};
use crate::emi::{amortise, get_emi, ACCOUNT_ACTIVATION_EVENT};
use crate::errors::Result;
use crate::events::{EventStore, LoanEvent};
use crate::interest::{accrue_daily_interest, AccruedInterestApplication, FlatInterestApplication, InterestApplication, InterestRateFeature};
use crate::ledger::{
    create_postings, standard_instruction_details, CustomInstruction, INTEREST_DUE, INTERNAL_CONTRA, PRINCIPAL,
    PRINCIPAL_DUE,
};
use crate::memory::InMemoryAccount;
use crate::repayment_holiday::{due_amount_calculation_blocking_flags, is_due_amount_calculation_blocked, RepaymentHolidayCondition};
use crate::schedule::{ScheduleExpression, ScheduledEvent};
use crate::state::LoanSnapshot;
use crate::types::AmortizationMethod;

/// drives one in-memory loan through its life, playing the scheduling host
pub struct LoanSimulator {
    account: InMemoryAccount,
    amortization: AmortizationFeature,
    interest_rate: InterestRateFeature,
    schedules: BTreeMap<String, ScheduledEvent>,
    events: EventStore,
    last_accrual: DateTime<Utc>,
}

impl LoanSimulator {
    /// open a loan at the provider's current time
    pub fn new(account_id: &str, parameters: &LoanParameters, time_provider: &SafeTimeProvider) -> Result<Self> {
        let opened = time_provider.now();
        let account = InMemoryAccount::from_parameters(account_id, opened, parameters)?;
        let ctx = account.context();
        let amortization = AmortizationFeature::from_parameters(&ctx)?;
        let interest_rate = InterestRateFeature::from_parameters(&ctx)?;

        Ok(Self {
            account,
            amortization,
            interest_rate,
            schedules: BTreeMap::new(),
            events: EventStore::new(),
            last_accrual: opened,
        })
    }

    pub fn account(&self) -> &InMemoryAccount {
        &self.account
    }

    /// direct access for flags and parameter changes
    pub fn account_mut(&mut self) -> &mut InMemoryAccount {
        &mut self.account
    }

    pub fn schedules(&self) -> &BTreeMap<String, ScheduledEvent> {
        &self.schedules
    }

    pub fn events(&self) -> &[LoanEvent] {
        self.events.events()
    }

    pub fn take_events(&mut self) -> Vec<LoanEvent> {
        self.events.take_events()
    }

    pub fn snapshot(&self, time_provider: &SafeTimeProvider) -> Result<LoanSnapshot> {
        LoanSnapshot::capture(&self.account.context(), time_provider.now())
    }

    fn denomination(&self) -> Result<String> {
        self.account.context().denomination()
    }

    /// disburse the principal, set the instalment and register the schedules
    pub fn activate(&mut self, time_provider: &SafeTimeProvider) -> Result<Money> {
        let at = time_provider.now();
        let denomination = self.denomination()?;
        let principal = Money::from_decimal(self.account.context().get_decimal(PARAM_PRINCIPAL, None)?);

        let disbursement = CustomInstruction::new(
            create_postings(principal, &self.account.account_id, PRINCIPAL, &self.account.account_id, INTERNAL_CONTRA, &denomination),
            standard_instruction_details("Principal disbursement", ACCOUNT_ACTIVATION_EVENT, true, due_amount::DEFAULT_ACCOUNT_TYPE),
        );
        self.account.apply(&[disbursement], at)?;

        let instructions = {
            let ctx = self.account.context();
            let inputs = AmortizationInputs::at(at).interest_rate(&self.interest_rate);
            amortise(&ctx, &self.amortization, &inputs, false, ACCOUNT_ACTIVATION_EVENT)?
        };
        self.account.apply(&instructions, at)?;
        let emi = get_emi(&self.account.context(), Some(at))?;

        let method = self.amortization.method();
        let ctx = self.account.context();
        self.schedules = if method.is_balloon() {
            balloon::scheduled_events(&ctx, at, method)?
        } else {
            due_amount::scheduled_events(&ctx, at)?
        };

        let account_id = self.account.account_id.clone();
        if !emi.is_zero() {
            self.events.emit(LoanEvent::EmiAmortised {
                account_id: account_id.clone(),
                previous_emi: Money::ZERO,
                emi,
                event_type: ACCOUNT_ACTIVATION_EVENT.to_string(),
                timestamp: at,
            });
        }
        self.events.emit(LoanEvent::LoanActivated {
            account_id,
            principal,
            emi,
            timestamp: at,
        });
        tracing::info!(%principal, %emi, ?method, "loan activated");
        Ok(emi)
    }

    /// book daily interest for every midnight after the last accrual up to `until`
    pub fn accrue_until(&mut self, until: DateTime<Utc>) -> Result<Money> {
        // flat interest is fixed up front
        if self.amortization.method() == AmortizationMethod::FlatInterest {
            self.last_accrual = self.last_accrual.max(until);
            return Ok(Money::ZERO);
        }

        let mut total = Money::ZERO;
        let mut days = 0;
        let mut day = self.last_accrual + Duration::days(1);
        while day <= until {
            let postings = accrue_daily_interest(&self.account.context(), day, &self.interest_rate)?;
            if let Some(amount) = postings.first().map(|p| p.amount) {
                total += amount;
                self.account.apply(&[CustomInstruction::new(postings, Default::default())], day)?;
            }
            self.last_accrual = day;
            days += 1;
            day += Duration::days(1);
        }

        if days > 0 {
            self.events.emit(LoanEvent::InterestAccrued {
                account_id: self.account.account_id.clone(),
                amount: total,
                days,
                timestamp: until,
            });
        }
        Ok(total)
    }

    /// next due amount calculation as the scheduler would fire it
    pub fn next_due_amount_calculation(&self, time_provider: &SafeTimeProvider) -> Result<DateTime<Utc>> {
        let at = time_provider.now();
        let ctx = self.account.context();
        let term = self.amortization.term_details(&ctx, &AmortizationInputs::at(at))?;
        next_due_amount_calculation_datetime(&ctx, at, term.elapsed, term.remaining, None)
    }

    /// one-off balloon datetime once it has been armed
    pub fn balloon_payment_datetime(&self) -> Option<DateTime<Utc>> {
        match self.schedules.get(BALLOON_PAYMENT_EVENT).map(|event| &event.expression) {
            Some(ScheduleExpression::OneOff(at)) => Some(*at),
            _ => None,
        }
    }

    /// run the due amount calculation at the current time
    ///
    /// returns None when a blocking flag suppressed the event. The schedule
    /// still counts as executed, so the next period starts here while the
    /// elapsed counter stays put.
    pub fn run_due_amount_calculation(&mut self, time_provider: &SafeTimeProvider) -> Result<Option<DueAmountOutcome>> {
        let at = time_provider.now();
        self.accrue_until(at)?;
        let account_id = self.account.account_id.clone();

        if is_due_amount_calculation_blocked(&self.account.context(), at)? {
            let flags = due_amount_calculation_blocking_flags(&self.account.context(), at)?;
            tracing::info!(%at, ?flags, "due amount calculation blocked");
            self.account.timeline.record_execution(DUE_AMOUNT_CALCULATION_EVENT, at);
            self.events.emit(LoanEvent::DueCalculationSkipped {
                account_id,
                reason: flags.join(","),
                timestamp: at,
            });
            return Ok(None);
        }

        let holiday = RepaymentHolidayCondition::default();
        let application: &dyn InterestApplication = match self.amortization.method() {
            AmortizationMethod::FlatInterest => &FlatInterestApplication,
            _ => &AccruedInterestApplication,
        };
        let outcome = {
            let ctx = self.account.context();
            let mut scheduler = DueAmountScheduler::new(&self.amortization)
                .with_interest_rate(&self.interest_rate)
                .with_interest_application(application);
            if self.amortization.method() != AmortizationMethod::FlatInterest {
                scheduler = scheduler.with_reamortization(&self.interest_rate);
            }
            scheduler.with_reamortization(&holiday).schedule_logic(&ctx, at)?
        };

        self.account.apply(&outcome.instructions, at)?;
        self.account.timeline.record_execution(DUE_AMOUNT_CALCULATION_EVENT, at);

        if let Some(reason) = outcome.decision.reason {
            self.events.emit(LoanEvent::Reamortized {
                account_id: account_id.clone(),
                reason,
                previous_emi: outcome.previous_emi,
                new_emi: outcome.emi,
                timestamp: at,
            });
        }
        self.events.emit(LoanEvent::DueAmountsPosted {
            account_id: account_id.clone(),
            principal_due: outcome.principal_due,
            interest_due: outcome.interest_applied,
            emi: outcome.emi,
            elapsed_term: outcome.term.elapsed,
            remaining_term: outcome.term.remaining,
            timestamp: at,
        });

        for directive in &outcome.schedule_directives {
            let start = self.schedules.get(&directive.event_type).and_then(|event| event.start);
            self.schedules.insert(
                directive.event_type.clone(),
                ScheduledEvent {
                    start,
                    expression: directive.expression.clone(),
                },
            );
            if let (BALLOON_PAYMENT_EVENT, ScheduleExpression::OneOff(balloon_at)) =
                (directive.event_type.as_str(), &directive.expression)
            {
                self.events.emit(LoanEvent::BalloonScheduled {
                    account_id: account_id.clone(),
                    balloon_at: *balloon_at,
                    timestamp: at,
                });
            }
        }
        Ok(Some(outcome))
    }

    /// customer pays everything currently due
    pub fn repay_due(&mut self, time_provider: &SafeTimeProvider) -> Result<Money> {
        let at = time_provider.now();
        let denomination = self.denomination()?;
        let (principal, interest) = {
            let ctx = self.account.context();
            (
                ctx.balance(PRINCIPAL_DUE, &denomination, Some(at))?,
                ctx.balance(INTEREST_DUE, &denomination, Some(at))?,
            )
        };

        let account_id = self.account.account_id.clone();
        let mut postings = create_postings(principal, &account_id, INTERNAL_CONTRA, &account_id, PRINCIPAL_DUE, &denomination);
        postings.extend(create_postings(interest, &account_id, INTERNAL_CONTRA, &account_id, INTEREST_DUE, &denomination));
        if postings.is_empty() {
            return Ok(Money::ZERO);
        }

        self.account.apply(
            &[CustomInstruction::new(
                postings,
                standard_instruction_details("Repayment of due balances", "REPAYMENT", true, due_amount::DEFAULT_ACCOUNT_TYPE),
            )],
            at,
        )?;
        self.events.emit(LoanEvent::RepaymentReceived {
            account_id,
            principal,
            interest,
            timestamp: at,
        });
        Ok(principal + interest)
    }

    /// run the balloon payment event at the current time
    pub fn run_balloon_payment(&mut self, time_provider: &SafeTimeProvider) -> Result<BalloonOutcome> {
        let at = time_provider.now();
        self.accrue_until(at)?;
        let outcome = balloon::schedule_logic(
            &self.account.context(),
            at,
            Some(&AccruedInterestApplication),
            due_amount::DEFAULT_ACCOUNT_TYPE,
        )?;
        self.account.apply(&outcome.instructions, at)?;
        self.account.timeline.record_execution(BALLOON_PAYMENT_EVENT, at);

        self.events.emit(LoanEvent::BalloonPaymentPosted {
            account_id: self.account.account_id.clone(),
            principal_due: outcome.principal_due,
            interest_due: outcome.interest_applied,
            timestamp: at,
        });
        Ok(outcome)
    }

    /// close a fully repaid loan
    pub fn close(&mut self, time_provider: &SafeTimeProvider) -> Result<()> {
        let at = time_provider.now();
        let closure = close_loan(&self.account.context(), at)?;
        self.account.apply(&closure.instructions, at)?;
        self.account.timeline.record_execution(CLOSE_LOAN_EVENT, at);
        self.events.emit(closure.event);
        Ok(())
    }
}
