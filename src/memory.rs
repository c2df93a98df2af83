use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LoanParameters;
use crate::context::{AccountHistory, LedgerView, LoanContext, ParameterValue, ParameterView};
use crate::decimal::Money;
use crate::errors::{LoanError, Result};
use crate::ledger::{BalanceCoordinate, CustomInstruction, Posting};

/// posting recorded by the in-memory ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub batch_id: Uuid,
    pub value_time: DateTime<Utc>,
    pub posting: Posting,
}

/// append-only ledger keeping every posting with its value time
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: Vec<LedgerEntry>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// apply one instruction atomically, returning its batch id
    pub fn apply(&mut self, instruction: &CustomInstruction, at: DateTime<Utc>) -> Result<Uuid> {
        validate(instruction)?;

        let batch_id = Uuid::new_v4();
        self.entries.extend(instruction.postings.iter().cloned().map(|posting| LedgerEntry {
            batch_id,
            value_time: at,
            posting,
        }));
        tracing::debug!(%batch_id, postings = instruction.postings.len(), at = %at, "instruction applied");
        Ok(batch_id)
    }

    /// apply a batch of instructions; nothing is recorded if any is invalid
    pub fn apply_all(&mut self, instructions: &[CustomInstruction], at: DateTime<Utc>) -> Result<Vec<Uuid>> {
        for instruction in instructions {
            validate(instruction)?;
        }
        instructions.iter().map(|i| self.apply(i, at)).collect()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
}

fn validate(instruction: &CustomInstruction) -> Result<()> {
    let mut net: HashMap<(&str, &str), Money> = HashMap::new();
    for posting in &instruction.postings {
        if !posting.amount.is_positive() {
            return Err(LoanError::Ledger {
                message: format!("posting to {} has non-positive amount {}", posting.address, posting.amount),
            });
        }
        let signed = if posting.credit { -posting.amount } else { posting.amount };
        *net.entry((posting.asset.as_str(), posting.denomination.as_str()))
            .or_insert(Money::ZERO) += signed;
    }

    match net.into_iter().find(|(_, amount)| !amount.is_zero()) {
        Some(((_, denomination), amount)) => Err(LoanError::Ledger {
            message: format!("instruction unbalanced by {amount} {denomination}"),
        }),
        None => Ok(()),
    }
}

impl LedgerView for InMemoryLedger {
    fn balance(
        &self,
        account_id: &str,
        coordinate: &BalanceCoordinate,
        at: Option<DateTime<Utc>>,
    ) -> Result<Money> {
        Ok(self
            .entries
            .iter()
            .filter(|e| at.map_or(true, |at| e.value_time <= at))
            .filter(|e| e.posting.account_id == account_id && &e.posting.coordinate() == coordinate)
            .map(|e| if e.posting.credit { -e.posting.amount } else { e.posting.amount })
            .sum())
    }
}

/// parameter values keyed by name, each a series ordered by effective time
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    series: HashMap<String, Vec<(DateTime<Utc>, ParameterValue)>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<ParameterValue>, at: DateTime<Utc>) {
        let series = self.series.entry(name.to_string()).or_default();
        series.push((at, value.into()));
        series.sort_by_key(|(t, _)| *t);
    }

    /// forget every value of the parameter
    pub fn unset(&mut self, name: &str) {
        self.series.remove(name);
    }
}

impl ParameterView for ParameterStore {
    fn parameter(&self, name: &str, at: Option<DateTime<Utc>>) -> Result<Option<ParameterValue>> {
        let Some(series) = self.series.get(name) else {
            return Ok(None);
        };
        let value = match at {
            None => series.last(),
            // before the first change the earliest value applies
            Some(at) => series
                .iter()
                .rev()
                .find(|(t, _)| *t <= at)
                .or_else(|| series.first()),
        };
        Ok(value.map(|(_, v)| v.clone()))
    }

    fn parameter_timeseries(&self, name: &str) -> Result<Vec<(DateTime<Utc>, ParameterValue)>> {
        Ok(self.series.get(name).cloned().unwrap_or_default())
    }
}

/// window during which a flag is active, end exclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagWindow {
    pub flag: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// creation time, schedule executions and flags of one account
#[derive(Debug, Clone)]
pub struct AccountTimeline {
    creation: DateTime<Utc>,
    executions: HashMap<String, Vec<DateTime<Utc>>>,
    flags: Vec<FlagWindow>,
}

impl AccountTimeline {
    pub fn new(creation: DateTime<Utc>) -> Self {
        Self {
            creation,
            executions: HashMap::new(),
            flags: Vec::new(),
        }
    }

    pub fn record_execution(&mut self, event_type: &str, at: DateTime<Utc>) {
        self.executions.entry(event_type.to_string()).or_default().push(at);
    }

    pub fn executions(&self, event_type: &str) -> &[DateTime<Utc>] {
        self.executions.get(event_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_flag(&mut self, flag: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) {
        self.flags.push(FlagWindow {
            flag: flag.to_string(),
            start,
            end,
        });
    }
}

impl AccountHistory for AccountTimeline {
    fn account_creation_datetime(&self) -> DateTime<Utc> {
        self.creation
    }

    fn last_execution_datetime(&self, event_type: &str) -> Option<DateTime<Utc>> {
        self.executions.get(event_type).and_then(|runs| runs.iter().max().copied())
    }

    fn is_flag_active(&self, flag: &str, at: DateTime<Utc>) -> bool {
        self.flags
            .iter()
            .any(|w| w.flag == flag && w.start <= at && w.end.map_or(true, |end| at < end))
    }
}

/// a complete loan account held in memory
#[derive(Debug)]
pub struct InMemoryAccount {
    pub account_id: String,
    pub ledger: InMemoryLedger,
    pub parameters: ParameterStore,
    pub timeline: AccountTimeline,
}

impl InMemoryAccount {
    pub fn new(account_id: &str, creation: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.to_string(),
            ledger: InMemoryLedger::new(),
            parameters: ParameterStore::new(),
            timeline: AccountTimeline::new(creation),
        }
    }

    /// account whose parameters are loaded from `parameters`, effective from creation
    pub fn from_parameters(account_id: &str, creation: DateTime<Utc>, parameters: &LoanParameters) -> Result<Self> {
        let mut account = Self::new(account_id, creation);
        account.parameters = parameters.into_parameter_store(creation)?;
        Ok(account)
    }

    pub fn context(&self) -> LoanContext<'_> {
        LoanContext::new(&self.account_id, &self.ledger, &self.parameters, &self.timeline)
    }

    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParameterValue>, at: DateTime<Utc>) {
        self.parameters.set(name, value, at);
    }

    pub fn apply(&mut self, instructions: &[CustomInstruction], at: DateTime<Utc>) -> Result<Vec<Uuid>> {
        self.ledger.apply_all(instructions, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{create_postings, INTERNAL_CONTRA, PRINCIPAL, PRINCIPAL_DUE};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_balance_is_time_aware() {
        let mut ledger = InMemoryLedger::new();
        let disburse = CustomInstruction::new(
            create_postings(Money::from_major(1000), "loan", PRINCIPAL, "loan", INTERNAL_CONTRA, "GBP"),
            BTreeMap::new(),
        );
        let due = CustomInstruction::new(
            create_postings(Money::from_major(100), "loan", PRINCIPAL_DUE, "loan", PRINCIPAL, "GBP"),
            BTreeMap::new(),
        );
        ledger.apply(&disburse, at(1)).unwrap();
        ledger.apply(&due, at(15)).unwrap();

        let principal = BalanceCoordinate::committed(PRINCIPAL, "GBP");
        assert_eq!(ledger.balance("loan", &principal, Some(at(10))).unwrap(), Money::from_major(1000));
        assert_eq!(ledger.balance("loan", &principal, None).unwrap(), Money::from_major(900));
        assert_eq!(ledger.balance("other", &principal, None).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_unbalanced_batch_is_rejected_atomically() {
        let mut ledger = InMemoryLedger::new();
        let good = CustomInstruction::new(
            create_postings(Money::from_major(5), "loan", PRINCIPAL, "loan", INTERNAL_CONTRA, "GBP"),
            BTreeMap::new(),
        );
        let bad = CustomInstruction::new(
            vec![Posting::debit("loan", PRINCIPAL, "GBP", Money::from(dec!(1)))],
            BTreeMap::new(),
        );

        assert!(ledger.apply_all(&[good, bad], at(1)).is_err());
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn test_parameter_series_lookup() {
        let mut store = ParameterStore::new();
        store.set("variable_interest_rate", dec!(0.05), at(1));
        store.set("variable_interest_rate", dec!(0.06), at(20));

        let value = |t| store.parameter("variable_interest_rate", t).unwrap();
        assert_eq!(value(Some(at(10))), Some(ParameterValue::Number(dec!(0.05))));
        assert_eq!(value(Some(at(20))), Some(ParameterValue::Number(dec!(0.06))));
        assert_eq!(value(None), Some(ParameterValue::Number(dec!(0.06))));
        assert_eq!(store.parameter_timeseries("variable_interest_rate").unwrap().len(), 2);
    }

    #[test]
    fn test_flag_windows_and_executions() {
        let mut timeline = AccountTimeline::new(at(1));
        timeline.add_flag("REPAYMENT_HOLIDAY", at(5), Some(at(10)));
        timeline.record_execution("DUE_AMOUNT_CALCULATION", at(3));
        timeline.record_execution("DUE_AMOUNT_CALCULATION", at(3) + Duration::days(28));

        assert!(timeline.is_flag_active("REPAYMENT_HOLIDAY", at(5)));
        assert!(!timeline.is_flag_active("REPAYMENT_HOLIDAY", at(10)));
        assert_eq!(
            timeline.last_execution_datetime("DUE_AMOUNT_CALCULATION"),
            Some(at(31))
        );
        assert_eq!(timeline.last_execution_datetime("BALLOON_PAYMENT_EVENT"), None);
    }
}
