use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::LedgerView;
use crate::decimal::Money;
use crate::errors::Result;

// balance addresses on the loan account
pub const PRINCIPAL: &str = "PRINCIPAL";
pub const PRINCIPAL_DUE: &str = "PRINCIPAL_DUE";
pub const INTEREST_DUE: &str = "INTEREST_DUE";
pub const EMI: &str = "EMI";
pub const ACCRUED_INTEREST_RECEIVABLE: &str = "ACCRUED_INTEREST_RECEIVABLE";
pub const DUE_CALCULATION_EVENT_COUNTER: &str = "DUE_CALCULATION_EVENT_COUNTER";
pub const INTERNAL_CONTRA: &str = "INTERNAL_CONTRA";
pub const DEFAULT_ADDRESS: &str = "DEFAULT";

pub const DEFAULT_ASSET: &str = "COMMERCIAL_BANK_MONEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Committed,
    PendingIncoming,
    PendingOutgoing,
}

/// one dimension of an account's balances
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceCoordinate {
    pub address: String,
    pub asset: String,
    pub denomination: String,
    pub phase: Phase,
}

impl BalanceCoordinate {
    pub fn new(address: &str, asset: &str, denomination: &str, phase: Phase) -> Self {
        Self {
            address: address.to_string(),
            asset: asset.to_string(),
            denomination: denomination.to_string(),
            phase,
        }
    }

    /// committed default-asset coordinate, the only kind the engine reads
    pub fn committed(address: &str, denomination: &str) -> Self {
        Self::new(address, DEFAULT_ASSET, denomination, Phase::Committed)
    }
}

/// single leg of a double entry movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub credit: bool,
    pub account_id: String,
    pub address: String,
    pub asset: String,
    pub denomination: String,
    pub phase: Phase,
    pub amount: Money,
}

impl Posting {
    pub fn debit(account_id: &str, address: &str, denomination: &str, amount: Money) -> Self {
        Self::leg(false, account_id, address, denomination, amount)
    }

    pub fn credit(account_id: &str, address: &str, denomination: &str, amount: Money) -> Self {
        Self::leg(true, account_id, address, denomination, amount)
    }

    fn leg(credit: bool, account_id: &str, address: &str, denomination: &str, amount: Money) -> Self {
        Self {
            credit,
            account_id: account_id.to_string(),
            address: address.to_string(),
            asset: DEFAULT_ASSET.to_string(),
            denomination: denomination.to_string(),
            phase: Phase::Committed,
            amount,
        }
    }

    pub fn coordinate(&self) -> BalanceCoordinate {
        BalanceCoordinate::new(&self.address, &self.asset, &self.denomination, self.phase)
    }
}

/// postings that must be applied together or not at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomInstruction {
    pub postings: Vec<Posting>,
    pub instruction_details: BTreeMap<String, String>,
    pub override_all_restrictions: bool,
}

impl CustomInstruction {
    pub fn new(postings: Vec<Posting>, instruction_details: BTreeMap<String, String>) -> Self {
        Self {
            postings,
            instruction_details,
            override_all_restrictions: false,
        }
    }

    pub fn overriding_restrictions(mut self) -> Self {
        self.override_all_restrictions = true;
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.instruction_details.get("description").map(String::as_str)
    }
}

/// metadata attached to every instruction the engine emits
pub fn standard_instruction_details(
    description: &str,
    event_type: &str,
    gl_impacted: bool,
    account_type: &str,
) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();
    details.insert("description".to_string(), description.to_string());
    details.insert("event".to_string(), event_type.to_string());
    details.insert("gl_impacted".to_string(), gl_impacted.to_string());
    details.insert("account_type".to_string(), account_type.to_string());
    details
}

/// balanced debit/credit pair, empty when there is nothing to move
pub fn create_postings(
    amount: Money,
    debit_account: &str,
    debit_address: &str,
    credit_account: &str,
    credit_address: &str,
    denomination: &str,
) -> Vec<Posting> {
    if !amount.is_positive() {
        return Vec::new();
    }

    vec![
        Posting::credit(credit_account, credit_address, denomination, amount),
        Posting::debit(debit_account, debit_address, denomination, amount),
    ]
}

/// zero tracker addresses against a contra address
///
/// trackers sit on the asset side, so a positive net balance is reset by
/// crediting the tracker.
pub fn reset_tracker_balances(
    ledger: &dyn LedgerView,
    account_id: &str,
    tracker_addresses: &[&str],
    contra_address: &str,
    denomination: &str,
    at: Option<DateTime<Utc>>,
) -> Result<Vec<Posting>> {
    let mut postings = Vec::new();
    for address in tracker_addresses {
        let net = ledger.balance(account_id, &BalanceCoordinate::committed(address, denomination), at)?;
        if net.is_positive() {
            postings.extend(create_postings(
                net,
                account_id,
                contra_address,
                account_id,
                address,
                denomination,
            ));
        } else if net.is_negative() {
            postings.extend(create_postings(
                net.abs(),
                account_id,
                address,
                account_id,
                contra_address,
                denomination,
            ));
        }
    }
    Ok(postings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLedger;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_postings_balanced_pair() {
        let postings = create_postings(Money::from(dec!(10.5)), "loan", PRINCIPAL_DUE, "loan", PRINCIPAL, "GBP");
        assert_eq!(
            postings,
            vec![
                Posting::credit("loan", PRINCIPAL, "GBP", Money::from(dec!(10.5))),
                Posting::debit("loan", PRINCIPAL_DUE, "GBP", Money::from(dec!(10.5))),
            ]
        );
    }

    #[test]
    fn test_create_postings_skips_non_positive() {
        assert!(create_postings(Money::ZERO, "loan", EMI, "loan", INTERNAL_CONTRA, "GBP").is_empty());
        assert!(create_postings(Money::from(dec!(-1)), "loan", EMI, "loan", INTERNAL_CONTRA, "GBP").is_empty());
    }

    #[test]
    fn test_reset_tracker_balances() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut ledger = InMemoryLedger::new();
        let setup = CustomInstruction::new(
            create_postings(Money::from_major(3), "loan", DUE_CALCULATION_EVENT_COUNTER, "loan", INTERNAL_CONTRA, "GBP"),
            BTreeMap::new(),
        );
        ledger.apply(&setup, at).unwrap();

        let postings = reset_tracker_balances(
            &ledger,
            "loan",
            &[DUE_CALCULATION_EVENT_COUNTER, EMI],
            INTERNAL_CONTRA,
            "GBP",
            None,
        )
        .unwrap();

        assert_eq!(
            postings,
            vec![
                Posting::credit("loan", DUE_CALCULATION_EVENT_COUNTER, "GBP", Money::from_major(3)),
                Posting::debit("loan", INTERNAL_CONTRA, "GBP", Money::from_major(3)),
            ]
        );
    }

    #[test]
    fn test_instruction_details() {
        let details = standard_instruction_details("Updating due balances", "DUE_AMOUNT_CALCULATION", true, "LOAN");
        assert_eq!(details.get("gl_impacted").map(String::as_str), Some("true"));
        assert_eq!(details.get("event").map(String::as_str), Some("DUE_AMOUNT_CALCULATION"));
    }
}
