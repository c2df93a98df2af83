use chrono::{DateTime, Utc};

use crate::context::LoanContext;
use crate::errors::Result;
use crate::types::{ReamortizationDecision, ReamortizationReason};

/// predicate deciding whether the instalment must be recomputed for a period
pub trait ReamortizationCondition {
    fn reason(&self) -> ReamortizationReason;

    fn should_trigger(
        &self,
        ctx: &LoanContext<'_>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        elapsed_term: u32,
    ) -> Result<bool>;
}

/// ordered rule table, any triggered rule reamortizes the loan
#[derive(Default)]
pub struct ReamortizationRules<'a> {
    conditions: Vec<&'a dyn ReamortizationCondition>,
}

impl<'a> ReamortizationRules<'a> {
    pub fn new() -> Self {
        Self { conditions: Vec::new() }
    }

    pub fn with(mut self, condition: &'a dyn ReamortizationCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// first triggered rule wins; later rules are not evaluated
    pub fn evaluate(
        &self,
        ctx: &LoanContext<'_>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        elapsed_term: u32,
    ) -> Result<ReamortizationDecision> {
        for condition in &self.conditions {
            if condition.should_trigger(ctx, period_start, period_end, elapsed_term)? {
                let reason = condition.reason();
                tracing::info!(?reason, %period_start, %period_end, elapsed_term, "reamortization triggered");
                return Ok(ReamortizationDecision::triggered(reason));
            }
        }
        Ok(ReamortizationDecision::none())
    }
}
