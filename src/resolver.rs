use crate::schema::RawRecord;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which of the record's candidate values became `valueChosen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ValueSource {
    /// A non-zero `valueCalculated` took precedence.
    Calculated,
    /// `valueCalculated` was zero, so the reported `valueAssigned` was used.
    Assigned,
    /// `uid == "0"`: the line item does not apply and resolves to zero.
    Inapplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedValue {
    pub value_chosen: i64,
    pub source: ValueSource,
}

impl ResolvedValue {
    pub fn is_inapplicable(&self) -> bool {
        self.source == ValueSource::Inapplicable
    }
}

/// Result of the bottom-up pass for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reconciliation {
    /// Sum of the applicable children's chosen values. `None` for leaves, and
    /// when the sum does not fit in an `i64`.
    pub children_sum: Option<i64>,
    /// The children's sum overflowed `i64`.
    pub sum_overflow: bool,
    /// The record's own calculated value is zero while its children carry value.
    pub suspect: bool,
}

/// Applies the value precedence rule. Stateless; every call depends only on its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver;

impl Resolver {
    pub fn new() -> Self {
        Self
    }

    /// First pass: resolve a single record in isolation.
    pub fn resolve(&self, record: &RawRecord) -> ResolvedValue {
        if record.is_inapplicable() {
            return ResolvedValue {
                value_chosen: 0,
                source: ValueSource::Inapplicable,
            };
        }

        if record.value_calculated != 0 {
            ResolvedValue {
                value_chosen: record.value_calculated,
                source: ValueSource::Calculated,
            }
        } else {
            ResolvedValue {
                value_chosen: record.value_assigned,
                source: ValueSource::Assigned,
            }
        }
    }

    /// Second pass: compare a resolved record with its already resolved children.
    ///
    /// Inapplicable children never contribute. The chosen value itself is left
    /// untouched; a zero calculated total over non-zero children is only flagged.
    pub fn reconcile(
        &self,
        record: &RawRecord,
        resolved: &ResolvedValue,
        children: &[ResolvedValue],
    ) -> Reconciliation {
        if children.is_empty() {
            return Reconciliation::default();
        }

        let applicable = children.iter().filter(|c| !c.is_inapplicable());
        let children_sum = applicable
            .clone()
            .try_fold(0i64, |acc, c| acc.checked_add(c.value_chosen));
        let any_valued = applicable.clone().any(|c| c.value_chosen != 0);

        Reconciliation {
            children_sum,
            sum_overflow: children_sum.is_none(),
            suspect: !resolved.is_inapplicable() && record.value_calculated == 0 && any_valued,
        }
    }
}

/// Resolves one record with the default resolver.
pub fn resolve(record: &RawRecord) -> ResolvedValue {
    Resolver::new().resolve(record)
}
