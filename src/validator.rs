use crate::config::ResolverConfig;
use crate::tree::{Forest, ResolvedNode};
use serde::{Deserialize, Serialize};

/// A checkable total whose chosen value disagrees with the sum of its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub tid: String,
    pub standardised_name: String,
    /// The total's own `value_chosen`.
    pub declared: i64,
    /// Sum of the children's `value_chosen`, widened so that it cannot overflow.
    pub computed: i128,
    /// `declared - computed`.
    pub delta: i128,
}

impl std::fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' ({}) declares {} but its children sum to {} (delta {})",
            self.standardised_name, self.tid, self.declared, self.computed, self.delta
        )
    }
}

/// Cross-checks totals against their children. Never modifies the forest.
///
/// Inapplicable totals are skipped and inapplicable children left out of the
/// sum unless [`TotalsValidator::with_inapplicable`] turns that on.
pub struct TotalsValidator {
    tolerance: i64,
    include_inapplicable: bool,
}

impl TotalsValidator {
    pub fn new(tolerance: i64) -> Self {
        Self {
            tolerance: tolerance.max(0),
            include_inapplicable: false,
        }
    }

    #[must_use]
    pub fn with_inapplicable(mut self, include_inapplicable: bool) -> Self {
        self.include_inapplicable = include_inapplicable;
        self
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.tolerance).with_inapplicable(config.validate_inapplicable)
    }

    pub fn validate(&self, forest: &Forest) -> Vec<Discrepancy> {
        forest
            .nodes()
            .iter()
            .filter_map(|node| self.check_node(forest, node))
            .collect()
    }

    fn check_node(&self, forest: &Forest, node: &ResolvedNode) -> Option<Discrepancy> {
        if !node.check_possible || node.is_leaf() {
            return None;
        }
        if node.inapplicable && !self.include_inapplicable {
            return None;
        }

        let computed: i128 = forest
            .children(node)
            .filter(|child| self.include_inapplicable || !child.inapplicable)
            .map(|child| i128::from(child.value_chosen))
            .sum();
        let delta = i128::from(node.value_chosen) - computed;

        if delta.unsigned_abs() > u128::from(self.tolerance.unsigned_abs()) {
            Some(Discrepancy {
                tid: node.tid.clone(),
                standardised_name: node.standardised_name.clone(),
                declared: node.value_chosen,
                computed,
                delta,
            })
        } else {
            None
        }
    }
}

impl Default for TotalsValidator {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Validates with exact equality.
pub fn validate(forest: &Forest) -> Vec<Discrepancy> {
    TotalsValidator::default().validate(forest)
}
