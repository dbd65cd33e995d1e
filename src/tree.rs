//! Assembles a flat snapshot of line items into a forest of resolved nodes.
//!
//! Structural problems in the parent links (duplicate `tid`, cycles, references
//! to missing parents) are hard errors. Everything softer is collected as a
//! [`ResolutionWarning`] on the forest.

use crate::config::{DanglingPolicy, ResolverConfig};
use crate::error::{ResolverError, Result};
use crate::resolver::{ResolvedValue, Resolver, ValueSource};
use crate::schema::RawRecord;
use crate::utils::parse_display_level;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNode {
    pub tid: String,
    pub parent_tid: String,
    pub uid: String,
    pub standardised_name: String,
    /// `displayLevel` as declared by the source, unparsed.
    pub display_level: String,
    /// Number of parent hops to a root.
    pub depth: u32,
    pub value_assigned: i64,
    pub value_calculated: i64,
    pub check_possible: bool,
    pub value_chosen: i64,
    pub value_source: ValueSource,
    pub inapplicable: bool,
    pub suspect: bool,
    /// Sum of applicable children's `value_chosen`; `None` when the node has no
    /// children or the sum overflowed.
    pub children_sum: Option<i64>,
    pub sum_overflow: bool,
    /// Position of the record in the input snapshot.
    pub source_index: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl ResolvedNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// A total is anything that has children or is declared checkable.
    pub fn is_total(&self) -> bool {
        self.check_possible || !self.children.is_empty()
    }

    fn resolved_value(&self) -> ResolvedValue {
        ResolvedValue {
            value_chosen: self.value_chosen,
            source: self.value_source,
        }
    }
}

/// Non-fatal findings produced while building the forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionWarning {
    /// The declared `displayLevel` does not match the depth derived from parent links.
    DisplayLevelMismatch {
        tid: String,
        declared: String,
        expected: u32,
    },
    /// A record marked not applicable (`uid == "0"`) still carries values. They are ignored.
    InapplicableWithValue {
        tid: String,
        value_assigned: i64,
        value_calculated: i64,
    },
    /// `valueCalculated` is zero although applicable children carry value.
    SuspectValue {
        tid: String,
        value_chosen: i64,
        children_sum: i64,
    },
    /// The applicable children's values add up to more than an `i64` holds.
    SumOverflow { tid: String },
}

impl ResolutionWarning {
    pub fn tid(&self) -> &str {
        match self {
            ResolutionWarning::DisplayLevelMismatch { tid, .. }
            | ResolutionWarning::InapplicableWithValue { tid, .. }
            | ResolutionWarning::SuspectValue { tid, .. }
            | ResolutionWarning::SumOverflow { tid } => tid,
        }
    }
}

impl std::fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionWarning::DisplayLevelMismatch {
                tid,
                declared,
                expected,
            } => write!(
                f,
                "Line item '{}' declares displayLevel '{}' but sits at level {}",
                tid, declared, expected
            ),
            ResolutionWarning::InapplicableWithValue {
                tid,
                value_assigned,
                value_calculated,
            } => write!(
                f,
                "Inapplicable line item '{}' carries values (assigned {}, calculated {})",
                tid, value_assigned, value_calculated
            ),
            ResolutionWarning::SuspectValue {
                tid,
                value_chosen,
                children_sum,
            } => write!(
                f,
                "Line item '{}' resolved to {} without a calculated value, children sum to {}",
                tid, value_chosen, children_sum
            ),
            ResolutionWarning::SumOverflow { tid } => write!(
                f,
                "Children of line item '{}' sum beyond the representable range",
                tid
            ),
        }
    }
}

/// A record left out of the forest under [`DanglingPolicy::DropSubtree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRecord {
    pub tid: String,
    /// The `tid` of the record whose parent is missing. Equal to `tid` for the subtree root.
    pub subtree_root: String,
    /// The missing parent identifier.
    pub missing_parent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Forest {
    nodes: Vec<ResolvedNode>,
    roots: Vec<usize>,
    warnings: Vec<ResolutionWarning>,
    dropped: Vec<DroppedRecord>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Forest {
    /// All nodes in source order.
    pub fn nodes(&self) -> &[ResolvedNode] {
        &self.nodes
    }

    pub fn roots(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.roots.iter().map(move |&i| &self.nodes[i])
    }

    pub fn node(&self, index: usize) -> Option<&ResolvedNode> {
        self.nodes.get(index)
    }

    pub fn get(&self, tid: &str) -> Option<&ResolvedNode> {
        self.index.get(tid).map(|&i| &self.nodes[i])
    }

    pub fn children<'a>(&'a self, node: &'a ResolvedNode) -> impl Iterator<Item = &'a ResolvedNode> {
        node.children.iter().map(move |&i| &self.nodes[i])
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    pub fn dropped(&self) -> &[DroppedRecord] {
        &self.dropped
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first walk: each root followed by its descendants, siblings in source order.
    pub fn pre_order(&self) -> Vec<&ResolvedNode> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();

        while let Some(i) = stack.pop() {
            let node = &self.nodes[i];
            ordered.push(node);
            stack.extend(node.children.iter().rev().copied());
        }

        ordered
    }
}

/// Where following the parent links of a record ends up.
#[derive(Debug, Clone, Copy)]
enum Anchor {
    Unvisited,
    Rooted { depth: u32 },
    /// Reaches a record (by input index) whose parent is missing.
    Dangling { origin: usize },
}

pub struct TreeBuilder {
    resolver: Resolver,
    display_level_base: u32,
    dangling_policy: DanglingPolicy,
}

impl TreeBuilder {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            resolver: Resolver::new(),
            display_level_base: config.display_level_base,
            dangling_policy: config.dangling_policy,
        }
    }

    pub fn build(&self, records: &[RawRecord]) -> Result<Forest> {
        let by_tid = index_by_tid(records)?;
        let anchors = anchor_records(records, &by_tid)?;

        let mut dropped = Vec::new();
        for (i, anchor) in anchors.iter().enumerate() {
            if let Anchor::Dangling { origin } = *anchor {
                let offending = &records[origin];
                if self.dangling_policy == DanglingPolicy::Fail {
                    return Err(ResolverError::DanglingReference {
                        tid: offending.tid.clone(),
                        parent_tid: offending.parent_tid.clone(),
                    });
                }
                dropped.push(DroppedRecord {
                    tid: records[i].tid.clone(),
                    subtree_root: offending.tid.clone(),
                    missing_parent: offending.parent_tid.clone(),
                });
            }
        }

        if !dropped.is_empty() {
            warn!(
                "Dropped {} line items whose parent chain references missing line items",
                dropped.len()
            );
        }

        let mut forest = self.link(records, &by_tid, &anchors);
        forest.dropped = dropped;
        self.recompute_totals(records, &mut forest);
        forest.warnings = self.collect_warnings(&forest);

        debug!(
            "Built forest with {} roots and {} nodes",
            forest.roots.len(),
            forest.nodes.len()
        );

        Ok(forest)
    }

    /// Creates one node per rooted record, resolved in isolation, and wires up parent/child links.
    fn link(
        &self,
        records: &[RawRecord],
        by_tid: &HashMap<&str, usize>,
        anchors: &[Anchor],
    ) -> Forest {
        let mut nodes = Vec::new();
        let mut record_to_node: HashMap<usize, usize> = HashMap::new();

        for (i, record) in records.iter().enumerate() {
            let Anchor::Rooted { depth } = anchors[i] else {
                continue;
            };
            let resolved = self.resolver.resolve(record);

            record_to_node.insert(i, nodes.len());
            nodes.push(ResolvedNode {
                tid: record.tid.clone(),
                parent_tid: record.parent_tid.clone(),
                uid: record.uid.clone(),
                standardised_name: record.standardised_name.clone(),
                display_level: record.display_level.clone(),
                depth,
                value_assigned: record.value_assigned,
                value_calculated: record.value_calculated,
                check_possible: record.check_possible,
                value_chosen: resolved.value_chosen,
                value_source: resolved.source,
                inapplicable: resolved.is_inapplicable(),
                suspect: false,
                children_sum: None,
                sum_overflow: false,
                source_index: i,
                parent: None,
                children: Vec::new(),
            });
        }

        let mut roots = Vec::new();
        for node_index in 0..nodes.len() {
            let record = &records[nodes[node_index].source_index];
            if record.is_root() {
                roots.push(node_index);
                continue;
            }

            let parent_node = by_tid
                .get(record.parent_tid.as_str())
                .and_then(|parent_record| record_to_node.get(parent_record))
                .copied();

            if let Some(parent_node) = parent_node {
                nodes[node_index].parent = Some(parent_node);
                nodes[parent_node].children.push(node_index);
            }
        }

        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.tid.clone(), i))
            .collect();

        Forest {
            nodes,
            roots,
            warnings: Vec::new(),
            dropped: Vec::new(),
            index,
        }
    }

    /// Bottom-up pass: deepest nodes first, so every child is final before its parent is visited.
    fn recompute_totals(&self, records: &[RawRecord], forest: &mut Forest) {
        let mut order: Vec<usize> = (0..forest.nodes.len()).collect();
        order.sort_by(|a, b| forest.nodes[*b].depth.cmp(&forest.nodes[*a].depth));

        for i in order {
            let node = &forest.nodes[i];
            if !node.is_total() {
                continue;
            }

            let children: Vec<ResolvedValue> = node
                .children
                .iter()
                .map(|&c| forest.nodes[c].resolved_value())
                .collect();
            let reconciliation = self.resolver.reconcile(
                &records[node.source_index],
                &node.resolved_value(),
                &children,
            );

            let node = &mut forest.nodes[i];
            node.children_sum = reconciliation.children_sum;
            node.sum_overflow = reconciliation.sum_overflow;
            node.suspect = reconciliation.suspect;
        }
    }

    fn collect_warnings(&self, forest: &Forest) -> Vec<ResolutionWarning> {
        let mut warnings = Vec::new();

        for node in &forest.nodes {
            let expected = node.depth + self.display_level_base;
            let declared = node.display_level.trim();
            if !declared.is_empty() && parse_display_level(declared) != Some(expected) {
                warnings.push(ResolutionWarning::DisplayLevelMismatch {
                    tid: node.tid.clone(),
                    declared: declared.to_string(),
                    expected,
                });
            }

            if node.inapplicable && (node.value_assigned != 0 || node.value_calculated != 0) {
                warnings.push(ResolutionWarning::InapplicableWithValue {
                    tid: node.tid.clone(),
                    value_assigned: node.value_assigned,
                    value_calculated: node.value_calculated,
                });
            }

            if node.sum_overflow {
                warnings.push(ResolutionWarning::SumOverflow {
                    tid: node.tid.clone(),
                });
            }

            if node.suspect {
                warnings.push(ResolutionWarning::SuspectValue {
                    tid: node.tid.clone(),
                    value_chosen: node.value_chosen,
                    children_sum: node.children_sum.unwrap_or_default(),
                });
            }
        }

        warnings
    }
}

fn index_by_tid(records: &[RawRecord]) -> Result<HashMap<&str, usize>> {
    let mut by_tid = HashMap::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        if by_tid.insert(record.tid.as_str(), i).is_some() {
            return Err(ResolverError::DuplicateTid(record.tid.clone()));
        }
    }
    Ok(by_tid)
}

/// Follows every record's parent chain to a root or to a missing parent.
///
/// Chains are memoised, so each record is walked once. Revisiting a record
/// within the current walk is a cycle and aborts the pass.
fn anchor_records(records: &[RawRecord], by_tid: &HashMap<&str, usize>) -> Result<Vec<Anchor>> {
    let mut anchors = vec![Anchor::Unvisited; records.len()];

    for start in 0..records.len() {
        let mut path: Vec<usize> = Vec::new();
        let mut on_path: HashSet<usize> = HashSet::new();
        let mut current = start;

        let terminal = loop {
            match anchors[current] {
                Anchor::Unvisited => {}
                known => break known,
            }

            if !on_path.insert(current) {
                let first = path.iter().position(|&p| p == current).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[first..].iter().map(|&p| records[p].tid.clone()).collect();
                cycle.push(records[current].tid.clone());
                return Err(ResolverError::Cycle {
                    tid: records[current].tid.clone(),
                    path: cycle,
                });
            }
            path.push(current);

            let record = &records[current];
            if record.is_root() {
                break Anchor::Rooted { depth: 0 };
            }
            match by_tid.get(record.parent_tid.as_str()) {
                Some(&parent) => current = parent,
                None => break Anchor::Dangling { origin: current },
            }
        };

        // The path runs from `start` towards the root. Its last element is one
        // hop below the terminal (or is the terminal itself for a root/dangling record).
        let ends_on_path = matches!(anchors[current], Anchor::Unvisited);
        for (hops, &i) in path.iter().rev().enumerate() {
            anchors[i] = match terminal {
                Anchor::Rooted { depth } => {
                    let offset = if ends_on_path { hops } else { hops + 1 };
                    Anchor::Rooted {
                        depth: depth + offset as u32,
                    }
                }
                other => other,
            };
        }
    }

    Ok(anchors)
}

/// Builds a forest with the default configuration.
pub fn build(records: &[RawRecord]) -> Result<Forest> {
    TreeBuilder::new(&ResolverConfig::default()).build(records)
}
