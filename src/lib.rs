//! # Statement Resolver
//!
//! A library for turning the flat list of standardised line items returned by a
//! financial-data API into a hierarchical statement with one unambiguous value
//! per line item.
//!
//! ## Core Concepts
//!
//! - **Line item**: one row of a standardised statement, linked to the total it rolls up into via `parent_tid`
//! - **Chosen value**: a non-zero `valueCalculated` wins, otherwise `valueAssigned` is used
//! - **Inapplicable**: `uid == "0"` marks a template row that does not apply to the company; it resolves to zero
//! - **Suspect**: a total with no calculated value although its children carry value
//! - **Discrepancy**: a checkable total whose value disagrees with the sum of its children
//!
//! Structural problems (duplicate `tid`, cycles, references to missing parents)
//! are errors. Everything else is reported alongside a best-effort result.
//!
//! ## Example
//!
//! ```rust
//! use statement_resolver::*;
//!
//! let records = vec![
//!     RawRecord::new("1", "0", "Total Assets")
//!         .with_values(0, 300)
//!         .with_check_possible(true),
//!     RawRecord::new("2", "1", "Cash").with_values(100, 0),
//!     RawRecord::new("3", "1", "Receivables").with_values(200, 0),
//! ];
//!
//! let report = resolve_statement(&records).unwrap();
//! assert_eq!(report.value_of("1"), Some(300));
//! assert!(report.discrepancies.is_empty());
//! ```

pub mod config;
pub mod error;
pub mod ingestion;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod tree;
pub mod utils;
pub mod validator;

pub use config::{DanglingPolicy, ExportOptions, ResolverConfig};
pub use error::{ResolverError, Result};
pub use ingestion::*;
pub use report::{ReportRow, ResolvedReport};
pub use resolver::{resolve, Reconciliation, ResolvedValue, Resolver, ValueSource};
pub use schema::*;
pub use tree::{build, DroppedRecord, Forest, ResolutionWarning, ResolvedNode, TreeBuilder};
pub use validator::{validate, Discrepancy, TotalsValidator};

use log::{debug, info};

/// Runs a full resolution pass: link and resolve, then validate totals.
pub struct StatementResolver {
    config: ResolverConfig,
}

impl StatementResolver {
    pub fn new(config: ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn resolve(&self, records: &[RawRecord]) -> Result<ResolvedReport> {
        self.resolve_titled("statement", records)
    }

    pub fn resolve_snapshot(&self, snapshot: &StatementSnapshot) -> Result<ResolvedReport> {
        self.resolve_titled(&snapshot.label(), &snapshot.values)
    }

    /// Resolves either a statement envelope or a bare array of line items.
    pub fn resolve_json(&self, json: &str) -> Result<ResolvedReport> {
        self.resolve_snapshot(&parse_payload(json)?)
    }

    fn resolve_titled(&self, title: &str, records: &[RawRecord]) -> Result<ResolvedReport> {
        info!("Resolving {} with {} line items", title, records.len());

        let forest = TreeBuilder::new(&self.config).build(records)?;
        let discrepancies = TotalsValidator::from_config(&self.config).validate(&forest);

        for warning in forest.warnings() {
            debug!("Resolution warning: {}", warning);
        }
        for discrepancy in &discrepancies {
            debug!("Totals discrepancy: {}", discrepancy);
        }

        info!(
            "Resolved {}: {} nodes, {} warnings, {} discrepancies, {} dropped",
            title,
            forest.len(),
            forest.warnings().len(),
            discrepancies.len(),
            forest.dropped().len()
        );

        Ok(ResolvedReport::new(
            title,
            forest,
            discrepancies,
            self.config.export,
        ))
    }
}

pub fn resolve_statement(records: &[RawRecord]) -> Result<ResolvedReport> {
    resolve_statement_with_config(records, &ResolverConfig::default())
}

pub fn resolve_statement_with_config(
    records: &[RawRecord],
    config: &ResolverConfig,
) -> Result<ResolvedReport> {
    StatementResolver::new(config.clone())?.resolve(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(total_calculated: i64) -> Vec<RawRecord> {
        vec![
            RawRecord::new("1", "0", "Total Assets")
                .with_values(0, total_calculated)
                .with_check_possible(true),
            RawRecord::new("2", "1", "Cash").with_values(100, 0),
            RawRecord::new("3", "1", "Receivables").with_values(200, 0),
        ]
    }

    #[test]
    fn test_end_to_end_resolution() {
        let report = resolve_statement(&scenario(300)).unwrap();

        assert_eq!(report.value_of("1"), Some(300));
        assert_eq!(report.value_of("2"), Some(100));
        assert_eq!(report.value_of("3"), Some(200));
        assert!(report.discrepancies.is_empty());
        assert!(!report.has_issues());
    }

    #[test]
    fn test_stale_total_produces_discrepancy() {
        let report = resolve_statement(&scenario(250)).unwrap();

        assert_eq!(report.discrepancies.len(), 1);
        let discrepancy = &report.discrepancies[0];
        assert_eq!(discrepancy.tid, "1");
        assert_eq!(discrepancy.declared, 250);
        assert_eq!(discrepancy.computed, 300);
        assert_eq!(discrepancy.delta, -50);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ResolverConfig {
            tolerance: -1,
            ..ResolverConfig::default()
        };
        assert!(matches!(
            StatementResolver::new(config),
            Err(ResolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_resolve_json_accepts_both_payload_shapes() {
        let resolver = StatementResolver::new(ResolverConfig::default()).unwrap();

        let envelope = r#"{"stype": "pl", "fyear": 2019, "ptype": "FY", "values": [
            {"tid": "1", "uid": "1", "parent_tid": "0", "standardisedName": "Revenue", "valueAssigned": "1200"}
        ]}"#;
        let report = resolver.resolve_json(envelope).unwrap();
        assert_eq!(report.title, "pl 2019 FY");
        assert_eq!(report.value_of("1"), Some(1200));

        let bare = r#"[{"tid": "1", "parent_tid": "0", "valueAssigned": 5}]"#;
        let report = resolver.resolve_json(bare).unwrap();
        assert_eq!(report.title, "statement");
        assert_eq!(report.value_of("1"), Some(5));
    }

    #[test]
    fn test_resolve_json_reports_bad_envelope_records() {
        let resolver = StatementResolver::new(ResolverConfig::default()).unwrap();
        let envelope = r#"{"stype": "pl", "values": [
            {"tid": "1", "parent_tid": "0", "valueAssigned": 12.5}
        ]}"#;
        assert!(matches!(
            resolver.resolve_json(envelope),
            Err(ResolverError::SerializationError(_))
        ));
    }
}
