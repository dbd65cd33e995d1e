use crate::error::{ResolverError, Result};
use crate::schema::{Period, RawRecord, StatementSnapshot, StatementType};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reads line items from either a bare JSON array of records or a statement
/// object carrying them under `values`.
pub fn parse_records(json: &str) -> Result<Vec<RawRecord>> {
    Ok(parse_payload(json)?.values)
}

/// Like [`parse_records`], but keeps the statement metadata when the payload
/// is an envelope. A bare array yields a snapshot without metadata.
pub fn parse_payload(json: &str) -> Result<StatementSnapshot> {
    let payload: Value = serde_json::from_str(json)?;
    match payload {
        Value::Array(_) => Ok(StatementSnapshot::new(serde_json::from_value(payload)?)),
        Value::Object(_) => snapshot_from_value(payload),
        other => Err(unexpected_payload(&other)),
    }
}

pub fn parse_snapshot(json: &str) -> Result<StatementSnapshot> {
    let payload: Value = serde_json::from_str(json)?;
    snapshot_from_value(payload)
}

/// Some endpoints answer with one statement object, others with a list of them.
pub fn parse_snapshots(json: &str) -> Result<Vec<StatementSnapshot>> {
    let payload: Value = serde_json::from_str(json)?;
    match payload {
        Value::Array(items) => items.into_iter().map(snapshot_from_value).collect(),
        Value::Object(_) => Ok(vec![snapshot_from_value(payload)?]),
        other => Err(unexpected_payload(&other)),
    }
}

fn snapshot_from_value(payload: Value) -> Result<StatementSnapshot> {
    if !payload.get("values").is_some_and(Value::is_array) {
        return Err(unexpected_payload(&payload));
    }
    Ok(serde_json::from_value(payload)?)
}

fn unexpected_payload(payload: &Value) -> ResolverError {
    let kind = match payload {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object without a 'values' array",
    };
    ResolverError::InvalidValue {
        field: "payload".to_string(),
        value: format!("expected a list of line items, got {}", kind),
    }
}

/// One entry of the statement catalogue returned for a company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementListing {
    pub period: Period,
    #[serde(rename = "fyear")]
    pub fiscal_year: i32,
    /// Whether the provider derived this statement rather than taking it from a filing.
    #[serde(default)]
    pub calculated: bool,
}

/// The statement/year/period to fetch for one annual snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRequest {
    #[serde(rename = "stype")]
    pub statement_type: StatementType,
    #[serde(rename = "fyear")]
    pub fiscal_year: i32,
    #[serde(rename = "ptype")]
    pub period: Period,
}

/// Which statements exist for a company, per statement type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailableStatements {
    pub statements: BTreeMap<StatementType, Vec<StatementListing>>,
}

impl AvailableStatements {
    /// Parses the catalogue object (`{"pl": [...], "bs": [...], "cf": [...]}`).
    /// Keys that are not a known statement type are skipped.
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: BTreeMap<String, Value> = serde_json::from_str(json)?;
        let mut statements = BTreeMap::new();

        for (key, listings) in payload {
            match serde_json::from_value::<StatementType>(Value::String(key.clone())) {
                Ok(statement_type) => {
                    let listings: Vec<StatementListing> = serde_json::from_value(listings)?;
                    statements.insert(statement_type, listings);
                }
                Err(_) => debug!("Skipping unknown statement type '{}'", key),
            }
        }

        Ok(Self { statements })
    }

    pub fn fiscal_years(&self, statement_type: StatementType) -> Vec<i32> {
        let mut years: Vec<i32> = self
            .statements
            .get(&statement_type)
            .map(|listings| listings.iter().map(|l| l.fiscal_year).collect())
            .unwrap_or_default();
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn periods(&self, statement_type: StatementType, fiscal_year: i32) -> Vec<Period> {
        let mut periods: Vec<Period> = self
            .statements
            .get(&statement_type)
            .map(|listings| {
                listings
                    .iter()
                    .filter(|l| l.fiscal_year == fiscal_year)
                    .map(|l| l.period)
                    .collect()
            })
            .unwrap_or_default();
        periods.sort_unstable();
        periods.dedup();
        periods
    }

    /// Earliest and latest fiscal year across all statement types.
    pub fn year_range(&self) -> Option<(i32, i32)> {
        let years = self
            .statements
            .values()
            .flat_map(|listings| listings.iter().map(|l| l.fiscal_year));
        let (min, max) = years.fold((None, None), |(min, max): (Option<i32>, Option<i32>), y| {
            (
                Some(min.map_or(y, |m| m.min(y))),
                Some(max.map_or(y, |m| m.max(y))),
            )
        });
        min.zip(max)
    }

    /// Up to `count` most recent fiscal years, oldest first, ending at the latest
    /// year whose balance sheet has a Q4 snapshot. Later, still incomplete years are skipped.
    pub fn latest_complete_years(&self, count: usize) -> Vec<i32> {
        if count == 0 {
            return Vec::new();
        }

        let years = self.fiscal_years(StatementType::BalanceSheet);
        let Some(end) = years
            .iter()
            .rposition(|&y| self.periods(StatementType::BalanceSheet, y).contains(&Period::Q4))
        else {
            return Vec::new();
        };

        let start = (end + 1).saturating_sub(count);
        years[start..=end].to_vec()
    }

    /// One request per available statement type and selected year, using each
    /// statement's annual period.
    pub fn annual_requests(&self, count: usize) -> Vec<StatementRequest> {
        let years = self.latest_complete_years(count);
        self.statements
            .keys()
            .flat_map(|&statement_type| {
                years.iter().map(move |&fiscal_year| StatementRequest {
                    statement_type,
                    fiscal_year,
                    period: statement_type.annual_period(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOGUE: &str = r#"{
        "pl": [
            {"period": "FY", "fyear": 2017, "calculated": false},
            {"period": "FY", "fyear": 2018, "calculated": false},
            {"period": "FY", "fyear": 2019, "calculated": false}
        ],
        "bs": [
            {"period": "Q4", "fyear": 2017, "calculated": false},
            {"period": "Q4", "fyear": 2018, "calculated": false},
            {"period": "Q4", "fyear": 2019, "calculated": false},
            {"period": "Q1", "fyear": 2020, "calculated": false},
            {"period": "Q2", "fyear": 2020, "calculated": true}
        ],
        "derived": []
    }"#;

    #[test]
    fn test_parse_bare_record_array() {
        let records = parse_records(
            r#"[
                {"tid": "1", "uid": "1", "parent_tid": "0", "standardisedName": "Revenue", "valueAssigned": 10}
            ]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value_assigned, 10);
    }

    #[test]
    fn test_parse_snapshot_envelope() {
        let snapshot = parse_snapshot(
            r#"{
                "stype": "bs",
                "fyear": 2019,
                "ptype": "Q4",
                "industryTemplate": "general",
                "values": [
                    {"tid": "1", "uid": "1", "parent_tid": "0", "standardisedName": "Total Assets", "valueCalculated": 300, "checkPossible": true}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(snapshot.statement_type, Some(StatementType::BalanceSheet));
        assert_eq!(snapshot.fiscal_year, Some(2019));
        assert_eq!(snapshot.period, Some(Period::Q4));
        assert_eq!(snapshot.industry_template.as_deref(), Some("general"));
        assert!(snapshot.values[0].check_possible);

        let records = parse_records(&serde_json::to_string(&snapshot).unwrap()).unwrap();
        assert_eq!(records, snapshot.values);
    }

    #[test]
    fn test_parse_snapshot_list() {
        let snapshots = parse_snapshots(r#"[{"values": []}, {"stype": "pl", "values": []}]"#).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].statement_type, Some(StatementType::ProfitLoss));
    }

    #[test]
    fn test_unexpected_payload_is_rejected() {
        assert!(matches!(
            parse_records("42"),
            Err(ResolverError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_records(r#"{"error": "invalid api key"}"#),
            Err(ResolverError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse_records("not json"),
            Err(ResolverError::SerializationError(_))
        ));
    }

    #[test]
    fn test_parse_payload_keeps_envelope_metadata() {
        let snapshot = parse_payload(r#"{"stype": "cf", "fyear": 2018, "values": []}"#).unwrap();
        assert_eq!(snapshot.statement_type, Some(StatementType::CashFlow));
        assert_eq!(snapshot.fiscal_year, Some(2018));

        let snapshot = parse_payload(r#"[{"tid": "1", "valueAssigned": 3}]"#).unwrap();
        assert_eq!(snapshot.label(), "statement");
        assert_eq!(snapshot.values[0].value_assigned, 3);
    }

    #[test]
    fn test_parse_payload_surfaces_record_errors() {
        let envelope = r#"{"stype": "pl", "values": [{"tid": "1", "valueAssigned": 10.5}]}"#;
        assert!(matches!(
            parse_payload(envelope),
            Err(ResolverError::SerializationError(_))
        ));
        assert!(matches!(
            parse_payload(r#"[{"tid": null}]"#),
            Err(ResolverError::SerializationError(_))
        ));
    }

    #[test]
    fn test_catalogue_years_and_range() {
        let available = AvailableStatements::from_json(CATALOGUE).unwrap();
        assert_eq!(available.statements.len(), 2);
        assert_eq!(
            available.fiscal_years(StatementType::BalanceSheet),
            vec![2017, 2018, 2019, 2020]
        );
        assert_eq!(
            available.periods(StatementType::BalanceSheet, 2020),
            vec![Period::Q1, Period::Q2]
        );
        assert_eq!(available.year_range(), Some((2017, 2020)));
        assert!(AvailableStatements::default().year_range().is_none());
    }

    #[test]
    fn test_latest_complete_years_skips_incomplete_year() {
        let available = AvailableStatements::from_json(CATALOGUE).unwrap();
        assert_eq!(available.latest_complete_years(2), vec![2018, 2019]);
        assert_eq!(available.latest_complete_years(10), vec![2017, 2018, 2019]);
        assert!(available.latest_complete_years(0).is_empty());
    }

    #[test]
    fn test_no_complete_year() {
        let available =
            AvailableStatements::from_json(r#"{"bs": [{"period": "Q1", "fyear": 2020}]}"#).unwrap();
        assert!(available.latest_complete_years(5).is_empty());
        assert!(available.annual_requests(5).is_empty());
    }

    #[test]
    fn test_annual_requests_use_statement_periods() {
        let available = AvailableStatements::from_json(CATALOGUE).unwrap();
        let requests = available.annual_requests(1);
        assert_eq!(
            requests,
            vec![
                StatementRequest {
                    statement_type: StatementType::ProfitLoss,
                    fiscal_year: 2019,
                    period: Period::FullYear,
                },
                StatementRequest {
                    statement_type: StatementType::BalanceSheet,
                    fiscal_year: 2019,
                    period: Period::Q4,
                },
            ]
        );
    }
}
