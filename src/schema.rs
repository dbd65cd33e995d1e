use crate::utils::{
    deserialize_amount, deserialize_flag, deserialize_parent_tid, deserialize_text, deserialize_tid,
    deserialize_uid, is_null_id, NULL_ID,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn null_id() -> String {
    NULL_ID.to_string()
}

/// One standardised line item exactly as the data API returns it.
///
/// Any `valueChosen` field present in the payload is ignored; the chosen value
/// is always derived by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(deserialize_with = "deserialize_tid")]
    #[schemars(with = "String")]
    #[schemars(
        description = "Opaque line-item identifier, unique within one statement snapshot. Must not be null or empty."
    )]
    pub tid: String,

    #[serde(
        rename = "parent_tid",
        default = "null_id",
        deserialize_with = "deserialize_parent_tid"
    )]
    #[schemars(with = "String")]
    #[schemars(
        description = "tid of the total this line item rolls up into. \"0\" marks a top-level line item."
    )]
    pub parent_tid: String,

    #[serde(default, deserialize_with = "deserialize_uid")]
    #[schemars(with = "String")]
    #[schemars(
        description = "Expected to equal tid. Missing, null or empty counts as applicable; only \"0\" marks a line item that does not apply to the reporting entity's template."
    )]
    pub uid: String,

    #[serde(default, deserialize_with = "deserialize_text")]
    #[schemars(with = "String")]
    #[schemars(description = "Human-readable label, e.g. 'Total Current Assets'.")]
    pub standardised_name: String,

    #[serde(default, deserialize_with = "deserialize_text")]
    #[schemars(with = "String")]
    #[schemars(
        description = "Declared indentation depth. Checked against the depth derived from parent links, never trusted."
    )]
    pub display_level: String,

    #[serde(default, deserialize_with = "deserialize_amount")]
    #[schemars(with = "i64")]
    #[schemars(description = "Value as reported in the filing, in whole currency units.")]
    pub value_assigned: i64,

    #[serde(default, deserialize_with = "deserialize_amount")]
    #[schemars(with = "i64")]
    #[schemars(
        description = "Value obtained by summing applicable children. 0 when the line item is not a calculated total."
    )]
    pub value_calculated: i64,

    #[serde(default, deserialize_with = "deserialize_flag")]
    #[schemars(with = "bool")]
    #[schemars(description = "Whether the line item is a total that can be checked against its children.")]
    pub check_possible: bool,
}

impl RawRecord {
    #[must_use]
    pub fn new(
        tid: impl Into<String>,
        parent_tid: impl Into<String>,
        standardised_name: impl Into<String>,
    ) -> Self {
        let tid = tid.into();
        Self {
            uid: tid.clone(),
            tid,
            parent_tid: parent_tid.into(),
            standardised_name: standardised_name.into(),
            display_level: String::new(),
            value_assigned: 0,
            value_calculated: 0,
            check_possible: false,
        }
    }

    #[must_use]
    pub fn with_values(mut self, value_assigned: i64, value_calculated: i64) -> Self {
        self.value_assigned = value_assigned;
        self.value_calculated = value_calculated;
        self
    }

    #[must_use]
    pub fn with_check_possible(mut self, check_possible: bool) -> Self {
        self.check_possible = check_possible;
        self
    }

    #[must_use]
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    #[must_use]
    pub fn with_display_level(mut self, display_level: impl Into<String>) -> Self {
        self.display_level = display_level.into();
        self
    }

    pub fn is_root(&self) -> bool {
        is_null_id(&self.parent_tid)
    }

    /// A missing uid counts as applicable; only an explicit "0" marks the line item as not applicable.
    pub fn is_inapplicable(&self) -> bool {
        is_null_id(&self.uid)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
pub enum StatementType {
    #[serde(rename = "pl")]
    #[schemars(description = "Profit & loss (income statement). Covers a period.")]
    ProfitLoss,

    #[serde(rename = "bs")]
    #[schemars(description = "Balance sheet. A point-in-time snapshot.")]
    BalanceSheet,

    #[serde(rename = "cf")]
    #[schemars(description = "Cash flow statement. Covers a period.")]
    CashFlow,
}

impl StatementType {
    pub fn code(&self) -> &'static str {
        match self {
            StatementType::ProfitLoss => "pl",
            StatementType::BalanceSheet => "bs",
            StatementType::CashFlow => "cf",
        }
    }

    /// The reporting period that represents a whole fiscal year for this statement.
    /// Balance sheets are snapshots, so the year-end view is the Q4 balance.
    pub fn annual_period(&self) -> Period {
        match self {
            StatementType::BalanceSheet => Period::Q4,
            StatementType::ProfitLoss | StatementType::CashFlow => Period::FullYear,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
pub enum Period {
    Q1,
    Q2,
    Q3,
    Q4,
    H1,
    H2,
    #[serde(rename = "9M")]
    NineMonths,
    #[serde(rename = "FY")]
    FullYear,
    #[serde(rename = "TTM")]
    TrailingTwelveMonths,
}

/// One statement for one reporting period, as returned by the statement endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatementSnapshot {
    #[serde(rename = "stype", default)]
    pub statement_type: Option<StatementType>,

    #[serde(rename = "fyear", default)]
    pub fiscal_year: Option<i32>,

    #[serde(rename = "ptype", default)]
    pub period: Option<Period>,

    #[serde(rename = "industryTemplate", default)]
    #[schemars(description = "Industry template the standardised line items were mapped onto.")]
    pub industry_template: Option<String>,

    #[schemars(description = "The flat list of standardised line items.")]
    pub values: Vec<RawRecord>,
}

impl StatementSnapshot {
    pub fn new(values: Vec<RawRecord>) -> Self {
        Self {
            statement_type: None,
            fiscal_year: None,
            period: None,
            industry_template: None,
            values,
        }
    }

    /// Short label such as `bs 2019 Q4`, used in log lines and report titles.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        if let Some(statement_type) = &self.statement_type {
            parts.push(statement_type.code().to_string());
        }
        if let Some(year) = self.fiscal_year {
            parts.push(year.to_string());
        }
        if let Some(period) = self.period {
            if let Ok(serde_json::Value::String(code)) = serde_json::to_value(period) {
                parts.push(code);
            }
        }
        if parts.is_empty() {
            "statement".to_string()
        } else {
            parts.join(" ")
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(StatementSnapshot)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = StatementSnapshot::schema_as_json().unwrap();
        assert!(schema_json.contains("parent_tid"));
        assert!(schema_json.contains("valueCalculated"));
        assert!(schema_json.contains("checkPossible"));
    }

    #[test]
    fn test_record_deserialization_with_loose_types() {
        let json = r#"{
            "tid": 10,
            "uid": "10",
            "parent_tid": "1",
            "standardisedName": "Cash & Cash Equivalents",
            "displayLevel": "1",
            "checkPossible": false,
            "valueAssigned": "1500",
            "valueCalculated": null,
            "valueChosen": 1500
        }"#;

        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.tid, "10");
        assert_eq!(record.parent_tid, "1");
        assert_eq!(record.display_level, "1");
        assert_eq!(record.value_assigned, 1500);
        assert_eq!(record.value_calculated, 0);
        assert!(!record.check_possible);
        assert!(!record.is_root());
        assert!(!record.is_inapplicable());
    }

    #[test]
    fn test_missing_parent_defaults_to_root() {
        let record: RawRecord = serde_json::from_str(r#"{"tid": "1"}"#).unwrap();
        assert_eq!(record.parent_tid, "0");
        assert!(record.is_root());
        assert!(!record.is_inapplicable());
    }

    #[test]
    fn test_only_explicit_zero_uid_is_inapplicable() {
        let missing: RawRecord = serde_json::from_str(r#"{"tid": "3"}"#).unwrap();
        let null: RawRecord = serde_json::from_str(r#"{"tid": "3", "uid": null}"#).unwrap();
        let empty: RawRecord = serde_json::from_str(r#"{"tid": "3", "uid": ""}"#).unwrap();
        for record in [&missing, &null, &empty] {
            assert_eq!(record.uid, "");
            assert!(!record.is_inapplicable());
        }

        let zero: RawRecord = serde_json::from_str(r#"{"tid": "3", "uid": 0}"#).unwrap();
        assert!(zero.is_inapplicable());
    }

    #[test]
    fn test_null_or_empty_tid_is_rejected() {
        for json in [r#"{"tid": null}"#, r#"{"tid": ""}"#, r#"{"parent_tid": "1"}"#] {
            assert!(serde_json::from_str::<RawRecord>(json).is_err(), "{}", json);
        }
    }

    #[test]
    fn test_fractional_value_is_rejected() {
        let result: Result<RawRecord, _> =
            serde_json::from_str(r#"{"tid": "1", "valueAssigned": 10.5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_uses_api_field_names() {
        let record = RawRecord::new("2", "1", "Receivables")
            .with_values(100, 0)
            .with_display_level("1");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"parent_tid\":\"1\""));
        assert!(json.contains("\"standardisedName\":\"Receivables\""));
        assert!(json.contains("\"valueAssigned\":100"));

        let back: RawRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_annual_period_and_label() {
        assert_eq!(StatementType::BalanceSheet.annual_period(), Period::Q4);
        assert_eq!(StatementType::ProfitLoss.annual_period(), Period::FullYear);

        let mut snapshot = StatementSnapshot::new(vec![]);
        assert_eq!(snapshot.label(), "statement");
        snapshot.statement_type = Some(StatementType::BalanceSheet);
        snapshot.fiscal_year = Some(2019);
        snapshot.period = Some(Period::Q4);
        assert_eq!(snapshot.label(), "bs 2019 Q4");
    }
}
