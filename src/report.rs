use crate::config::ExportOptions;
use crate::tree::{DroppedRecord, Forest, ResolutionWarning, ResolvedNode};
use crate::validator::Discrepancy;
use serde::{Deserialize, Serialize};

/// One line of the flattened, display-ordered statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub tid: String,
    pub standardised_name: String,
    pub value_chosen: i64,
    pub depth: u32,
    pub inapplicable: bool,
    pub suspect: bool,
}

impl From<&ResolvedNode> for ReportRow {
    fn from(node: &ResolvedNode) -> Self {
        Self {
            tid: node.tid.clone(),
            standardised_name: node.standardised_name.clone(),
            value_chosen: node.value_chosen,
            depth: node.depth,
            inapplicable: node.inapplicable,
            suspect: node.suspect,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ReportExport<'a> {
    title: &'a str,
    rows: Vec<ReportRow>,
    discrepancies: &'a [Discrepancy],
    warnings: &'a [ResolutionWarning],
    dropped: &'a [DroppedRecord],
}

/// The resolved statement: the forest plus everything the validator and builder found.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedReport {
    pub title: String,
    pub forest: Forest,
    pub discrepancies: Vec<Discrepancy>,
    /// Row filter used by the export helpers.
    pub export: ExportOptions,
}

impl ResolvedReport {
    pub fn new(
        title: impl Into<String>,
        forest: Forest,
        discrepancies: Vec<Discrepancy>,
        export: ExportOptions,
    ) -> Self {
        Self {
            title: title.into(),
            forest,
            discrepancies,
            export,
        }
    }

    pub fn get(&self, tid: &str) -> Option<&ResolvedNode> {
        self.forest.get(tid)
    }

    pub fn value_of(&self, tid: &str) -> Option<i64> {
        self.forest.get(tid).map(|n| n.value_chosen)
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        self.forest.warnings()
    }

    pub fn dropped(&self) -> &[DroppedRecord] {
        self.forest.dropped()
    }

    pub fn has_issues(&self) -> bool {
        !self.discrepancies.is_empty()
            || !self.forest.warnings().is_empty()
            || !self.forest.dropped().is_empty()
    }

    /// Display-ordered rows. Excluding a node drops only its own row; its
    /// descendants keep theirs.
    pub fn rows_with(&self, options: &ExportOptions) -> Vec<ReportRow> {
        self.forest
            .pre_order()
            .into_iter()
            .filter(|node| options.include_inapplicable || !node.inapplicable)
            .filter(|node| options.include_suspect || !node.suspect)
            .map(ReportRow::from)
            .collect()
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        self.rows_with(&self.export)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let export = ReportExport {
            title: &self.title,
            rows: self.rows(),
            discrepancies: &self.discrepancies,
            warnings: self.forest.warnings(),
            dropped: self.forest.dropped(),
        };
        serde_json::to_string_pretty(&export)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("tid,standardised_name,value_chosen,depth,inapplicable,suspect\n");

        for row in self.rows() {
            output.push_str(&format!(
                "{},{},{},{},{},{}\n",
                csv_field(&row.tid),
                csv_field(&row.standardised_name),
                row.value_chosen,
                row.depth,
                row.inapplicable,
                row.suspect
            ));
        }

        output
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str("| Line Item | Value |\n");
        output.push_str("|---|---:|\n");

        for row in self.rows() {
            let indent = "&nbsp;&nbsp;".repeat(row.depth as usize);
            let marker = if row.suspect {
                " ⚠️ **[SUSPECT]**"
            } else if row.inapplicable {
                " *(n/a)*"
            } else {
                ""
            };
            output.push_str(&format!(
                "| {}{}{} | {} |\n",
                indent,
                row.standardised_name.replace('|', "\\|"),
                marker,
                row.value_chosen
            ));
        }
        output.push('\n');

        if !self.discrepancies.is_empty() {
            output.push_str("## Discrepancies\n\n");
            for discrepancy in &self.discrepancies {
                output.push_str(&format!("- {}\n", discrepancy));
            }
            output.push('\n');
        }

        if !self.forest.warnings().is_empty() {
            output.push_str("## Warnings\n\n");
            for warning in self.forest.warnings() {
                output.push_str(&format!("- {}\n", warning));
            }
            output.push('\n');
        }

        if !self.forest.dropped().is_empty() {
            output.push_str("## Dropped Line Items\n\n");
            for dropped in self.forest.dropped() {
                output.push_str(&format!(
                    "- {} (parent '{}' of '{}' is missing)\n",
                    dropped.tid, dropped.missing_parent, dropped.subtree_root
                ));
            }
            output.push('\n');
        }

        output
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
