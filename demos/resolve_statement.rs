use statement_resolver::{
    parse_snapshot, AvailableStatements, ExportOptions, ResolverConfig, StatementResolver,
};

const CATALOGUE: &str = r#"{
    "pl": [{"period": "FY", "fyear": 2018}, {"period": "FY", "fyear": 2019}],
    "bs": [{"period": "Q4", "fyear": 2018}, {"period": "Q4", "fyear": 2019}, {"period": "Q1", "fyear": 2020}]
}"#;

const BALANCE_SHEET: &str = r#"{
    "stype": "bs",
    "fyear": 2019,
    "ptype": "Q4",
    "values": [
        {"tid": "1", "uid": "1", "parent_tid": "0", "standardisedName": "Total Assets", "displayLevel": "0", "checkPossible": true, "valueAssigned": 0, "valueCalculated": 950},
        {"tid": "2", "uid": "2", "parent_tid": "1", "standardisedName": "Cash & Cash Equivalents", "displayLevel": "1", "checkPossible": false, "valueAssigned": 400, "valueCalculated": 0},
        {"tid": "3", "uid": "3", "parent_tid": "1", "standardisedName": "Accounts Receivable", "displayLevel": "1", "checkPossible": false, "valueAssigned": 600, "valueCalculated": 0},
        {"tid": "4", "uid": "0", "parent_tid": "1", "standardisedName": "Reinsurance Assets", "displayLevel": "1", "checkPossible": false, "valueAssigned": 0, "valueCalculated": 0},
        {"tid": "5", "uid": "5", "parent_tid": "0", "standardisedName": "Total Equity", "displayLevel": "0", "checkPossible": true, "valueAssigned": 0, "valueCalculated": 0},
        {"tid": "6", "uid": "6", "parent_tid": "5", "standardisedName": "Share Capital", "displayLevel": "1", "checkPossible": false, "valueAssigned": 1000, "valueCalculated": 0}
    ]
}"#;

fn main() {
    let available = AvailableStatements::from_json(CATALOGUE).expect("catalogue should parse");
    println!("Statements to fetch for the last two complete years:");
    for request in available.annual_requests(2) {
        println!(
            "  {} {} {:?}",
            request.statement_type.code(),
            request.fiscal_year,
            request.period
        );
    }

    let snapshot = parse_snapshot(BALANCE_SHEET).expect("snapshot should parse");
    let resolver = StatementResolver::new(ResolverConfig::default()).expect("default config is valid");
    let report = resolver
        .resolve_snapshot(&snapshot)
        .expect("snapshot should resolve");

    println!("\n{}", report.to_markdown());

    println!("All rows, including inapplicable and suspect line items:");
    for row in report.rows_with(&ExportOptions::everything()) {
        println!(
            "{}{} = {}{}{}",
            "  ".repeat(row.depth as usize),
            row.standardised_name,
            row.value_chosen,
            if row.inapplicable { " [n/a]" } else { "" },
            if row.suspect { " [suspect]" } else { "" }
        );
    }
}
