use brokerage_pipeline::ingestion::csv::{ingest_csv_from_reader, ingest_csv_from_str};
use brokerage_pipeline::types::{DataType, Value};
use brokerage_pipeline::IngestionError;

fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}

#[test]
fn ingest_opportunities_fixture_infers_types() {
    let ds = ingest_csv_from_str(&fixture("opportunities.csv")).unwrap();

    assert_eq!(ds.row_count(), 5);
    assert_eq!(
        ds.schema.field_names().collect::<Vec<_>>(),
        vec![
            "opportunity_id",
            "client_id",
            "created_at",
            "project_type",
            "loan_amount",
            "property_value",
            "city",
            "is_first_purchase",
        ]
    );
    let types: Vec<DataType> = ds.schema.fields.iter().map(|f| f.data_type).collect();
    assert_eq!(
        types,
        vec![
            DataType::Utf8,
            DataType::Utf8,
            DataType::Utf8,
            DataType::Utf8,
            DataType::Float64,
            DataType::Int64,
            DataType::Utf8,
            DataType::Bool,
        ]
    );
    assert_eq!(ds.rows[1][4], Value::Float64(180000.5));
    assert_eq!(ds.rows[1][5], Value::Null);
    assert_eq!(ds.rows[2][7], Value::Null);
    assert!(ds.rows.iter().all(|r| r.len() == ds.column_count()));
}

#[test]
fn ingest_propositions_fixture() {
    let ds = ingest_csv_from_str(&fixture("propositions.csv")).unwrap();
    assert_eq!(ds.row_count(), 3);
    assert_eq!(ds.column_count(), 6);
    let duration = ds.schema.index_of("duration_months").unwrap();
    assert_eq!(ds.schema.fields[duration].data_type, DataType::Int64);
    assert_eq!(ds.rows[2][duration], Value::Null);
    assert_eq!(ds.rows[0][2], Value::Utf8("Banque A".to_string()));
}

#[test]
fn ingest_from_existing_reader() {
    let input = "id,name\n1,Ada\n2,Grace\n";
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input.as_bytes());

    let ds = ingest_csv_from_reader(&mut rdr).unwrap();
    assert_eq!(ds.row_count(), 2);
    assert_eq!(ds.rows[1], vec![Value::Int64(2), Value::Utf8("Grace".to_string())]);
}

#[test]
fn header_only_input_is_an_empty_dataset() {
    let ds = ingest_csv_from_str("a,b,c\n").unwrap();
    assert_eq!(ds.row_count(), 0);
    assert_eq!(ds.column_count(), 3);
}

#[test]
fn ingest_csv_errors_on_inconsistent_column_count() {
    let err = ingest_csv_from_str("id,name,score\n1,Ada,98.5\n2,Grace\n").unwrap_err();
    assert!(matches!(err, IngestionError::Csv(_)));
    assert!(err.to_string().contains("csv error"));
}

#[test]
fn ingest_csv_errors_on_duplicate_header() {
    let err = ingest_csv_from_str("id,name,id\n1,Ada,2\n").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("schema mismatch"));
    assert!(msg.contains("duplicate column 'id'"));
}

#[test]
fn ingest_csv_errors_on_empty_input() {
    let err = ingest_csv_from_str("").unwrap_err();
    assert!(err.to_string().contains("no header row"));
}

#[test]
fn ingest_csv_errors_on_blank_header() {
    let err = ingest_csv_from_str("id,,name\n1,2,3\n").unwrap_err();
    assert!(err.to_string().contains("header column 2 is blank"));
}
