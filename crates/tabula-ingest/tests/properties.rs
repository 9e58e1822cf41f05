use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tabula_columnar::{ColumnType, Table, Value};
use tabula_ingest::{
    buffer_delimited, infer_column_type, read_delimited, resolve_schema, write_delimited,
    ColumnTypeSpec, DelimitedOptions, ParseOptions, TypeHint, WriteOptions,
};

fn infer(tokens: &[&str]) -> ColumnType {
    let options = ParseOptions::default();
    infer_column_type(tokens.iter().copied(), options.max_peek, &options)
}

#[test]
fn inference_widens_monotonically() {
    assert_eq!(infer(&["1", "2", "3.5"]), ColumnType::Double);
    assert_eq!(infer(&["1", "2", "3"]), ColumnType::Int);
    assert_eq!(infer(&["true", "false"]), ColumnType::Boolean);
    assert_eq!(infer(&["1", "NA", "2"]), ColumnType::Int);
    assert_eq!(infer(&["1", "5000000000"]), ColumnType::Long);
    assert_eq!(infer(&["true", "1"]), ColumnType::String);
    assert_eq!(infer(&["NA", ""]), ColumnType::String);
}

#[test]
fn missing_slot_survives_inference() {
    let table = read_delimited(&b"n\n1\nNA\n2\n"[..], &DelimitedOptions::default()).unwrap();
    let column = table.column("n").unwrap();
    assert_eq!(column.column_type(), ColumnType::Int);
    assert_eq!(column.na_count(), 1);
    assert!(column.is_na(1));
}

#[test]
fn non_finite_doubles_survive_a_round_trip() {
    let table = Table::from_rows(
        vec!["d"],
        vec![
            vec![Value::Double(f64::NAN)],
            vec![Value::Double(f64::INFINITY)],
            vec![Value::Double(f64::NEG_INFINITY)],
            vec![Value::Double(1.5)],
        ],
    )
    .unwrap();
    let mut buf = Vec::new();
    write_delimited(&table, &mut buf, &WriteOptions::default()).unwrap();
    assert_eq!(String::from_utf8(buf.clone()).unwrap(), "d\nNaN\ninf\n-inf\n1.5\n");

    let declared = DelimitedOptions {
        column_types: Some(ColumnTypeSpec::compact("d").unwrap()),
        ..DelimitedOptions::default()
    };
    assert_eq!(read_delimited(buf.as_slice(), &declared).unwrap(), table);

    let inferred = read_delimited(buf.as_slice(), &DelimitedOptions::default()).unwrap();
    assert_eq!(inferred.column("d").unwrap().column_type(), ColumnType::String);
}

#[test]
fn empty_na_token_round_trips_a_single_column() {
    let table = Table::from_rows(
        vec!["n"],
        vec![
            vec![Value::Na],
            vec![Value::Int(1)],
            vec![Value::Na],
            vec![Value::Int(2)],
            vec![Value::Na],
        ],
    )
    .unwrap();
    let options = WriteOptions {
        na_string: String::new(),
        ..WriteOptions::default()
    };
    let mut buf = Vec::new();
    write_delimited(&table, &mut buf, &options).unwrap();
    assert_eq!(String::from_utf8(buf.clone()).unwrap(), "n\n\"\"\n1\n\"\"\n2\n\"\"\n");

    let back = read_delimited(buf.as_slice(), &DelimitedOptions::default()).unwrap();
    assert_eq!(back, table);

    // The same column typed by hand, with bare empty lines.
    let by_hand = read_delimited(&b"n\n\n1\n\n2\n\n"[..], &DelimitedOptions::default()).unwrap();
    assert_eq!(by_hand, table);
}

#[test]
fn schema_resolution_is_idempotent() {
    let raw = buffer_delimited(
        &b"id,when,score,label\n1,2024-01-02,0.5,a\n2,2024-01-03 10:30,NA,b\n"[..],
        &DelimitedOptions::default(),
    )
    .unwrap();
    let spec = ColumnTypeSpec::from_map([
        ("label", TypeHint::Declared(ColumnType::String)),
        (".default", TypeHint::Infer),
    ]);
    let options = ParseOptions::default();

    let first = resolve_schema(raw.names(), Some(&spec), &raw, &options).unwrap();
    let second = resolve_schema(raw.names(), Some(&spec), &raw, &options).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.iter().map(|c| c.column_type).collect::<Vec<_>>(),
        vec![
            ColumnType::Int,
            ColumnType::DateTime,
            ColumnType::Double,
            ColumnType::String
        ]
    );
}

fn row_strategy() -> impl Strategy<Value = Vec<Value>> {
    (
        "[a-z][a-z ,\"]{0,8}[a-z]",
        any::<i32>(),
        any::<i64>(),
        prop_oneof![
            8 => -1.0e12f64..1.0e12,
            1 => Just(f64::NAN),
            1 => Just(f64::INFINITY),
            1 => Just(f64::NEG_INFINITY),
        ],
        any::<bool>(),
    )
        .prop_map(|(s, i, l, d, b)| {
            vec![
                Value::from(s),
                Value::Int(i),
                Value::Long(l),
                Value::Double(d),
                Value::Boolean(b),
            ]
        })
}

proptest! {
    #[test]
    fn written_tables_read_back_identically(rows in prop::collection::vec(row_strategy(), 1..20)) {
        let table = Table::from_rows(vec!["s", "i", "l", "d", "b"], rows).unwrap();
        let mut buf = Vec::new();
        write_delimited(&table, &mut buf, &WriteOptions::default()).unwrap();

        let options = DelimitedOptions {
            column_types: Some(ColumnTypeSpec::compact("sildb").unwrap()),
            ..DelimitedOptions::default()
        };
        let back = read_delimited(buf.as_slice(), &options).unwrap();
        prop_assert_eq!(back.schema(), table.schema());
        prop_assert_eq!(back, table);
    }

    #[test]
    fn every_cell_is_na_or_the_column_type(
        tokens in prop::collection::vec(
            prop::sample::select(vec!["1", "-7", "2.5", "true", "NA", "", "x", "2024-05-01"]),
            1..30,
        )
    ) {
        let mut text = String::from("v\n");
        for token in &tokens {
            text.push_str(token);
            text.push('\n');
        }
        let table = read_delimited(text.as_bytes(), &DelimitedOptions::default()).unwrap();
        let column = table.column("v").unwrap();
        for value in column.iter() {
            prop_assert!(value.is_na() || value.column_type() == Some(column.column_type()));
        }
    }
}
