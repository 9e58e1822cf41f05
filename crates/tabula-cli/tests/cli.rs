use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use assert_cmd::Command as CargoCommand;
use pretty_assertions::assert_eq;

const CARS: &str = "model,mpg,cyl,automatic\nFiat 128,32.4,4,false\nValiant,NA,6,true\nCamaro Z28,13.3,8,NA\n";

fn tabula() -> CargoCommand {
    CargoCommand::new(assert_cmd::cargo::cargo_bin!("tabula"))
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

#[test]
fn schema_reports_resolved_types_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "cars.csv", CARS);

    let output = tabula()
        .arg("schema")
        .arg(&input)
        .arg("--json")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["rows"], 3);
    let columns: Vec<(String, String, u64)> = report["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            (
                c["name"].as_str().unwrap().to_owned(),
                c["type"].as_str().unwrap().to_owned(),
                c["missing"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        columns,
        vec![
            ("model".to_owned(), "string".to_owned(), 0),
            ("mpg".to_owned(), "double".to_owned(), 1),
            ("cyl".to_owned(), "int".to_owned(), 0),
            ("automatic".to_owned(), "boolean".to_owned(), 1),
        ]
    );
}

#[test]
fn declared_types_override_inference() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "cars.csv", CARS);

    let output = tabula()
        .args(["schema", "--types", "cyl=d,.default=s"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8(output.stdout).unwrap();
    assert!(text.starts_with("3 rows\n"), "{text}");
    assert!(text.contains("cyl        Double"), "{text}");
    assert!(text.contains("mpg        String"), "{text}");
}

#[test]
fn head_limits_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "cars.csv", CARS);

    tabula()
        .args(["head", "-n", "1"])
        .arg(&input)
        .assert()
        .success()
        .stdout("model,mpg,cyl,automatic\nFiat 128,32.4,4,false\n");
}

#[test]
fn convert_fixed_width_to_tsv() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        dir.path(),
        "rates.txt",
        "Nissan    4.5  \nFord          6\n",
    );
    let output = dir.path().join("rates.tsv");

    tabula()
        .args(["convert", "--widths", "make:10,rate:5", "--delimiter", "\t"])
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "make\trate\nNissan\t4.5\nFord\t6.0\n"
    );
}

#[test]
fn convert_json_groups() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(
        dir.path(),
        "cars.json",
        r#"{"fleet": {"Nissan": [{"model": "Sentra"}], "Ford": [{"model": "Focus", "doors": 5}]}}"#,
    );

    tabula()
        .args(["convert", "--json-path", "fleet", "--output-na", ""])
        .arg(&input)
        .assert()
        .success()
        .stdout("_id,model,doors\nNissan,Sentra,\nFord,Focus,5\n");
}

#[test]
fn coercion_failures_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = write(dir.path(), "bad.csv", "n\n1\nx\n");

    let output = tabula()
        .args(["schema", "--types", "i"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot coerce `x` to Int"), "{stderr}");

    tabula()
        .args(["schema", "--types", "i", "--lenient"])
        .arg(&input)
        .assert()
        .success();
}

#[test]
fn cli_does_not_panic_on_broken_pipe() {
    let dir = tempfile::tempdir().unwrap();
    let mut rows = String::from("n\n");
    for i in 0..50_000 {
        rows.push_str(&format!("{i}\n"));
    }
    let input = write(dir.path(), "many.csv", &rows);

    let mut child = Command::new(assert_cmd::cargo::cargo_bin!("tabula"))
        .arg("convert")
        .arg(&input)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tabula");

    // Closing the read end forces stdout writes to return EPIPE / BrokenPipe.
    drop(child.stdout.take());

    let output = child.wait_with_output().expect("wait for tabula");
    assert!(
        output.status.success(),
        "expected success even when stdout is closed\nstderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
}
