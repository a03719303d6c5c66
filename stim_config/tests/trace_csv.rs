use std::fs::File;
use std::io::Write;

use rstest::rstest;
use stim_config::{TraceRow, load_trace_csv};
use tempfile::tempdir;

fn write_csv(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    (dir, path)
}

#[test]
fn loads_rows_in_order() {
    let (_dir, path) = write_csv("t,x,y\n0.0,0.0,0.0\n1.5,10.0,-2.0\n");
    let rows = load_trace_csv(&path).unwrap();
    assert_eq!(
        rows,
        vec![
            TraceRow {
                t: 0.0,
                x: 0.0,
                y: 0.0
            },
            TraceRow {
                t: 1.5,
                x: 10.0,
                y: -2.0
            },
        ]
    );
}

#[rstest]
#[case("x,t,y\n0,0,0\n", "headers 't,x,y'")]
#[case("t,x,y\n", "has no rows")]
#[case("t,x,y\n0,0,0\n0,1,1\n", "strictly increasing")]
#[case("t,x,y\n0,0,0\n1,abc,1\n", "invalid CSV row 3")]
#[case("t,x,y\n0,NaN,0\n", "non-finite")]
fn rejects_malformed_traces(#[case] body: &str, #[case] expected: &str) {
    let (_dir, path) = write_csv(body);
    let err = load_trace_csv(&path).unwrap_err();
    assert!(
        err.to_string().contains(expected),
        "got {err}, expected {expected}"
    );
}

#[test]
fn missing_file_names_the_path() {
    let err = load_trace_csv(std::path::Path::new("/nonexistent/trace.csv")).unwrap_err();
    assert!(err.to_string().contains("open trace CSV"));
}
