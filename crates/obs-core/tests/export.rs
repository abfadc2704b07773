mod common;

use std::fs;

use obs_core::export::{write_csv, write_parquet};
use obs_parser::{FormatParser, NoaaTideParser, ParseOptions};

use common::fixture;

#[test]
fn csv_export_writes_iso_timestamps_and_empty_nulls() {
    let content = String::from_utf8(fixture("noaa_water_level.csv")).unwrap();
    let table = NoaaTideParser::default()
        .parse(&content, &ParseOptions::default())
        .expect("parse failed");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tides.csv");
    write_csv(&table, &path).expect("csv export failed");

    let written = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "time,water_level,sigma,flag_i,flag_l");
    assert!(lines[1].starts_with("2021-01-01T00:00:00Z,1.402"));
    assert_eq!(lines[3], "2021-01-01T02:00:00Z,,,1,0");
    assert_eq!(lines.len(), 4);
}

#[test]
fn parquet_export_creates_a_file() {
    let content = String::from_utf8(fixture("noaa_water_level.csv")).unwrap();
    let table = NoaaTideParser::default()
        .parse(&content, &ParseOptions::default())
        .expect("parse failed");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tides.parquet");
    write_parquet(&table, &path).expect("parquet export failed");
    assert!(fs::metadata(&path).unwrap().len() > 0);
}
