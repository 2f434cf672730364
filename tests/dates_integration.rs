//! Date normalization over text files.

use norm_patcher::dates::{self, DateError, DateForm};
use norm_patcher::{Extractor, PatternLibrary, TokenCategory};
use std::fs;
use tempfile::TempDir;

const NOTES: &str = "\
Spotkanie Jan 5 2021 11:30PM w biurze.
Odbiór 12/24/2020, poprawki 05-01-2021 10:15.
Zły zapis 31-02-2021 zostaje.
";

#[test]
fn test_find_dates_in_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notatki.txt");
    fs::write(&path, NOTES).unwrap();

    let found = dates::find_in_file(&Extractor::default(), &path).unwrap();
    let raw: Vec<&str> = found.iter().map(|m| m.raw.as_str()).collect();
    assert_eq!(
        raw,
        vec![
            "Jan 5 2021 11:30PM",
            "12/24/2020",
            "05-01-2021 10:15",
            "31-02-2021"
        ]
    );

    assert_eq!(found[0].date.category(), TokenCategory::Date);
    assert_eq!(
        found[0].time.as_ref().map(|t| t.category()),
        Some(TokenCategory::Time)
    );
    assert!(found[1].time.is_none());
    assert!(found[3].value.is_none());
}

#[test]
fn test_format_file_to_stdout_and_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notatki.txt");
    let output = dir.path().join("daty.txt");
    fs::write(&input, NOTES).unwrap();

    let extractor = Extractor::default();
    let formatted = dates::format_file(&extractor, &input, None, "%Y-%m-%d").unwrap();
    assert_eq!(
        formatted,
        vec!["2021-01-05 23:30", "2020-12-24", "2021-01-05 10:15", ""]
    );
    assert!(!output.exists());

    dates::format_file(&extractor, &input, Some(&output), "%Y-%m-%d").unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "2021-01-05 23:30\n2020-12-24\n2021-01-05 10:15\n\n"
    );
}

#[test]
fn test_replace_file_normalizes_every_date() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notatki.txt");
    let output = dir.path().join("notatki_norm.txt");
    fs::write(&input, NOTES).unwrap();

    let replaced =
        dates::replace_file(&Extractor::default(), &input, &output, dates::DEFAULT_FORMAT)
            .unwrap();

    let expected = "\
Spotkanie 05-01-2021 23:30 w biurze.
Odbiór 24-12-2020, poprawki 05-01-2021 10:15.
Zły zapis 31-02-2021 zostaje.
";
    assert_eq!(replaced, expected);
    assert_eq!(fs::read_to_string(&output).unwrap(), expected);
    assert_eq!(fs::read_to_string(&input).unwrap(), NOTES);
}

#[test]
fn test_invalid_pattern_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notatki.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, NOTES).unwrap();

    let err = dates::replace_file(&Extractor::default(), &input, &output, "%Q").unwrap_err();
    assert!(matches!(err, DateError::InvalidPattern { .. }));
    assert!(!output.exists());
}

#[test]
fn test_missing_input() {
    let dir = TempDir::new().unwrap();
    let err = dates::find_in_file(&Extractor::default(), &dir.path().join("nope.txt"))
        .unwrap_err();
    assert!(matches!(err, DateError::Io { .. }));
}

#[test]
fn test_marker_does_not_affect_dates() {
    let extractor = Extractor::new(PatternLibrary::with_marker("BN").unwrap());
    let found = extractor.extract_dates("BN-1:2000 on 05-01-2021").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(
        dates::parse_date(&found[0].raw, DateForm::Dash),
        found[0].value.map(|v| v.date)
    );
}
