//! Rule-file listing and viewing against a temporary rules directory.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use octavi_manager::udev::{list_rule_files, read_rule_file, UdevError, RULE_LINE};

#[test]
fn listing_filters_by_substring() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("99-octavi.rules"), RULE_LINE).expect("write rule");
    fs::write(dir.path().join("50-other.rules"), "# unrelated\n").expect("write rule");

    let rules = list_rule_files(dir.path(), "octavi").expect("listing should succeed");
    assert_eq!(rules, vec!["99-octavi.rules".to_owned()]);
}

#[test]
fn listing_matches_case_insensitively() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("10-OCTAVI-alt.rules"), "# alt\n").expect("write rule");

    let rules = list_rule_files(dir.path(), "octavi").expect("listing should succeed");
    assert_eq!(rules, vec!["10-OCTAVI-alt.rules".to_owned()]);
}

#[test]
fn empty_directory_lists_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let rules = list_rule_files(dir.path(), "octavi").expect("listing should succeed");
    assert!(rules.is_empty());
}

#[test]
fn missing_directory_is_reported() {
    let result = list_rule_files(Path::new("/nonexistent/rules.d"), "octavi");
    assert!(matches!(result, Err(UdevError::MissingDirectory(_))));
}

#[test]
fn read_rule_file_returns_contents() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("99-octavi.rules"), RULE_LINE).expect("write rule");

    let contents = read_rule_file(dir.path(), "99-octavi.rules").expect("read should succeed");
    assert_eq!(contents, RULE_LINE);
}

#[test]
fn read_missing_rule_file_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let result = read_rule_file(dir.path(), "99-octavi.rules");
    assert!(matches!(result, Err(UdevError::Read { .. })));
}
