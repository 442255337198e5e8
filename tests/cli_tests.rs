//! Tests for the `catdiff` command-line wrapper.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn catdiff(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_catdiff"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run catdiff")
}

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.display().to_string()
}

/// Test that HTML goes to the output file and the metric to stdout.
#[test]
fn test_html_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let previous = write(dir.path(), "old.txt", "a\nb\nc");
    let current = write(dir.path(), "new.txt", "a\nx\nc");
    let output = dir.path().join("diff.html");

    let result = catdiff(&[&previous, &current, "-o", output.to_str().unwrap()]);
    assert!(result.status.success());
    assert_eq!(
        String::from_utf8_lossy(&result.stdout).trim(),
        "Code Difference: 20.0%"
    );

    let html = fs::read_to_string(&output).unwrap();
    assert!(html.contains("<div class=\"legend\">"));
    assert!(html.contains(">Previous Code</th>"));
    assert!(html.contains(">Current Code</th>"));
}

/// Test that without --output the fragment goes to stdout and the metric
/// to stderr.
#[test]
fn test_html_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let previous = write(dir.path(), "old.txt", "same\n");
    let current = write(dir.path(), "new.txt", "same\n");

    let result = catdiff(&[&previous, &current]);
    assert!(result.status.success());
    assert!(String::from_utf8_lossy(&result.stdout).contains("No Differences Found"));
    assert!(String::from_utf8_lossy(&result.stderr).contains("Code Difference: 0.0%"));
}

/// Test the plain terminal format.
#[test]
fn test_terminal_format() {
    let dir = tempfile::tempdir().unwrap();
    let previous = write(dir.path(), "old.txt", "one\ntwo\n");
    let current = write(dir.path(), "new.txt", "one\ntwo\nthree\n");

    let result = catdiff(&[&previous, &current, "--format", "terminal", "--no-color"]);
    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("@@ -1 +1 @@"));
    assert!(stdout.contains("3 + three"));
    assert!(!stdout.contains('\u{1b}'));
}

/// Test that invalid flag combinations fail with a message.
#[test]
fn test_invalid_combinations() {
    let dir = tempfile::tempdir().unwrap();
    let previous = write(dir.path(), "old.txt", "a");

    let both_stdin = catdiff(&["-", "-"]);
    assert!(!both_stdin.status.success());
    assert!(String::from_utf8_lossy(&both_stdin.stderr).contains("stdin"));

    let open_without_output = catdiff(&[&previous, &previous, "--open"]);
    assert!(!open_without_output.status.success());
    assert!(String::from_utf8_lossy(&open_without_output.stderr).contains("--open requires --output"));

    let watch_without_output = catdiff(&[&previous, &previous, "--watch"]);
    assert!(!watch_without_output.status.success());
}

/// Test that a missing input reports the path.
#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let previous = write(dir.path(), "old.txt", "a");
    let missing = dir.path().join("nope.txt");

    let result = catdiff(&[&previous, missing.to_str().unwrap()]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("nope.txt"));
}
