//! End-to-end CLI tests for the offline command paths. HOME is redirected
//! to a temp directory so each test gets its own database and config.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

fn folio(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.env("HOME", home.path());
    cmd
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    folio(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("benchmark"))
        .stdout(predicate::str::contains("rebalance"));
}

#[test]
fn import_dry_run_previews_without_saving() {
    let home = TempDir::new().unwrap();
    let mut csv = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    csv.write_all(
        b"Date,Product,ISIN,Quantity,Local value,Fee,Currency\n\
          2024-01-02,Core MSCI World,IE00B4L5Y983,10,-1000.00,-2.50,EUR\n",
    )
    .unwrap();

    folio(&home)
        .args(["import", csv.path().to_str().unwrap(), "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 transactions"))
        .stdout(predicate::str::contains("Dry run"));

    // Nothing was saved, so the portfolio is still empty
    folio(&home)
        .arg("portfolio")
        .assert()
        .success()
        .stdout(predicate::str::contains("No open positions"));
}

#[test]
fn import_then_portfolio_shows_position() {
    let home = TempDir::new().unwrap();
    let mut csv = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    csv.write_all(
        b"Date,Product,ISIN,Quantity,Local value,Fee,Currency\n\
          2024-01-02,Core MSCI World,IE00B4L5Y983,10,-1000.00,-2.50,EUR\n",
    )
    .unwrap();

    folio(&home)
        .args(["import", csv.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported: 1"));

    // Re-import is a no-op
    folio(&home)
        .args(["import", csv.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipped (duplicates): 1"));

    folio(&home)
        .args(["--no-color", "portfolio"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Core MSCI World"))
        .stdout(predicate::str::contains("1,000.00"));
}

#[test]
fn mappings_load_and_list_round_trip() {
    let home = TempDir::new().unwrap();
    let mut csv = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    csv.write_all(
        b"ISIN,Ticker,Category\n\
          IE00B4L5Y983,IWDA.AS,ETF\n",
    )
    .unwrap();

    folio(&home)
        .args(["mappings", "load", csv.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 1 mappings"));

    folio(&home)
        .args(["mappings", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("IWDA.AS"));
}

#[test]
fn benchmark_without_ticker_or_config_fails_cleanly() {
    let home = TempDir::new().unwrap();
    folio(&home)
        .arg("benchmark")
        .assert()
        .failure()
        .stderr(predicate::str::contains("default_benchmark"));
}

#[test]
fn rebalance_without_targets_fails_cleanly() {
    let home = TempDir::new().unwrap();
    folio(&home)
        .arg("rebalance")
        .assert()
        .failure()
        .stderr(predicate::str::contains("targets"));
}
