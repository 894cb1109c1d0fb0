use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn routebook_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("routebook"))
}

/// Run a command against `config_path` and assert it succeeds
fn run_ok(config_path: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    routebook_cmd()
        .arg("-C")
        .arg(config_path)
        .args(args)
        .assert()
        .success()
}

/// Init a config dir with one product and two customers on route "north"
fn setup(temp_dir: &TempDir) -> std::path::PathBuf {
    let config_path = temp_dir.path().join("routebook-config");
    run_ok(&config_path, &["init"]);
    run_ok(&config_path, &["product", "add", "milk", "--name", "Milk", "--price", "25"]);
    run_ok(
        &config_path,
        &[
            "customer", "add", "--id", "asha", "--name", "Asha", "--route", "north", "--opening",
            "100",
        ],
    );
    run_ok(
        &config_path,
        &["customer", "add", "--id", "ravi", "--name", "Ravi", "--route", "north"],
    );
    config_path
}

#[test]
fn test_help() {
    routebook_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Route delivery ledger"));
}

#[test]
fn test_version() {
    routebook_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("routebook"));
}

#[test]
fn test_init_creates_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("routebook-config");

    run_ok(&config_path, &["init"])
        .stdout(predicate::str::contains("Initialized routebook config"));

    assert!(config_path.join("config.toml").exists());
    assert!(config_path.join("data").is_dir());
}

#[test]
fn test_init_fails_if_exists() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("routebook-config");

    run_ok(&config_path, &["init"]);

    routebook_cmd()
        .arg("-C")
        .arg(&config_path)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_status_without_init() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nonexistent");

    routebook_cmd()
        .arg("-C")
        .arg(&config_path)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_status_reports_local_backend() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = setup(&temp_dir);

    run_ok(&config_path, &["status"])
        .stdout(predicate::str::contains("Routebook Status"))
        .stdout(predicate::str::contains("Storage:          local"))
        .stdout(predicate::str::contains("Customers:        2"))
        .stdout(predicate::str::contains("Outstanding:      ₹100.00"));

    assert!(config_path.join("data/routebook_customers.json").exists());
}

#[test]
fn test_customers_and_routes_list() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = setup(&temp_dir);

    run_ok(&config_path, &["customer", "list"])
        .stdout(predicate::str::contains("asha"))
        .stdout(predicate::str::contains("Ravi"))
        .stdout(predicate::str::contains("₹100.00"));

    run_ok(&config_path, &["routes"])
        .stdout(predicate::str::contains("north"))
        .stdout(predicate::str::contains("₹100.00"));

    run_ok(&config_path, &["product", "list"])
        .stdout(predicate::str::contains("milk"))
        .stdout(predicate::str::contains("₹25.00"));
}

#[test]
fn test_negative_product_price_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = setup(&temp_dir);

    routebook_cmd()
        .arg("-C")
        .arg(&config_path)
        .args(["product", "add", "curd", "--name", "Curd", "--price=-4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be negative"));
}

#[test]
fn test_sheet_round_trip_through_close() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = setup(&temp_dir);
    let sheet = "north_2026-10-19_0600";

    run_ok(
        &config_path,
        &["sheet", "open", "--route", "north", "--date", "2026-10-19", "--time", "06:00"],
    )
    .stdout(predicate::str::contains(format!("Opened {sheet}")))
    .stdout(predicate::str::contains("Customers: 2"));

    run_ok(&config_path, &["sheet", "deliver", sheet, "asha", "--item", "milk:2"])
        .stdout(predicate::str::contains("₹50.00"));
    run_ok(
        &config_path,
        &["sheet", "pay", sheet, "asha", "--cash", "40", "--upi", "10"],
    )
    .stdout(predicate::str::contains("Received ₹50.00"));
    run_ok(&config_path, &["sheet", "deliver", sheet, "ravi", "--item", "milk:1"]);

    run_ok(&config_path, &["sheet", "show", sheet])
        .stdout(predicate::str::contains("ACTIVE"))
        .stdout(predicate::str::contains("milk:2"));

    run_ok(&config_path, &["sheet", "close", sheet])
        .stdout(predicate::str::contains(format!("Closed {sheet}")))
        .stdout(predicate::str::contains("Invoices: 2  Transactions: 3"))
        .stdout(predicate::str::contains("(PAID)"))
        .stdout(predicate::str::contains("(PENDING)"));

    run_ok(&config_path, &["invoices"])
        .stdout(predicate::str::contains("PAID"))
        .stdout(predicate::str::contains("PENDING"))
        .stdout(predicate::str::contains("Total:    ₹75.00"))
        .stdout(predicate::str::contains("Received: ₹50.00"));

    run_ok(&config_path, &["statement", "asha"])
        .stdout(predicate::str::contains("adjustment"))
        .stdout(predicate::str::contains("sale"))
        .stdout(predicate::str::contains("payment"))
        .stdout(predicate::str::contains("₹100.00"));

    run_ok(&config_path, &["sheet", "list"]).stdout(predicate::str::contains("CLOSED"));

    routebook_cmd()
        .arg("-C")
        .arg(&config_path)
        .args(["sheet", "close", sheet])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already closed"));
}

#[test]
fn test_close_reports_consistency_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = setup(&temp_dir);
    let sheet = "north_2026-10-19_0600";

    run_ok(
        &config_path,
        &["sheet", "open", "--route", "north", "--date", "2026-10-19", "--time", "06:00"],
    );

    // Hand-edit the stored sheet so the payment split no longer adds up
    let sheets_file = config_path.join("data/routebook_sheets.json");
    let content = fs::read_to_string(&sheets_file).unwrap();
    let mut sheets: serde_json::Value = serde_json::from_str(&content).unwrap();
    sheets[0]["amountReceived"] =
        serde_json::json!({"asha": {"cash": 30.0, "upi": 20.0, "total": 60.0}});
    fs::write(&sheets_file, sheets.to_string()).unwrap();

    routebook_cmd()
        .arg("-C")
        .arg(&config_path)
        .args(["sheet", "close", sheet])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Consistency check failed"))
        .stderr(predicate::str::contains("asha"))
        .stderr(predicate::str::contains("expected 50.00, got 60.00"));

    run_ok(&config_path, &["invoices"]).stdout(predicate::str::contains("No invoices posted yet."));
}

#[test]
fn test_close_unknown_sheet() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = setup(&temp_dir);

    routebook_cmd()
        .arg("-C")
        .arg(&config_path)
        .args(["sheet", "close", "south_2026-10-19_0600"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Sheet 'south_2026-10-19_0600' not found",
        ));
}

#[test]
fn test_deliver_invalid_format() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = setup(&temp_dir);

    run_ok(
        &config_path,
        &["sheet", "open", "--route", "north", "--date", "2026-10-19", "--time", "06:00"],
    );

    routebook_cmd()
        .arg("-C")
        .arg(&config_path)
        .args(["sheet", "deliver", "north_2026-10-19_0600", "asha", "--item", "milk"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid delivery 'milk'"));
}
