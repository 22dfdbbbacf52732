use assert_cmd::Command;
use predicates as pred;
use tempfile::TempDir;

/// Runs the binary with an empty environment from `dir`, so only a `.env`
/// placed there can add settings.
fn service(dir: &TempDir) -> Command {
    let exe = env!("CARGO_BIN_EXE_banking_service");
    let mut cmd = Command::new(exe);
    cmd.env_clear().current_dir(dir.path());
    cmd
}

#[test]
fn refuses_to_start_without_store_url() {
    let dir = TempDir::new().unwrap();
    service(&dir)
        .env("PASSWORD", "secret")
        .assert()
        .failure()
        .stderr(pred::str::contains("--store-url"));
}

#[test]
fn refuses_to_start_without_password() {
    let dir = TempDir::new().unwrap();
    service(&dir)
        .env("STORE_URL", "memory://")
        .assert()
        .failure()
        .stderr(pred::str::contains("--password"));
}

#[test]
fn refuses_unsupported_store_scheme() {
    let dir = TempDir::new().unwrap();
    service(&dir)
        .env("PASSWORD", "secret")
        .env("STORE_URL", "mongodb://localhost:27017")
        .env("PORT", "0")
        .assert()
        .failure()
        .stderr(pred::str::contains("failed to connect to account store"))
        .stderr(pred::str::contains("unsupported store url scheme: mongodb"));
}

#[test]
fn reads_settings_from_dot_env() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(".env"),
        "PASSWORD=secret\nSTORE_URL=mongodb://localhost:27017\nPORT=0\n",
    )
    .unwrap();

    service(&dir)
        .assert()
        .failure()
        .stderr(pred::str::contains("unsupported store url scheme: mongodb"));
}

#[test]
fn rejects_zero_transfer_timeout() {
    let dir = TempDir::new().unwrap();
    service(&dir)
        .env("PASSWORD", "secret")
        .env("STORE_URL", "memory://")
        .env("TRANSFER_TIMEOUT_MS", "0")
        .assert()
        .failure()
        .stderr(pred::str::contains("transfer-timeout-ms"));
}
