use std::process::Command;

#[test]
fn cli_compiles_without_warnings() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["check", "--quiet", "--bin", "parkscript"])
        .status()
        .expect("failed to invoke cargo check for the parkscript binary");

    assert!(status.success(), "cargo check --bin parkscript should succeed");
}

#[test]
fn short_loopback_session_runs_to_completion() {
    let status = Command::new(env!("CARGO_BIN_EXE_parkscript"))
        .args(["--ticks", "40", "--clients", "2"])
        .env("RUST_LOG", "warn")
        .status()
        .expect("failed to launch parkscript");

    assert!(status.success(), "a loopback session should exit cleanly");
}
