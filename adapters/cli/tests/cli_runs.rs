use std::process::{Command, Output};

fn defence_in_depth(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_defence-in-depth"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to launch the defence-in-depth binary")
}

#[test]
fn zero_zones_exits_with_an_error() {
    let output = defence_in_depth(&["--zones", "0", "--log", "off"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least one zone"), "stderr was: {stderr}");
}

#[test]
fn undefended_campaign_prints_an_overrun_report() {
    let output = defence_in_depth(&[
        "--zones",
        "2",
        "--defenders",
        "0",
        "--prepare-secs",
        "5",
        "--log",
        "off",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("outcome:          overrun after zone 2"), "stdout was: {stdout}");
    assert!(stdout.contains("zones played:     2"), "stdout was: {stdout}");
}

#[test]
fn unreadable_tuning_file_is_reported() {
    let output = defence_in_depth(&["--tuning", "/definitely/not/here.toml", "--log", "off"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("here.toml"), "stderr was: {stderr}");
}
