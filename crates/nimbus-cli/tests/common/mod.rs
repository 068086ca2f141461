use std::process::{Command, Output};

/// Environment variables the CLI reads; cleared so the host shell can't leak in.
const NIMBUS_ENV: &[&str] = &[
    "NIMBUS_AUTH_URL",
    "NIMBUS_USERNAME",
    "NIMBUS_API_KEY",
    "NIMBUS_TENANT",
    "NIMBUS_AUTH_METHOD",
    "NIMBUS_SERVICE_TYPE",
    "NIMBUS_SERVICE_NAME",
    "NIMBUS_REGION",
    "NIMBUS_ENDPOINT_TYPE",
    "NIMBUS_PROXY",
    "NIMBUS_INSECURE",
    "NIMBUS_DEBUG",
];

/// Run the CLI binary with arguments.
pub fn run_cli(args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nimbus"));
    for var in NIMBUS_ENV {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd.args(args);
    cmd.output().expect("Failed to execute CLI")
}

/// Run the CLI against a V1 auth endpoint as alice.
pub fn run_cli_as_alice(auth_url: &str, args: &[&str]) -> Output {
    let mut full = vec![
        "--auth-url",
        auth_url,
        "--username",
        "alice",
        "--api-key",
        "key123",
    ];
    full.extend_from_slice(args);
    run_cli(&full)
}

/// Run the CLI and expect success.
pub fn expect_success(output: Output) -> String {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!("CLI command failed\nstderr: {}", stderr);
    }
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Run the CLI and expect failure, returning stderr.
pub fn expect_failure(output: Output) -> String {
    if output.status.success() {
        panic!("CLI command should have failed");
    }
    String::from_utf8_lossy(&output.stderr).to_string()
}
