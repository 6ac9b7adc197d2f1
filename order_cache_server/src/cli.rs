use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and the relevant environment, and returns `true`
/// so that the caller can exit.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "OCS_HOST",
        "OCS_PORT",
        "OCS_DATABASE_URL",
        "OCS_DB_MAX_CONNECTIONS",
        "OCS_KAFKA_BROKERS",
        "OCS_KAFKA_TOPIC",
        "OCS_KAFKA_GROUP_ID",
        "OCS_MAX_DELIVERY_ATTEMPTS",
        "OCS_RETRY_BACKOFF_MS",
        "OCS_RETRY_MAX_BACKOFF_MS",
        "OCS_DEAD_LETTER_TOPIC",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
