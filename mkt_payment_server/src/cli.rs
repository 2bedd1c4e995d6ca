use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // No arguments are expected, so any argument is a request for help
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
    // API keys, webhook secrets and the cron secret are left out on purpose
    const DISPLAY_ENVS: [&str; 12] = [
        "RUST_LOG",
        "MKT_HOST",
        "MKT_PORT",
        "MKT_DATABASE_URL",
        "MKT_PUBLIC_URL",
        "MKT_REQUIRE_WEBHOOK_SIGNATURES",
        "MKT_AUTO_COMPLETE_AFTER_HOURS",
        "MKT_AUTO_REVIEW_AFTER_HOURS",
        "MKT_SWEEP_BATCH_LIMIT",
        "MKT_SWEEP_TIME_BUDGET_SECS",
        "MKT_SESSION_TTL_MINUTES",
        "MKT_NOTIFY_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
