use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument prints the help text and the current configuration.
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
    // Listed explicitly so that OBG_JWT_SECRET can never be printed
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "OBG_HOST",
        "OBG_PORT",
        "OBG_DATABASE_URL",
        "OBG_DB_MAX_CONNECTIONS",
        "OBG_DB_TIMEOUT_SECS",
        "OBG_ACCESS_TOKEN_TTL_SECS",
        "OBG_REFRESH_TOKEN_TTL_SECS",
        "OBG_AUTH_CODE_TTL_SECS",
        "OBG_DEFAULT_RATE_LIMIT",
        "OBG_AUDIT_BUFFER_SIZE",
        "OBG_AUDIT_MAX_BODY_BYTES",
        "OBG_MAX_BODY_BYTES",
        "OBG_USE_X_FORWARDED_FOR",
        "OBG_USE_FORWARDED",
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
