//! `meshrelay check`: print the resolved configuration and any problems
//! with it, without connecting to the broker or Discord.

use meshrelay_config::{RelayConfig, Severity, ValidationResult};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn severity_label(severity: Severity) -> (&'static str, &'static str) {
    match severity {
        Severity::Error => ("fail", RED),
        Severity::Warning => ("warn", YELLOW),
        Severity::Info => ("info", CYAN),
    }
}

/// Mapping rows: name, hash, destination, key source.
fn mapping_rows(config: &RelayConfig) -> Vec<[String; 4]> {
    config
        .channels
        .iter()
        .map(|m| {
            [
                if m.name.is_empty() {
                    "-".to_string()
                } else {
                    m.name.clone()
                },
                m.channel_hash.clone(),
                m.destination_channel_id.clone(),
                if m.secret.is_some() {
                    "secret".to_string()
                } else {
                    "hash only".to_string()
                },
            ]
        })
        .collect()
}

pub fn handle_check(config: &RelayConfig, report: &ValidationResult) -> anyhow::Result<()> {
    eprintln!("{BOLD}meshrelay check{RESET}");
    eprintln!("{BOLD}==============={RESET}\n");

    eprintln!("{BOLD}Transport{RESET}");
    eprintln!("  broker   {}", config.mqtt.url());
    eprintln!("  topic    {} (qos {})", config.mqtt.topic, config.mqtt.qos.level());
    eprintln!(
        "  dedupe   {}s window",
        config.relay.dedupe_seconds
    );
    eprintln!();

    eprintln!("{BOLD}Destinations{RESET} ({})", config.channels_file.display());
    eprintln!(
        "  default  {}",
        config.discord.default_channel_id.as_deref().unwrap_or("none")
    );
    let rows = mapping_rows(config);
    if rows.is_empty() {
        eprintln!("  no channel mappings");
    }
    for [name, hash, destination, source] in &rows {
        eprintln!("  {hash}  {name:<20} → {destination:<20} ({source})");
    }
    eprintln!();

    eprintln!("{BOLD}Diagnostics{RESET}");
    if report.diagnostics.is_empty() {
        eprintln!("  [{GREEN}ok{RESET}]  configuration looks good");
    }
    for d in &report.diagnostics {
        let (label, color) = severity_label(d.severity);
        eprintln!("  [{color}{label}{RESET}]  {}: {}", d.path, d.message);
    }
    eprintln!();

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
