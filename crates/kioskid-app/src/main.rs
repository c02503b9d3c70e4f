// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kioskid: attendance kiosk identity service.
//
// Entry point. Initialises logging and the kiosk services, then runs one
// command (`probe` when none is given).

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use kioskid_core::KioskError;
use kioskid_core::human_errors::humanize_error;
use kioskid_device::{derive_bag_id, validate_tag_id};
use serde::Serialize;
use tracing::{error, info};

use kioskid_app::KioskServices;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "kioskid",
    version,
    about = "Attendance kiosk identity service"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the capability report as JSON.
    Probe,

    /// Connect the scanner, capture one sealed template, disconnect.
    Capture,

    /// Wait for one proximity tag.
    ScanTag {
        /// Scan bound in milliseconds; the configured default when omitted.
        timeout_ms: Option<u64>,
    },

    /// Derive a bag id for a tag.
    BagId { tag_id: String, lot_id: String },

    /// Print the most recent audit entries as JSON.
    Audit {
        #[arg(default_value_t = 20)]
        limit: u32,
    },
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => error!(error = %e, "failed to serialise output"),
    }
}

fn report_failure(err: &KioskError) -> ExitCode {
    let human = humanize_error(err);
    error!(error = %err, severity = ?human.severity, "command failed");
    eprintln!("{}\n{}", human.message, human.suggestion);
    ExitCode::FAILURE
}

async fn run(services: &KioskServices, command: Command) -> ExitCode {
    match command {
        Command::Probe => {
            print_json(&services.probe().await);
            ExitCode::SUCCESS
        }
        Command::Capture => {
            if !services.connect_scanner().await {
                return failure_from_scanner(services).await;
            }
            let payload = services.capture_template().await;
            let code = match payload {
                Some(encoded) => {
                    println!("{encoded}");
                    ExitCode::SUCCESS
                }
                None => failure_from_scanner(services).await,
            };
            services.disconnect_scanner().await;
            code
        }
        Command::ScanTag { timeout_ms } => match services.scan_tag(timeout_ms).await {
            Ok(reading) => {
                print_json(&reading);
                ExitCode::SUCCESS
            }
            Err(e) => report_failure(&e),
        },
        Command::BagId { tag_id, lot_id } => {
            if !validate_tag_id(&tag_id) {
                eprintln!("{tag_id} is not a valid tag id (8 to 14 hex characters)");
                return ExitCode::FAILURE;
            }
            println!("{}", derive_bag_id(&tag_id, &lot_id));
            ExitCode::SUCCESS
        }
        Command::Audit { limit } => match services.recent_audit_entries(limit) {
            Ok(entries) => {
                print_json(&entries);
                ExitCode::SUCCESS
            }
            Err(e) => report_failure(&e),
        },
    }
}

async fn failure_from_scanner(services: &KioskServices) -> ExitCode {
    if let Some(human) = services.scanner_error().await {
        eprintln!("{}\n{}", human.message, human.suggestion);
    }
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = Cli::parse().cmd.unwrap_or(Command::Probe);

    info!(?command, "Kioskid starting");

    let services = match KioskServices::init() {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "persistent storage failed, using in-memory fallback");
            match KioskServices::fallback() {
                Ok(services) => services,
                Err(e) => return report_failure(&e),
            }
        }
    };

    run(&services, command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Command>, clap::Error> {
        Cli::try_parse_from(std::iter::once("kioskid").chain(args.iter().copied()))
            .map(|cli| cli.cmd)
    }

    #[test]
    fn no_subcommand_runs_probe() {
        let command = parse(&[]).unwrap().unwrap_or(Command::Probe);
        assert!(matches!(command, Command::Probe));
        assert!(matches!(parse(&["probe"]), Ok(Some(Command::Probe))));
    }

    #[test]
    fn parses_arguments() {
        assert!(matches!(
            parse(&["scan-tag", "500"]),
            Ok(Some(Command::ScanTag {
                timeout_ms: Some(500)
            }))
        ));
        assert!(matches!(
            parse(&["scan-tag"]),
            Ok(Some(Command::ScanTag { timeout_ms: None }))
        ));
        assert!(matches!(
            parse(&["audit"]),
            Ok(Some(Command::Audit { limit: 20 }))
        ));
        assert!(matches!(
            parse(&["audit", "5"]),
            Ok(Some(Command::Audit { limit: 5 }))
        ));
        match parse(&["bag-id", "04A1B2C3", "LOT9"]) {
            Ok(Some(Command::BagId { tag_id, lot_id })) => {
                assert_eq!(tag_id, "04A1B2C3");
                assert_eq!(lot_id, "LOT9");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse(&["scan-tag", "soon"]).is_err());
        assert!(parse(&["bag-id", "04A1B2C3"]).is_err());
        assert!(parse(&["audit", "-1"]).is_err());
        assert!(parse(&["reboot"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
