//! # Tally Action Shell
//!
//! Reads one JSON object per line from stdin, runs it as a terminal action
//! and prints the JSON response.
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-pos --bin tally -- --db ./tally_dev.db --terminal T1
//!
//! {"action":"recalculate-order","lines":[{"description":"Tea","unit_price":"2.00"}]}
//! {"action":"save-order","token":"<token>","customer_code":"C0000","lines":[...]}
//! {"action":"get-orders-on-hold"}
//! ```
//!
//! The first line printed is the token for the first gated action. Every
//! response that carries a `token` replaces it.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use serde_json::{json, Value};
use tracing::warn;

use tally_pos::{PosConfig, PosService, SalesSession};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tally_pos::init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut terminal = String::from("T1");
    let mut session_id = chrono::Utc::now().format("S-%Y-%m-%d").to_string();
    let mut user = String::from("clerk");

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match (args[i].as_str(), value) {
            ("--config" | "-c", Some(v)) => {
                config_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--db" | "-d", Some(v)) => {
                db_path = Some(PathBuf::from(v));
                i += 1;
            }
            ("--terminal" | "-t", Some(v)) => {
                terminal = v;
                i += 1;
            }
            ("--session" | "-s", Some(v)) => {
                session_id = v;
                i += 1;
            }
            ("--user" | "-u", Some(v)) => {
                user = v;
                i += 1;
            }
            ("--help" | "-h", _) => {
                println!("Tally POS Action Shell");
                println!();
                println!("Usage: tally [OPTIONS] < actions.jsonl");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>    pos.toml to load (default: platform config dir)");
                println!("  -d, --db <PATH>        Database file path (overrides config)");
                println!("  -t, --terminal <ID>    Terminal id (default: T1)");
                println!("  -s, --session <ID>     Session id (default: S-<today>)");
                println!("  -u, --user <NAME>      Operator login (default: clerk)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            (other, _) => warn!(argument = %other, "Ignoring argument"),
        }
        i += 1;
    }

    let mut config = PosConfig::load(config_path)?;
    if db_path.is_some() {
        config.storage.database_path = db_path;
    }

    let service = PosService::connect(config).await?;
    let clerk = SalesSession::new(terminal, session_id, user);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", json!({ "token": service.issue_token(&clerk) }))?;

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(raw)) => service.handle(&clerk, raw).await,
            Ok(_) => json!({ "code": "VALIDATION_ERROR", "message": "Expected a JSON object" }),
            Err(e) => json!({ "code": "VALIDATION_ERROR", "message": e.to_string() }),
        };
        writeln!(out, "{}", response)?;
        out.flush()?;
    }

    service.close_session(&clerk);
    service.shutdown().await;
    Ok(())
}
