//! beacon-ctl — command-line interface for the Beacon relay.

use anyhow::{Context, Result};

use beacon_core::config::DEFAULT_PORT;

mod cmd;

fn print_usage() {
    println!("Usage: beacon-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status        Show node count and connected node ids");
    println!("  nodes         List connected nodes with bootstrap details");
    println!();
    println!("Options:");
    println!("  --port <port>   Relay port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["nodes"] => cmd::status::cmd_nodes(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
