//! txtline-ctl: command-line interface for the txtline daemon.

mod cmd;

use anyhow::{Context, Result};

use txtline_core::{Encoding, TxtlineConfig};

fn print_usage() {
    println!("txtline-ctl: txtline daemon control");
    println!();
    println!("USAGE:");
    println!("  txtline-ctl [--port <port>] [--encoding hex|base32] <command>");
    println!();
    println!("COMMANDS:");
    println!("  status                 Store counters and uptime");
    println!("  send <file>            Fragment a file and upload it");
    println!("  fetch <id> <out>       Look up a message frame by frame and reassemble it");
    println!("  discover <client>      Deliver new messages to a client");
    println!("  ack <id> <client>      Mark a message consumed");
    println!("  state <id>             Show a message's queue state");
    println!("  zone <file> [out]      Render a file as a zone file (offline)");
    println!();
    println!("OPTIONS:");
    println!("  --port <port>          API port (default from config, 8080)");
    println!("  --encoding <enc>       Frame encoding for send/fetch/zone");
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = TxtlineConfig::load().unwrap_or_else(|e| {
        eprintln!("warning: {e}, using defaults");
        TxtlineConfig::default()
    });

    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port / --encoding options
    let mut port = config.server.api_port;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            "--encoding" => {
                i += 1;
                let enc: Encoding = args
                    .get(i)
                    .context("--encoding requires a value")?
                    .parse()?;
                config.protocol.encoding = enc;
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["send", file] => cmd::send::cmd_send(port, &config, file).await,
        ["fetch", id, out] => cmd::send::cmd_fetch(port, &config, id, out).await,
        ["discover", client] => cmd::queue::cmd_discover(port, client).await,
        ["ack", id, client] => cmd::queue::cmd_ack(port, id, client).await,
        ["state", id] => cmd::queue::cmd_state(port, id).await,
        ["zone", file] => cmd::zone::cmd_zone(&config, file, None),
        ["zone", file, out] => cmd::zone::cmd_zone(&config, file, Some(*out)),
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
