//! Discover Hue bridges on the network.
//!
//! Run with: cargo run --example discover -- --timeout 10

use std::time::Duration;

use clap::Parser;
use hue_mirror::{DEFAULT_DISCOVERY_TIMEOUT, discover_bridges};

#[derive(Parser)]
#[command(name = "discover")]
#[command(about = "Find Hue bridges on the local network", long_about = None)]
struct Cli {
    /// Seconds to wait for answers
    #[arg(short, long, default_value_t = DEFAULT_DISCOVERY_TIMEOUT.as_secs())]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    println!("Discovering Hue bridges for {}s...", cli.timeout);
    let bridges = discover_bridges(Duration::from_secs(cli.timeout)).await?;

    if bridges.is_empty() {
        println!("No bridges found on the network.");
        return Ok(());
    }

    println!("Found {} bridge(s):", bridges.len());
    for bridge in &bridges {
        match &bridge.bridge_id {
            Some(id) => println!("  - {} (id {})", bridge.address, id),
            None => println!("  - {}", bridge.address),
        }
    }
    Ok(())
}
