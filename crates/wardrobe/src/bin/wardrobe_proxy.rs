//! Wardrobe forwarding proxy
//!
//! Relays `/google-api/*` to the generation API so the CLI can reach it
//! through a single local endpoint.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;

use wardrobe::proxy::{self, DEFAULT_BIND, DEFAULT_UPSTREAM};

#[derive(Parser)]
#[command(name = "wardrobe_proxy")]
#[command(about = "Forwarding proxy for the generation API")]
#[command(version)]
struct Args {
  /// Proxy bind address
  #[arg(long, default_value = DEFAULT_BIND)]
  bind: SocketAddr,

  /// Upstream the /google-api prefix maps to
  #[arg(long, default_value = DEFAULT_UPSTREAM)]
  upstream: String,

  /// Enable verbose logging
  #[arg(short, long)]
  verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  valet::init_tracing(args.verbose);

  valet::info!(&format!("Starting wardrobe proxy v{}", env!("CARGO_PKG_VERSION")));
  valet::info!(&format!("Forwarding {}/* on {} to {}", proxy::PROXY_PREFIX, args.bind, args.upstream));

  proxy::serve(args.bind, &args.upstream)
    .await
    .with_context(|| format!("Proxy on {} stopped", args.bind))?;

  Ok(())
}
