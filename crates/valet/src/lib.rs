//! Terminal status output for the wardrobe tools.
//!
//! Status lines go to stderr with a short colored level prefix so that stdout
//! stays reserved for command results. Library crates log through `tracing`;
//! [`init_tracing`] wires those events to the same stderr stream.

use colored::*;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Otherwise wardrobe crates log at `info` in
/// verbose mode and at `warn` by default. Calling this twice is harmless.
pub fn init_tracing(verbose: bool) {
  let default_filter = if verbose {
    "wardrobe=debug,valet=debug,tower_http=info,warn"
  } else {
    "wardrobe=warn,warn"
  };

  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

  let _ = tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
    .with(filter)
    .try_init();
}

/// Write every line of a message to stderr
pub fn log(message: &str) {
  for line in message.lines() {
    eprintln!("{line}");
  }
}

fn format_prefix(color: Color, prefix: &str) -> String {
  format!("[{}]{:<width$}", prefix.color(color).bold(), "", width = 7 - prefix.len() - 2)
}

fn log_with_prefix(color: Color, prefix: &str, message: &str) {
  let prefix = format_prefix(color, prefix);
  for line in message.lines() {
    log(&format!("{prefix} {line}"));
  }
}

pub fn info(message: &str) {
  log_with_prefix(Color::Blue, "info", message);
}

pub fn warn(message: &str) {
  log_with_prefix(Color::Yellow, "warn", message);
}

/// Something the user asked for completed
pub fn success(message: &str) {
  log_with_prefix(Color::Green, "sccs", message);
}

/// Build a horizontal rule for section headings
pub fn rule(length: usize, ch: char) -> String {
  ch.to_string().repeat(length)
}

/// Print a heading framed by rules, used above multi-line command output
pub fn heading(title: &str) {
  let line = rule(title.chars().count().max(24), '-');
  log(&line.blue().to_string());
  log(&title.blue().bold().to_string());
  log(&line.blue().to_string());
}

#[macro_export]
macro_rules! info {
  ($msg:expr) => {
    $crate::info($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! warn {
  ($msg:expr) => {
    $crate::warn($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! success {
  ($msg:expr) => {
    $crate::success($msg); // LCOV_EXCL_LINE
  };
}
