mod cmd;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{cmd_detect, cmd_info, cmd_run};
use output::OutputFormat;

/// autobuild - work out how to build a checkout, then build it
#[derive(Parser)]
#[command(name = "autobuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Select a strategy, build the checkout and check the extractor log (default)
  Run,

  /// Show the strategy that would be used, without running anything
  Detect,

  /// Show platform, developer environments and installed SDKs
  Info,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let status = match cli.command.unwrap_or(Commands::Run) {
    Commands::Run => cmd_run(cli.format)?,
    Commands::Detect => cmd_detect(cli.format)?,
    Commands::Info => {
      cmd_info(cli.format)?;
      0
    }
  };

  if status != 0 {
    std::process::exit(status);
  }
  Ok(())
}
