//! Implementation of the `autobuild run` command.
//!
//! Reads the configuration from the environment, selects a strategy for the
//! current directory, runs it and validates the extractor log. The process
//! exits with the resulting status.

use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use autobuild_lib::actions::SystemActions;
use autobuild_lib::autobuild::{AutobuildOptions, Autobuilder};
use autobuild_lib::diagnostics::Severity;

use crate::output::{
  OutputFormat, format_duration, print_command, print_error, print_info, print_json, print_success, print_warning,
};

pub fn cmd_run(format: OutputFormat) -> Result<i32> {
  let json = format.is_json();
  let actions = SystemActions::new();
  let options = AutobuildOptions::from_actions(&actions).context("Invalid autobuild configuration")?;
  debug!(options = ?options, "read configuration");
  let autobuilder = Autobuilder::new(&actions, options);

  let strategy = autobuilder.select_strategy();
  if !json {
    print_info(&format!("Building {} using {}", autobuilder.options().root, strategy.name()));
  }

  let start = Instant::now();
  let mut commands = 0usize;
  let mut failed_commands = 0usize;
  let status = autobuilder.run_strategy(
    &strategy,
    &mut |command, quiet| {
      commands += 1;
      if !json && !quiet {
        print_command(command);
      }
    },
    &mut |status, command, quiet| {
      if status != 0 {
        failed_commands += 1;
        if !json && !quiet {
          print_warning(&format!("{} exited with status {}", command, status));
        }
      }
    },
  );
  let elapsed = format_duration(start.elapsed());
  let diagnostics = autobuilder.diagnostics().messages();

  if json {
    print_json(&json!({
      "root": autobuilder.options().root,
      "strategy": strategy,
      "status": status,
      "commands": commands,
      "failed_commands": failed_commands,
      "elapsed": elapsed,
      "diagnostics": diagnostics,
    }))?;
    return Ok(status);
  }

  for message in &diagnostics {
    match message.severity {
      Severity::Error => print_error(&message.source.name),
      Severity::Warning => print_warning(&message.source.name),
      Severity::Note => print_info(&message.source.name),
    }
    eprintln!("  {}", message.markdown_message.replace('\n', "\n  "));
  }

  if status == 0 {
    print_success(&format!("Build succeeded ({} command(s) in {})", commands, elapsed));
  } else {
    print_error(&format!(
      "Build failed with status {} ({} command(s) in {})",
      status, commands, elapsed
    ));
  }
  Ok(status)
}
