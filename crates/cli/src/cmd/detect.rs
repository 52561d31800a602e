//! Implementation of the `autobuild detect` command.
//!
//! Runs discovery and strategy selection only. Exits non-zero when the
//! selected strategy cannot build anything.

use anyhow::{Context, Result};
use serde_json::json;

use autobuild_lib::actions::SystemActions;
use autobuild_lib::autobuild::{AutobuildOptions, Autobuilder, Strategy};

use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, print_success};

pub fn cmd_detect(format: OutputFormat) -> Result<i32> {
  let actions = SystemActions::new();
  let options = AutobuildOptions::from_actions(&actions).context("Invalid autobuild configuration")?;
  let autobuilder = Autobuilder::new(&actions, options);
  let strategy = autobuilder.select_strategy();
  let status = if strategy.is_failure() { 1 } else { 0 };

  if format.is_json() {
    print_json(&json!({
      "root": autobuilder.options().root,
      "strategy": strategy,
    }))?;
    return Ok(status);
  }

  if strategy.is_failure() {
    print_error(&format!("Strategy: {}", strategy.name()));
  } else {
    print_success(&format!("Strategy: {}", strategy.name()));
  }
  print_stat("Root", &autobuilder.options().root);

  match &strategy {
    Strategy::BuildCommand { command } => print_stat("Command", command),
    Strategy::Buildless { extractor } => print_stat("Extractor", extractor),
    Strategy::Aggregate { project, members } => {
      print_stat("Project", project);
      print_stat("Members", &members.len().to_string());
      for member in members {
        println!("    {}", member);
      }
    }
    Strategy::ProjectCycle { chain, .. } => print_stat("Cycle", &chain.join(" -> ")),
    Strategy::UnreadableProject { project, reason } => {
      print_stat("Project", project);
      print_stat("Reason", reason);
    }
    Strategy::BuildScript { script } => print_stat("Script", script),
    Strategy::DotNet { targets } => print_targets(targets),
    Strategy::MsBuild { targets, incompatible } => {
      print_targets(targets);
      print_stat("Not SDK-style", &incompatible.len().to_string());
      for project in incompatible {
        println!("    {}", project);
      }
    }
    Strategy::NoEntryPoint => print_info("No solution, project file or build script found."),
  }

  Ok(status)
}

fn print_targets(targets: &[String]) {
  print_stat("Targets", &targets.len().to_string());
  for target in targets {
    println!("    {}", target);
  }
}
