use anyhow::Result;
use serde_json::json;

use autobuild_lib::actions::{BuildActions, SystemActions};
use autobuild_lib::dotnet::installed_sdks;
use autobuild_lib::platform::platform_triple;
use autobuild_lib::toolchain::candidate_vcvars_files;

use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_info(format: OutputFormat) -> Result<()> {
  let actions = SystemActions::new();
  let platform = platform_triple();
  let candidates = candidate_vcvars_files(&actions);
  let sdks = installed_sdks(&actions);

  if format.is_json() {
    return print_json(&json!({
      "platform": platform,
      "developer_environments": candidates,
      "dotnet_sdks": sdks,
    }));
  }

  println!("System:");
  match platform {
    Some(triple) => print_stat("Platform", &triple),
    None => println!("Could not detect platform."),
  }

  if actions.is_windows() {
    println!("Developer environments:");
    if candidates.is_empty() {
      println!("  none found");
    }
    for candidate in &candidates {
      println!("  {} ({})", candidate.path, candidate.tools_version);
    }
  }

  println!("dotnet SDKs:");
  if sdks.is_empty() {
    println!("  none found");
  }
  for sdk in &sdks {
    println!("  {}", sdk);
  }
  Ok(())
}
