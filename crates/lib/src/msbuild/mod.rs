//! The `msbuild` build rule.
//!
//! Each target gets a best-effort NuGet restore, falling back to a freshly
//! downloaded `nuget.exe` when no usable `nuget` is on the path. The build
//! itself runs plain `msbuild` unless developer-environment scripts are found,
//! in which case each candidate is tried as a complete activated build, newest
//! version first, until one succeeds. A requested developer-environment
//! version that is not installed fails the build.

use tracing::{debug, error, warn};

use crate::actions::BuildActions;
use crate::autobuild::AutobuildOptions;
use crate::diagnostics::{DiagnosticMessage, Diagnostics};
use crate::script::{BuildScript, CommandBuilder, FAILURE, SUCCESS};
use crate::toolchain::{self, VcVarsCandidate};

pub const NUGET_URL: &str = "https://dist.nuget.org/win-x86-commandline/latest/nuget.exe";

/// Restore and build `targets` with `msbuild`.
pub fn msbuild_script(
  actions: &dyn BuildActions,
  options: &AutobuildOptions,
  diagnostics: &Diagnostics,
  targets: &[String],
) -> BuildScript {
  let restore = if options.nuget_restore {
    BuildScript::all(
      targets
        .iter()
        .map(|target| BuildScript::attempt(nuget_restore(actions, options, target))),
    )
  } else {
    debug!("nuget restore disabled");
    BuildScript::succeed()
  };

  let options = options.clone();
  let diagnostics = diagnostics.clone();
  let targets = targets.to_vec();
  let build = BuildScript::lazy(move |actions| {
    let found = toolchain::candidate_vcvars_files(actions);
    let candidates = toolchain::preferred_order(&found, options.vstools_version);
    if let Some(version) = options.vstools_version
      && actions.is_windows()
      && candidates.is_empty()
    {
      let available: Vec<u32> = toolchain::preferred_order(&found, None)
        .iter()
        .map(|candidate| candidate.tools_version)
        .collect();
      error!(version, available = ?available, "requested developer environment not found");
      diagnostics.push(DiagnosticMessage::missing_developer_environment(version, &available));
      return BuildScript::fail();
    }
    BuildScript::all(targets.iter().map(|target| build_target(actions, &options, &candidates, target)))
  });

  restore & build
}

fn nuget_restore(actions: &dyn BuildActions, options: &AutobuildOptions, target: &str) -> BuildScript {
  let windows = actions.is_windows();
  let restore_args = |builder: CommandBuilder| {
    builder
      .argument("restore")
      .path_argument(target)
      .argument("-DisableParallelProcessing")
      .script()
  };

  let nuget_dir = actions.path_combine(&[&options.scratch_dir, ".nuget"]);
  let nuget_exe = actions.path_combine(&[&nuget_dir, "nuget.exe"]);

  let direct = restore_args(CommandBuilder::for_windows(windows).run_command("nuget"));
  let local = if windows {
    restore_args(CommandBuilder::for_windows(true).run_command(nuget_exe.clone()))
  } else {
    restore_args(CommandBuilder::for_windows(false).run_command("mono").path_argument(&nuget_exe))
  };

  direct | (download_nuget(nuget_dir, nuget_exe) & local)
}

fn download_nuget(dir: String, exe: String) -> BuildScript {
  BuildScript::from_fn(move |actions| {
    let result = actions
      .create_directory(&dir)
      .and_then(|()| actions.download_file(NUGET_URL, &exe));
    match result {
      Ok(()) => SUCCESS,
      Err(e) => {
        warn!(error = %e, "cannot download nuget.exe");
        FAILURE
      }
    }
  })
}

fn msbuild_command(builder: CommandBuilder, options: &AutobuildOptions, target: &str) -> BuildScript {
  let mut builder = builder
    .run_command("msbuild")
    .path_argument(target)
    .argument(format!("/t:{}", options.msbuild_target));
  if let Some(platform) = &options.msbuild_platform {
    builder = builder.argument(format!("/p:Platform=\"{}\"", platform));
  }
  if let Some(configuration) = &options.msbuild_configuration {
    builder = builder.argument(format!("/p:Configuration=\"{}\"", configuration));
  }
  if let Some(extra) = &options.msbuild_arguments {
    builder = builder.argument(extra);
  }
  builder.script()
}

fn build_target(
  actions: &dyn BuildActions,
  options: &AutobuildOptions,
  candidates: &[VcVarsCandidate],
  target: &str,
) -> BuildScript {
  let windows = actions.is_windows();
  if candidates.is_empty() {
    if windows {
      warn!("no developer environment found, running msbuild without activation");
    }
    return msbuild_command(CommandBuilder::for_windows(windows), options, target);
  }

  BuildScript::any(candidates.iter().map(|candidate| {
    debug!(path = %candidate.path, version = candidate.tools_version, "trying developer environment");
    let builder = CommandBuilder::for_windows(windows).call_batch_file(&candidate.path, None);
    msbuild_command(builder, options, target)
  }))
}
