//! Locating Visual Studio developer-environment scripts.
//!
//! Candidates come from two places: the `vswhere` locator shipped with modern
//! installers, and a fixed list of legacy install directories. Both are always
//! consulted; legacy entries are kept only if their script exists.

use serde::Serialize;
use tracing::{debug, warn};

use crate::actions::BuildActions;

/// First major version using the `VC\Auxiliary\Build` layout.
pub const NEWEST_LAYOUT_VERSION: u32 = 15;

/// Legacy versions probed at fixed paths, newest first.
const LEGACY_VERSIONS: [u32; 4] = [14, 12, 11, 10];

/// Scripts inside a newest-layout installation, in preference order.
const NEWEST_LAYOUT_SCRIPTS: [&str; 3] = [
  "VC\\Auxiliary\\Build\\vcvars32.bat",
  "VC\\Auxiliary\\Build\\vcvars64.bat",
  "Common7\\Tools\\VsDevCmd.bat",
];

const OLD_LAYOUT_SCRIPT: &str = "VC\\vcvarsall.bat";

/// An environment-setup script and the major version it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VcVarsCandidate {
  pub path: String,
  pub tools_version: u32,
}

impl VcVarsCandidate {
  fn new(path: String, tools_version: u32) -> Self {
    Self { path, tools_version }
  }
}

fn program_files(actions: &dyn BuildActions) -> Option<String> {
  if !actions.is_windows() {
    return None;
  }
  actions
    .get_environment_variable("ProgramFiles(x86)")
    .filter(|dir| !dir.is_empty())
}

/// All candidate scripts: locator results in locator order, then existing
/// legacy scripts newest first.
pub fn candidate_vcvars_files(actions: &dyn BuildActions) -> Vec<VcVarsCandidate> {
  let Some(program_files) = program_files(actions) else {
    debug!("no Program Files (x86) directory, skipping toolchain discovery");
    return Vec::new();
  };

  let mut candidates = vswhere_candidates(actions, &program_files);
  candidates.extend(legacy_candidates(actions, &program_files));
  debug!(count = candidates.len(), "found developer environment candidates");
  candidates
}

/// Existing `vcvarsall.bat` scripts from the fixed legacy install directories.
fn legacy_candidates(actions: &dyn BuildActions, program_files: &str) -> Vec<VcVarsCandidate> {
  LEGACY_VERSIONS
    .iter()
    .map(|version| {
      let install = format!("Microsoft Visual Studio {}.0", version);
      let path = actions.path_combine(&[program_files, &install, OLD_LAYOUT_SCRIPT]);
      VcVarsCandidate::new(path, *version)
    })
    .filter(|candidate| actions.file_exists(&candidate.path))
    .collect()
}

fn vswhere_candidates(actions: &dyn BuildActions, program_files: &str) -> Vec<VcVarsCandidate> {
  let vswhere = actions.path_combine(&[program_files, "Microsoft Visual Studio\\Installer\\vswhere.exe"]);
  if !actions.file_exists(&vswhere) {
    debug!(path = %vswhere, "vswhere not found");
    return Vec::new();
  }

  let query = |property: &str| {
    let args = format!("-prerelease -legacy -property {}", property);
    let (status, lines) = actions.run_process_capture(&vswhere, &args, None, None);
    if status != 0 {
      warn!(status, property, "vswhere query failed");
      return None;
    }
    Some(lines)
  };

  let (Some(paths), Some(versions)) = (query("installationPath"), query("installationVersion")) else {
    return Vec::new();
  };

  let mut candidates = Vec::new();
  for (path, version) in paths.iter().zip(versions.iter()) {
    let path = path.trim();
    let Some(major) = parse_major_version(version) else {
      warn!(version = %version, "unrecognised installation version");
      continue;
    };
    if major >= NEWEST_LAYOUT_VERSION {
      for script in NEWEST_LAYOUT_SCRIPTS {
        candidates.push(VcVarsCandidate::new(actions.path_combine(&[path, script]), major));
      }
    } else {
      candidates.push(VcVarsCandidate::new(actions.path_combine(&[path, OLD_LAYOUT_SCRIPT]), major));
    }
  }
  candidates
}

fn parse_major_version(version: &str) -> Option<u32> {
  version.trim().split('.').next()?.parse().ok()
}

/// Candidates to try, newest version first, optionally restricted to one major version.
pub fn preferred_order(candidates: &[VcVarsCandidate], version: Option<u32>) -> Vec<VcVarsCandidate> {
  let mut ordered: Vec<_> = candidates
    .iter()
    .filter(|candidate| version.is_none_or(|v| candidate.tools_version == v))
    .cloned()
    .collect();
  ordered.sort_by(|a, b| b.tools_version.cmp(&a.tools_version));
  ordered
}
