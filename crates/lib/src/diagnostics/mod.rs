//! Structured diagnostics about how the autobuild went.
//!
//! Messages are collected while the build script runs and written out as JSON
//! lines at the end, so that whatever drives the autobuilder can surface them.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::actions::{ActionError, BuildActions};

/// File name of the diagnostics output inside the diagnostics directory.
pub const DIAGNOSTICS_FILE: &str = "autobuilder.jsonl";

const SOURCE_PREFIX: &str = "autobuild";

#[derive(Debug, Error)]
pub enum DiagnosticsError {
  #[error("failed to serialize diagnostic: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error(transparent)]
  Write(#[from] ActionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Note,
  Warning,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSource {
  /// Stable identifier, e.g. `autobuild/no-projects-found`.
  pub id: String,
  /// Human readable title.
  pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
  pub status_page: bool,
  pub cli_summary_table: bool,
  pub telemetry: bool,
}

impl Default for Visibility {
  fn default() -> Self {
    Self {
      status_page: true,
      cli_summary_table: true,
      telemetry: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticMessage {
  pub source: DiagnosticSource,
  pub markdown_message: String,
  pub severity: Severity,
  pub visibility: Visibility,
}

impl DiagnosticMessage {
  pub fn new(id: &str, name: &str, markdown_message: impl Into<String>, severity: Severity) -> Self {
    Self {
      source: DiagnosticSource {
        id: format!("{}/{}", SOURCE_PREFIX, id),
        name: name.to_string(),
      },
      markdown_message: markdown_message.into(),
      severity,
      visibility: Visibility::default(),
    }
  }

  pub fn no_entry_point() -> Self {
    Self::new(
      "no-projects-found",
      "No project files or build scripts found",
      "Could not find a solution, project file or build script to build. \
       Set `AUTOBUILD_BUILD_COMMAND` to tell the autobuilder how to build this repository.",
      Severity::Error,
    )
  }

  pub fn project_cycle(chain: &[String]) -> Self {
    let chain: Vec<String> = chain.iter().map(|p| format!("`{}`", p)).collect();
    Self::new(
      "project-reference-cycle",
      "Cyclic project references",
      format!("The aggregate project references itself: {}.", chain.join(" → ")),
      Severity::Error,
    )
  }

  pub fn unreadable_project(path: &str, reason: &str) -> Self {
    Self::new(
      "unreadable-project",
      "Project file could not be read",
      format!("Could not read `{}`: {}", path, reason),
      Severity::Error,
    )
  }

  pub fn dotnet_incompatible(projects: &[String]) -> Self {
    let listed: Vec<String> = projects.iter().take(5).map(|p| format!("- `{}`", p)).collect();
    let more = projects.len().saturating_sub(listed.len());
    let mut message = format!(
      "{} project file(s) are not SDK-style and cannot be built with `dotnet`; `msbuild` will be used instead:\n{}",
      projects.len(),
      listed.join("\n")
    );
    if more > 0 {
      message.push_str(&format!("\n- and {} more", more));
    }
    Self::new(
      "dotnet-incompatible-projects",
      "Some projects are incompatible with .NET Core",
      message,
      Severity::Warning,
    )
  }

  pub fn missing_developer_environment(version: u32, available: &[u32]) -> Self {
    let available = if available.is_empty() {
      "none".to_string()
    } else {
      available.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
    };
    Self::new(
      "missing-developer-environment",
      "Requested Visual Studio version not found",
      format!(
        "`AUTOBUILD_VSTOOLS_VERSION` requests version {} but it is not installed. Installed versions: {}.",
        version, available
      ),
      Severity::Error,
    )
  }

  pub fn script_failed(script: &str, status: i32) -> Self {
    Self::new(
      "script-failure",
      "Build script failed",
      format!("Running `{}` exited with status {}.", script, status),
      Severity::Error,
    )
  }

  pub fn missing_log(path: &str) -> Self {
    Self::new(
      "missing-extractor-log",
      "Build produced no extractor output",
      format!(
        "The build finished successfully but `{}` was not created. \
         The build commands probably did not compile any source code.",
        path
      ),
      Severity::Error,
    )
  }
}

/// A shared, append-only collection of diagnostics.
///
/// Clones share the same storage so build steps can record messages while the
/// autobuilder keeps a handle for writing them out.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics(Rc<RefCell<Vec<DiagnosticMessage>>>);

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&self, message: DiagnosticMessage) {
    debug!(id = %message.source.id, "recording diagnostic");
    self.0.borrow_mut().push(message);
  }

  pub fn messages(&self) -> Vec<DiagnosticMessage> {
    self.0.borrow().clone()
  }

  pub fn is_empty(&self) -> bool {
    self.0.borrow().is_empty()
  }

  /// Render all messages as JSON lines.
  pub fn to_json_lines(&self) -> Result<String, DiagnosticsError> {
    let mut out = String::new();
    for message in self.0.borrow().iter() {
      out.push_str(&serde_json::to_string(message)?);
      out.push('\n');
    }
    Ok(out)
  }

  /// Write all messages to `<dir>/autobuilder.jsonl`, replacing the file left
  /// by an earlier run. Nothing is written when empty.
  pub fn write_to(&self, actions: &dyn BuildActions, dir: &str) -> Result<(), DiagnosticsError> {
    if self.is_empty() {
      return Ok(());
    }
    let contents = self.to_json_lines()?;
    if let Err(e) = actions.create_directory(dir) {
      warn!(error = %e, "cannot create diagnostics directory");
    }
    let path = actions.path_combine(&[dir, DIAGNOSTICS_FILE]);
    actions.write_all_text(&path, &contents)?;
    Ok(())
  }
}
