//! Autobuild configuration, read once from the environment.

use serde::Serialize;
use thiserror::Error;

use crate::actions::BuildActions;
use crate::platform::os::Os;

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "AUTOBUILD_";

/// File the extractor writes while the build runs; its absence means nothing was extracted.
pub const EXTRACTOR_LOG: &str = "extractor.log";

#[derive(Debug, Error)]
pub enum OptionsError {
  #[error("invalid boolean '{value}' for {name} (expected true/false, yes/no, on/off or 1/0)")]
  InvalidBool { name: String, value: String },

  #[error("invalid number '{value}' for {name}")]
  InvalidNumber { name: String, value: String },
}

/// Everything the decision engine needs to know about the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutobuildOptions {
  /// The checkout being built: the working directory at startup.
  pub root: String,
  pub trap_dir: Option<String>,
  pub source_archive_dir: Option<String>,
  pub diagnostic_dir: Option<String>,
  pub extractor_root: Option<String>,
  pub scratch_dir: String,
  pub log_dir: String,
  pub buildless: bool,
  pub dotnet_version: Option<String>,
  pub build_command: Option<String>,
  pub dotnet_arguments: Option<String>,
  pub msbuild_arguments: Option<String>,
  pub msbuild_target: String,
  pub msbuild_configuration: Option<String>,
  pub msbuild_platform: Option<String>,
  pub vstools_version: Option<u32>,
  pub nuget_restore: bool,
  /// Platform directory of the standalone extractor, e.g. `linux64`.
  pub platform: String,
}

struct Reader<'a> {
  actions: &'a dyn BuildActions,
}

impl Reader<'_> {
  /// A non-empty variable value. Empty values count as unset.
  fn string(&self, name: &str) -> Option<String> {
    self
      .actions
      .get_environment_variable(&format!("{}{}", ENV_PREFIX, name))
      .filter(|value| !value.trim().is_empty())
  }

  /// A value with environment references expanded.
  fn expanded(&self, name: &str) -> Option<String> {
    self.string(name).map(|value| self.actions.expand_env_vars(&value))
  }

  fn bool(&self, name: &str, default: bool) -> Result<bool, OptionsError> {
    match self.string(name) {
      None => Ok(default),
      Some(value) => parse_bool(&value).ok_or_else(|| OptionsError::InvalidBool {
        name: format!("{}{}", ENV_PREFIX, name),
        value,
      }),
    }
  }

  fn number(&self, name: &str) -> Result<Option<u32>, OptionsError> {
    match self.string(name) {
      None => Ok(None),
      Some(value) => value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| OptionsError::InvalidNumber {
          name: format!("{}{}", ENV_PREFIX, name),
          value,
        }),
    }
  }
}

fn parse_bool(value: &str) -> Option<bool> {
  match value.trim().to_ascii_lowercase().as_str() {
    "true" | "1" | "yes" | "on" => Some(true),
    "false" | "0" | "no" | "off" => Some(false),
    _ => None,
  }
}

fn provider_os(actions: &dyn BuildActions) -> Os {
  if actions.is_windows() {
    Os::Windows
  } else if actions.is_macos() {
    Os::MacOs
  } else {
    Os::Linux
  }
}

impl AutobuildOptions {
  /// Read the configuration through the provider's environment lookup.
  pub fn from_actions(actions: &dyn BuildActions) -> Result<Self, OptionsError> {
    let env = Reader { actions };
    Ok(Self {
      root: actions.current_directory(),
      trap_dir: env.string("TRAP_DIR"),
      source_archive_dir: env.string("SOURCE_ARCHIVE_DIR"),
      diagnostic_dir: env.string("DIAGNOSTIC_DIR"),
      extractor_root: env.string("EXTRACTOR_ROOT"),
      scratch_dir: env.string("SCRATCH_DIR").unwrap_or_else(|| ".".to_string()),
      log_dir: env.string("LOG_DIR").unwrap_or_else(|| ".".to_string()),
      buildless: env.bool("BUILDLESS", false)?,
      dotnet_version: env.string("DOTNET_VERSION").map(|v| v.trim().to_string()),
      build_command: env.expanded("BUILD_COMMAND"),
      dotnet_arguments: env.expanded("DOTNET_ARGUMENTS"),
      msbuild_arguments: env.expanded("MSBUILD_ARGUMENTS"),
      msbuild_target: env.string("MSBUILD_TARGET").unwrap_or_else(|| "rebuild".to_string()),
      msbuild_configuration: env.string("MSBUILD_CONFIGURATION"),
      msbuild_platform: env.string("MSBUILD_PLATFORM"),
      vstools_version: env.number("VSTOOLS_VERSION")?,
      nuget_restore: env.bool("NUGET_RESTORE", true)?,
      platform: env
        .string("PLATFORM")
        .unwrap_or_else(|| provider_os(actions).extractor_platform().to_string()),
    })
  }

  /// Where the extractor log is expected after the build.
  pub fn extractor_log(&self, actions: &dyn BuildActions) -> String {
    actions.path_combine(&[&self.log_dir, EXTRACTOR_LOG])
  }
}
