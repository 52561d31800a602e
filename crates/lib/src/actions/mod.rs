//! The action provider: every side effect the autobuilder performs.
//!
//! The decision engine and the build script interpreter never touch the
//! operating system directly. They go through [`BuildActions`], which lets the
//! whole pipeline run against [`SystemActions`] in production and against a
//! recording fake in tests.
//!
//! Paths are plain strings rather than [`std::path::Path`] values: the provider
//! decides the separator (see [`BuildActions::is_windows`]), so a Windows
//! checkout can be reasoned about on any host.

pub mod system;
pub mod xml;

use std::collections::BTreeMap;

use thiserror::Error;

pub use system::SystemActions;
pub use xml::XmlElement;

/// Environment variable overrides applied on top of the inherited environment.
pub type EnvOverrides = BTreeMap<String, String>;

/// Errors reported by provider operations that can fail.
#[derive(Debug, Error)]
pub enum ActionError {
  /// A filesystem operation failed.
  #[error("io error at {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  /// Downloading a file failed.
  #[error("download failed for {url}: {message}")]
  Download { url: String, message: String },

  /// A file could not be parsed as XML.
  #[error("invalid xml in {path}: {message}")]
  Xml { path: String, message: String },
}

/// Capability interface over process execution, filesystem, environment,
/// network, XML loading and platform queries.
///
/// Process operations return the tool's exit status verbatim. A process that
/// cannot be started at all is reported as a non-zero status, never as a panic.
pub trait BuildActions {
  /// Run `cmd` with `args` and wait for it to finish.
  fn run_process(&self, cmd: &str, args: &str, working_dir: Option<&str>, env: Option<&EnvOverrides>) -> i32;

  /// Run `cmd` with `args`, delivering each line of standard output as it is produced.
  fn run_process_streaming(
    &self,
    cmd: &str,
    args: &str,
    working_dir: Option<&str>,
    env: Option<&EnvOverrides>,
    on_output: &mut dyn FnMut(&str),
  ) -> i32;

  /// Run `cmd` with `args` and collect its standard output lines.
  fn run_process_capture(
    &self,
    cmd: &str,
    args: &str,
    working_dir: Option<&str>,
    env: Option<&EnvOverrides>,
  ) -> (i32, Vec<String>) {
    let mut lines = Vec::new();
    let status = self.run_process_streaming(cmd, args, working_dir, env, &mut |line| {
      lines.push(line.to_string())
    });
    (status, lines)
  }

  fn file_exists(&self, path: &str) -> bool;

  fn directory_exists(&self, path: &str) -> bool;

  /// Delete a file. Callers confirm existence first.
  fn delete_file(&self, path: &str) -> Result<(), ActionError>;

  /// Delete a directory. Callers confirm existence first.
  fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), ActionError>;

  /// All files below `dir`, recursively, as full paths.
  fn enumerate_files(&self, dir: &str) -> Vec<String>;

  /// All directories below `dir`, recursively, as full paths. `dir` itself is not included.
  fn enumerate_directories(&self, dir: &str) -> Vec<String>;

  /// Create a directory and any missing parents. Succeeds if it already exists.
  fn create_directory(&self, path: &str) -> Result<(), ActionError>;

  fn download_file(&self, url: &str, dest: &str) -> Result<(), ActionError>;

  fn write_all_text(&self, path: &str, contents: &str) -> Result<(), ActionError>;

  fn get_environment_variable(&self, name: &str) -> Option<String>;

  fn current_directory(&self) -> String;

  fn load_xml(&self, path: &str) -> Result<XmlElement, ActionError>;

  fn is_windows(&self) -> bool;

  fn is_macos(&self) -> bool;

  fn is_apple_silicon(&self) -> bool;

  /// The directory separator for this provider's OS family.
  fn path_separator(&self) -> char {
    if self.is_windows() { '\\' } else { '/' }
  }

  /// Join path fragments with the provider's separator.
  ///
  /// Blank fragments are skipped and an absolute fragment discards everything
  /// before it, mirroring how the OS would resolve the joined path.
  fn path_combine(&self, parts: &[&str]) -> String {
    let separator = self.path_separator();
    let mut combined = String::new();
    for part in parts.iter().filter(|p| !p.trim().is_empty()) {
      if is_absolute(part) {
        combined.clear();
      } else if !combined.is_empty() && !combined.ends_with(['/', '\\']) {
        combined.push(separator);
      }
      combined.push_str(part);
    }
    combined
  }

  /// The last component of `path`, accepting either separator.
  fn file_name(&self, path: &str) -> String {
    path.rsplit(['/', '\\']).next().unwrap_or(path).to_string()
  }

  /// Everything before the last separator of `path`, or `None` for a bare name.
  fn directory_name(&self, path: &str) -> Option<String> {
    path.rfind(['/', '\\']).map(|index| path[..index].to_string())
  }

  /// Expand environment references using this provider's lookups.
  ///
  /// Windows expands `%NAME%` and leaves unknown names untouched, as `cmd.exe`
  /// does. POSIX expands `$NAME` and `${NAME}`, substituting an empty string
  /// for unknown names, as `sh` does.
  fn expand_env_vars(&self, value: &str) -> String {
    if self.is_windows() {
      expand_windows(value, |name| self.get_environment_variable(name))
    } else {
      expand_posix(value, |name| self.get_environment_variable(name))
    }
  }
}

fn is_absolute(path: &str) -> bool {
  let bytes = path.as_bytes();
  path.starts_with(['/', '\\']) || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

fn expand_windows(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
  let mut result = String::with_capacity(value.len());
  let mut rest = value;
  while let Some(start) = rest.find('%') {
    let after = &rest[start + 1..];
    let Some(end) = after.find('%') else {
      break;
    };
    result.push_str(&rest[..start]);
    let name = &after[..end];
    match lookup(name).filter(|_| !name.is_empty()) {
      Some(expanded) => {
        result.push_str(&expanded);
        rest = &after[end + 1..];
      }
      None => {
        // Leave the opening `%` in place; the closing one may start a real reference.
        result.push('%');
        result.push_str(name);
        rest = &after[end..];
      }
    }
  }
  result.push_str(rest);
  result
}

fn expand_posix(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
  let is_name_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
  let mut result = String::with_capacity(value.len());
  let mut rest = value;
  while let Some(start) = rest.find('$') {
    result.push_str(&rest[..start]);
    let after = &rest[start + 1..];
    if let Some(braced) = after.strip_prefix('{')
      && let Some(end) = braced.find('}')
    {
      result.push_str(&lookup(&braced[..end]).unwrap_or_default());
      rest = &braced[end + 1..];
      continue;
    }
    let end = after.find(|c: char| !is_name_char(c)).unwrap_or(after.len());
    if end == 0 {
      result.push('$');
    } else {
      result.push_str(&lookup(&after[..end]).unwrap_or_default());
    }
    rest = &after[end..];
  }
  result.push_str(rest);
  result
}
