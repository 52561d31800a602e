//! [`BuildActions`] backed by the real operating system.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{ActionError, BuildActions, EnvOverrides, XmlElement};
use crate::platform::Platform;
use crate::platform::os::Os;

/// Status reported when a process cannot be started at all.
const SPAWN_FAILURE: i32 = 127;

/// The production action provider.
#[derive(Debug, Clone)]
pub struct SystemActions {
  platform: Option<Platform>,
}

impl SystemActions {
  pub fn new() -> Self {
    Self {
      platform: Platform::current(),
    }
  }

  /// The detected host platform, if supported.
  pub fn platform(&self) -> Option<Platform> {
    self.platform
  }

  fn os(&self) -> Option<Os> {
    self.platform.map(|p| p.os)
  }

  /// Build the OS command for `cmd args`.
  ///
  /// `cmd` is always the program itself. Arguments arrive as one literal
  /// string: Windows hands it to the program untouched, POSIX splits it into
  /// words with shell quoting rules but without a shell.
  fn command(
    &self,
    cmd: &str,
    args: &str,
    working_dir: Option<&str>,
    env: Option<&EnvOverrides>,
  ) -> Option<Command> {
    let mut command = match program_command(cmd, args) {
      Ok(command) => command,
      Err(e) => {
        warn!(cmd = %cmd, args = %args, error = %e, "cannot split arguments");
        return None;
      }
    };
    if let Some(dir) = working_dir {
      command.current_dir(dir);
    }
    if let Some(env) = env {
      command.envs(env);
    }
    Some(command)
  }
}

impl Default for SystemActions {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(windows)]
fn program_command(cmd: &str, args: &str) -> Result<Command, shell_words::ParseError> {
  use std::os::windows::process::CommandExt;

  let mut command = Command::new(cmd);
  if !args.is_empty() {
    command.raw_arg(args);
  }
  Ok(command)
}

#[cfg(not(windows))]
fn program_command(cmd: &str, args: &str) -> Result<Command, shell_words::ParseError> {
  let mut command = Command::new(cmd);
  command.args(shell_words::split(args)?);
  Ok(command)
}

fn io_error(path: &str) -> impl FnOnce(std::io::Error) -> ActionError + '_ {
  move |source| ActionError::Io {
    path: path.to_string(),
    source,
  }
}

impl BuildActions for SystemActions {
  fn run_process(&self, cmd: &str, args: &str, working_dir: Option<&str>, env: Option<&EnvOverrides>) -> i32 {
    debug!(cmd = %cmd, args = %args, working_dir = ?working_dir, "spawning process");
    let Some(mut command) = self.command(cmd, args, working_dir, env) else {
      return SPAWN_FAILURE;
    };
    match command.status() {
      Ok(status) => status.code().unwrap_or(1),
      Err(e) => {
        warn!(cmd = %cmd, error = %e, "failed to start process");
        SPAWN_FAILURE
      }
    }
  }

  fn run_process_streaming(
    &self,
    cmd: &str,
    args: &str,
    working_dir: Option<&str>,
    env: Option<&EnvOverrides>,
    on_output: &mut dyn FnMut(&str),
  ) -> i32 {
    debug!(cmd = %cmd, args = %args, working_dir = ?working_dir, "spawning process with captured output");
    let Some(mut command) = self.command(cmd, args, working_dir, env) else {
      return SPAWN_FAILURE;
    };
    let mut child = match command.stdout(Stdio::piped()).spawn() {
      Ok(child) => child,
      Err(e) => {
        warn!(cmd = %cmd, error = %e, "failed to start process");
        return SPAWN_FAILURE;
      }
    };

    if let Some(stdout) = child.stdout.take() {
      for line in BufReader::new(stdout).lines() {
        match line {
          Ok(line) => on_output(line.trim_end_matches('\r')),
          Err(e) => {
            debug!(error = %e, "stopped reading process output");
            break;
          }
        }
      }
    }

    match child.wait() {
      Ok(status) => status.code().unwrap_or(1),
      Err(e) => {
        warn!(cmd = %cmd, error = %e, "failed to wait for process");
        1
      }
    }
  }

  fn file_exists(&self, path: &str) -> bool {
    Path::new(path).is_file()
  }

  fn directory_exists(&self, path: &str) -> bool {
    Path::new(path).is_dir()
  }

  fn delete_file(&self, path: &str) -> Result<(), ActionError> {
    fs::remove_file(path).map_err(io_error(path))
  }

  fn delete_directory(&self, path: &str, recursive: bool) -> Result<(), ActionError> {
    if recursive {
      fs::remove_dir_all(path).map_err(io_error(path))
    } else {
      fs::remove_dir(path).map_err(io_error(path))
    }
  }

  fn enumerate_files(&self, dir: &str) -> Vec<String> {
    walk(dir, |entry| entry.file_type().is_file())
  }

  fn enumerate_directories(&self, dir: &str) -> Vec<String> {
    walk(dir, |entry| entry.file_type().is_dir())
  }

  fn create_directory(&self, path: &str) -> Result<(), ActionError> {
    fs::create_dir_all(path).map_err(io_error(path))
  }

  fn download_file(&self, url: &str, dest: &str) -> Result<(), ActionError> {
    info!(url = %url, dest = %dest, "downloading");

    let download_error = |message: String| ActionError::Download {
      url: url.to_string(),
      message,
    };

    let response = reqwest::blocking::get(url).map_err(|e| download_error(e.to_string()))?;
    if !response.status().is_success() {
      return Err(download_error(format!("HTTP {}", response.status())));
    }
    let bytes = response.bytes().map_err(|e| download_error(e.to_string()))?;
    fs::write(dest, &bytes).map_err(io_error(dest))?;

    debug!(dest = %dest, size = bytes.len(), "download complete");
    Ok(())
  }

  fn write_all_text(&self, path: &str, contents: &str) -> Result<(), ActionError> {
    fs::write(path, contents).map_err(io_error(path))
  }

  fn get_environment_variable(&self, name: &str) -> Option<String> {
    std::env::var(name).ok()
  }

  fn current_directory(&self) -> String {
    match std::env::current_dir() {
      Ok(dir) => dunce::simplified(&dir).to_string_lossy().into_owned(),
      Err(e) => {
        warn!(error = %e, "cannot determine current directory, using '.'");
        ".".to_string()
      }
    }
  }

  fn load_xml(&self, path: &str) -> Result<XmlElement, ActionError> {
    let source = fs::read_to_string(path).map_err(io_error(path))?;
    XmlElement::parse(&source).map_err(|e| ActionError::Xml {
      path: path.to_string(),
      message: e.to_string(),
    })
  }

  fn is_windows(&self) -> bool {
    self.os() == Some(Os::Windows)
  }

  fn is_macos(&self) -> bool {
    self.os() == Some(Os::MacOs)
  }

  fn is_apple_silicon(&self) -> bool {
    self.platform.is_some_and(|p| p.is_apple_silicon())
  }
}

/// Recursive listing below `dir` (excluding `dir`), sorted by file name for
/// a stable order across filesystems.
fn walk(dir: &str, keep: impl Fn(&walkdir::DirEntry) -> bool) -> Vec<String> {
  WalkDir::new(dir)
    .min_depth(1)
    .sort_by_file_name()
    .into_iter()
    .filter_map(|entry| match entry {
      Ok(entry) => Some(entry),
      Err(e) => {
        debug!(error = %e, "skipping unreadable entry");
        None
      }
    })
    .filter(|entry| keep(entry))
    .map(|entry| entry.path().to_string_lossy().into_owned())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
  }

  #[test]
  fn enumerate_is_recursive_and_excludes_root() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("a/b")).unwrap();
    fs::write(temp.path().join("top.txt"), "").unwrap();
    fs::write(temp.path().join("a/b/deep.txt"), "").unwrap();

    let actions = SystemActions::new();
    let root = path_str(temp.path());

    let files = actions.enumerate_files(&root);
    assert_eq!(files.len(), 2);
    assert!(files.contains(&path_str(&temp.path().join("a/b/deep.txt"))));

    let dirs = actions.enumerate_directories(&root);
    assert_eq!(dirs, vec![path_str(&temp.path().join("a")), path_str(&temp.path().join("a/b"))]);
  }

  #[test]
  fn file_lifecycle() {
    let temp = TempDir::new().unwrap();
    let actions = SystemActions::new();
    let dir = path_str(&temp.path().join("x/y"));
    let file = path_str(&temp.path().join("x/y/file.txt"));

    actions.create_directory(&dir).unwrap();
    actions.create_directory(&dir).unwrap();
    assert!(actions.directory_exists(&dir));

    actions.write_all_text(&file, "hello").unwrap();
    assert!(actions.file_exists(&file));
    assert!(!actions.directory_exists(&file));

    actions.delete_file(&file).unwrap();
    assert!(!actions.file_exists(&file));

    actions.delete_directory(&path_str(&temp.path().join("x")), true).unwrap();
    assert!(!actions.directory_exists(&dir));
  }

  #[test]
  fn delete_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let actions = SystemActions::new();
    let missing = path_str(&temp.path().join("missing"));
    assert!(matches!(actions.delete_file(&missing), Err(ActionError::Io { .. })));
  }

  #[test]
  fn load_xml_reports_parse_errors() {
    let temp = TempDir::new().unwrap();
    let actions = SystemActions::new();
    let good = path_str(&temp.path().join("good.csproj"));
    let bad = path_str(&temp.path().join("bad.csproj"));
    fs::write(&good, r#"<Project Sdk="Microsoft.NET.Sdk"></Project>"#).unwrap();
    fs::write(&bad, "<Project>").unwrap();

    assert_eq!(actions.load_xml(&good).unwrap().attribute("Sdk"), Some("Microsoft.NET.Sdk"));
    assert!(matches!(actions.load_xml(&bad), Err(ActionError::Xml { .. })));
  }

  #[test]
  #[cfg(unix)]
  fn run_process_reports_exit_status_and_output() {
    let temp = TempDir::new().unwrap();
    let actions = SystemActions::new();
    let dir = path_str(temp.path());

    assert_eq!(actions.run_process("/bin/sh", "-c 'exit 3'", None, None), 3);

    let mut env = EnvOverrides::new();
    env.insert("GREETING".to_string(), "hello".to_string());
    let (status, lines) =
      actions.run_process_capture("/bin/sh", "-c 'echo \"$GREETING\" && pwd'", Some(&dir), Some(&env));
    assert_eq!(status, 0);
    assert_eq!(lines[0], "hello");
    assert_eq!(
      dunce::canonicalize(&lines[1]).unwrap(),
      dunce::canonicalize(temp.path()).unwrap()
    );
  }

  #[test]
  #[cfg(unix)]
  fn program_path_with_spaces_runs_directly() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let checkout = temp.path().join("my checkout");
    fs::create_dir_all(&checkout).unwrap();
    let script = checkout.join("build.sh");
    fs::write(&script, "#!/bin/sh\nprintf '%s\\n' \"$@\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let actions = SystemActions::new();
    let (status, lines) = actions.run_process_capture(
      &path_str(&script),
      "first \"second arg\" '$HOME'",
      Some(&path_str(&checkout)),
      None,
    );
    assert_eq!(status, 0);
    assert_eq!(lines, vec!["first", "second arg", "$HOME"]);
  }

  #[test]
  #[cfg(unix)]
  fn unbalanced_quotes_are_a_failure_status() {
    let actions = SystemActions::new();
    assert_ne!(actions.run_process("/bin/echo", "\"unterminated", None, None), 0);
  }

  #[test]
  #[cfg(unix)]
  fn missing_program_is_a_failure_status() {
    let actions = SystemActions::new();
    assert_ne!(actions.run_process("/definitely/not/a/program", "", None, None), 0);
  }

  #[test]
  fn platform_queries_match_host() {
    let actions = SystemActions::new();
    assert_eq!(actions.is_windows(), cfg!(windows));
    assert_eq!(actions.is_macos(), cfg!(target_os = "macos"));
  }
}
