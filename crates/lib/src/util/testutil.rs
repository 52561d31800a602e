//! Test utilities for autobuild-lib.
//!
//! [`TestActions`] is a scripted [`BuildActions`] provider. Tests fill in the
//! answers it should give; it records what it was asked, and panics on any
//! question it was not told how to answer so that an unexpected lookup fails
//! the test loudly.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::actions::{ActionError, BuildActions, EnvOverrides, XmlElement};
use crate::script::BuildScript;

#[derive(Default)]
pub struct TestActions {
  /// Exit status per command line (`cmd` or `cmd args`).
  pub run_process: HashMap<String, i32>,
  /// Captured standard output per command line, lines separated by `\n`.
  pub run_process_out: HashMap<String, String>,
  /// Expected working directory per command line; absent means none expected.
  pub run_process_working_directory: HashMap<String, String>,
  /// Environment overrides received per command line.
  pub run_process_env: RefCell<HashMap<String, EnvOverrides>>,
  pub run_process_in: RefCell<Vec<String>>,

  /// Answers for `file_exists`, by full path or by file name.
  pub file_exists: HashMap<String, bool>,
  pub file_exists_in: RefCell<Vec<String>>,
  pub file_delete_in: RefCell<Vec<String>>,

  pub directory_exists: HashMap<String, bool>,
  pub directory_delete_in: RefCell<Vec<String>>,

  /// Listing per directory, entries relative to it and separated by `\n`.
  pub enumerate_files: HashMap<String, String>,
  pub enumerate_directories: HashMap<String, String>,

  pub create_directories: HashSet<String>,
  pub created_directories: RefCell<Vec<String>>,
  pub download_files: HashSet<(String, String)>,
  pub downloaded_files: RefCell<Vec<(String, String)>>,
  pub written_files: RefCell<Vec<(String, String)>>,

  pub env: HashMap<String, String>,
  pub current_directory: String,
  /// XML source per path.
  pub load_xml: HashMap<String, String>,

  pub is_windows: bool,
  pub is_macos: bool,
  pub is_apple_silicon: bool,
}

impl TestActions {
  fn command_line(cmd: &str, args: &str) -> String {
    if args.is_empty() {
      cmd.to_string()
    } else {
      format!("{} {}", cmd, args)
    }
  }

  fn record_process(&self, cmd: &str, args: &str, working_dir: Option<&str>, env: Option<&EnvOverrides>) -> String {
    let line = Self::command_line(cmd, args);
    self.run_process_in.borrow_mut().push(line.clone());
    if let Some(env) = env {
      self.run_process_env.borrow_mut().insert(line.clone(), env.clone());
    }

    let expected = self.run_process_working_directory.get(&line).map(String::as_str);
    if expected != working_dir {
      panic!(
        "Unexpected working directory for {}: got {:?}, expected {:?}",
        line, working_dir, expected
      );
    }
    line
  }

  fn status_for(&self, line: &str) -> i32 {
    match self.run_process.get(line) {
      Some(status) => *status,
      None => panic!("Missing run_process entry: {}", line),
    }
  }

  fn split_listing(&self, dir: &str, listing: &str) -> Vec<String> {
    listing
      .split('\n')
      .filter(|entry| !entry.is_empty())
      .map(|entry| self.path_combine(&[dir, entry]))
      .collect()
  }
}

impl BuildActions for TestActions {
  fn run_process(&self, cmd: &str, args: &str, working_dir: Option<&str>, env: Option<&EnvOverrides>) -> i32 {
    let line = self.record_process(cmd, args, working_dir, env);
    self.status_for(&line)
  }

  fn run_process_streaming(
    &self,
    cmd: &str,
    args: &str,
    working_dir: Option<&str>,
    env: Option<&EnvOverrides>,
    on_output: &mut dyn FnMut(&str),
  ) -> i32 {
    let line = self.record_process(cmd, args, working_dir, env);
    let Some(output) = self.run_process_out.get(&line) else {
      panic!("Missing run_process_out entry: {}", line);
    };
    let status = self.status_for(&line);
    output.split('\n').for_each(|out| on_output(out));
    status
  }

  fn file_exists(&self, path: &str) -> bool {
    self.file_exists_in.borrow_mut().push(path.to_string());
    if let Some(exists) = self.file_exists.get(path) {
      return *exists;
    }
    match self.file_exists.get(&self.file_name(path)) {
      Some(exists) => *exists,
      None => panic!("Missing file_exists entry: {}", path),
    }
  }

  fn directory_exists(&self, path: &str) -> bool {
    match self.directory_exists.get(path) {
      Some(exists) => *exists,
      None => panic!("Missing directory_exists entry: {}", path),
    }
  }

  fn delete_file(&self, path: &str) -> Result<(), ActionError> {
    self.file_delete_in.borrow_mut().push(path.to_string());
    Ok(())
  }

  fn delete_directory(&self, path: &str, _recursive: bool) -> Result<(), ActionError> {
    self.directory_delete_in.borrow_mut().push(path.to_string());
    Ok(())
  }

  fn enumerate_files(&self, dir: &str) -> Vec<String> {
    match self.enumerate_files.get(dir) {
      Some(listing) => self.split_listing(dir, listing),
      None => panic!("Missing enumerate_files entry: {}", dir),
    }
  }

  fn enumerate_directories(&self, dir: &str) -> Vec<String> {
    match self.enumerate_directories.get(dir) {
      Some(listing) => self.split_listing(dir, listing),
      None => panic!("Missing enumerate_directories entry: {}", dir),
    }
  }

  fn create_directory(&self, path: &str) -> Result<(), ActionError> {
    if !self.create_directories.contains(path) {
      panic!("Missing create_directory entry: {}", path);
    }
    self.created_directories.borrow_mut().push(path.to_string());
    Ok(())
  }

  fn download_file(&self, url: &str, dest: &str) -> Result<(), ActionError> {
    let key = (url.to_string(), dest.to_string());
    if !self.download_files.contains(&key) {
      panic!("Missing download_file entry: {} -> {}", url, dest);
    }
    self.downloaded_files.borrow_mut().push(key);
    Ok(())
  }

  fn write_all_text(&self, path: &str, contents: &str) -> Result<(), ActionError> {
    self
      .written_files
      .borrow_mut()
      .push((path.to_string(), contents.to_string()));
    Ok(())
  }

  fn get_environment_variable(&self, name: &str) -> Option<String> {
    self.env.get(name).cloned()
  }

  fn current_directory(&self) -> String {
    self.current_directory.clone()
  }

  fn load_xml(&self, path: &str) -> Result<XmlElement, ActionError> {
    match self.load_xml.get(path) {
      Some(source) => XmlElement::parse(source).map_err(|e| ActionError::Xml {
        path: path.to_string(),
        message: e.to_string(),
      }),
      None => panic!("Missing load_xml entry: {}", path),
    }
  }

  fn is_windows(&self) -> bool {
    self.is_windows
  }

  fn is_macos(&self) -> bool {
    self.is_macos
  }

  fn is_apple_silicon(&self) -> bool {
    self.is_apple_silicon
  }
}

/// Everything the start and end callbacks saw during one script run.
#[derive(Debug, Default)]
pub struct CallbackLog {
  pub started: Vec<String>,
  pub ended: Vec<(i32, String)>,
}

/// Run `script` against `actions`, recording callback traffic.
pub fn run_script(script: &BuildScript, actions: &TestActions) -> (i32, CallbackLog) {
  let log = RefCell::new(CallbackLog::default());
  let status = script.run(
    actions,
    &mut |display, _quiet| log.borrow_mut().started.push(display.to_string()),
    &mut |status, display, _quiet| log.borrow_mut().ended.push((status, display.to_string())),
  );
  (status, log.into_inner())
}
