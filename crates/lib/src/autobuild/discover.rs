//! Checkout discovery: one pass over the source tree, classified by file name.

use serde::Serialize;
use tracing::debug;

use crate::actions::BuildActions;
use crate::project::{is_aggregate_project, is_project_file, is_solution_file};

/// Aggregate project preferred when several sit at the root.
const PREFERRED_AGGREGATE: &str = "dirs.proj";

const POSIX_SCRIPTS: [&str; 1] = ["build.sh"];
const WINDOWS_SCRIPTS: [&str; 2] = ["build.bat", "build.cmd"];

/// The files of a checkout, outside hidden directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Checkout {
  pub root: String,
  /// Full paths in provider order.
  pub files: Vec<String>,
  #[serde(skip)]
  windows: bool,
}

impl Checkout {
  pub fn discover(actions: &dyn BuildActions, root: &str) -> Self {
    let hidden: Vec<String> = actions
      .enumerate_directories(root)
      .into_iter()
      .filter(|dir| actions.file_name(dir).starts_with('.'))
      .collect();

    let files: Vec<String> = actions
      .enumerate_files(root)
      .into_iter()
      .filter(|file| !hidden.iter().any(|dir| is_below(file, dir)))
      .collect();

    debug!(root = %root, files = files.len(), hidden = hidden.len(), "discovered checkout");
    Self {
      root: root.to_string(),
      files,
      windows: actions.is_windows(),
    }
  }

  /// Path of `file` relative to the root.
  fn relative<'a>(&self, file: &'a str) -> &'a str {
    file
      .strip_prefix(self.root.as_str())
      .unwrap_or(file)
      .trim_start_matches(['/', '\\'])
  }

  fn depth(&self, file: &str) -> usize {
    self.relative(file).matches(['/', '\\']).count()
  }

  fn file_name<'a>(&self, file: &'a str) -> &'a str {
    file.rsplit(['/', '\\']).next().unwrap_or(file)
  }

  /// The aggregate project directly in the root, preferring `dirs.proj`.
  pub fn root_aggregate(&self) -> Option<String> {
    let at_root: Vec<&String> = self
      .files
      .iter()
      .filter(|file| self.depth(file) == 0 && is_aggregate_project(file))
      .collect();
    at_root
      .iter()
      .find(|file| self.file_name(file).eq_ignore_ascii_case(PREFERRED_AGGREGATE))
      .or_else(|| at_root.first())
      .map(|file| file.to_string())
  }

  /// Build scripts for this OS family, shallowest first, then by path.
  pub fn build_scripts(&self) -> Vec<String> {
    let names: &[&str] = if self.windows { &WINDOWS_SCRIPTS } else { &POSIX_SCRIPTS };
    let mut scripts: Vec<String> = self
      .files
      .iter()
      .filter(|file| {
        let name = self.file_name(file);
        names.iter().any(|script| name.eq_ignore_ascii_case(script))
      })
      .cloned()
      .collect();
    scripts.sort_by(|a, b| self.depth(a).cmp(&self.depth(b)).then_with(|| a.cmp(b)));
    scripts
  }

  /// Solutions in provider order.
  pub fn solutions(&self) -> Vec<String> {
    self.files.iter().filter(|f| is_solution_file(f)).cloned().collect()
  }

  /// Project files in provider order.
  pub fn projects(&self) -> Vec<String> {
    self.files.iter().filter(|f| is_project_file(f)).cloned().collect()
  }
}

fn is_below(file: &str, dir: &str) -> bool {
  file
    .strip_prefix(dir)
    .is_some_and(|rest| rest.starts_with(['/', '\\']))
}
