//! Build scripts: composable descriptions of external build steps.
//!
//! A [`BuildScript`] is assembled up front without touching the system and only
//! does something when [`BuildScript::run`] interprets it against a
//! [`BuildActions`] provider. Scripts compose with `&` (run the right side only
//! if the left succeeded), `|` (run the right side only if the left failed) and
//! [`BuildScript::attempt`] (run, then report success regardless).
//!
//! Callbacks fire exactly once around every process leaf that actually runs.
//! Leaves skipped by short-circuiting fire nothing, and the non-process leaves
//! (`succeed`, `fail`, deletions, [`BuildScript::from_fn`]) are silent.

pub mod command;

use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::actions::{BuildActions, EnvOverrides};

pub use command::CommandBuilder;

/// Status of a step that succeeded.
pub const SUCCESS: i32 = 0;

/// Status of a step that failed without a tool-provided exit code.
pub const FAILURE: i32 = 1;

/// Called before a process leaf starts, with its display string and quiet flag.
pub type StartCallback<'a> = &'a mut dyn FnMut(&str, bool);

/// Called after a process leaf finishes, with its status, display string and quiet flag.
pub type EndCallback<'a> = &'a mut dyn FnMut(i32, &str, bool);

/// A single external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
  pub command: String,
  /// The literal argument string, passed through untouched.
  pub args: String,
  /// Quiet leaves are reported to callbacks with `quiet` set so callers can
  /// keep them out of user-facing output.
  pub quiet: bool,
  pub working_directory: Option<String>,
  pub env: Option<EnvOverrides>,
}

impl ProcessSpec {
  pub fn new(command: impl Into<String>, args: impl Into<String>) -> Self {
    Self {
      command: command.into(),
      args: args.into(),
      quiet: false,
      working_directory: None,
      env: None,
    }
  }

  /// `command`, or `command args` when there are arguments.
  pub fn display(&self) -> String {
    if self.args.is_empty() {
      self.command.clone()
    } else {
      format!("{} {}", self.command, self.args)
    }
  }
}

impl fmt::Display for ProcessSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display())
  }
}

type ActionFn = dyn Fn(&dyn BuildActions) -> i32;
type ContinuationFn = dyn Fn(&[String], i32) -> BuildScript;
type LazyFn = dyn Fn(&dyn BuildActions) -> BuildScript;
type StatusFn = dyn Fn(i32) -> BuildScript;

enum Node {
  Succeed,
  Fail,
  Process(ProcessSpec),
  DeleteFile(String),
  DeleteDirectory { path: String, recursive: bool },
  Action(Box<ActionFn>),
  And(BuildScript, BuildScript),
  Or(BuildScript, BuildScript),
  Try(BuildScript),
  Bind(ProcessSpec, Box<ContinuationFn>),
  Lazy(Box<LazyFn>),
  Then(BuildScript, Box<StatusFn>),
}

/// An immutable, cheaply clonable build script.
#[derive(Clone)]
pub struct BuildScript(Rc<Node>);

impl fmt::Debug for BuildScript {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("BuildScript(..)")
  }
}

impl BuildScript {
  fn node(node: Node) -> Self {
    Self(Rc::new(node))
  }

  /// Always returns [`SUCCESS`].
  pub fn succeed() -> Self {
    Self::node(Node::Succeed)
  }

  /// Always returns [`FAILURE`].
  pub fn fail() -> Self {
    Self::node(Node::Fail)
  }

  /// Run one process.
  pub fn process(
    command: impl Into<String>,
    args: impl Into<String>,
    quiet: bool,
    working_directory: Option<String>,
    env: Option<EnvOverrides>,
  ) -> Self {
    Self::from_spec(ProcessSpec {
      quiet,
      working_directory,
      env,
      ..ProcessSpec::new(command, args)
    })
  }

  pub fn from_spec(spec: ProcessSpec) -> Self {
    Self::node(Node::Process(spec))
  }

  /// Delete `path` if it is an existing file; fail otherwise.
  pub fn delete_file(path: impl Into<String>) -> Self {
    Self::node(Node::DeleteFile(path.into()))
  }

  /// Delete `path` if it is an existing directory; fail otherwise.
  pub fn delete_directory(path: impl Into<String>, recursive: bool) -> Self {
    Self::node(Node::DeleteDirectory {
      path: path.into(),
      recursive,
    })
  }

  /// A silent leaf computed by `f`.
  pub fn from_fn(f: impl Fn(&dyn BuildActions) -> i32 + 'static) -> Self {
    Self::node(Node::Action(Box::new(f)))
  }

  /// Run `spec` capturing its output, then run whatever `then` builds from the
  /// captured lines and exit status.
  pub fn bind(spec: ProcessSpec, then: impl Fn(&[String], i32) -> BuildScript + 'static) -> Self {
    Self::node(Node::Bind(spec, Box::new(then)))
  }

  /// Defer assembly until the script is reached during execution.
  pub fn lazy(f: impl Fn(&dyn BuildActions) -> BuildScript + 'static) -> Self {
    Self::node(Node::Lazy(Box::new(f)))
  }

  /// Run `self`, then whatever `next` builds from its status.
  pub fn then(self, next: impl Fn(i32) -> BuildScript + 'static) -> Self {
    Self::node(Node::Then(self, Box::new(next)))
  }

  /// Run `script` and report success whatever happens.
  pub fn attempt(script: BuildScript) -> Self {
    Self::node(Node::Try(script))
  }

  /// Run `self`, then `next` only if `self` succeeded.
  pub fn and(self, next: BuildScript) -> Self {
    Self::node(Node::And(self, next))
  }

  /// Run `self`, then `other` only if `self` failed.
  pub fn or(self, other: BuildScript) -> Self {
    Self::node(Node::Or(self, other))
  }

  /// Sequence every script with `&`. Empty input succeeds.
  pub fn all(scripts: impl IntoIterator<Item = BuildScript>) -> Self {
    scripts.into_iter().reduce(BuildScript::and).unwrap_or_else(Self::succeed)
  }

  /// Chain every script with `|`. Empty input fails.
  pub fn any(scripts: impl IntoIterator<Item = BuildScript>) -> Self {
    scripts.into_iter().reduce(BuildScript::or).unwrap_or_else(Self::fail)
  }

  /// Execute the script and return its final status.
  pub fn run(&self, actions: &dyn BuildActions, on_start: StartCallback<'_>, on_end: EndCallback<'_>) -> i32 {
    match self.0.as_ref() {
      Node::Succeed => SUCCESS,
      Node::Fail => FAILURE,
      Node::Process(spec) => run_leaf(spec, actions, on_start, on_end),
      Node::DeleteFile(path) => {
        if !actions.file_exists(path) {
          return FAILURE;
        }
        match actions.delete_file(path) {
          Ok(()) => SUCCESS,
          Err(e) => {
            warn!(error = %e, "failed to delete file");
            FAILURE
          }
        }
      }
      Node::DeleteDirectory { path, recursive } => {
        if !actions.directory_exists(path) {
          return FAILURE;
        }
        match actions.delete_directory(path, *recursive) {
          Ok(()) => SUCCESS,
          Err(e) => {
            warn!(error = %e, "failed to delete directory");
            FAILURE
          }
        }
      }
      Node::Action(f) => f(actions),
      Node::And(first, second) => {
        let status = first.run(actions, on_start, on_end);
        if status != SUCCESS {
          return status;
        }
        second.run(actions, on_start, on_end)
      }
      Node::Or(first, second) => {
        if first.run(actions, on_start, on_end) == SUCCESS {
          return SUCCESS;
        }
        second.run(actions, on_start, on_end)
      }
      Node::Try(inner) => {
        let status = inner.run(actions, on_start, on_end);
        if status != SUCCESS {
          debug!(status, "ignoring failure of best-effort step");
        }
        SUCCESS
      }
      Node::Bind(spec, then) => {
        let line = spec.display();
        on_start(&line, spec.quiet);
        let (status, lines) = actions.run_process_capture(
          &spec.command,
          &spec.args,
          spec.working_directory.as_deref(),
          spec.env.as_ref(),
        );
        debug!(command = %line, status, "captured process finished");
        on_end(status, &line, spec.quiet);
        then(&lines, status).run(actions, on_start, on_end)
      }
      Node::Lazy(f) => f(actions).run(actions, on_start, on_end),
      Node::Then(first, next) => {
        let status = first.run(actions, on_start, on_end);
        next(status).run(actions, on_start, on_end)
      }
    }
  }
}

fn run_leaf(spec: &ProcessSpec, actions: &dyn BuildActions, on_start: StartCallback<'_>, on_end: EndCallback<'_>) -> i32 {
  let line = spec.display();
  on_start(&line, spec.quiet);
  let status = actions.run_process(
    &spec.command,
    &spec.args,
    spec.working_directory.as_deref(),
    spec.env.as_ref(),
  );
  debug!(command = %line, status, "process finished");
  on_end(status, &line, spec.quiet);
  status
}

impl BitAnd for BuildScript {
  type Output = BuildScript;

  fn bitand(self, rhs: BuildScript) -> BuildScript {
    self.and(rhs)
  }
}

impl BitOr for BuildScript {
  type Output = BuildScript;

  fn bitor(self, rhs: BuildScript) -> BuildScript {
    self.or(rhs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{TestActions, run_script};
  use std::cell::Cell;
  use tracing_test::traced_test;

  fn abc() -> BuildScript {
    BuildScript::process("abc", "def ghi", false, None, None)
  }

  fn tool() -> BuildScript {
    BuildScript::process("codeql", "", false, None, None)
  }

  #[test]
  fn process_reports_display_and_status() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 1);

    let (status, log) = run_script(&abc(), &actions);

    assert_eq!(status, 1);
    assert_eq!(*actions.run_process_in.borrow(), vec!["abc def ghi"]);
    assert_eq!(log.started, vec!["abc def ghi"]);
    assert_eq!(log.ended, vec![(1, "abc def ghi".to_string())]);
  }

  #[test]
  #[traced_test]
  fn finished_processes_are_logged_with_their_command_line() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 1);
    actions.run_process.insert("codeql".to_string(), 0);

    run_script(&(abc() | tool()), &actions);

    assert!(logs_contain("process finished"));
    assert!(logs_contain("command=abc def ghi"));
    assert!(logs_contain("command=codeql"));
  }

  #[test]
  fn process_passes_working_directory_and_env() {
    let mut actions = TestActions::default();
    actions.run_process.insert("build.sh".to_string(), 0);
    actions
      .run_process_working_directory
      .insert("build.sh".to_string(), "/src".to_string());

    let mut env = EnvOverrides::new();
    env.insert("PATH".to_string(), "/opt/bin".to_string());
    let script = BuildScript::process("build.sh", "", true, Some("/src".to_string()), Some(env.clone()));

    let (status, _) = run_script(&script, &actions);
    assert_eq!(status, 0);
    assert_eq!(actions.run_process_env.borrow().get("build.sh"), Some(&env));
  }

  #[test]
  fn and_stops_after_failure() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 1);

    let (status, log) = run_script(&(abc() & tool()), &actions);

    assert_eq!(status, 1);
    assert_eq!(log.started, vec!["abc def ghi"]);
    assert_eq!(log.ended.len(), 1);
  }

  #[test]
  fn and_runs_both_and_returns_second_status() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 1);
    actions.run_process.insert("codeql".to_string(), 0);

    let (status, log) = run_script(&(tool() & abc()), &actions);

    assert_eq!(status, 1);
    assert_eq!(*actions.run_process_in.borrow(), vec!["codeql", "abc def ghi"]);
    assert_eq!(log.ended, vec![(0, "codeql".to_string()), (1, "abc def ghi".to_string())]);
  }

  #[test]
  fn or_stops_after_success() {
    let mut actions = TestActions::default();
    actions.run_process.insert("codeql".to_string(), 0);

    let (status, log) = run_script(&(tool() | abc()), &actions);

    assert_eq!(status, 0);
    assert_eq!(log.ended, vec![(0, "codeql".to_string())]);
  }

  #[test]
  fn or_falls_back_after_failure() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 1);
    actions.run_process.insert("codeql".to_string(), 0);

    let (status, log) = run_script(&(abc() | tool()), &actions);

    assert_eq!(status, 0);
    assert_eq!(log.started, vec!["abc def ghi", "codeql"]);
  }

  #[test]
  fn or_returns_second_status_when_both_fail() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 1);
    actions.run_process.insert("codeql".to_string(), 7);

    let (status, _) = run_script(&(abc() | tool()), &actions);
    assert_eq!(status, 7);
  }

  #[test]
  fn constants_fire_no_callbacks() {
    let actions = TestActions::default();

    let (status, log) = run_script(&BuildScript::succeed(), &actions);
    assert_eq!(status, SUCCESS);
    assert!(log.started.is_empty() && log.ended.is_empty());

    let (status, log) = run_script(&BuildScript::fail(), &actions);
    assert_ne!(status, SUCCESS);
    assert!(log.started.is_empty() && log.ended.is_empty());
  }

  #[test]
  fn attempt_always_succeeds() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 3);

    assert_eq!(run_script(&BuildScript::attempt(BuildScript::fail()), &actions).0, 0);

    let (status, log) = run_script(&BuildScript::attempt(abc()), &actions);
    assert_eq!(status, 0);
    assert_eq!(log.ended, vec![(3, "abc def ghi".to_string())]);
  }

  #[test]
  fn delete_file_existing() {
    let mut actions = TestActions::default();
    actions.file_exists.insert("extractor.log".to_string(), true);

    let (status, log) = run_script(&BuildScript::delete_file("extractor.log"), &actions);

    assert_eq!(status, 0);
    assert_eq!(*actions.file_exists_in.borrow(), vec!["extractor.log"]);
    assert_eq!(*actions.file_delete_in.borrow(), vec!["extractor.log"]);
    assert!(log.started.is_empty());
  }

  #[test]
  fn delete_file_missing() {
    let mut actions = TestActions::default();
    actions.file_exists.insert("extractor.log".to_string(), false);

    let (status, _) = run_script(&BuildScript::delete_file("extractor.log"), &actions);

    assert_ne!(status, 0);
    assert_eq!(*actions.file_exists_in.borrow(), vec!["extractor.log"]);
    assert!(actions.file_delete_in.borrow().is_empty());
  }

  #[test]
  fn delete_directory_existing_and_missing() {
    let mut actions = TestActions::default();
    actions.directory_exists.insert("trap".to_string(), true);
    actions.directory_exists.insert("gone".to_string(), false);

    assert_eq!(run_script(&BuildScript::delete_directory("trap", true), &actions).0, 0);
    assert_ne!(run_script(&BuildScript::delete_directory("gone", true), &actions).0, 0);
    assert_eq!(*actions.directory_delete_in.borrow(), vec!["trap"]);
  }

  #[test]
  fn bind_feeds_captured_output_to_continuation() {
    let mut actions = TestActions::default();
    actions.run_process.insert("dotnet --list-sdks".to_string(), 0);
    actions
      .run_process_out
      .insert("dotnet --list-sdks".to_string(), "2.1.3 [/sdk]\n2.1.4 [/sdk]".to_string());
    actions.run_process.insert("codeql".to_string(), 0);

    let script = BuildScript::bind(ProcessSpec::new("dotnet", "--list-sdks"), |lines, status| {
      if status == SUCCESS && lines.len() == 2 {
        BuildScript::process("codeql", "", false, None, None)
      } else {
        BuildScript::fail()
      }
    });

    let (status, log) = run_script(&script, &actions);
    assert_eq!(status, 0);
    assert_eq!(log.started, vec!["dotnet --list-sdks", "codeql"]);
  }

  #[test]
  fn lazy_is_only_assembled_when_reached() {
    let actions = TestActions::default();
    let built = Rc::new(Cell::new(0));

    let counter = built.clone();
    let deferred = BuildScript::lazy(move |_| {
      counter.set(counter.get() + 1);
      BuildScript::succeed()
    });

    assert_eq!(run_script(&(BuildScript::succeed() | deferred.clone()), &actions).0, 0);
    assert_eq!(built.get(), 0);

    assert_eq!(run_script(&(BuildScript::fail() | deferred), &actions).0, 0);
    assert_eq!(built.get(), 1);
  }

  #[test]
  fn then_receives_the_status() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 5);
    actions.run_process.insert("codeql".to_string(), 0);

    let script = abc().then(|status| if status == 5 { tool() } else { BuildScript::fail() });
    let (status, log) = run_script(&script, &actions);

    assert_eq!(status, 0);
    assert_eq!(log.started, vec!["abc def ghi", "codeql"]);
  }

  #[test]
  fn from_fn_sees_the_provider() {
    let mut actions = TestActions::default();
    actions.is_windows = true;

    let script = BuildScript::from_fn(|actions| if actions.is_windows() { SUCCESS } else { FAILURE });
    let (status, log) = run_script(&script, &actions);
    assert_eq!(status, 0);
    assert!(log.started.is_empty());
  }

  #[test]
  fn all_and_any_fold_in_order() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 1);
    actions.run_process.insert("codeql".to_string(), 0);

    assert_eq!(run_script(&BuildScript::all([]), &actions).0, SUCCESS);
    assert_eq!(run_script(&BuildScript::any([]), &actions).0, FAILURE);

    let (status, log) = run_script(&BuildScript::all([tool(), abc(), tool()]), &actions);
    assert_eq!(status, 1);
    assert_eq!(log.started, vec!["codeql", "abc def ghi"]);

    let (status, log) = run_script(&BuildScript::any([abc(), tool(), abc()]), &actions);
    assert_eq!(status, 0);
    assert_eq!(log.started, vec!["abc def ghi", "codeql"]);
  }

  #[test]
  fn running_twice_is_deterministic() {
    let mut actions = TestActions::default();
    actions.run_process.insert("abc def ghi".to_string(), 1);
    actions.run_process.insert("codeql".to_string(), 0);
    let script = (abc() | tool()) & BuildScript::attempt(abc());

    let (first_status, first) = run_script(&script, &actions);
    let (second_status, second) = run_script(&script, &actions);

    assert_eq!(first_status, second_status);
    assert_eq!(first.started, second.started);
    assert_eq!(first.ended, second.ended);
  }
}
