//! The decision engine.
//!
//! [`Autobuilder`] looks at a checkout once, picks the first strategy that
//! applies and assembles a single [`BuildScript`] for it:
//!
//! 1. an explicit build command
//! 2. the standalone extractor, in buildless mode
//! 3. an aggregate project at the root
//! 4. the shallowest build script
//! 5. solutions or project files, through `dotnet` when every project is
//!    SDK-style and through `msbuild` otherwise
//!
//! The strategy runs between stale-state cleanup and log validation, so a
//! build that returns zero but extracts nothing still fails.

pub mod discover;
pub mod options;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::actions::BuildActions;
use crate::diagnostics::{DiagnosticMessage, Diagnostics, DiagnosticsError};
use crate::dotnet::{dotnet_build_script, with_dotnet};
use crate::msbuild::msbuild_script;
use crate::project::{GraphError, ProjectFile, expand_aggregate};
use crate::script::{BuildScript, CommandBuilder, EndCallback, FAILURE, SUCCESS, StartCallback};

pub use discover::Checkout;
pub use options::{AutobuildOptions, EXTRACTOR_LOG, OptionsError};

/// How the checkout will be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
  BuildCommand {
    command: String,
  },
  Buildless {
    extractor: String,
  },
  Aggregate {
    project: String,
    /// Leaf projects the aggregate builds.
    members: Vec<String>,
  },
  /// A root aggregate whose references loop back on themselves.
  ProjectCycle {
    project: String,
    chain: Vec<String>,
  },
  UnreadableProject {
    project: String,
    reason: String,
  },
  BuildScript {
    script: String,
  },
  #[serde(rename = "dotnet")]
  DotNet {
    targets: Vec<String>,
  },
  #[serde(rename = "msbuild")]
  MsBuild {
    targets: Vec<String>,
    /// Projects that kept the build off `dotnet`.
    incompatible: Vec<String>,
  },
  NoEntryPoint,
}

impl Strategy {
  pub fn name(&self) -> &'static str {
    match self {
      Strategy::BuildCommand { .. } => "build command",
      Strategy::Buildless { .. } => "buildless",
      Strategy::Aggregate { .. } => "aggregate project",
      Strategy::ProjectCycle { .. } => "project cycle",
      Strategy::UnreadableProject { .. } => "unreadable project",
      Strategy::BuildScript { .. } => "build script",
      Strategy::DotNet { .. } => "dotnet",
      Strategy::MsBuild { .. } => "msbuild",
      Strategy::NoEntryPoint => "no entry point",
    }
  }

  /// Whether the strategy can only fail.
  pub fn is_failure(&self) -> bool {
    matches!(
      self,
      Strategy::ProjectCycle { .. } | Strategy::UnreadableProject { .. } | Strategy::NoEntryPoint
    )
  }
}

pub struct Autobuilder<'a> {
  actions: &'a dyn BuildActions,
  options: AutobuildOptions,
  diagnostics: Diagnostics,
}

impl<'a> Autobuilder<'a> {
  pub fn new(actions: &'a dyn BuildActions, options: AutobuildOptions) -> Self {
    Self {
      actions,
      options,
      diagnostics: Diagnostics::new(),
    }
  }

  pub fn options(&self) -> &AutobuildOptions {
    &self.options
  }

  pub fn diagnostics(&self) -> &Diagnostics {
    &self.diagnostics
  }

  /// Pick the strategy for the checkout. Looks at files only; nothing runs.
  pub fn select_strategy(&self) -> Strategy {
    if let Some(command) = &self.options.build_command {
      return Strategy::BuildCommand {
        command: command.clone(),
      };
    }
    if self.options.buildless {
      return Strategy::Buildless {
        extractor: self.standalone_extractor(),
      };
    }

    let checkout = Checkout::discover(self.actions, &self.options.root);

    if let Some(project) = checkout.root_aggregate() {
      return match expand_aggregate(self.actions, &project) {
        Ok(graph) => Strategy::Aggregate {
          project,
          members: graph.leaves,
        },
        Err(GraphError::Cycle { chain }) => Strategy::ProjectCycle { project, chain },
        Err(GraphError::Unreadable { path, source }) => Strategy::UnreadableProject {
          project: path,
          reason: source.to_string(),
        },
      };
    }

    if let Some(script) = checkout.build_scripts().into_iter().next() {
      return Strategy::BuildScript { script };
    }

    let solutions = checkout.solutions();
    let projects = checkout.projects();
    if solutions.is_empty() && projects.is_empty() {
      return Strategy::NoEntryPoint;
    }

    let incompatible: Vec<String> = projects
      .iter()
      .filter(|path| !self.is_sdk_style(path))
      .cloned()
      .collect();
    let targets = if solutions.is_empty() { projects } else { solutions };

    if incompatible.is_empty() {
      Strategy::DotNet { targets }
    } else {
      Strategy::MsBuild { targets, incompatible }
    }
  }

  fn is_sdk_style(&self, path: &str) -> bool {
    match ProjectFile::load(self.actions, path) {
      Ok(project) => project.sdk_style,
      Err(e) => {
        warn!(path = %path, error = %e, "cannot read project file, assuming msbuild");
        false
      }
    }
  }

  fn standalone_extractor(&self) -> String {
    let exe = if self.actions.is_windows() {
      "standalone-extractor.exe"
    } else {
      "standalone-extractor"
    };
    let root = self.options.extractor_root.as_deref().unwrap_or("");
    self
      .actions
      .path_combine(&[root, "tools", &self.options.platform, exe])
  }

  /// The script for `strategy` alone, without cleanup or validation.
  pub fn build_script(&self, strategy: &Strategy) -> BuildScript {
    let windows = self.actions.is_windows();
    match strategy {
      Strategy::BuildCommand { command } => {
        let root = self.options.root.clone();
        let command = command.clone();
        with_dotnet(self.actions, &self.options, move |dotnet| {
          let builder = CommandBuilder::for_windows(windows).working_directory(root.clone());
          let builder = match &dotnet.env {
            Some(env) => builder.env(env.clone()),
            None => builder,
          };
          builder.run_shell_line(&command).script()
        })
      }
      Strategy::Buildless { extractor } => CommandBuilder::new(self.actions)
        .working_directory(self.options.root.clone())
        .run_command(extractor.clone())
        .script(),
      Strategy::Aggregate { project, .. } => msbuild_script(
        self.actions,
        &self.options,
        &self.diagnostics,
        std::slice::from_ref(project),
      ),
      Strategy::ProjectCycle { chain, .. } => self.report(DiagnosticMessage::project_cycle(chain), FAILURE),
      Strategy::UnreadableProject { project, reason } => {
        self.report(DiagnosticMessage::unreadable_project(project, reason), FAILURE)
      }
      Strategy::BuildScript { script } => self.run_build_script(script),
      Strategy::DotNet { targets } => dotnet_build_script(self.actions, &self.options, targets),
      Strategy::MsBuild { targets, incompatible } => {
        self.report(DiagnosticMessage::dotnet_incompatible(incompatible), SUCCESS)
          & msbuild_script(self.actions, &self.options, &self.diagnostics, targets)
      }
      Strategy::NoEntryPoint => self.report(DiagnosticMessage::no_entry_point(), FAILURE),
    }
  }

  /// A silent step that records `message` and returns `status`.
  fn report(&self, message: DiagnosticMessage, status: i32) -> BuildScript {
    let diagnostics = self.diagnostics.clone();
    BuildScript::from_fn(move |_| {
      diagnostics.push(message.clone());
      status
    })
  }

  fn run_build_script(&self, script: &str) -> BuildScript {
    let windows = self.actions.is_windows();
    let dir = self
      .actions
      .directory_name(script)
      .unwrap_or_else(|| self.options.root.clone());

    let run = CommandBuilder::new(self.actions)
      .working_directory(dir)
      .run_command(script)
      .script();
    let run = if windows {
      run
    } else {
      CommandBuilder::for_windows(false)
        .run_command("/bin/chmod")
        .argument("u+x")
        .path_argument(script)
        .script()
        & run
    };

    let diagnostics = self.diagnostics.clone();
    let script = script.to_string();
    run.then(move |status| {
      if status == SUCCESS {
        return BuildScript::succeed();
      }
      diagnostics.push(DiagnosticMessage::script_failed(&script, status));
      BuildScript::fail()
    })
  }

  /// Best-effort removal of output left behind by an earlier run.
  fn cleanup(&self) -> BuildScript {
    let mut steps = Vec::new();
    if let Some(dir) = &self.options.trap_dir {
      steps.push(BuildScript::attempt(BuildScript::delete_directory(dir.clone(), true)));
    }
    if let Some(dir) = &self.options.source_archive_dir {
      steps.push(BuildScript::attempt(BuildScript::delete_directory(dir.clone(), true)));
    }
    steps.push(BuildScript::attempt(BuildScript::delete_file(
      self.options.extractor_log(self.actions),
    )));
    BuildScript::all(steps)
  }

  /// Fails when the extractor log is missing after an otherwise successful build.
  fn check_log(&self) -> BuildScript {
    let log = self.options.extractor_log(self.actions);
    let diagnostics = self.diagnostics.clone();
    BuildScript::from_fn(move |actions| {
      if actions.file_exists(&log) {
        return SUCCESS;
      }
      error!(log = %log, "build succeeded but the extractor log is missing");
      diagnostics.push(DiagnosticMessage::missing_log(&log));
      FAILURE
    })
  }

  fn selected(&self) -> Strategy {
    let strategy = self.select_strategy();
    info!(strategy = strategy.name(), "selected build strategy");
    strategy
  }

  /// The complete script: cleanup, the selected strategy, then validation.
  pub fn get_build_script(&self) -> BuildScript {
    self.script_for(&self.selected())
  }

  pub fn script_for(&self, strategy: &Strategy) -> BuildScript {
    self.cleanup() & self.build_script(strategy) & self.check_log()
  }

  /// Select, build and validate.
  pub fn run(&self, on_start: StartCallback<'_>, on_end: EndCallback<'_>) -> i32 {
    self.run_strategy(&self.selected(), on_start, on_end)
  }

  /// Build and validate with an already selected strategy. Diagnostics are
  /// written out when a diagnostics directory is configured.
  pub fn run_strategy(&self, strategy: &Strategy, on_start: StartCallback<'_>, on_end: EndCallback<'_>) -> i32 {
    let script = self.script_for(strategy);
    let status = script.run(
      self.actions,
      &mut |command, quiet| {
        if quiet {
          debug!(command = %command, "running");
        } else {
          info!(command = %command, "running");
        }
        on_start(command, quiet);
      },
      &mut |status, command, quiet| {
        if status == SUCCESS {
          debug!(command = %command, "finished");
        } else {
          info!(command = %command, status, "exited with non-zero status");
        }
        on_end(status, command, quiet);
      },
    );

    if let Err(e) = self.write_diagnostics() {
      warn!(error = %e, "cannot write diagnostics");
    }
    if status == SUCCESS {
      info!("autobuild succeeded");
    } else {
      error!(status, "autobuild failed");
    }
    status
  }

  pub fn write_diagnostics(&self) -> Result<(), DiagnosticsError> {
    match &self.options.diagnostic_dir {
      Some(dir) => self.diagnostics.write_to(self.actions, dir),
      None => {
        for message in self.diagnostics.messages() {
          warn!(id = %message.source.id, "{}", message.markdown_message);
        }
        Ok(())
      }
    }
  }
}
