//! Command-line assembly for build steps.
//!
//! On Windows every command goes through `cmd.exe /C` so that `&&`, `CALL` and
//! environment activation scripts behave as they would in a developer prompt.
//! Elsewhere the first fragment is the program and the rest its arguments.

use std::borrow::Cow;

use super::{BuildScript, ProcessSpec};
use crate::actions::{BuildActions, EnvOverrides};

/// Characters `cmd.exe` treats specially and that must be `^`-escaped.
const CMD_SPECIAL: &[char] = &[' ', '(', ')', '%', '!', '^', '"', '<', '>', '&', '|'];

/// Characters that make a POSIX argument string split or expand differently.
const POSIX_SPECIAL: &[char] = &[
  '\'', '"', '$', '`', '!', '*', '?', '[', ']', '{', '}', '(', ')', '<', '>', '|', '&', ';', '#', '~',
];

#[derive(Debug, Clone)]
pub struct CommandBuilder {
  windows: bool,
  fragments: Vec<String>,
  working_directory: Option<String>,
  env: Option<EnvOverrides>,
  quiet: bool,
}

impl CommandBuilder {
  pub fn new(actions: &dyn BuildActions) -> Self {
    Self::for_windows(actions.is_windows())
  }

  pub fn for_windows(windows: bool) -> Self {
    Self {
      windows,
      fragments: Vec::new(),
      working_directory: None,
      env: None,
      quiet: false,
    }
  }

  pub fn working_directory(mut self, dir: impl Into<String>) -> Self {
    self.working_directory = Some(dir.into());
    self
  }

  pub fn env(mut self, env: EnvOverrides) -> Self {
    self.env = Some(env);
    self
  }

  pub fn quiet(mut self) -> Self {
    self.quiet = true;
    self
  }

  /// Activate a batch environment script before the command that follows.
  ///
  /// Only meaningful on Windows; elsewhere the call is ignored. `Platform` is
  /// reset after activation because `vcvars` scripts set it to a value that
  /// confuses `msbuild` solution builds.
  pub fn call_batch_file(mut self, path: &str, args: Option<&str>) -> Self {
    if !self.windows {
      return self;
    }
    self.fragments.push("CALL".to_string());
    self.fragments.push(format!("^\"{}^\"", escape_for_cmd(path)));
    if let Some(args) = args.filter(|a| !a.is_empty()) {
      self.fragments.push(args.to_string());
    }
    self.fragments.push("&& set Platform=&& type NUL &&".to_string());
    self
  }

  /// The program to run.
  pub fn run_command(mut self, exe: impl Into<String>) -> Self {
    self.fragments.push(exe.into());
    self
  }

  /// Append an argument verbatim. Empty arguments are dropped.
  pub fn argument(mut self, arg: impl AsRef<str>) -> Self {
    let arg = arg.as_ref();
    if !arg.is_empty() {
      self.fragments.push(arg.to_string());
    }
    self
  }

  /// Append an argument wrapped in double quotes.
  pub fn quote_argument(self, arg: &str) -> Self {
    self.argument(format!("\"{}\"", arg))
  }

  /// Append a file path as a single argument.
  ///
  /// Off Windows a path with whitespace or shell metacharacters is quoted so
  /// it survives word splitting. Plain paths are appended verbatim.
  pub fn path_argument(self, path: &str) -> Self {
    if self.windows {
      return self.argument(path);
    }
    let quoted = posix_quote(path);
    self.argument(quoted)
  }

  /// Run a free-form command line the way a user would type it.
  ///
  /// Windows already goes through `cmd.exe /C`. Elsewhere the line is handed
  /// to `/bin/sh -c` as one argument.
  pub fn run_shell_line(self, line: &str) -> Self {
    if self.windows {
      return self.run_command(line);
    }
    self.run_command("/bin/sh").argument("-c").argument(shell_words::quote(line))
  }

  pub fn spec(&self) -> ProcessSpec {
    let (command, args) = if self.windows {
      ("cmd.exe".to_string(), format!("/C {}", self.fragments.join(" ")))
    } else {
      match self.fragments.split_first() {
        Some((exe, rest)) => (exe.clone(), rest.join(" ")),
        None => (String::new(), String::new()),
      }
    };
    ProcessSpec {
      command,
      args,
      quiet: self.quiet,
      working_directory: self.working_directory.clone(),
      env: self.env.clone(),
    }
  }

  pub fn script(&self) -> BuildScript {
    BuildScript::from_spec(self.spec())
  }
}

/// Quote `path` for POSIX word splitting when it needs it.
pub fn posix_quote(path: &str) -> Cow<'_, str> {
  if path.chars().any(|c| c.is_whitespace() || POSIX_SPECIAL.contains(&c)) {
    shell_words::quote(path)
  } else {
    Cow::Borrowed(path)
  }
}

fn escape_for_cmd(value: &str) -> String {
  let mut escaped = String::with_capacity(value.len() * 2);
  for c in value.chars() {
    if CMD_SPECIAL.contains(&c) {
      escaped.push('^');
    }
    escaped.push(c);
  }
  escaped
}
