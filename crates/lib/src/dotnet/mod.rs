//! Managed SDK resolution and the `dotnet` build rule.
//!
//! When a specific SDK version is required, the installed SDKs are listed at
//! execution time. A missing version is installed into `<scratch>/.dotnet` with
//! the official install script and every later command uses that local copy.

use tracing::{info, warn};

use crate::actions::{BuildActions, EnvOverrides};
use crate::autobuild::AutobuildOptions;
use crate::script::{BuildScript, CommandBuilder, FAILURE, SUCCESS};

pub const INSTALL_SCRIPT_URL: &str = "https://dot.net/v1/dotnet-install.sh";
pub const INSTALL_POWERSHELL_URL: &str = "https://dot.net/v1/dotnet-install.ps1";

/// Versions from `dotnet --list-sdks` output, one `<version> [<path>]` per line.
pub fn parse_installed_sdks(lines: &[String]) -> Vec<String> {
  lines
    .iter()
    .filter_map(|line| line.split_whitespace().next())
    .map(str::to_string)
    .collect()
}

/// The SDKs the system `dotnet` reports, empty if it cannot be run.
pub fn installed_sdks(actions: &dyn BuildActions) -> Vec<String> {
  let spec = list_sdks(actions.is_windows()).spec();
  let (status, lines) = actions.run_process_capture(&spec.command, &spec.args, None, None);
  if status != SUCCESS {
    return Vec::new();
  }
  parse_installed_sdks(&lines)
}

fn list_sdks(windows: bool) -> CommandBuilder {
  CommandBuilder::for_windows(windows)
    .quiet()
    .run_command("dotnet")
    .argument("--list-sdks")
}

/// How to invoke `dotnet` for the rest of the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotNetEnvironment {
  pub executable: String,
  pub env: Option<EnvOverrides>,
}

impl DotNetEnvironment {
  pub fn system() -> Self {
    Self {
      executable: "dotnet".to_string(),
      env: None,
    }
  }

  /// A command builder that runs this `dotnet` with its environment.
  pub fn command(&self, windows: bool) -> CommandBuilder {
    let builder = CommandBuilder::for_windows(windows);
    let builder = match &self.env {
      Some(env) => builder.env(env.clone()),
      None => builder,
    };
    builder.run_command(self.executable.clone())
  }
}

/// Run `build` with the required SDK available.
///
/// Without a configured version `build` runs against the system `dotnet`
/// straight away. Otherwise the decision between the system copy and a local
/// install is taken when the script runs.
pub fn with_dotnet(
  actions: &dyn BuildActions,
  options: &AutobuildOptions,
  build: impl Fn(&DotNetEnvironment) -> BuildScript + 'static,
) -> BuildScript {
  let Some(version) = options.dotnet_version.clone() else {
    return build(&DotNetEnvironment::system());
  };

  let windows = actions.is_windows();
  let install_dir = actions.path_combine(&[&options.scratch_dir, ".dotnet"]);
  let installer = install_script(actions, &version, &install_dir);
  let local = local_environment(actions, &install_dir);

  BuildScript::bind(list_sdks(windows).spec(), move |lines, status| {
    if status == SUCCESS && parse_installed_sdks(lines).contains(&version) {
      info!(version = %version, "required dotnet SDK is installed");
      return build(&DotNetEnvironment::system());
    }
    info!(version = %version, dir = %local.executable, "installing dotnet SDK");
    installer.clone() & build(&local)
  })
}

fn local_environment(actions: &dyn BuildActions, install_dir: &str) -> DotNetEnvironment {
  let list_separator = if actions.is_windows() { ';' } else { ':' };
  let path = match actions.get_environment_variable("PATH") {
    Some(path) if !path.is_empty() => format!("{}{}{}", install_dir, list_separator, path),
    _ => install_dir.to_string(),
  };

  let mut env = EnvOverrides::new();
  env.insert("DOTNET_MULTILEVEL_LOOKUP".to_string(), "false".to_string());
  env.insert("DOTNET_SKIP_FIRST_TIME_EXPERIENCE".to_string(), "true".to_string());
  env.insert("PATH".to_string(), path);

  DotNetEnvironment {
    executable: actions.path_combine(&[install_dir, "dotnet"]),
    env: Some(env),
  }
}

fn install_script(actions: &dyn BuildActions, version: &str, install_dir: &str) -> BuildScript {
  if actions.is_windows() {
    let snippet = format!(
      "[Net.ServicePointManager]::SecurityProtocol = [Net.SecurityProtocolType]::Tls12; \
       &([scriptblock]::Create((Invoke-WebRequest -UseBasicParsing '{}'))) -Version {} -InstallDir {}",
      INSTALL_POWERSHELL_URL, version, install_dir
    );
    let shell = |exe: &str| {
      CommandBuilder::for_windows(true)
        .run_command(exe)
        .argument("-NoProfile -ExecutionPolicy unrestricted -Command")
        .quote_argument(&snippet)
        .script()
    };
    return shell("pwsh") | shell("powershell");
  }

  let script_path = actions.path_combine(&[install_dir, "dotnet-install.sh"]);
  let dir = install_dir.to_string();
  let create = BuildScript::from_fn(move |actions| match actions.create_directory(&dir) {
    Ok(()) => SUCCESS,
    Err(e) => {
      warn!(error = %e, "cannot create SDK install directory");
      FAILURE
    }
  });
  let dest = script_path.clone();
  let download = BuildScript::from_fn(move |actions| match actions.download_file(INSTALL_SCRIPT_URL, &dest) {
    Ok(()) => SUCCESS,
    Err(e) => {
      warn!(error = %e, "cannot download SDK install script");
      FAILURE
    }
  });
  let chmod = CommandBuilder::for_windows(false)
    .run_command("chmod")
    .argument("u+x")
    .path_argument(&script_path)
    .script();
  let install = CommandBuilder::for_windows(false)
    .run_command(script_path)
    .argument(format!("--channel release --version {} --install-dir", version))
    .path_argument(install_dir)
    .script();
  create & download & chmod & install
}

/// Clean, restore and build every target with `dotnet`.
///
/// Clean is best effort; a failed restore stops that target's build.
pub fn dotnet_build_script(actions: &dyn BuildActions, options: &AutobuildOptions, targets: &[String]) -> BuildScript {
  let windows = actions.is_windows();
  let targets = targets.to_vec();
  let extra = options.dotnet_arguments.clone().unwrap_or_default();

  with_dotnet(actions, options, move |dotnet| {
    BuildScript::all(targets.iter().map(|target| {
      let clean = dotnet.command(windows).argument("clean").path_argument(target).script();
      let restore = dotnet.command(windows).argument("restore").path_argument(target).script();
      let build = dotnet
        .command(windows)
        .argument("build --no-incremental")
        .path_argument(target)
        .argument(&extra)
        .script();
      BuildScript::attempt(clean) & restore & build
    }))
  })
}
