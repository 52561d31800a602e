//! Project-file inspection.
//!
//! Only two facts are read from a project file: whether it uses the SDK-style
//! format that `dotnet` can build, and which other project files it references.

pub mod graph;

use tracing::debug;

use crate::actions::{ActionError, BuildActions, XmlElement};

pub use graph::{GraphError, ProjectGraph, expand_aggregate};

/// Item names whose `Include` attribute lists other project files.
const REFERENCE_ITEMS: [&str; 3] = ["ProjectFile", "ProjectFiles", "ProjectReference"];

fn has_extension(path: &str, extensions: &[&str]) -> bool {
  let lower = path.to_ascii_lowercase();
  extensions.iter().any(|ext| lower.ends_with(ext))
}

/// A meta project whose only job is to build other projects, e.g. `dirs.proj`.
pub fn is_aggregate_project(path: &str) -> bool {
  has_extension(path, &[".proj"])
}

pub fn is_project_file(path: &str) -> bool {
  has_extension(path, &[".csproj", ".vbproj", ".fsproj", ".vcxproj"])
}

pub fn is_solution_file(path: &str) -> bool {
  has_extension(path, &[".sln"])
}

/// What a project file says about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
  pub path: String,
  /// Declares an SDK, so `dotnet` can build it.
  pub sdk_style: bool,
  /// Referenced project files in declaration order, resolved against the
  /// directory of this file.
  pub references: Vec<String>,
}

impl ProjectFile {
  pub fn load(actions: &dyn BuildActions, path: &str) -> Result<Self, ActionError> {
    let root = actions.load_xml(path)?;
    let project = Self::from_xml(actions, path, &root);
    debug!(
      path = %path,
      sdk_style = project.sdk_style,
      references = project.references.len(),
      "loaded project file"
    );
    Ok(project)
  }

  fn from_xml(actions: &dyn BuildActions, path: &str, root: &XmlElement) -> Self {
    let base = actions.directory_name(path);
    let sdk_style = root.attribute("Sdk").is_some()
      || root.children_named("Sdk").next().is_some()
      || root.children_named("Import").any(|import| import.attribute("Sdk").is_some());

    let references = root
      .descendants()
      .into_iter()
      .filter(|element| REFERENCE_ITEMS.contains(&element.name.as_str()))
      .filter_map(|element| element.attribute("Include"))
      .flat_map(|include| include.split(';'))
      .map(str::trim)
      .filter(|include| is_literal_path(include))
      .map(|include| resolve_reference(actions, base.as_deref(), include))
      .collect();

    Self {
      path: path.to_string(),
      sdk_style,
      references,
    }
  }
}

/// Wildcards and property expansions cannot be resolved without evaluating the project.
fn is_literal_path(include: &str) -> bool {
  !include.is_empty() && !include.contains(['*', '?']) && !include.contains("$(")
}

fn resolve_reference(actions: &dyn BuildActions, base: Option<&str>, include: &str) -> String {
  let separator = actions.path_separator().to_string();
  if include.starts_with(['/', '\\']) || include.get(1..2) == Some(":") {
    return include.replace(['/', '\\'], &separator);
  }

  let mut base = base.map(str::to_string);
  let mut parts: Vec<&str> = Vec::new();
  for segment in include.split(['/', '\\']) {
    match segment {
      "" | "." => {}
      ".." if parts.last().is_some_and(|last| *last != "..") => {
        parts.pop();
      }
      ".." if parts.is_empty() => match base.as_deref().and_then(|b| actions.directory_name(b)) {
        Some(parent) => base = Some(parent),
        None => parts.push(".."),
      },
      other => parts.push(other),
    }
  }

  let relative = parts.join(&separator);
  match base {
    Some(base) => actions.path_combine(&[&base, &relative]),
    None => relative,
  }
}
