//! Aggregate project expansion.
//!
//! An aggregate project (`dirs.proj` and friends) lists other projects, some of
//! which may be aggregates themselves. Expansion walks the references depth
//! first in declaration order and collects the leaf projects.
//!
//! Projects currently being expanded are tracked explicitly; reaching one of
//! them again is a cycle and aborts the whole expansion. An aggregate that was
//! already fully expanded through another path is not walked twice.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::{ProjectFile, is_aggregate_project};
use crate::actions::{ActionError, BuildActions};

/// Errors that can occur while expanding an aggregate project.
#[derive(Debug, Error)]
pub enum GraphError {
  /// A project (transitively) references itself.
  #[error("project reference cycle: {}", chain.join(" -> "))]
  Cycle { chain: Vec<String> },

  /// A project in the graph could not be loaded.
  #[error("cannot read project {path}: {source}")]
  Unreadable {
    path: String,
    #[source]
    source: ActionError,
  },
}

/// The result of expanding an aggregate project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectGraph {
  pub root: String,
  /// Leaf projects in depth-first declaration order, each listed once.
  pub leaves: Vec<String>,
  /// `(referencing, referenced)` pairs in the order they were read.
  pub edges: Vec<(String, String)>,
}

struct Expansion<'a> {
  actions: &'a dyn BuildActions,
  /// Paths from the root to the project being expanded.
  stack: Vec<String>,
  in_progress: HashSet<String>,
  done: HashSet<String>,
  seen_leaves: HashSet<String>,
  graph: ProjectGraph,
}

impl Expansion<'_> {
  /// Identity of a path; Windows paths compare case-insensitively.
  fn key(&self, path: &str) -> String {
    if self.actions.is_windows() {
      path.to_lowercase()
    } else {
      path.to_string()
    }
  }

  fn visit(&mut self, path: &str) -> Result<(), GraphError> {
    let key = self.key(path);
    if self.in_progress.contains(&key) {
      let start = self
        .stack
        .iter()
        .position(|entry| self.key(entry) == key)
        .unwrap_or(0);
      let mut chain = self.stack[start..].to_vec();
      chain.push(path.to_string());
      error!(chain = %chain.join(" -> "), "project reference cycle");
      return Err(GraphError::Cycle { chain });
    }
    if self.done.contains(&key) {
      debug!(path = %path, "aggregate already expanded");
      return Ok(());
    }

    self.stack.push(path.to_string());
    self.in_progress.insert(key.clone());

    let project = ProjectFile::load(self.actions, path).map_err(|source| GraphError::Unreadable {
      path: path.to_string(),
      source,
    })?;

    for reference in project.references {
      self.graph.edges.push((path.to_string(), reference.clone()));
      if !self.actions.file_exists(&reference) {
        warn!(from = %path, reference = %reference, "skipping missing project reference");
        continue;
      }
      if is_aggregate_project(&reference) {
        self.visit(&reference)?;
        continue;
      }
      let leaf_key = self.key(&reference);
      if self.seen_leaves.insert(leaf_key) {
        self.graph.leaves.push(reference);
      }
    }

    self.stack.pop();
    self.in_progress.remove(&key);
    self.done.insert(key);
    Ok(())
  }
}

/// Expand `root` into the leaf projects it builds.
pub fn expand_aggregate(actions: &dyn BuildActions, root: &str) -> Result<ProjectGraph, GraphError> {
  let mut expansion = Expansion {
    actions,
    stack: Vec::new(),
    in_progress: HashSet::new(),
    done: HashSet::new(),
    seen_leaves: HashSet::new(),
    graph: ProjectGraph {
      root: root.to_string(),
      ..Default::default()
    },
  };
  expansion.visit(root)?;
  debug!(root = %root, leaves = expansion.graph.leaves.len(), "expanded aggregate project");
  Ok(expansion.graph)
}
