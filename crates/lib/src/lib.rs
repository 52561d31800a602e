//! autobuild-lib: decide how to build an unknown checkout, then build it.
//!
//! The crate is layered leaves first:
//! - `actions`: the capability interface every side effect goes through
//! - `script`: composable build steps with short-circuit and fallback semantics
//! - `toolchain`, `dotnet`, `project`, `msbuild`: the rules that know about tools
//! - `autobuild`: inspects a checkout, picks one strategy and assembles its script

pub mod actions;
pub mod autobuild;
pub mod diagnostics;
pub mod dotnet;
pub mod msbuild;
pub mod platform;
pub mod project;
pub mod script;
pub mod toolchain;
pub mod util;
