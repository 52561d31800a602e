//! Host platform detection.
//!
//! [`SystemActions`](crate::actions::SystemActions) answers the provider's
//! platform queries from here; nothing else in the crate asks the host directly.

pub mod arch;
pub mod os;

use arch::Arch;
use os::Os;
use std::fmt;

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  /// Apple silicon: macOS on an arm64 CPU.
  pub fn is_apple_silicon(&self) -> bool {
    self.os == Os::MacOs && self.arch == Arch::Aarch64
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}

/// Returns the platform triple for the current system (e.g., "aarch64-darwin")
///
/// Returns `None` if the current platform is not supported
pub fn platform_triple() -> Option<String> {
  Platform::current().map(|p| p.triple())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn platform_triple_format() {
    let platform = Platform::new(Arch::Aarch64, Os::MacOs);
    assert_eq!(platform.triple(), "aarch64-darwin");

    let platform = Platform::new(Arch::X86_64, Os::Windows);
    assert_eq!(platform.triple(), "x86_64-windows");
  }

  #[test]
  fn apple_silicon_requires_macos_and_arm() {
    assert!(Platform::new(Arch::Aarch64, Os::MacOs).is_apple_silicon());
    assert!(!Platform::new(Arch::X86_64, Os::MacOs).is_apple_silicon());
    assert!(!Platform::new(Arch::Aarch64, Os::Linux).is_apple_silicon());
  }
}
