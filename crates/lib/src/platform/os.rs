use std::fmt;

/// Operating system families the autobuilder distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
    }
  }

  /// Directory name used for per-platform extractor tools (`tools/<name>`).
  pub fn extractor_platform(&self) -> &'static str {
    match self {
      Self::Linux => "linux64",
      Self::MacOs => "osx64",
      Self::Windows => "win64",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn macos_uses_darwin_identifier() {
    assert_eq!(Os::MacOs.as_str(), "darwin");
  }

  #[test]
  fn extractor_platform_names() {
    assert_eq!(Os::Linux.extractor_platform(), "linux64");
    assert_eq!(Os::MacOs.extractor_platform(), "osx64");
    assert_eq!(Os::Windows.extractor_platform(), "win64");
  }
}
