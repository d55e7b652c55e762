//! Machine architecture of the requesting environment.

/// Machine architecture of the requesting environment, as reported by
/// Python's `platform.machine()` (e.g. `x86_64`, `aarch64`, `i686`, `ppc64le`).
///
/// The value is kept verbatim; comparisons against the architecture suffix of
/// a platform tag are ASCII case-insensitive.
///
/// # Example
///
/// ```
/// use wheelpick_schema::Machine;
///
/// let machine = Machine::new("x86_64");
/// assert!(machine.matches("X86_64"));
/// assert!(!machine.matches("aarch64"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Machine(String);

impl Machine {
    /// Create a machine from an architecture string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Architecture of the running binary, spelled the way Python reports it
    /// on the same host.
    pub fn current() -> Self {
        let name = match std::env::consts::ARCH {
            "aarch64" if cfg!(target_os = "macos") => "arm64",
            "x86_64" if cfg!(windows) => "AMD64",
            "aarch64" if cfg!(windows) => "ARM64",
            "x86" if cfg!(windows) => "x86",
            "x86" => "i686",
            "arm" => "armv7l",
            "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
            "powerpc64" => "ppc64",
            other => other,
        };
        Self(name.to_string())
    }

    /// Whether an architecture suffix taken from a platform tag names this machine.
    pub fn matches(&self, tag_arch: &str) -> bool {
        self.0.eq_ignore_ascii_case(tag_arch)
    }

    /// Return the architecture as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Machine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.contains(['-', '.', ' ']) {
            return Err(format!("Unknown architecture: {s}"));
        }
        Ok(Self(s.to_string()))
    }
}

impl AsRef<str> for Machine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
