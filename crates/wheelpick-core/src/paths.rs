//! Well-known file locations.

use std::path::PathBuf;

/// Poetry's configuration directory.
///
/// `POETRY_CONFIG_DIR` wins when set; otherwise `%LOCALAPPDATA%\pypoetry` on
/// Windows, `~/Library/Application Support/pypoetry` on macOS and
/// `$XDG_CONFIG_HOME/pypoetry` (`~/.config/pypoetry`) elsewhere.
pub fn poetry_config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("POETRY_CONFIG_DIR").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    let base = if cfg!(windows) {
        dirs::data_local_dir()
    } else {
        dirs::config_dir()
    };
    base.map(|d| d.join("pypoetry"))
}

/// Location of Poetry's `auth.toml` (HTTP basic credentials per repository).
pub fn poetry_auth_path() -> Option<PathBuf> {
    poetry_config_dir().map(|d| d.join("auth.toml"))
}

/// Extract the filename from a URL, ignoring any query or fragment.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.split('/').next_back().unwrap_or("")
}
