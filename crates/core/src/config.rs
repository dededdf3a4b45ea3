//! Runtime settings for gomodrun.
//!
//! Settings are read from the environment:
//!
//! | Variable             | Meaning                                   | Default        |
//! |----------------------|-------------------------------------------|----------------|
//! | `GOMODRUN_CACHE_DIR` | Cache directory name under the root       | `.gomodrun`    |
//! | `GOMODRUN_GO`        | `go` executable to invoke                 | `go`           |
//! | `GOMODCACHE`         | Module store location                     | see below      |
//! | `GOPATH`             | First entry + `/pkg/mod` is the store     | `~/go`         |

use std::ffi::OsString;
use std::path::PathBuf;

/// Default name of the cache directory created in the project root.
pub const DEFAULT_CACHE_DIR_NAME: &str = ".gomodrun";

/// Settings shared by the runner, the cache and the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Name of the cache directory inside the project root.
    pub cache_dir_name: String,
    /// The `go` executable.
    pub go_binary: PathBuf,
    /// Explicit module store location. `None` means "ask the environment".
    pub module_store: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir_name: DEFAULT_CACHE_DIR_NAME.to_string(),
            go_binary: PathBuf::from("go"),
            module_store: None,
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(name) = non_empty_var("GOMODRUN_CACHE_DIR") {
            settings.cache_dir_name = name.to_string_lossy().into_owned();
        }
        if let Some(go) = non_empty_var("GOMODRUN_GO") {
            settings.go_binary = PathBuf::from(go);
        }
        settings.module_store = module_store_from_env();

        settings
    }

    /// Use a different cache directory name.
    #[must_use]
    pub fn with_cache_dir_name(mut self, name: impl Into<String>) -> Self {
        self.cache_dir_name = name.into();
        self
    }

    /// Use a different `go` executable.
    #[must_use]
    pub fn with_go_binary(mut self, go: impl Into<PathBuf>) -> Self {
        self.go_binary = go.into();
        self
    }

    /// Pin the module store location.
    #[must_use]
    pub fn with_module_store(mut self, store: impl Into<PathBuf>) -> Self {
        self.module_store = Some(store.into());
        self
    }
}

/// Locate the module store the way the go command does.
///
/// Resolution order:
/// 1. `GOMODCACHE`
/// 2. first entry of `GOPATH` + `/pkg/mod`
/// 3. `~/go/pkg/mod`
#[must_use]
pub fn module_store_from_env() -> Option<PathBuf> {
    if let Some(dir) = non_empty_var("GOMODCACHE") {
        return Some(PathBuf::from(dir));
    }

    let gopath = non_empty_var("GOPATH")
        .and_then(|list| std::env::split_paths(&list).next())
        .or_else(|| dirs::home_dir().map(|home| home.join("go")))?;

    Some(gopath.join("pkg").join("mod"))
}

fn non_empty_var(key: &str) -> Option<OsString> {
    std::env::var_os(key).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.cache_dir_name, ".gomodrun");
        assert_eq!(settings.go_binary, PathBuf::from("go"));
        assert!(settings.module_store.is_none());
    }

    #[test]
    fn test_builder_methods() {
        let settings = Settings::default()
            .with_cache_dir_name(".cache")
            .with_go_binary("/usr/local/go/bin/go")
            .with_module_store("/tmp/mod");

        assert_eq!(settings.cache_dir_name, ".cache");
        assert_eq!(settings.go_binary, PathBuf::from("/usr/local/go/bin/go"));
        assert_eq!(settings.module_store, Some(PathBuf::from("/tmp/mod")));
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("GOMODRUN_CACHE_DIR", Some(".tools-cache")),
                ("GOMODRUN_GO", Some("/opt/go/bin/go")),
                ("GOMODCACHE", Some("/srv/gomodcache")),
            ],
            || {
                let settings = Settings::from_env();
                assert_eq!(settings.cache_dir_name, ".tools-cache");
                assert_eq!(settings.go_binary, PathBuf::from("/opt/go/bin/go"));
                assert_eq!(settings.module_store, Some(PathBuf::from("/srv/gomodcache")));
            },
        );
    }

    #[test]
    fn test_empty_vars_are_ignored() {
        temp_env::with_vars(
            [("GOMODRUN_CACHE_DIR", Some("")), ("GOMODRUN_GO", Some(""))],
            || {
                let settings = Settings::from_env();
                assert_eq!(settings.cache_dir_name, DEFAULT_CACHE_DIR_NAME);
                assert_eq!(settings.go_binary, PathBuf::from("go"));
            },
        );
    }

    #[test]
    fn test_module_store_from_gopath() {
        temp_env::with_vars(
            [("GOMODCACHE", None), ("GOPATH", Some("/work/gopath"))],
            || {
                assert_eq!(
                    module_store_from_env(),
                    Some(PathBuf::from("/work/gopath").join("pkg").join("mod"))
                );
            },
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_module_store_uses_first_gopath_entry() {
        temp_env::with_vars(
            [("GOMODCACHE", None), ("GOPATH", Some("/first:/second"))],
            || {
                assert_eq!(
                    module_store_from_env(),
                    Some(PathBuf::from("/first/pkg/mod"))
                );
            },
        );
    }
}
