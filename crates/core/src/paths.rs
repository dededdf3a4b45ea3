//! Path handling for project roots and the Go module store.
//!
//! The module store (`$GOMODCACHE`) names directories after module paths with
//! every uppercase letter replaced by `!` and its lowercase form, so that the
//! layout survives case-insensitive filesystems:
//!
//! ```text
//! github.com/BurntSushi/toml@v1.3.2  ->  github.com/!burnt!sushi/toml@v1.3.2
//! ```

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// File name of the module manifest.
pub const MANIFEST_FILE: &str = "go.mod";

/// Find the project root by walking up from `start`.
///
/// The project root is the first directory containing a `go.mod`.
///
/// # Errors
///
/// Returns [`Error::RootNotFound`] if no ancestor contains a `go.mod`.
pub fn find_project_root(start: &Path) -> Result<PathBuf> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| Error::io(e, start, "resolve current directory"))?
            .join(start)
    };

    for dir in start.ancestors() {
        if dir.join(MANIFEST_FILE).is_file() {
            tracing::debug!(root = %dir.display(), "Found project root");
            return Ok(dir.to_path_buf());
        }
    }

    Err(Error::RootNotFound { start })
}

/// Find the project root starting from the current working directory.
///
/// # Errors
///
/// Returns an error if the working directory is unavailable or no `go.mod`
/// is found above it.
pub fn discover_project_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().map_err(|e| Error::Io {
        source: e,
        path: None,
        operation: "read current directory".to_string(),
    })?;
    find_project_root(&cwd)
}

/// Escape a module path for the module store.
///
/// Uppercase letters become `!` followed by the lowercase letter.
#[must_use]
pub fn escape_module_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch.is_uppercase() {
            escaped.push('!');
            escaped.extend(ch.to_lowercase());
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

/// Reverse [`escape_module_path`].
///
/// A `!` not followed by a lowercase letter is kept as is.
#[must_use]
pub fn unescape_module_path(path: &str) -> String {
    let mut unescaped = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(ch) = chars.next() {
        match (ch, chars.peek()) {
            ('!', Some(next)) if next.is_lowercase() => {
                unescaped.extend(next.to_uppercase());
                chars.next();
            }
            _ => unescaped.push(ch),
        }
    }
    unescaped
}

/// Location of a versioned command path inside the module store.
#[must_use]
pub fn module_source_path(store: &Path, command_path: &str) -> PathBuf {
    join_slash_path(store, &escape_module_path(command_path))
}

/// Join a `/`-separated module path onto `base` using native separators.
#[must_use]
pub fn join_slash_path(base: &Path, slash_path: &str) -> PathBuf {
    slash_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(base.to_path_buf(), |acc, segment| acc.join(segment))
}

/// Walk up from `source_dir` to the module root inside `store`.
///
/// The module root is the first directory whose name carries the `@version`
/// marker, e.g. `<store>/github.com/onsi/ginkgo@v1.16.5` for
/// `<store>/github.com/onsi/ginkgo@v1.16.5/ginkgo`.
///
/// # Errors
///
/// Returns [`Error::ModuleSourceNotFound`] if the walk leaves the store
/// without finding a versioned directory.
pub fn find_module_root(store: &Path, source_dir: &Path) -> Result<PathBuf> {
    for dir in source_dir.ancestors() {
        if dir == store || !dir.starts_with(store) {
            break;
        }
        if dir
            .file_name()
            .is_some_and(|name| name.to_string_lossy().contains('@'))
        {
            return Ok(dir.to_path_buf());
        }
    }

    Err(Error::ModuleSourceNotFound {
        path: source_dir.to_path_buf(),
    })
}

/// Derive the module path from a module root inside the store.
///
/// Strips the store prefix and everything from `@` onwards, then unescapes:
/// `<store>/github.com/!burnt!sushi/toml@v1.3.2` gives
/// `github.com/BurntSushi/toml`.
#[must_use]
pub fn module_name_from_store_path(store: &Path, module_root: &Path) -> Option<String> {
    let relative = module_root.strip_prefix(store).ok()?;
    let slash_path = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    let name = slash_path.split('@').next().unwrap_or_default();
    if name.is_empty() {
        return None;
    }
    Some(unescape_module_path(name))
}

/// Render a path relative to `base` with `/` separators.
#[must_use]
pub fn slash_relative(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_project_root_in_start_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/app\n").unwrap();

        let root = find_project_root(temp.path()).unwrap();
        assert_eq!(root, temp.path());
    }

    #[test]
    fn test_find_project_root_from_subdirectory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/app\n").unwrap();
        let nested = temp.path().join("internal").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let root = find_project_root(&nested).unwrap();
        assert_eq!(root, temp.path());
    }

    #[test]
    fn test_find_project_root_prefers_nearest() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module example.com/outer\n").unwrap();
        let inner = temp.path().join("tools");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(inner.join("go.mod"), "module example.com/outer/tools\n").unwrap();

        assert_eq!(find_project_root(&inner).unwrap(), inner);
    }

    #[test]
    fn test_find_project_root_ignores_go_mod_directory() {
        let temp = TempDir::new().unwrap();
        let start = temp.path().join("a");
        std::fs::create_dir_all(start.join("go.mod")).unwrap();

        // A directory named go.mod is not a manifest; the walk continues
        // upward and eventually either finds an unrelated go.mod or fails.
        if let Ok(root) = find_project_root(&start) {
            assert_ne!(root, start);
        }
    }

    #[test]
    fn test_escape_module_path() {
        assert_eq!(
            escape_module_path("github.com/BurntSushi/toml@v1.3.2"),
            "github.com/!burnt!sushi/toml@v1.3.2"
        );
        assert_eq!(
            escape_module_path("github.com/Azure/azure-sdk-for-go/sdk/azcore"),
            "github.com/!azure/azure-sdk-for-go/sdk/azcore"
        );
        assert_eq!(escape_module_path("golang.org/x/tools"), "golang.org/x/tools");
        assert_eq!(escape_module_path(""), "");
    }

    #[test]
    fn test_escape_all_uppercase_segment() {
        assert_eq!(escape_module_path("example.com/ABC"), "example.com/!a!b!c");
    }

    #[test]
    fn test_unescape_module_path() {
        assert_eq!(
            unescape_module_path("github.com/!burnt!sushi/toml"),
            "github.com/BurntSushi/toml"
        );
        assert_eq!(unescape_module_path("example.com/!a!b!c"), "example.com/ABC");
        assert_eq!(unescape_module_path("example.com/bang!"), "example.com/bang!");
    }

    #[test]
    fn test_escape_unescape_mixed_case() {
        for path in [
            "github.com/Masterminds/semver/v3",
            "github.com/golangci/golangci-lint/cmd/golangci-lint",
            "gopkg.in/yaml.v3",
            "github.com/GoogleCloudPlatform/Cloud-SQL-Proxy",
        ] {
            let escaped = escape_module_path(path);
            assert!(!escaped.chars().any(char::is_uppercase));
            assert_eq!(unescape_module_path(&escaped), path);
        }
    }

    #[test]
    fn test_module_source_path() {
        let store = Path::new("/home/gopher/go/pkg/mod");
        assert_eq!(
            module_source_path(store, "github.com/Foo/bar@v1.0.0/cmd/bar"),
            store
                .join("github.com")
                .join("!foo")
                .join("bar@v1.0.0")
                .join("cmd")
                .join("bar")
        );
    }

    #[test]
    fn test_find_module_root() {
        let store = Path::new("/store");
        let source = store
            .join("github.com")
            .join("onsi")
            .join("ginkgo@v1.16.5")
            .join("ginkgo");
        assert_eq!(
            find_module_root(store, &source).unwrap(),
            store.join("github.com").join("onsi").join("ginkgo@v1.16.5")
        );
    }

    #[test]
    fn test_find_module_root_when_source_is_root() {
        let store = Path::new("/store");
        let source = store.join("github.com").join("goreleaser").join("goreleaser@v1.2.3");
        assert_eq!(find_module_root(store, &source).unwrap(), source);
    }

    #[test]
    fn test_find_module_root_stops_at_store() {
        let store = Path::new("/store");
        let source = store.join("github.com").join("onsi").join("ginkgo");
        assert!(matches!(
            find_module_root(store, &source),
            Err(Error::ModuleSourceNotFound { .. })
        ));
    }

    #[test]
    fn test_module_name_from_store_path() {
        let store = Path::new("/store");
        let root = store.join("github.com").join("!burnt!sushi").join("toml@v1.3.2");
        assert_eq!(
            module_name_from_store_path(store, &root).as_deref(),
            Some("github.com/BurntSushi/toml")
        );
    }

    #[test]
    fn test_module_name_from_store_path_outside_store() {
        assert!(module_name_from_store_path(Path::new("/store"), Path::new("/elsewhere/x@v1")).is_none());
    }

    #[test]
    fn test_slash_relative() {
        let base = Path::new("/cache/go1.22.0");
        let path = base.join("example.com").join("pkg@v0.0.2").join("hello-world");
        assert_eq!(
            slash_relative(base, &path).as_deref(),
            Some("example.com/pkg@v0.0.2/hello-world")
        );
    }
}
