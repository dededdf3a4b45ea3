//! Binary name resolution.
//!
//! A short name such as `golangci-lint` is mapped to a versioned command path
//! such as `github.com/golangci/golangci-lint@v1.55.2/cmd/golangci-lint`:
//! the tools file says which package provides the binary, go.mod says which
//! version of its module to use.

use crate::manifest::{GoMod, read_go_mod};
use crate::tools::{ToolDeclarations, scan_tool_imports};
use crate::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Suffix of executables on the platforms that have one.
pub const EXE_SUFFIX: &str = ".exe";

/// Final import path segment of a semantic import version (`v2`, `v10`, ...).
static MAJOR_VERSION_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^v\d+$").unwrap()
});

/// Strip a trailing `.exe` from `binary`.
#[must_use]
pub fn normalize_binary_name(binary: &str) -> &str {
    binary.strip_suffix(EXE_SUFFIX).unwrap_or(binary)
}

/// Find the import that provides `binary`.
///
/// The binary name is the last path segment of the import, or the segment
/// before a major version suffix (`github.com/onsi/ginkgo/v2` provides
/// `ginkgo`). The first match in scan order wins.
#[must_use]
pub fn find_tool_import<'a>(declarations: &'a ToolDeclarations, binary: &str) -> Option<&'a str> {
    declarations.iter().find(|import| import_provides(import, binary))
}

fn import_provides(import: &str, binary: &str) -> bool {
    let mut segments = import.rsplit('/');
    let Some(last) = segments.next() else {
        return false;
    };
    if last == binary {
        return true;
    }
    MAJOR_VERSION_SEGMENT.is_match(last) && segments.next() == Some(binary)
}

/// Build the versioned command path for `import` from the manifest.
///
/// # Errors
///
/// Returns [`Error::RequirementNotFound`] if no requirement provides `import`.
pub fn versioned_command_path(gomod: &GoMod, import: &str) -> Result<String> {
    let requirement = gomod
        .requirement_for(import)
        .ok_or_else(|| Error::RequirementNotFound {
            import: import.to_string(),
        })?;

    let suffix = &import[requirement.path.len()..];
    Ok(format!("{}{}", requirement.versioned_path(), suffix))
}

/// Resolve `binary` to its versioned command path for the project at `root`.
///
/// # Errors
///
/// Fails with [`Error::Scanner`] or [`Error::BinaryNotDeclared`] when the
/// tools file does not declare the binary, and with the manifest errors or
/// [`Error::RequirementNotFound`] when go.mod does not pin it.
pub fn resolve_command_path(root: &Path, binary: &str) -> Result<String> {
    let binary = normalize_binary_name(binary);

    let declarations = scan_tool_imports(root)?;
    let import = find_tool_import(&declarations, binary).ok_or_else(|| Error::BinaryNotDeclared {
        binary: binary.to_string(),
    })?;

    let gomod = read_go_mod(root)?;
    let command_path = versioned_command_path(&gomod, import)?;

    tracing::debug!(%binary, %import, %command_path, "Resolved tool");
    Ok(command_path)
}

/// `<module>@<version>` for every declared import that go.mod requires.
///
/// Declarations without a requirement are skipped; they cannot have a cache
/// entry anyway.
#[must_use]
pub fn versioned_imports(declarations: &ToolDeclarations, gomod: &GoMod) -> Vec<String> {
    let mut versioned: Vec<String> = declarations
        .iter()
        .filter_map(|import| gomod.requirement_for(import))
        .map(|req| req.versioned_path())
        .collect();
    versioned.sort();
    versioned.dedup();
    versioned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_go_mod;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const TEST_PACKAGE: &str = "github.com/dustinblackman/go-hello-world-test@v0.0.2/hello-world";

    fn declarations(imports: &[&str]) -> ToolDeclarations {
        ToolDeclarations {
            dir: PathBuf::from("."),
            files: vec![PathBuf::from("tools.go")],
            imports: imports.iter().map(|i| (*i).to_string()).collect(),
        }
    }

    fn gomod(contents: &str) -> GoMod {
        parse_go_mod(Path::new("go.mod"), contents).unwrap()
    }

    fn write_project(dir: &Path) {
        std::fs::write(
            dir.join("go.mod"),
            "module example.com/project\n\ngo 1.21\n\nrequire (\n\tgithub.com/dustinblackman/go-hello-world-test v0.0.2\n\tgithub.com/onsi/ginkgo/v2 v2.13.0\n)\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("tools.go"),
            "//go:build tools\n\npackage tools\n\nimport (\n\t_ \"github.com/dustinblackman/go-hello-world-test/hello-world\"\n\t_ \"github.com/onsi/ginkgo/v2/ginkgo\"\n\t_ \"github.com/mattn/goveralls\"\n)\n",
        )
        .unwrap();
    }

    #[test]
    fn test_normalize_binary_name() {
        assert_eq!(normalize_binary_name("hello-world.exe"), "hello-world");
        assert_eq!(normalize_binary_name("hello-world"), "hello-world");
        assert_eq!(normalize_binary_name("exe"), "exe");
    }

    #[test]
    fn test_find_tool_import_by_last_segment() {
        let decls = declarations(&[
            "github.com/golangci/golangci-lint/cmd/golangci-lint",
            "github.com/goreleaser/goreleaser",
        ]);
        assert_eq!(
            find_tool_import(&decls, "golangci-lint"),
            Some("github.com/golangci/golangci-lint/cmd/golangci-lint")
        );
        assert_eq!(
            find_tool_import(&decls, "goreleaser"),
            Some("github.com/goreleaser/goreleaser")
        );
        assert_eq!(find_tool_import(&decls, "cmd"), None);
    }

    #[test]
    fn test_find_tool_import_major_version_suffix() {
        let decls = declarations(&["github.com/example/tool/v2", "github.com/other/thing/v10"]);
        assert_eq!(find_tool_import(&decls, "tool"), Some("github.com/example/tool/v2"));
        assert_eq!(find_tool_import(&decls, "thing"), Some("github.com/other/thing/v10"));
        assert_eq!(find_tool_import(&decls, "v2"), Some("github.com/example/tool/v2"));
    }

    #[test]
    fn test_find_tool_import_requires_version_shape() {
        let decls = declarations(&["github.com/example/tool/vnext"]);
        assert_eq!(find_tool_import(&decls, "tool"), None);
    }

    #[test]
    fn test_find_tool_import_first_match_wins() {
        let decls = declarations(&["a.com/one/lint", "b.com/two/lint"]);
        assert_eq!(find_tool_import(&decls, "lint"), Some("a.com/one/lint"));
    }

    #[test]
    fn test_versioned_command_path() {
        let gomod = gomod("module m\nrequire github.com/golangci/golangci-lint v1.55.2\n");
        assert_eq!(
            versioned_command_path(&gomod, "github.com/golangci/golangci-lint/cmd/golangci-lint").unwrap(),
            "github.com/golangci/golangci-lint@v1.55.2/cmd/golangci-lint"
        );
    }

    #[test]
    fn test_versioned_command_path_module_root_package() {
        let gomod = gomod("module m\nrequire github.com/goreleaser/goreleaser v1.22.1\n");
        assert_eq!(
            versioned_command_path(&gomod, "github.com/goreleaser/goreleaser").unwrap(),
            "github.com/goreleaser/goreleaser@v1.22.1"
        );
    }

    #[test]
    fn test_versioned_command_path_missing_requirement() {
        let gomod = gomod("module m\nrequire github.com/other/module v1.0.0\n");
        let err = versioned_command_path(&gomod, "github.com/example/tool").unwrap_err();
        assert!(err.to_string().contains("cant find require"));
    }

    #[test]
    fn test_resolve_command_path() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());

        assert_eq!(resolve_command_path(temp.path(), "hello-world").unwrap(), TEST_PACKAGE);
        assert_eq!(resolve_command_path(temp.path(), "hello-world.exe").unwrap(), TEST_PACKAGE);
        assert_eq!(
            resolve_command_path(temp.path(), "ginkgo").unwrap(),
            "github.com/onsi/ginkgo/v2@v2.13.0/ginkgo"
        );
    }

    #[test]
    fn test_resolve_command_path_not_declared() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());

        let err = resolve_command_path(temp.path(), "not-real").unwrap_err();
        assert!(matches!(err, Error::BinaryNotDeclared { ref binary } if binary == "not-real"));
        assert!(err.to_string().contains("cant find bin not-real in tools file"));
    }

    #[test]
    fn test_resolve_command_path_not_required() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());

        let err = resolve_command_path(temp.path(), "goveralls").unwrap_err();
        assert!(matches!(err, Error::RequirementNotFound { .. }));
    }

    #[test]
    fn test_resolve_command_path_without_tools_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("go.mod"), "module m\n").unwrap();

        assert!(matches!(
            resolve_command_path(temp.path(), "hello-world"),
            Err(Error::Scanner { .. })
        ));
    }

    #[test]
    fn test_resolve_command_path_missing_go_mod() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());
        std::fs::remove_file(temp.path().join("go.mod")).unwrap();

        assert!(matches!(
            resolve_command_path(temp.path(), "hello-world"),
            Err(Error::ManifestNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_command_path_corrupted_go_mod() {
        let temp = TempDir::new().unwrap();
        write_project(temp.path());
        std::fs::write(
            temp.path().join("go.mod"),
            "module m\nrequire github.com/dustinblackman/go-hello-world-test 0.0.2\n",
        )
        .unwrap();

        assert!(matches!(
            resolve_command_path(temp.path(), "hello-world"),
            Err(Error::ManifestParse { .. })
        ));
    }

    #[test]
    fn test_versioned_imports() {
        let decls = declarations(&[
            "github.com/dustinblackman/go-hello-world-test/hello-world",
            "github.com/dustinblackman/go-hello-world-test/other-cmd",
            "github.com/mattn/goveralls",
        ]);
        let gomod = gomod("module m\nrequire github.com/dustinblackman/go-hello-world-test v0.0.2\n");

        assert_eq!(
            versioned_imports(&decls, &gomod),
            vec!["github.com/dustinblackman/go-hello-world-test@v0.0.2".to_string()]
        );
    }
}
