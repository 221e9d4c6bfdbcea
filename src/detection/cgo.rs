//! Native toolchain (CGO) analysis for Go repositories
//!
//! Three independent signals mark a module as needing a C toolchain: a
//! denylisted dependency in `go.mod`, `import "C"` in a source file, or a
//! `#cgo` directive. Any one of them is enough.

use crate::fs::FileSystem;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Modules known to require CGO, matched by path prefix
pub const CGO_PACKAGES: &[&str] = &[
    "github.com/mattn/go-sqlite3",
    "github.com/miekg/pkcs11",
    "github.com/spacemonkeygo/openssl",
    "github.com/shirou/gopsutil",
    "github.com/therecipe/qt",
    "fyne.io/fyne",
    "github.com/tecbot/gorocksdb",
    "github.com/linxGnu/grocksdb",
    "github.com/jmhodges/levigo",
    "github.com/gographics/imagick",
    "gopkg.in/gographics/imagick.v2",
    "gopkg.in/gographics/imagick.v3",
    "github.com/giorgisio/goav",
    "github.com/3d0c/gmf",
    "github.com/DataDog/zstd",
    "github.com/valyala/gozstd",
    "github.com/google/gopacket",
    "gorgonia.org/tensor",
    "github.com/tensorflow/tensorflow/tensorflow/go",
];

const SKIP_DIRS: &[&str] = &["vendor", "node_modules"];

/// Outcome of a CGO scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CgoAnalysis {
    pub requires_cgo: bool,
    pub reason: String,
    pub detected_packages: Vec<String>,
    pub has_c_import: bool,
    pub has_cgo_directives: bool,
    /// Signals that could not be checked
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
}

/// True when `module` is, contains, or lives under a denylisted package
pub fn is_cgo_package(module: &str) -> bool {
    CGO_PACKAGES.iter().any(|pkg| {
        module.starts_with(pkg) || pkg.starts_with(&format!("{}/", module))
    })
}

/// Denylisted modules required by a go.mod, in file order without duplicates
pub fn scan_go_mod(content: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        let line = line.strip_prefix("require").map(str::trim).unwrap_or(line);
        if line.is_empty() || line.starts_with("//") || line == "(" || line == ")" {
            continue;
        }

        let Some(module) = line.split_whitespace().next() else {
            continue;
        };

        if is_cgo_package(module) && !found.iter().any(|m| m == module) {
            found.push(module.to_string());
        }
    }

    found
}

/// Scans a single Go source file for the foreign import and cgo directives
pub fn scan_source(content: &str) -> (bool, bool) {
    let mut has_c_import = false;
    let mut has_directives = false;
    let mut in_import_block = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("#cgo")
            || trimmed.starts_with("// #cgo")
            || trimmed.starts_with("//#cgo")
            || trimmed.starts_with("//go:cgo_")
        {
            has_directives = true;
        }

        if in_import_block {
            if trimmed.starts_with(')') {
                in_import_block = false;
            } else if trimmed == "\"C\"" {
                has_c_import = true;
            }
            continue;
        }

        if trimmed == "import \"C\"" {
            has_c_import = true;
        } else if trimmed.starts_with("import (") {
            in_import_block = true;
        }
    }

    (has_c_import, has_directives)
}

fn skip_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name) || name.starts_with('.')
}

/// Full CGO analysis of the repository rooted at `repo`
///
/// The go.mod scan and the source scan fail independently; each failure is
/// recorded in `failures` and the other signal still counts.
pub fn analyze(fs: &dyn FileSystem, repo: &Path) -> CgoAnalysis {
    let mut result = CgoAnalysis::default();
    let mut reasons: Vec<&str> = Vec::new();

    let go_mod = repo.join("go.mod");
    if fs.is_file(&go_mod) {
        match fs.read_lossy(&go_mod) {
            Ok(content) => {
                let packages = scan_go_mod(&content);
                if !packages.is_empty() {
                    result.detected_packages = packages;
                    reasons.push("detected CGO-requiring packages in go.mod");
                }
            }
            Err(e) => result.failures.push(format!("go.mod: {:#}", e)),
        }
    }

    match fs.walk_files(repo, skip_dir) {
        Ok(files) => scan_sources(fs, &files, &mut result),
        Err(e) => result.failures.push(format!("source scan: {:#}", e)),
    }

    if result.has_c_import {
        reasons.push("detected import \"C\" in source files");
    }
    if result.has_cgo_directives {
        reasons.push("detected CGO directives in source files");
    }

    result.requires_cgo = !reasons.is_empty();
    result.reason = if reasons.is_empty() {
        "no CGO requirements detected".to_string()
    } else {
        reasons.join("; ")
    };

    result
}

fn scan_sources(fs: &dyn FileSystem, files: &[PathBuf], result: &mut CgoAnalysis) {
    for file in files {
        let name = file.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !name.ends_with(".go") || name.ends_with("_test.go") {
            continue;
        }

        let content = match fs.read_lossy(file) {
            Ok(content) => content,
            Err(e) => {
                result.failures.push(format!("{}: {:#}", file.display(), e));
                continue;
            }
        };

        let (c_import, directives) = scan_source(&content);
        result.has_c_import |= c_import;
        result.has_cgo_directives |= directives;
        if result.has_c_import && result.has_cgo_directives {
            break;
        }
    }
}

/// CGO analysis with every failure logged
///
/// Whatever the signals that did run found is kept; callers surface
/// [`CgoAnalysis::failures`] on the detection result.
pub fn detect_cgo(fs: &dyn FileSystem, repo: &Path) -> CgoAnalysis {
    let result = analyze(fs, repo);
    for failure in &result.failures {
        warn!(repo = %repo.display(), failure = %failure, "CGO analysis incomplete");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    #[test]
    fn test_is_cgo_package() {
        assert!(is_cgo_package("github.com/mattn/go-sqlite3"));
        assert!(is_cgo_package("github.com/shirou/gopsutil/v3"));
        assert!(is_cgo_package("github.com/tensorflow/tensorflow"));
        assert!(!is_cgo_package("github.com/gin-gonic/gin"));
        assert!(!is_cgo_package("github.com/mattn/go-isatty"));
    }

    #[test]
    fn test_scan_go_mod_block_and_single() {
        let go_mod = r#"module example.com/app

go 1.22

require github.com/DataDog/zstd v1.5.5

require (
	github.com/gin-gonic/gin v1.9.1
	github.com/mattn/go-sqlite3 v1.14.22 // indirect
)
"#;
        assert_eq!(
            scan_go_mod(go_mod),
            vec!["github.com/DataDog/zstd", "github.com/mattn/go-sqlite3"]
        );
    }

    #[test]
    fn test_scan_source_single_import() {
        let src = "package main\n\n// #include <stdio.h>\nimport \"C\"\n";
        assert_eq!(scan_source(src), (true, false));
    }

    #[test]
    fn test_scan_source_import_block_and_directive() {
        let src = r#"package db

/*
#cgo LDFLAGS: -lsqlite3
#include <sqlite3.h>
*/
import (
	"C"
	"unsafe"
)
"#;
        assert_eq!(scan_source(src), (true, true));
    }

    #[test]
    fn test_scan_source_plain() {
        let src = "package main\n\nimport (\n\t\"fmt\"\n)\n\nfunc main() { fmt.Println(\"C\") }\n";
        assert_eq!(scan_source(src), (false, false));
    }

    #[test]
    fn test_analyze_no_cgo() {
        let fs = MockFileSystem::new();
        fs.add_file("go.mod", "module example.com/app\n\ngo 1.22\n");
        fs.add_file("main.go", "package main\n\nfunc main() {}\n");

        let result = analyze(&fs, Path::new("/mock"));
        assert!(!result.requires_cgo);
        assert_eq!(result.reason, "no CGO requirements detected");
    }

    #[test]
    fn test_analyze_ignores_vendor_hidden_and_tests() {
        let fs = MockFileSystem::new();
        fs.add_file("go.mod", "module example.com/app\n");
        fs.add_file("main.go", "package main\n");
        fs.add_file("vendor/x/x.go", "package x\nimport \"C\"\n");
        fs.add_file(".cache/y.go", "package y\nimport \"C\"\n");
        fs.add_file("cgo_test.go", "package main\nimport \"C\"\n");

        let result = analyze(&fs, Path::new("/mock"));
        assert!(!result.requires_cgo);
    }

    #[test]
    fn test_analyze_combines_reasons() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "go.mod",
            "module example.com/app\n\nrequire github.com/mattn/go-sqlite3 v1.14.0\n",
        );
        fs.add_file("native/bridge.go", "package native\n\nimport \"C\"\n");

        let result = analyze(&fs, Path::new("/mock"));
        assert!(result.requires_cgo);
        assert!(result.has_c_import);
        assert!(!result.has_cgo_directives);
        assert_eq!(
            result.reason,
            "detected CGO-requiring packages in go.mod; detected import \"C\" in source files"
        );
        assert_eq!(result.detected_packages, vec!["github.com/mattn/go-sqlite3"]);
    }

    #[test]
    fn test_missing_repository_is_a_failure() {
        let fs = MockFileSystem::new();
        let result = detect_cgo(&fs, Path::new("/missing"));
        assert!(!result.requires_cgo);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].starts_with("source scan:"));
    }

    #[test]
    fn test_unreadable_go_mod_still_scans_sources() {
        let fs = MockFileSystem::new();
        fs.add_unreadable_file("go.mod");
        fs.add_file("bridge.go", "package main\n\nimport \"C\"\n");

        let result = analyze(&fs, Path::new("/mock"));
        assert!(result.requires_cgo);
        assert!(result.has_c_import);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].starts_with("go.mod:"));
    }

    #[test]
    fn test_unreadable_source_keeps_go_mod_signal() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "go.mod",
            "module example.com/app\n\nrequire github.com/mattn/go-sqlite3 v1.14.0\n",
        );
        fs.add_unreadable_file("main.go");

        let result = analyze(&fs, Path::new("/mock"));
        assert!(result.requires_cgo);
        assert_eq!(result.detected_packages, vec!["github.com/mattn/go-sqlite3"]);
        assert_eq!(result.failures.len(), 1);
        assert!(result.failures[0].contains("main.go"));
    }
}
