use crate::fastapi::route_method;
use crate::scanner::{read_source, FileScanner};
use crate::syntax::{walk_stmts, Module, PythonParser, Stmt};
use std::path::Path;

/// Raw structural signals of a FastAPI + pytest repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FastApiSignals {
    pub has_fastapi_import: bool,
    pub has_router: bool,
    pub has_pytest: bool,
}

impl FastApiSignals {
    fn is_complete(&self) -> bool {
        self.has_fastapi_import && self.has_router && self.has_pytest
    }

    /// Fold one parsed module into the signal set
    pub fn absorb(&mut self, module: &Module) {
        walk_stmts(&module.body, &mut |stmt| match stmt {
            Stmt::Import { modules } => {
                if modules.iter().any(|m| m.starts_with("fastapi")) {
                    self.has_fastapi_import = true;
                }
                if modules.iter().any(|m| m.starts_with("pytest")) {
                    self.has_pytest = true;
                }
            }
            Stmt::ImportFrom { module: Some(module) } => {
                if module.starts_with("fastapi") {
                    self.has_fastapi_import = true;
                }
                if module.starts_with("pytest") {
                    self.has_pytest = true;
                }
            }
            Stmt::FunctionDef(func) => {
                if func.decorators.iter().any(|d| route_method(d).is_some()) {
                    self.has_router = true;
                }
            }
            Stmt::ImportFrom { module: None }
            | Stmt::ClassDef(_)
            | Stmt::Assign { .. }
            | Stmt::If { .. }
            | Stmt::Compound(_)
            | Stmt::Expr(_)
            | Stmt::Other => {}
        });
    }

    /// Human-readable reasons for a probe result
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.has_fastapi_import {
            reasons.push("Detected FastAPI import patterns.".to_string());
        }
        if self.has_router {
            reasons.push("Detected FastAPI router decorator patterns.".to_string());
        }
        if self.has_pytest {
            reasons.push("Detected pytest import patterns.".to_string());
        }
        reasons
    }
}

/// Walk every parseable Python file and collect FastAPI signals.
///
/// Files that fail to read or parse are skipped.
pub fn scan_fastapi_signals(repo_root: &Path) -> FastApiSignals {
    let mut signals = FastApiSignals::default();
    let mut parser = match PythonParser::new() {
        Ok(parser) => parser,
        Err(e) => {
            log::warn!("Python parser unavailable, no signals collected: {e}");
            return signals;
        }
    };

    for file in FileScanner::new(repo_root).scan_python() {
        let source = match read_source(&file.path) {
            Ok(source) => source,
            Err(e) => {
                log::debug!("Skipping unreadable {}: {e}", file.relative);
                continue;
            }
        };
        let Some(module) = parser.parse(&source) else {
            log::debug!("Skipping unparseable {}", file.relative);
            continue;
        };
        signals.absorb(&module);
        if signals.is_complete() {
            break;
        }
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn detects_all_three_signals() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "app/api.py",
            "from fastapi import APIRouter\nrouter = APIRouter()\n@router.get('/orders')\ndef list_orders():\n    return []\n",
        );
        write(dir.path(), "tests/test_api.py", "import pytest\n");

        let signals = scan_fastapi_signals(dir.path());
        assert_eq!(
            signals,
            FastApiSignals {
                has_fastapi_import: true,
                has_router: true,
                has_pytest: true,
            }
        );
        assert_eq!(signals.reasons().len(), 3);
    }

    #[test]
    fn malformed_files_do_not_stop_the_scan() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a_broken.py", "def oops(:\n");
        write(dir.path(), "b_api.py", "import fastapi\n");

        let signals = scan_fastapi_signals(dir.path());
        assert!(signals.has_fastapi_import);
        assert!(!signals.has_router);
    }

    #[test]
    fn plain_python_has_no_signals() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app.py", "def hello():\n    return 'ok'\n");
        assert_eq!(scan_fastapi_signals(dir.path()), FastApiSignals::default());
    }
}
