use crate::error::{CollectorError, Result};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// Directory names never descended into: VCS metadata, dependency caches,
/// build output and riskmap's own output directory.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".venv",
    "venv",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    "node_modules",
    "build",
    "dist",
    ".riskmap",
];

/// A discovered file with its repository-relative path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub relative: String,
}

impl SourceFile {
    pub fn is_python(&self) -> bool {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "py")
    }

    pub fn file_name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }
}

/// Scanner for finding files in a repository
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Walk the repository, sorted by path. Ignore files are not honoured:
    /// only [`EXCLUDED_DIRS`] prune the walk.
    pub fn scan(&self) -> Vec<SourceFile> {
        let mut files = Vec::new();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(false)
            .ignore(false)
            .parents(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .sort_by_file_name(|a, b| a.cmp(b));
        builder.filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !(is_dir && entry.depth() > 0 && Self::is_excluded_dir(entry.path()))
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                        continue;
                    }
                    let path = entry.path();
                    let Some(relative) = relative_path(&self.root, path) else {
                        continue;
                    };
                    files.push(SourceFile {
                        path: path.to_path_buf(),
                        relative,
                    });
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        log::debug!("Found {} files under {}", files.len(), self.root.display());
        files
    }

    /// Python files only
    pub fn scan_python(&self) -> Vec<SourceFile> {
        self.scan().into_iter().filter(SourceFile::is_python).collect()
    }

    fn is_excluded_dir(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
    }
}

/// `path` relative to `root`, joined with `/`
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Canonical form used whenever paths are compared: `/` separators, no leading `./`
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}

/// Read a source file as UTF-8
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|_| CollectorError::Encoding(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x = 1\n").unwrap();
    }

    #[test]
    fn scan_skips_excluded_directories() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app/main.py");
        touch(dir.path(), ".venv/lib/site.py");
        touch(dir.path(), "node_modules/pkg/index.js");
        touch(dir.path(), ".riskmap/graph.json");
        touch(dir.path(), "app/__pycache__/main.cpython-312.pyc");
        touch(dir.path(), "README.md");

        let files: Vec<String> = FileScanner::new(dir.path())
            .scan()
            .into_iter()
            .map(|f| f.relative)
            .collect();

        assert_eq!(files, vec!["README.md".to_string(), "app/main.py".to_string()]);
    }

    #[test]
    fn scan_python_filters_by_extension() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app/main.py");
        touch(dir.path(), "app/notes.txt");

        let files = FileScanner::new(dir.path()).scan_python();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, "app/main.py");
        assert_eq!(files[0].file_name(), "main.py");
    }

    #[test]
    fn normalize_path_unifies_separators() {
        assert_eq!(normalize_path("app\\api.py"), "app/api.py");
        assert_eq!(normalize_path("./app/api.py"), "app/api.py");
        assert_eq!(normalize_path("app/api.py"), "app/api.py");
    }

    #[test]
    fn relative_path_never_leaks_root() {
        let root = Path::new("/tmp/repo");
        assert_eq!(
            relative_path(root, Path::new("/tmp/repo/app/api.py")).as_deref(),
            Some("app/api.py")
        );
        assert_eq!(relative_path(root, Path::new("/elsewhere/api.py")), None);
    }
}
