use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// Files above this size are reported as `large` and never read
pub const MAX_FILE_SIZE_BYTES: u64 = 512 * 1024;

/// Result of one walk over the project root
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Indexable files, sorted
    pub files: Vec<PathBuf>,
    /// Allowlisted files skipped for size
    pub large: Vec<PathBuf>,
}

/// Scanner for finding source files in a project
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Scan directory for source files (.gitignore aware)
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true) // do not index hidden files
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false);
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if Self::is_noise_file(path) {
                        log::debug!("Skipping noisy artifact {}", path.display());
                        continue;
                    }
                    if !Self::is_source_file(path) {
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > MAX_FILE_SIZE_BYTES {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                MAX_FILE_SIZE_BYTES
                            );
                            report.large.push(path.to_path_buf());
                            continue;
                        }
                    }

                    report.files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        report.files.sort();
        report.large.sort();
        log::info!("Found {} source files", report.files.len());
        report
    }

    /// Check if file has an allowlisted extension
    pub fn is_source_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SUPPORTED_EXTENSIONS
                    .iter()
                    .any(|candidate| ext.eq_ignore_ascii_case(candidate))
            })
    }

    pub fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        relative.components().any(|component| match component {
            Component::Normal(name) => {
                let lowered = name.to_string_lossy().to_lowercase();
                IGNORED_SCOPES.iter().any(|ignored| ignored == &lowered)
            }
            _ => false,
        })
    }

    pub fn is_noise_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| {
                NOISE_FILE_NAMES
                    .iter()
                    .any(|candidate| name.eq_ignore_ascii_case(candidate))
            })
    }

    /// Whether a change at `path` could alter the indexable set.
    ///
    /// Mirrors the walk filters without touching the disk, so it also answers for paths
    /// that were just removed.
    pub fn is_relevant_path(root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        for component in relative.components() {
            if let Component::Normal(name) = component {
                let name = name.to_string_lossy();
                if name.starts_with('.') {
                    return false;
                }
                if IGNORED_SCOPES
                    .iter()
                    .any(|ignored| name.eq_ignore_ascii_case(ignored))
                {
                    return false;
                }
            }
        }
        Self::is_source_file(path) && !Self::is_noise_file(path)
    }
}

/// Directory names that are never descended into
pub const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // caches / builds
    ".cache",
    "node_modules",
    "__pycache__",
    ".next",
    ".nuxt",
    "build",
    "dist",
    "target",
    // virtualenvs
    ".venv",
    "venv",
    "myenv",
    "env",
    // data / vendor
    "vendor",
    "data",
];

const NOISE_FILE_NAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Pipfile.lock",
    "composer.lock",
];

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "tsx", "jsx", "go", "rs", "java", "kt", "c", "cpp", "h", "hpp", "rb",
    "php", "swift", "md", "txt", "yaml", "yml", "json",
];
