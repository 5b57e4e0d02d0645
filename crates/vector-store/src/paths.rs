use crate::error::{Result, VectorStoreError};
use crate::fingerprint::fingerprint_bytes;
use std::path::{Path, PathBuf};

pub const DATA_DIR_NAME: &str = ".greppy";
pub const PROJECTS_DIR_NAME: &str = "projects";
pub const INDEX_FILE_NAME: &str = "index.json";
pub const LOCK_FILE_NAME: &str = "index.lock";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const MAX_NAME_CHARS: usize = 20;

/// `$GREPPY_HOME`, or `~/.greppy`
pub fn data_root() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("GREPPY_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .ok_or_else(|| VectorStoreError::Other("cannot determine home directory; set GREPPY_HOME".into()))
}

/// `<sanitized dir name>_<12 hex of sha256(abs path)>`
#[must_use]
pub fn project_id(root: &Path) -> String {
    let name: String = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("root")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(MAX_NAME_CHARS)
        .collect();
    let name = if name.is_empty() { "root".to_string() } else { name };

    let digest = fingerprint_bytes(root.to_string_lossy().as_bytes());
    format!("{name}_{}", &digest.as_str()[..12])
}

/// Canonical absolute form of a project root
pub fn canonical_root(root: &Path) -> Result<PathBuf> {
    let root = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()?.join(root)
    };
    match root.canonicalize() {
        Ok(path) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(VectorStoreError::NotFound(
            format!("project path does not exist: {}", root.display()),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Where one project's index lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub id: String,
    pub dir: PathBuf,
}

impl ProjectPaths {
    /// Resolve under the process data root
    pub fn resolve(root: &Path) -> Result<Self> {
        Self::resolve_in(&data_root()?, root)
    }

    pub fn resolve_in(data_root: &Path, root: &Path) -> Result<Self> {
        let root = canonical_root(root)?;
        let id = project_id(&root);
        let dir = data_root.join(PROJECTS_DIR_NAME).join(&id);
        Ok(Self { root, id, dir })
    }

    #[must_use]
    pub fn index_file(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.dir.join(LOCK_FILE_NAME)
    }

    #[must_use]
    pub fn index_exists(&self) -> bool {
        self.index_file().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn project_id_is_stable_and_sanitized() {
        let a = project_id(Path::new("/home/dev/my project (copy)"));
        assert_eq!(a, project_id(Path::new("/home/dev/my project (copy)")));
        let (name, hash) = a.rsplit_once('_').unwrap();
        assert_eq!(name, "my_project__copy_");
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn long_names_are_capped_and_paths_disambiguate() {
        let long = project_id(Path::new("/a/a-really-long-directory-name-here"));
        assert!(long.starts_with("a-really-long-direct_"));
        assert_ne!(project_id(Path::new("/x/app")), project_id(Path::new("/y/app")));
    }

    #[test]
    fn resolve_in_places_index_under_projects() {
        let data = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let paths = ProjectPaths::resolve_in(data.path(), project.path()).unwrap();

        assert_eq!(paths.root, project.path().canonicalize().unwrap());
        assert!(paths.index_file().starts_with(data.path().join(PROJECTS_DIR_NAME)));
        assert!(paths.index_file().ends_with(INDEX_FILE_NAME));
        assert!(!paths.index_exists());
    }

    #[test]
    fn missing_root_is_not_found() {
        let data = TempDir::new().unwrap();
        let missing = data.path().join("nope");
        assert!(matches!(
            ProjectPaths::resolve_in(data.path(), &missing),
            Err(VectorStoreError::NotFound(_))
        ));
    }
}
