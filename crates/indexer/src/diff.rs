use greppy_vector_store::Fingerprint;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-file classification of a scan against the stored index. Paths are root-relative and
/// each list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub unchanged: Vec<String>,
    pub deleted: Vec<String>,
}

impl ChangeSet {
    /// Compare recorded fingerprints with the indexable files currently on disk.
    /// A recorded path missing from `current` is deleted, whatever the reason it vanished.
    pub fn classify<'a>(
        recorded: impl IntoIterator<Item = (&'a str, &'a Fingerprint)>,
        current: &BTreeMap<String, Fingerprint>,
    ) -> Self {
        let recorded: BTreeMap<&str, &Fingerprint> = recorded.into_iter().collect();
        let mut changes = Self::default();

        for (path, fingerprint) in current {
            match recorded.get(path.as_str()) {
                None => changes.added.push(path.clone()),
                Some(previous) if *previous == fingerprint => changes.unchanged.push(path.clone()),
                Some(_) => changes.modified.push(path.clone()),
            }
        }
        changes.deleted = recorded
            .keys()
            .filter(|path| !current.contains_key(**path))
            .map(|path| (*path).to_string())
            .collect();

        changes
    }

    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty())
    }

    /// Files that need chunking and embedding
    pub fn to_embed(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.modified.iter())
    }

    /// Files whose previous chunks must go
    pub fn to_remove(&self) -> impl Iterator<Item = &String> {
        self.modified.iter().chain(self.deleted.iter())
    }
}
