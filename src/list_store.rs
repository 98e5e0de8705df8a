use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("cannot read list file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write list file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// One blacklist or whitelist file: a sorted, duplicate-free set of
/// patterns, one per line. Loaded fresh at the start of every pass;
/// "no list configured" and "list configured but empty" differ only by
/// whether a path exists at all.
pub struct ListStore {
    path: PathBuf,
}

impl ListStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        ListStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the pattern set, creating an empty file (and parent directory)
    /// if none exists yet. Blank lines are dropped.
    pub fn load(&self) -> Result<BTreeSet<String>, ListError> {
        if !self.path.exists() {
            self.create_empty()?;
            return Ok(BTreeSet::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| ListError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Record a newly observed spam signal (sender address or IP).
    ///
    /// The candidate is considered already covered when any existing
    /// pattern is a substring of it, not only on exact match; a list that
    /// blocks "evil.com" never accumulates "spam@evil.com" on top of it.
    /// On a genuinely new signal the whole file is rewritten sorted.
    /// Returns whether the file was rewritten.
    pub fn append_if_new(&self, candidate: &str) -> Result<bool, ListError> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Ok(false);
        }
        let mut patterns = self.load()?;
        if patterns.iter().any(|p| candidate.contains(p.as_str())) {
            return Ok(false);
        }
        patterns.insert(candidate.to_string());
        self.write(&patterns)?;
        Ok(true)
    }

    fn write(&self, patterns: &BTreeSet<String>) -> Result<(), ListError> {
        let content = patterns
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&self.path, content).map_err(|source| ListError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn create_empty(&self) -> Result<(), ListError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| ListError::Write {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }
        std::fs::write(&self.path, "").map_err(|source| ListError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
