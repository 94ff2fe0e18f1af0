//! Datastore paths of the form `[datastore] folder/file.vmdk`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static DATASTORE_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]\s*(.*)$").ok());

/// A file or folder location on a named datastore.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatastorePath {
    pub datastore: String,
    /// Slash-separated path relative to the datastore root. Empty is the root.
    pub path: String,
}

impl DatastorePath {
    pub fn new(datastore: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            datastore: datastore.into(),
            path: path.into().trim_matches('/').to_string(),
        }
    }

    /// Root of a datastore.
    pub fn root(datastore: impl Into<String>) -> Self {
        Self::new(datastore, "")
    }

    /// Parses `[ds] some/path`. Returns `None` when the brackets are missing.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let re = DATASTORE_PATH.as_ref()?;
        let caps = re.captures(raw.trim())?;
        Some(Self::new(&caps[1], &caps[2]))
    }

    /// Appends a relative component.
    #[must_use]
    pub fn join(&self, component: &str) -> Self {
        let component = component.trim_matches('/');
        if self.path.is_empty() {
            Self::new(self.datastore.clone(), component)
        } else {
            Self::new(self.datastore.clone(), format!("{}/{component}", self.path))
        }
    }

    /// Containing folder. The parent of a top-level entry is the root.
    #[must_use]
    pub fn parent(&self) -> Self {
        match self.path.rsplit_once('/') {
            Some((dir, _)) => Self::new(self.datastore.clone(), dir),
            None => Self::root(self.datastore.clone()),
        }
    }

    /// Last path component, or an empty string for the root.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }
}

impl fmt::Display for DatastorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "[{}]", self.datastore)
        } else {
            write!(f, "[{}] {}", self.datastore, self.path)
        }
    }
}
