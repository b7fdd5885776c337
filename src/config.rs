//! Open-time options for a [`GraphStore`](crate::GraphStore).

use std::{collections::BTreeMap, path::Path, time::Duration};

use rusqlite::OpenFlags;

use crate::{GraphStore, errors::GraphError};

/// Connection options applied when a store is opened.
///
/// ```rust
/// use docgraph::GraphConfig;
/// let config = GraphConfig::default();
/// assert!(config.create_if_missing);
/// assert!(!config.read_only);
/// assert!(config.pragma_settings.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct GraphConfig {
    /// Create the database file when it does not exist. **Default:** `true`
    pub create_if_missing: bool,
    /// Open without write access. The schema script still runs and fails
    /// on a file that has never been initialized. **Default:** `false`
    pub read_only: bool,
    /// `PRAGMA key = value` statements run after open, in key order.
    pub pragma_settings: BTreeMap<String, String>,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Option<Duration>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            read_only: false,
            pragma_settings: BTreeMap::new(),
            busy_timeout: None,
        }
    }
}

impl GraphConfig {
    pub fn with_pragma<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.pragma_settings.insert(key.into(), value.into());
        self
    }

    /// Flags passed to `sqlite3_open_v2`. The connection is always opened in
    /// serialized (full mutex) mode.
    pub fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_FULL_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        if self.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if self.create_if_missing {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }
        flags
    }
}

/// Opens a store at `path` with the default JSON codec.
pub fn open_graph<P: AsRef<Path>>(path: P, cfg: &GraphConfig) -> Result<GraphStore, GraphError> {
    GraphStore::open_with_config(path, cfg)
}
