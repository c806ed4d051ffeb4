use std::fmt;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, warn};

use crate::db::{BookmarkRecord, Database};

pub(crate) const MAX_BOOKMARKS: usize = 10;
pub(crate) const KEY_SEPARATOR: &str = "||";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct BookmarkKey {
    pub(crate) collection_id: String,
    pub(crate) sub_collection_id: String,
}

impl BookmarkKey {
    pub(crate) fn new(collection_id: impl Into<String>, sub_collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            sub_collection_id: sub_collection_id.into(),
        }
    }

    pub(crate) fn of(record: &BookmarkRecord) -> Self {
        Self::new(&record.collection_id, &record.sub_collection_id)
    }

    pub(crate) fn matches(&self, record: &BookmarkRecord) -> bool {
        record.collection_id == self.collection_id
            && record.sub_collection_id == self.sub_collection_id
    }
}

impl fmt::Display for BookmarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{KEY_SEPARATOR}{}",
            self.collection_id, self.sub_collection_id
        )
    }
}

/// Ordered, capped list of resume points. Front is the most recent save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BookmarkList {
    records: Vec<BookmarkRecord>,
}

impl BookmarkList {
    /// Drops later duplicates and anything past the cap.
    pub(crate) fn from_records(records: Vec<BookmarkRecord>) -> Self {
        let mut list = Self::default();
        for record in records {
            if list.len() == MAX_BOOKMARKS {
                break;
            }
            if !list
                .records
                .iter()
                .any(|existing| BookmarkKey::of(existing) == BookmarkKey::of(&record))
            {
                list.records.push(record);
            }
        }
        list
    }

    pub(crate) fn records(&self) -> &[BookmarkRecord] {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn lookup(&self, key: &BookmarkKey) -> Option<&BookmarkRecord> {
        self.records.iter().find(|record| key.matches(record))
    }

    /// Inserts at the front and returns the record evicted to respect the cap.
    ///
    /// A sibling (same collection, other category) nearest the back is
    /// preferred over the oldest record overall.
    pub(crate) fn save(&mut self, record: BookmarkRecord) -> Option<BookmarkRecord> {
        let key = BookmarkKey::of(&record);
        self.records.retain(|existing| !key.matches(existing));
        self.records.insert(0, record);

        if self.records.len() <= MAX_BOOKMARKS {
            return None;
        }
        let sibling = (1..self.records.len()).rev().find(|&i| {
            let candidate = &self.records[i];
            candidate.collection_id == key.collection_id
                && candidate.sub_collection_id != key.sub_collection_id
        });
        Some(self.records.remove(sibling.unwrap_or(MAX_BOOKMARKS)))
    }

    pub(crate) fn remove(&mut self, key: &BookmarkKey) -> bool {
        let before = self.records.len();
        self.records.retain(|existing| !key.matches(existing));
        self.records.len() != before
    }
}

type Listener = Box<dyn FnMut(&[BookmarkRecord])>;

/// Resume-point store. Persistence faults are logged, never returned.
pub(crate) struct ProgressStore {
    db: Option<Database>,
    /// Whether the database has been read successfully at least once.
    synced: bool,
    cache: BookmarkList,
    listeners: Vec<Listener>,
}

impl ProgressStore {
    pub(crate) fn open(db: Database) -> Self {
        let mut store = Self {
            db: Some(db),
            synced: false,
            cache: BookmarkList::default(),
            listeners: Vec::new(),
        };
        store.cache = store.reload();
        store
    }

    /// In-memory only; used when the database cannot be opened.
    pub(crate) fn detached() -> Self {
        Self {
            db: None,
            synced: false,
            cache: BookmarkList::default(),
            listeners: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, listener: impl FnMut(&[BookmarkRecord]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub(crate) fn save(
        &mut self,
        row_id: &str,
        percentage: &str,
        sub_collection_id: &str,
        collection_id: &str,
    ) {
        let mut list = self.reload();
        let evicted = list.save(BookmarkRecord {
            collection_id: collection_id.to_string(),
            sub_collection_id: sub_collection_id.to_string(),
            row_id: row_id.to_string(),
            percentage: percentage.to_string(),
            timestamp: Utc::now().timestamp_millis(),
        });
        if let Some(evicted) = evicted {
            debug!(key = %BookmarkKey::of(&evicted), "evicted resume point");
        }
        self.commit(list);
    }

    pub(crate) fn remove(&mut self, collection_id: &str, sub_collection_id: &str) {
        let mut list = self.reload();
        if list.remove(&BookmarkKey::new(collection_id, sub_collection_id)) {
            self.commit(list);
        }
    }

    pub(crate) fn list(&self) -> &[BookmarkRecord] {
        self.cache.records()
    }

    pub(crate) fn lookup(&self, collection_id: &str, sub_collection_id: &str) -> Option<&BookmarkRecord> {
        self.cache
            .lookup(&BookmarkKey::new(collection_id, sub_collection_id))
    }

    /// Current stored list. An unreadable database falls back to the cached
    /// list so a later write never replaces good records with a partial view.
    fn reload(&mut self) -> BookmarkList {
        let Some(db) = &self.db else {
            return self.cache.clone();
        };
        match db.load_bookmarks() {
            Ok(records) => {
                self.synced = true;
                BookmarkList::from_records(records)
            }
            Err(err) => {
                warn!(error = %err, "failed to load resume points, using the cached list");
                self.cache.clone()
            }
        }
    }

    /// Writes `list` and publishes it. A failed write leaves the cache as it
    /// was. A database that was never readable is not written over.
    fn commit(&mut self, list: BookmarkList) {
        if let Some(db) = &self.db {
            if !self.synced {
                warn!("resume points are unreadable on disk, keeping this change in memory");
            } else if let Err(err) = persist(db, &list) {
                warn!(error = %err, "failed to persist resume points, keeping the previous list");
                return;
            }
        }
        self.cache = list;
        for listener in &mut self.listeners {
            listener(self.cache.records());
        }
    }

    #[cfg(test)]
    pub(crate) fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }
}

fn persist(db: &Database, list: &BookmarkList) -> Result<()> {
    db.replace_bookmarks(list.records())
}
