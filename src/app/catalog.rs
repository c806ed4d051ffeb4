use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Dialect {
    Sixian,
    Hailu,
    Dapu,
    Raoping,
    Zhaoan,
}

impl Dialect {
    pub(crate) fn code(self) -> &'static str {
        match self {
            Self::Sixian => "si",
            Self::Hailu => "ha",
            Self::Dapu => "da",
            Self::Raoping => "rh",
            Self::Zhaoan => "zh",
        }
    }

    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "si" => Some(Self::Sixian),
            "ha" => Some(Self::Hailu),
            "da" => Some(Self::Dapu),
            "rh" => Some(Self::Raoping),
            "zh" => Some(Self::Zhaoan),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Sixian => "Sixian",
            Self::Hailu => "Hailu",
            Self::Dapu => "Dapu",
            Self::Raoping => "Raoping",
            Self::Zhaoan => "Zhaoan",
        }
    }
}

/// Proficiency tier. The code doubles as the media directory level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Level {
    Basic,
    Elementary,
    Intermediate,
    UpperIntermediate,
    Advanced,
}

impl Level {
    pub(crate) fn code(self) -> &'static str {
        match self {
            Self::Basic => "5",
            Self::Elementary => "1",
            Self::Intermediate => "2",
            Self::UpperIntermediate => "3",
            Self::Advanced => "4",
        }
    }

    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "5" => Some(Self::Basic),
            "1" => Some(Self::Elementary),
            "2" => Some(Self::Intermediate),
            "3" => Some(Self::UpperIntermediate),
            "4" => Some(Self::Advanced),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Elementary => "Elementary",
            Self::Intermediate => "Intermediate",
            Self::UpperIntermediate => "Upper-intermediate",
            Self::Advanced => "Advanced",
        }
    }

    /// Directory level used when a row hits the exception table.
    pub(crate) fn alternate_dir_level(self) -> Option<&'static str> {
        match self {
            Self::Basic => Some("1"),
            _ => None,
        }
    }

    pub(crate) fn file_level(self) -> &'static str {
        match self {
            Self::Basic | Self::Elementary => "",
            Self::Intermediate => "1",
            Self::UpperIntermediate => "2",
            Self::Advanced => "3",
        }
    }

    /// Example sentences are never voiced at this tier.
    pub(crate) fn voices_sentences(self) -> bool {
        !matches!(self, Self::Advanced)
    }
}

/// A dialect and level combination; the parent of a set of categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Collection {
    pub(crate) dialect: Dialect,
    pub(crate) level: Level,
}

impl Collection {
    pub(crate) fn new(dialect: Dialect, level: Level) -> Self {
        Self { dialect, level }
    }

    pub(crate) fn from_codes(dialect: &str, level: &str) -> Result<Self> {
        let dialect =
            Dialect::from_code(dialect).ok_or_else(|| anyhow!("unknown dialect code: {dialect}"))?;
        let level = Level::from_code(level).ok_or_else(|| anyhow!("unknown level code: {level}"))?;
        Ok(Self::new(dialect, level))
    }

    pub(crate) fn id(self) -> String {
        format!("{}{}", self.dialect.code(), self.level.code())
    }

    pub(crate) fn from_id(id: &str) -> Option<Self> {
        let dialect = Dialect::from_code(id.get(..2)?)?;
        let level = Level::from_code(id.get(2..)?)?;
        Some(Self { dialect, level })
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.dialect.label(), self.level.label())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VocabRow {
    /// Row identifier as printed in the word list, e.g. `3-12`.
    pub(crate) number: String,
    #[serde(default)]
    pub(crate) word: String,
    #[serde(default)]
    pub(crate) phonetic: String,
    #[serde(default)]
    pub(crate) meaning: String,
    #[serde(default)]
    pub(crate) notes: String,
    #[serde(default)]
    pub(crate) sentence: String,
    #[serde(default)]
    pub(crate) translation: String,
    #[serde(default)]
    pub(crate) categories: Vec<String>,
}

impl VocabRow {
    pub(crate) fn has_sentence(&self) -> bool {
        !self.sentence.trim().is_empty()
    }

    pub(crate) fn in_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct MediaException {
    pub(crate) number: String,
    pub(crate) year: String,
    pub(crate) media_no: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct MissingAudio {
    pub(crate) primary_missing: bool,
    pub(crate) secondary_missing: bool,
}

/// Known-missing audio lookup consulted while building playback sequences.
pub(crate) trait AudioAvailability {
    fn lookup(
        &self,
        collection_id: &str,
        sub_collection_id: &str,
        row_identifier: &str,
    ) -> Option<MissingAudio>;
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    collections: Vec<RawCollection>,
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    dialect: String,
    level: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    exceptions: Vec<MediaException>,
    #[serde(default)]
    missing_audio: Vec<RawMissingAudio>,
    #[serde(default)]
    rows: Vec<VocabRow>,
}

#[derive(Debug, Deserialize)]
struct RawMissingAudio {
    category: String,
    number: String,
    #[serde(default)]
    primary_missing: bool,
    #[serde(default)]
    secondary_missing: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct CollectionData {
    pub(crate) collection: Collection,
    pub(crate) categories: Vec<String>,
    pub(crate) exceptions: Vec<MediaException>,
    pub(crate) rows: Vec<VocabRow>,
    missing: HashMap<(String, String), MissingAudio>,
}

impl CollectionData {
    fn from_raw(raw: RawCollection) -> Result<Self> {
        let collection = Collection::from_codes(&raw.dialect, &raw.level)?;

        let mut categories = raw.categories;
        if categories.is_empty() {
            for row in &raw.rows {
                for category in &row.categories {
                    if !categories.contains(category) {
                        categories.push(category.clone());
                    }
                }
            }
        }

        let missing = raw
            .missing_audio
            .into_iter()
            .map(|entry| {
                (
                    (entry.category, entry.number),
                    MissingAudio {
                        primary_missing: entry.primary_missing,
                        secondary_missing: entry.secondary_missing,
                    },
                )
            })
            .collect();

        Ok(Self {
            collection,
            categories,
            exceptions: raw.exceptions,
            rows: raw.rows,
            missing,
        })
    }

    pub(crate) fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub(crate) fn rows_in(&self, category: &str) -> Vec<&VocabRow> {
        self.rows
            .iter()
            .filter(|row| row.in_category(category))
            .collect()
    }
}

impl AudioAvailability for CollectionData {
    fn lookup(
        &self,
        collection_id: &str,
        sub_collection_id: &str,
        row_identifier: &str,
    ) -> Option<MissingAudio> {
        if collection_id != self.collection.id() {
            return None;
        }
        self.missing
            .get(&(sub_collection_id.to_string(), row_identifier.to_string()))
            .copied()
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    collections: Vec<CollectionData>,
}

impl Catalog {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid catalog {}", path.display()))
    }

    pub(crate) fn from_json(raw: &str) -> Result<Self> {
        let parsed: RawCatalog = serde_json::from_str(raw).context("failed to parse catalog JSON")?;
        let mut collections: Vec<CollectionData> = Vec::with_capacity(parsed.collections.len());
        for raw_collection in parsed.collections {
            let data = CollectionData::from_raw(raw_collection)?;
            if collections
                .iter()
                .any(|existing| existing.collection == data.collection)
            {
                bail!("collection {} is listed more than once", data.collection);
            }
            collections.push(data);
        }
        Ok(Self { collections })
    }

    pub(crate) fn collections(&self) -> &[CollectionData] {
        &self.collections
    }

    pub(crate) fn get(&self, collection: Collection) -> Option<&CollectionData> {
        self.collections
            .iter()
            .find(|data| data.collection == collection)
    }

    pub(crate) fn require(&self, collection: Collection) -> Result<&CollectionData> {
        self.get(collection)
            .ok_or_else(|| anyhow!("collection {collection} is not in the catalog"))
    }

    /// Collection `step` places away in catalog order, wrapping around.
    pub(crate) fn neighbor(&self, collection: Collection, step: isize) -> Option<Collection> {
        let len = self.collections.len() as isize;
        if len == 0 {
            return None;
        }
        let current = self
            .collections
            .iter()
            .position(|data| data.collection == collection)? as isize;
        let next = (current + step).rem_euclid(len) as usize;
        Some(self.collections[next].collection)
    }
}
