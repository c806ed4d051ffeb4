use super::catalog::{AudioAvailability, Collection, Dialect, Level, MediaException, VocabRow};

pub(crate) const DEFAULT_MEDIA_BASE: &str =
    "https://elearning.hakka.gov.tw/hakka/files/cert/vocabulary";
const DEFAULT_MEDIA_YEAR: &str = "112";

/// Hailu Upper-intermediate `4-261` has its word audio in the dictionary tree.
const WORD_OVERRIDE_ROW: &str = "4-261";
const WORD_OVERRIDE_LOCATOR: &str =
    "https://elearning.hakka.gov.tw/hakka/files/dictionaries/3/hk0000014571/hk0000014571-1-2.mp3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitKind {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlayableUnit {
    pub(crate) index: usize,
    pub(crate) kind: UnitKind,
    pub(crate) row_id: String,
    /// `None` only for skip placeholders.
    pub(crate) source: Option<String>,
    pub(crate) skip: bool,
}

impl PlayableUnit {
    pub(crate) fn is_playable(&self) -> bool {
        !self.skip && self.source.is_some()
    }
}

/// Two units per row, primary then secondary. Rebuilt on every selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PlaybackSequence {
    units: Vec<PlayableUnit>,
    row_count: usize,
}

impl PlaybackSequence {
    pub(crate) fn len(&self) -> usize {
        self.units.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub(crate) fn row_count(&self) -> usize {
        self.row_count
    }

    pub(crate) fn get(&self, index: usize) -> Option<&PlayableUnit> {
        self.units.get(index)
    }

    pub(crate) fn units(&self) -> &[PlayableUnit] {
        &self.units
    }

    /// Index of the primary unit of `row_id`.
    pub(crate) fn index_of_row(&self, row_id: &str) -> Option<usize> {
        let wanted = normalize_row_id(row_id)?;
        self.units
            .iter()
            .find(|unit| unit.kind == UnitKind::Primary && unit.row_id == wanted)
            .map(|unit| unit.index)
    }

    /// Which of the row's two units will be skipped, as `(word, sentence)`.
    pub(crate) fn skipped_audio(&self, row_id: &str) -> Option<(bool, bool)> {
        let index = self.index_of_row(row_id)?;
        let word = self.units.get(index)?.skip;
        let sentence = self.units.get(index + 1).is_none_or(|unit| unit.skip);
        Some((word, sentence))
    }

    pub(crate) fn percentage_for_row(&self, row_id: &str) -> String {
        progress_percentage(row_id, self.row_count)
    }
}

/// Locator rules for one collection.
#[derive(Debug, Clone)]
pub(crate) struct MediaRules {
    collection: Collection,
    base_url: String,
    exceptions: Vec<MediaException>,
}

struct RowAddress {
    prefix: String,
    number: String,
}

impl MediaRules {
    pub(crate) fn new(
        collection: Collection,
        base_url: impl Into<String>,
        exceptions: Vec<MediaException>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            collection,
            base_url,
            exceptions,
        }
    }

    pub(crate) fn word_locator(&self, row_identifier: &str) -> String {
        if self.collection.dialect == Dialect::Hailu
            && self.collection.level == Level::UpperIntermediate
            && row_identifier == WORD_OVERRIDE_ROW
        {
            return WORD_OVERRIDE_LOCATOR.to_string();
        }
        self.locator(row_identifier, "w/", "")
    }

    pub(crate) fn sentence_locator(&self, row_identifier: &str) -> String {
        self.locator(row_identifier, "s/", "s")
    }

    fn locator(&self, row_identifier: &str, exception_segment: &str, suffix: &str) -> String {
        let address = address(row_identifier, self.collection.level);
        let level = self.collection.level;
        let dialect = self.collection.dialect.code();

        let mut year = DEFAULT_MEDIA_YEAR;
        let mut media_no = address.number.as_str();
        let mut dir_level = level.code();
        let mut segment = "";
        if let Some(entry) = self
            .exceptions
            .iter()
            .find(|entry| entry.number == row_identifier)
        {
            year = entry.year.as_str();
            media_no = entry.media_no.as_str();
            segment = exception_segment;
            if let Some(alternate) = level.alternate_dir_level() {
                dir_level = alternate;
            }
        }

        format!(
            "{}/{year}/{dir_level}/{dialect}/{segment}{}{dialect}-{}-{media_no}{suffix}.mp3",
            self.base_url,
            level.file_level(),
            address.prefix,
        )
    }
}

fn address(row_identifier: &str, level: Level) -> RowAddress {
    let (head, tail) = row_identifier
        .split_once('-')
        .unwrap_or(("", row_identifier));

    let mut prefix = head.trim().to_string();
    if prefix.parse::<u32>().is_ok_and(|value| value <= 9) {
        prefix.insert(0, '0');
    }
    if level == Level::Elementary {
        prefix.insert(0, '0');
    }

    let number = pad_number(tail.trim());
    RowAddress { prefix, number }
}

fn pad_number(raw: &str) -> String {
    if raw.len() >= 3 {
        raw.to_string()
    } else {
        format!("{raw:0>3}")
    }
}

/// Accepts `7`, `007` or a full identifier like `3-7` and yields `007`.
pub(crate) fn normalize_row_id(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let tail = raw.rsplit_once('-').map_or(raw, |(_, tail)| tail);
    if tail.is_empty() || !tail.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(pad_number(tail))
}

/// `row / total * 100` as two-decimal display text; `7 / 40` gives `17.50`.
pub(crate) fn progress_percentage(row_id: &str, total_rows: usize) -> String {
    let row_number: f64 = row_id
        .trim()
        .trim_start_matches('0')
        .parse()
        .unwrap_or(0.0);
    if total_rows == 0 {
        return format!("{:.2}", 0.0);
    }
    format!("{:.2}", row_number / total_rows as f64 * 100.0)
}

pub(crate) fn build_sequence(
    rows: &[&VocabRow],
    collection_id: &str,
    sub_collection_id: &str,
    rules: &MediaRules,
    availability: &dyn AudioAvailability,
) -> PlaybackSequence {
    let level = rules.collection.level;
    let mut units = Vec::with_capacity(rows.len() * 2);

    for row in rows {
        let row_id = address(&row.number, level).number;
        let missing = availability
            .lookup(collection_id, sub_collection_id, &row.number)
            .unwrap_or_default();

        let primary_skip = missing.primary_missing;
        units.push(PlayableUnit {
            index: units.len(),
            kind: UnitKind::Primary,
            row_id: row_id.clone(),
            source: (!primary_skip).then(|| rules.word_locator(&row.number)),
            skip: primary_skip,
        });

        let secondary_skip =
            !row.has_sentence() || !level.voices_sentences() || missing.secondary_missing;
        units.push(PlayableUnit {
            index: units.len(),
            kind: UnitKind::Secondary,
            row_id,
            source: (!secondary_skip).then(|| rules.sentence_locator(&row.number)),
            skip: secondary_skip,
        });
    }

    PlaybackSequence {
        units,
        row_count: rows.len(),
    }
}
