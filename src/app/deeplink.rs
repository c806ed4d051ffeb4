use std::fmt;

use anyhow::{Context, Result, anyhow};

use super::catalog::Collection;
use super::sequence::normalize_row_id;
use crate::db::BookmarkRecord;

/// Query string that fully addresses a resume point:
/// `dialect=si&level=5&category=<encoded>&row=007`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeepLink {
    pub(crate) collection: Collection,
    pub(crate) category: String,
    pub(crate) row_id: Option<String>,
}

impl DeepLink {
    /// Accepts a bare query or anything with a `?` in front of it.
    pub(crate) fn parse(raw: &str) -> Result<Self> {
        let query = raw.split_once('?').map_or(raw, |(_, query)| query);
        let query = query.split_once('#').map_or(query, |(query, _)| query);

        let mut dialect = None;
        let mut level = None;
        let mut category = None;
        let mut row = None;
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode(value).with_context(|| format!("bad value for {name}"))?;
            match name {
                "dialect" => dialect = Some(value),
                "level" => level = Some(value),
                "category" => category = Some(value),
                "row" => row = Some(value),
                _ => {}
            }
        }

        let dialect = dialect.ok_or_else(|| anyhow!("link has no dialect"))?;
        let level = level.ok_or_else(|| anyhow!("link has no level"))?;
        let category = category
            .filter(|category| !category.trim().is_empty())
            .ok_or_else(|| anyhow!("link has no category"))?;
        let row_id = match row.filter(|row| !row.trim().is_empty()) {
            Some(row) => {
                Some(normalize_row_id(&row).ok_or_else(|| anyhow!("not a row number: {row}"))?)
            }
            None => None,
        };

        Ok(Self {
            collection: Collection::from_codes(&dialect, &level)?,
            category,
            row_id,
        })
    }

    pub(crate) fn from_bookmark(record: &BookmarkRecord) -> Result<Self> {
        let collection = Collection::from_id(&record.collection_id)
            .ok_or_else(|| anyhow!("unknown collection id: {}", record.collection_id))?;
        Ok(Self {
            collection,
            category: record.sub_collection_id.clone(),
            row_id: Some(record.row_id.clone()),
        })
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dialect={}&level={}&category={}",
            self.collection.dialect.code(),
            self.collection.level.code(),
            urlencoding::encode(&self.category)
        )?;
        if let Some(row) = &self.row_id {
            write!(f, "&row={row}")?;
        }
        Ok(())
    }
}

fn decode(value: &str) -> Result<String> {
    let spaced = value.replace('+', " ");
    Ok(urlencoding::decode(&spaced)?.into_owned())
}
