use anyhow::{Result, bail};

use super::catalog::{Catalog, Collection, CollectionData, VocabRow};
use super::playback::PlaybackContext;
use super::player::CategoryBrowser;
use super::sequence::{MediaRules, build_sequence};

/// Category browser over the loaded catalog, scoped to one collection.
pub(crate) struct CatalogBrowser {
    catalog: Catalog,
    collection: Collection,
    media_base: String,
}

impl CatalogBrowser {
    pub(crate) fn new(catalog: Catalog, collection: Collection, media_base: String) -> Result<Self> {
        catalog.require(collection)?;
        Ok(Self {
            catalog,
            collection,
            media_base,
        })
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(crate) fn collection(&self) -> Collection {
        self.collection
    }

    pub(crate) fn set_collection(&mut self, collection: Collection) -> Result<()> {
        self.catalog.require(collection)?;
        self.collection = collection;
        Ok(())
    }

    fn data(&self) -> Result<&CollectionData> {
        self.catalog.require(self.collection)
    }

    pub(crate) fn categories(&self) -> Vec<String> {
        self.data()
            .map(|data| data.categories.clone())
            .unwrap_or_default()
    }

    pub(crate) fn rows(&self, category: &str) -> Vec<VocabRow> {
        self.data()
            .map(|data| data.rows_in(category).into_iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl CategoryBrowser for CatalogBrowser {
    fn open(&mut self, sub_collection_id: &str) -> Result<PlaybackContext> {
        let data = self.data()?;
        if !data.has_category(sub_collection_id) {
            bail!(
                "category {sub_collection_id} does not exist in {}",
                data.collection
            );
        }

        let collection_id = data.collection.id();
        let rules = MediaRules::new(data.collection, &self.media_base, data.exceptions.clone());
        let rows = data.rows_in(sub_collection_id);
        let sequence = build_sequence(&rows, &collection_id, sub_collection_id, &rules, data);

        Ok(PlaybackContext {
            collection_id,
            sub_collection_id: sub_collection_id.to_string(),
            sub_collections: data.categories.clone(),
            sequence,
        })
    }
}
