//! Catalog queries.
//!
//! Turns caller-supplied search criteria into a storage [`Predicate`], runs
//! it, and aggregates metadata over exactly the same predicate so the facets
//! describe the returned technologies rather than the whole catalog.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::storage::{Facet, Predicate, Storage};
use crate::technology::Technology;

/// Search criteria for listing technologies.
///
/// Every dimension is optional. Empty strings inside the lists are ignored,
/// and a list that ends up empty places no constraint on its dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TechnologyFilter {
    /// Case-insensitive substring matched against name, category and tags.
    pub search: Option<String>,
    /// Accepted categories.
    pub categories: Vec<String>,
    /// Accepted stages.
    pub stages: Vec<String>,
    /// Accepted tags; a technology matches if any of its tags is listed.
    pub tags: Vec<String>,
}

impl TechnologyFilter {
    /// Build a filter from `key=value` query pairs.
    ///
    /// Recognises `search` plus repeated `categories`, `stages` and `tags`;
    /// unknown keys are ignored. A repeated `search` keeps the last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut filter = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "search" => filter.search = Some(value.into()),
                "categories" => filter.categories.push(value.into()),
                "stages" => filter.stages.push(value.into()),
                "tags" => filter.tags.push(value.into()),
                _ => {}
            }
        }
        filter
    }

    /// The storage predicate equivalent to this filter.
    #[must_use]
    pub fn to_predicate(&self) -> Predicate {
        let mut predicate = Predicate::all();

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            predicate = predicate.text_contains(search);
        }

        predicate
            .category_in(&non_empty(&self.categories))
            .stage_in(&non_empty(&self.stages))
            .any_tag_in(&non_empty(&self.tags))
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values.iter().filter(|v| !v.is_empty()).cloned().collect()
}

/// Aggregates over the technologies matched by a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    /// Number of matching technologies.
    pub total_count: usize,
    /// Distinct categories among the matches, sorted.
    pub categories: Vec<String>,
    /// Distinct stages among the matches, sorted.
    pub stages: Vec<String>,
    /// Distinct tags among the matches, flattened and sorted.
    pub available_tags: Vec<String>,
}

/// Result of a catalog listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnologyListing {
    /// Matching technologies in insertion order.
    pub technologies: Vec<Technology>,
    /// Metadata over the same matches.
    pub metadata: CatalogMetadata,
}

/// List technologies matching `filter` together with their metadata.
///
/// Never fails for lack of matches; an empty result has empty metadata.
///
/// # Errors
///
/// Returns an error if the store cannot be queried.
pub fn list(storage: &Storage, filter: &TechnologyFilter) -> Result<TechnologyListing> {
    let predicate = filter.to_predicate();

    let listing = storage.read_snapshot(|store| {
        let technologies = store.find(&predicate)?;
        let metadata = CatalogMetadata {
            total_count: store.count_matching(&predicate)?,
            categories: store.distinct(&predicate, Facet::Category)?,
            stages: store.distinct(&predicate, Facet::Stage)?,
            available_tags: store.distinct(&predicate, Facet::Tag)?,
        };
        Ok(TechnologyListing {
            technologies,
            metadata,
        })
    })?;

    debug!(
        matches = listing.metadata.total_count,
        unconstrained = predicate.is_unconstrained(),
        "Listed technologies"
    );
    Ok(listing)
}
