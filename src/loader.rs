//! Map loading: paging a map's segments out of a [SegmentStore] and pulling in the segments
//! they reference.
//!
//! Every request is awaited before the next one is issued. Ordering is therefore reproducible
//! (page order, then reference discovery order) and a single load never has more than one
//! request in flight against the store.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    properties::{LinkHash, Segment},
    query::{Pagination, SegmentStore, SegmentsFilter, DEFAULT_PAGE_SIZE},
    MapError,
};

/// Number of consecutive pages that may come back without new segments before the store is
/// considered inconsistent.
pub const MAX_STALLED_PAGES: usize = 2;

/// Insertion-ordered set of segments keyed by link hash.
#[derive(Debug, Clone, Default)]
pub struct SegmentSet {
    segments: Vec<Segment>,
    index: BTreeSet<LinkHash>,
}

impl SegmentSet {
    pub fn new() -> Self {
        SegmentSet::default()
    }

    /// Returns false (and leaves the set untouched) if the hash is already present.
    pub fn insert(&mut self, segment: Segment) -> bool {
        if !self.index.insert(segment.link_hash) {
            return false;
        }
        self.segments.push(segment);
        true
    }

    /// Insert every segment, returning how many were new.
    pub fn extend<I: IntoIterator<Item = Segment>>(&mut self, segments: I) -> usize {
        segments
            .into_iter()
            .map(|s| self.insert(s))
            .filter(|added| *added)
            .count()
    }

    pub fn contains(&self, link_hash: &LinkHash) -> bool {
        self.index.contains(link_hash)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn into_vec(self) -> Vec<Segment> {
        self.segments
    }
}

impl FromIterator<Segment> for SegmentSet {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        let mut set = SegmentSet::new();
        set.extend(iter);
        set
    }
}

/// Fetches referenced segments that are not part of a segment set yet.
///
/// Lookups are remembered, including the ones the store could not answer, so a target is
/// requested at most once for the lifetime of the resolver.
#[derive(Debug)]
pub struct ReferenceResolver<S> {
    store: S,
    fetched: BTreeMap<LinkHash, Option<Segment>>,
}

impl<S: SegmentStore> ReferenceResolver<S> {
    pub fn new(store: S) -> Self {
        ReferenceResolver {
            store,
            fetched: BTreeMap::new(),
        }
    }

    /// Returns `segments` followed by every distinct referenced segment that was not among
    /// them. References the store cannot find are dropped: remote stores may prune segments.
    #[tracing::instrument(skip_all, fields(segments = segments.len()))]
    pub async fn resolve(&mut self, segments: Vec<Segment>) -> Result<Vec<Segment>, MapError> {
        let mut set: SegmentSet = segments.into_iter().collect();
        let targets = set
            .iter()
            .flat_map(|s| s.refs.iter().map(|r| r.link_hash))
            .collect::<Vec<_>>();

        let mut scheduled = BTreeSet::new();
        for target in targets {
            if set.contains(&target) || !scheduled.insert(target) {
                continue;
            }
            if let Some(segment) = self.fetch(target).await? {
                set.insert(segment);
            }
        }
        Ok(set.into_vec())
    }

    async fn fetch(&mut self, target: LinkHash) -> Result<Option<Segment>, MapError> {
        if let Some(known) = self.fetched.get(&target) {
            return Ok(known.clone());
        }
        let found = self.store.get_segment(&target.to_hex()).await?;
        if found.is_none() {
            tracing::debug!("Referenced segment {} not found, dropping reference", target);
        }
        self.fetched.insert(target, found.clone());
        Ok(found)
    }

    /// Number of distinct targets looked up in the store so far.
    pub fn lookups(&self) -> usize {
        self.fetched.len()
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

/// Loads all segments of a map in a form suitable for [crate::layout::build_layout].
#[derive(Debug, Clone)]
pub struct MapLoader<S> {
    store: S,
    page_size: usize,
}

impl<S: SegmentStore> MapLoader<S> {
    pub fn new(store: S) -> Self {
        MapLoader {
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Result<Self, MapError> {
        Pagination::new(0, page_size)?;
        self.page_size = page_size;
        Ok(self)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load every segment of `map_id`, followed by the segments they reference.
    ///
    /// An empty map is not an error. Store failures are propagated untouched.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, process: &str, map_id: &str) -> Result<Vec<Segment>, MapError> {
        let set = self.load_map(process, map_id).await?;
        ReferenceResolver::new(&self.store)
            .resolve(set.into_vec())
            .await
    }

    /// Page through the map's own segments. References are left unresolved.
    pub async fn load_map(&self, process: &str, map_id: &str) -> Result<SegmentSet, MapError> {
        let filter = SegmentsFilter::new(process).with_map_ids([map_id]);
        let mut set = SegmentSet::new();

        let mut page = Pagination::new(0, self.page_size)?;
        let response = self.store.find_segments(&filter, &page).await?;
        let total_count = response.total_count;
        set.extend(response.segments);
        tracing::debug!(
            "Map {process}/{map_id} declares {total_count} segments, received {}",
            set.len()
        );

        let mut stalled = 0;
        while set.len() < total_count {
            page = Pagination::new(set.len(), self.page_size)?;
            let response = self.store.find_segments(&filter, &page).await?;
            if set.extend(response.segments) == 0 {
                stalled += 1;
                tracing::warn!(
                    "Page at offset {} added no segments ({stalled}/{MAX_STALLED_PAGES})",
                    page.offset
                );
                if stalled >= MAX_STALLED_PAGES {
                    break;
                }
            } else {
                stalled = 0;
            }
        }

        if set.len() != total_count {
            return Err(MapError::InconsistentPage {
                expected: total_count,
                received: set.len(),
            });
        }
        Ok(set)
    }
}
