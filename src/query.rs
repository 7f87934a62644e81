use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::{
    properties::{LinkHash, Segment},
    MapError,
};

/// Number of segments requested per `find_segments` call while loading a map.
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_OFFSET: usize = 0;

/// Pagination options for store queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Pagination {
    /// Offsets are unsigned, so only the limit needs checking.
    pub fn new(offset: usize, limit: usize) -> Result<Self, MapError> {
        if limit == 0 {
            return Err(MapError::InvalidPagination(
                "limit should be a strictly-positive integer".to_string(),
            ));
        }
        Ok(Pagination { offset, limit })
    }

    /// The page immediately following this one.
    pub fn next(&self) -> Pagination {
        Pagination {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            offset: DEFAULT_OFFSET,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A set of filtering options for segments. Empty fields do not filter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentsFilter {
    /// Process of the target segments.
    pub process: String,
    /// Process step of the target segments.
    pub step: String,
    /// Maps that should contain the target segments.
    pub map_ids: Vec<String>,
    /// Tags that the target segments should all carry.
    pub tags: Vec<String>,
    /// Filter out segments that have a parent.
    pub without_parent: bool,
    /// Only keep children of this segment.
    pub prev_link_hash: Option<LinkHash>,
    /// Only keep these segments.
    pub link_hashes: Vec<LinkHash>,
}

impl SegmentsFilter {
    pub fn new(process: impl Into<String>) -> Self {
        SegmentsFilter {
            process: process.into(),
            ..Default::default()
        }
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = step.into();
        self
    }

    pub fn with_map_ids<I, T>(mut self, map_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.map_ids.extend(map_ids.into_iter().map(Into::into));
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn without_parent(mut self) -> Self {
        self.without_parent = true;
        self.prev_link_hash = None;
        self
    }

    pub fn with_parent(mut self, parent: LinkHash) -> Self {
        self.without_parent = false;
        self.prev_link_hash = Some(parent);
        self
    }

    pub fn with_link_hashes<I: IntoIterator<Item = LinkHash>>(mut self, hashes: I) -> Self {
        self.link_hashes.extend(hashes);
        self
    }

    pub fn matches(&self, segment: &Segment) -> bool {
        if !self.process.is_empty() && segment.process != self.process {
            return false;
        }
        if !self.step.is_empty() && segment.step != self.step {
            return false;
        }
        if !self.map_ids.is_empty() && !self.map_ids.contains(&segment.map_id) {
            return false;
        }
        if !self.tags.iter().all(|t| segment.tags.contains(t)) {
            return false;
        }
        if self.without_parent && segment.parent_hash.is_some() {
            return false;
        }
        if let Some(parent) = self.prev_link_hash {
            if segment.parent_hash != Some(parent) {
                return false;
            }
        }
        self.link_hashes.is_empty() || self.link_hashes.contains(&segment.link_hash)
    }

    /// Query parameters for an HTTP transport. Fields left at their default are omitted so
    /// request URLs stay short.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if !self.process.is_empty() {
            pairs.push(("process".to_string(), self.process.clone()));
        }
        if !self.step.is_empty() {
            pairs.push(("step".to_string(), self.step.clone()));
        }
        for map_id in &self.map_ids {
            pairs.push(("mapIds[]".to_string(), map_id.clone()));
        }
        for tag in &self.tags {
            pairs.push(("tags[]".to_string(), tag.clone()));
        }
        if self.without_parent {
            pairs.push(("withoutParent".to_string(), "true".to_string()));
        }
        if let Some(parent) = self.prev_link_hash {
            pairs.push(("prevLinkHash".to_string(), parent.to_hex()));
        }
        for hash in &self.link_hashes {
            pairs.push(("linkHashes[]".to_string(), hash.to_hex()));
        }
        pairs
    }
}

/// One slice of a filtered segment collection, along with the size of the whole collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentsPage {
    pub segments: Vec<Segment>,
    pub total_count: usize,
}

/// Access to a segment store. Implementations own their transport, timeouts and retries;
/// callers inject a handle rather than reaching for a shared client.
pub trait SegmentStore: Sync {
    /// Find segments matching `filter`, restricted to the `page` slice.
    fn find_segments(
        &self,
        filter: &SegmentsFilter,
        page: &Pagination,
    ) -> impl Future<Output = Result<SegmentsPage, MapError>> + Send;

    /// Get a segment from its hex-encoded link hash. `Ok(None)` when the store does not hold it.
    fn get_segment(
        &self,
        link_hash: &str,
    ) -> impl Future<Output = Result<Option<Segment>, MapError>> + Send;

    /// List the map ids of a process.
    /// Default implementation returns an empty list (stores without a map index).
    fn get_map_ids(
        &self,
        _process: &str,
        _page: &Pagination,
    ) -> impl Future<Output = Result<Vec<String>, MapError>> + Send {
        tracing::warn!("This SegmentStore impl does not have a get_map_ids implementation!");
        async { Ok(Vec::new()) }
    }
}

impl<T: SegmentStore> SegmentStore for &T {
    fn find_segments(
        &self,
        filter: &SegmentsFilter,
        page: &Pagination,
    ) -> impl Future<Output = Result<SegmentsPage, MapError>> + Send {
        (**self).find_segments(filter, page)
    }

    fn get_segment(
        &self,
        link_hash: &str,
    ) -> impl Future<Output = Result<Option<Segment>, MapError>> + Send {
        (**self).get_segment(link_hash)
    }

    fn get_map_ids(
        &self,
        process: &str,
        page: &Pagination,
    ) -> impl Future<Output = Result<Vec<String>, MapError>> + Send {
        (**self).get_map_ids(process, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::SegmentBuilder;
    use test_log::test;

    #[test]
    fn test_pagination_rejects_empty_pages() {
        assert!(matches!(
            Pagination::new(0, 0),
            Err(MapError::InvalidPagination(_))
        ));
        let page = Pagination::new(25, 25).unwrap();
        assert_eq!(page.next(), Pagination::new(50, 25).unwrap());
        assert_eq!(Pagination::default().limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_filter_matches() {
        let root = SegmentBuilder::new("p", "m")
            .with_step("init")
            .with_tags(["t1", "t2"])
            .build()
            .unwrap();
        let child = SegmentBuilder::new("p", "m")
            .with_parent(root.link_hash)
            .with_step("sign")
            .build()
            .unwrap();
        let other = SegmentBuilder::new("p", "other").build().unwrap();

        let map_filter = SegmentsFilter::new("p").with_map_ids(["m"]);
        assert!(map_filter.matches(&root));
        assert!(map_filter.matches(&child));
        assert!(!map_filter.matches(&other));

        assert!(!SegmentsFilter::new("q").matches(&root));
        assert!(SegmentsFilter::default().matches(&other));

        let roots = map_filter.clone().without_parent();
        assert!(roots.matches(&root));
        assert!(!roots.matches(&child));

        let children = map_filter.clone().with_parent(root.link_hash);
        assert!(!children.without_parent);
        assert!(children.matches(&child));
        assert!(!children.matches(&root));

        assert!(map_filter.clone().with_tags(["t1"]).matches(&root));
        assert!(!map_filter.clone().with_tags(["t1", "t3"]).matches(&root));
        assert!(map_filter.clone().with_step("sign").matches(&child));
        assert!(!map_filter
            .clone()
            .with_link_hashes([child.link_hash])
            .matches(&root));
    }

    #[test]
    fn test_query_pairs_omit_defaults() {
        assert!(SegmentsFilter::default().to_query_pairs().is_empty());

        let parent = SegmentBuilder::new("p", "m").build().unwrap().link_hash;
        let pairs = SegmentsFilter::new("p")
            .with_map_ids(["m1", "m2"])
            .with_parent(parent)
            .to_query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("process".to_string(), "p".to_string()),
                ("mapIds[]".to_string(), "m1".to_string()),
                ("mapIds[]".to_string(), "m2".to_string()),
                ("prevLinkHash".to_string(), parent.to_hex()),
            ]
        );
    }
}
