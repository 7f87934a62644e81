//! [crate::properties] contains the basic building blocks shared by the loader and the layout
//! builder: link hashes, segments and the references between them.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use crate::error::MapError;

pub const LINK_HASH_LEN: usize = 32;

/// Hex-encode an arbitrary hash buffer, the format used for node ids and store lookups.
pub fn hash_to_string<B: AsRef<[u8]>>(hash: B) -> String {
    hex::encode(hash)
}

/// Link Hash
///
/// The 32 byte digest identifying a segment. Displayed, parsed and serialized as lowercase hex.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkHash([u8; LINK_HASH_LEN]);

impl LinkHash {
    pub fn from_bytes(bytes: [u8; LINK_HASH_LEN]) -> Self {
        LinkHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; LINK_HASH_LEN] {
        &self.0
    }

    /// The SHA-256 digest of `content`.
    pub fn digest<B: AsRef<[u8]>>(content: B) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_ref());
        LinkHash(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hash_to_string(self.0)
    }
}

impl AsRef<[u8]> for LinkHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for LinkHash {
    type Error = MapError;

    fn try_from(blob: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; LINK_HASH_LEN] = blob.try_into().map_err(|_| {
            MapError::InvalidHash(format!(
                "expected {LINK_HASH_LEN} bytes, received {}",
                blob.len()
            ))
        })?;
        Ok(LinkHash(bytes))
    }
}

impl FromStr for LinkHash {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; LINK_HASH_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(LinkHash(bytes))
    }
}

impl TryFrom<String> for LinkHash {
    type Error = MapError;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        string.parse()
    }
}

impl From<LinkHash> for String {
    fn from(val: LinkHash) -> Self {
        val.to_hex()
    }
}

impl Display for LinkHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A pointer from one segment to another, possibly owned by a different process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub link_hash: LinkHash,
    pub process: String,
}

impl Reference {
    pub fn new(link_hash: LinkHash, process: impl Into<String>) -> Self {
        Reference {
            link_hash,
            process: process.into(),
        }
    }
}

/// An immutable, hash-linked record belonging to one map of one process.
///
/// Segments are produced by the owning store; this crate only reads them. The `link_hash` is
/// the digest of every other field, see [Segment::compute_hash].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub link_hash: LinkHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_hash: Option<LinkHash>,
    pub process: String,
    pub map_id: String,
    #[serde(default)]
    pub step: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// The hashed portion of a segment. Field order is fixed so the digest is reproducible.
#[derive(Serialize)]
struct LinkContent<'a> {
    process: &'a str,
    map_id: &'a str,
    parent_hash: Option<&'a LinkHash>,
    step: &'a str,
    refs: &'a [Reference],
    data: &'a Value,
    tags: &'a [String],
}

impl Segment {
    pub fn id(&self) -> String {
        self.link_hash.to_hex()
    }

    pub fn parent_id(&self) -> Option<String> {
        self.parent_hash.map(|h| h.to_hex())
    }

    /// Whether this segment belongs to the map identified by `process` and `map_id`.
    pub fn in_map(&self, process: &str, map_id: &str) -> bool {
        self.process == process && self.map_id == map_id
    }

    pub fn compute_hash(&self) -> Result<LinkHash, MapError> {
        let content = LinkContent {
            process: &self.process,
            map_id: &self.map_id,
            parent_hash: self.parent_hash.as_ref(),
            step: &self.step,
            refs: &self.refs,
            data: &self.data,
            tags: &self.tags,
        };
        Ok(LinkHash::digest(serde_json::to_vec(&content)?))
    }

    /// Check that `link_hash` matches the segment content.
    pub fn verify(&self) -> Result<(), MapError> {
        let computed = self.compute_hash()?;
        if computed != self.link_hash {
            return Err(MapError::InvalidHash(format!(
                "segment {} hashes to {computed}",
                self.link_hash
            )));
        }
        Ok(())
    }
}

/// Assembles new segments the way an owning store does, computing the link hash on build.
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    segment: Segment,
}

impl SegmentBuilder {
    pub fn new(process: impl Into<String>, map_id: impl Into<String>) -> Self {
        SegmentBuilder {
            segment: Segment {
                link_hash: LinkHash::default(),
                parent_hash: None,
                process: process.into(),
                map_id: map_id.into(),
                step: String::new(),
                refs: Vec::new(),
                data: Value::Null,
                tags: Vec::new(),
            },
        }
    }

    pub fn with_parent(mut self, parent: LinkHash) -> Self {
        self.segment.parent_hash = Some(parent);
        self
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.segment.step = step.into();
        self
    }

    pub fn with_refs<I: IntoIterator<Item = Reference>>(mut self, refs: I) -> Self {
        self.segment.refs.extend(refs);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.segment.data = data;
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.segment.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<Segment, MapError> {
        let mut segment = self.segment;
        segment.link_hash = segment.compute_hash()?;
        Ok(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_log::test;

    #[test]
    fn test_hash_to_string() {
        assert_eq!(hash_to_string([42u8, 24u8]), "2a18");
    }

    #[test]
    fn test_link_hash_parse_and_display() {
        let hash = LinkHash::digest(b"segment");
        let hex_str = hash.to_string();
        assert_eq!(hex_str.len(), 2 * LINK_HASH_LEN);
        assert_eq!(hex_str.parse::<LinkHash>().unwrap(), hash);

        assert!(matches!(
            "2a18".parse::<LinkHash>(),
            Err(MapError::InvalidHash(_))
        ));
        assert!(matches!(
            LinkHash::try_from(&[1u8, 2, 3][..]),
            Err(MapError::InvalidHash(_))
        ));
    }

    #[test]
    fn test_link_hash_serializes_as_hex() {
        let hash = LinkHash::from_bytes([0xab; LINK_HASH_LEN]);
        let encoded = serde_json::to_string(&hash).unwrap();
        assert_eq!(encoded, format!("\"{}\"", "ab".repeat(LINK_HASH_LEN)));
        let decoded: LinkHash = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, hash);
    }

    #[test]
    fn test_builder_hash_depends_on_content() {
        let root = SegmentBuilder::new("p", "m").with_step("init").build().unwrap();
        let a = SegmentBuilder::new("p", "m")
            .with_parent(root.link_hash)
            .with_step("split")
            .with_data(json!({ "amount": 2 }))
            .build()
            .unwrap();
        let b = SegmentBuilder::new("p", "m")
            .with_parent(root.link_hash)
            .with_step("split")
            .with_data(json!({ "amount": 5 }))
            .build()
            .unwrap();

        assert_ne!(a.link_hash, b.link_hash);
        assert_eq!(a.parent_id(), Some(root.id()));
        assert!(root.parent_id().is_none());
        assert!(a.verify().is_ok());

        let mut tampered = a.clone();
        tampered.step = "merge".to_string();
        assert!(tampered.verify().is_err());
    }

    #[test]
    fn test_segment_json_shape() {
        let ext = SegmentBuilder::new("pp", "mm").build().unwrap();
        let seg = SegmentBuilder::new("p", "m")
            .with_step("init")
            .with_refs([Reference::new(ext.link_hash, "pp")])
            .with_tags(["a"])
            .build()
            .unwrap();
        let value = serde_json::to_value(&seg).unwrap();
        assert_eq!(value["link_hash"], json!(seg.id()));
        assert!(value.get("parent_hash").is_none());
        assert_eq!(value["refs"][0]["process"], json!("pp"));

        let decoded: Segment = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, seg);
        assert!(decoded.in_map("p", "m"));
        assert!(!decoded.in_map("pp", "m"));
    }
}
