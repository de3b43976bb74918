//! Element and segment data types (`spec.md` §3 GLOSSARY).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;

/// `(file_id, file_offset, logical_offset, length)`: `length` bytes at
/// `logical_offset` of an element live at `file_offset` inside the data
/// file owned by rank `file_id` (OPTIMIZED mode only).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub file_id: u64,
    pub file_offset: u64,
    pub logical_offset: u64,
    pub length: u64,
}

impl Segment {
    pub fn covers(&self, offset: u64) -> bool {
        offset >= self.logical_offset && offset < self.logical_offset + self.length
    }

    pub fn end(&self) -> u64 {
        self.logical_offset + self.length
    }
}

/// Identifies an element uniquely within a dataset: the rank tag
/// disambiguates filenames only in UNIQUE mode (`spec.md` §3).
#[derive(Clone, Hash, PartialEq, Eq, Debug)]
pub struct ElementKey {
    pub name: String,
    pub rank_tag: Option<u64>,
}

pub struct Element {
    pub key: ElementKey,
    /// Monotonic id assigned at first open; used as the BASIC-mode cache
    /// key so direct-mapped eviction applies uniformly across modes
    /// (`spec.md` §4.D).
    pub id: u64,
    /// Monotonic high-water mark of `offset + bytes_written` (invariant 4).
    pub size: u64,
    /// BASIC mode only: the element's own dedicated file handle.
    pub basic_handle: Option<File>,
    /// OPTIMIZED mode only: segments this rank itself wrote for this
    /// element, keyed by `logical_offset` for range lookup.
    pub segments: BTreeMap<u64, Segment>,
}

impl Element {
    pub fn new(key: ElementKey, id: u64) -> Self {
        Element { key, id, size: 0, basic_handle: None, segments: BTreeMap::new() }
    }

    pub fn bump_size(&mut self, offset: u64, len: u64) {
        self.size = self.size.max(offset + len);
    }

    /// Segment whose range contains `offset`, if the element itself wrote
    /// one (checked before falling back to the dataset map of peer
    /// segments on a read, `spec.md` §4.E OPTIMIZED read path).
    pub fn find_segment(&self, offset: u64) -> Option<&Segment> {
        self.segments.range(..=offset).next_back().map(|(_, s)| s).filter(|s| s.covers(offset))
    }

    pub fn insert_segment(&mut self, seg: Segment) {
        self.segments.insert(seg.logical_offset, seg);
    }
}
