//! Manifest collaborator (`spec.md` §6.2). `spec.md` treats the wire
//! format as opaque; this is the one concrete default implementation:
//! JSON structure (`serde_json`) with optional bzip2 compression applied
//! at `save`/`read` time when the path carries a `.bz2` suffix, matching
//! `manifest.json[.bz2]` / `manifest.<hex>.json[.bz2]` literally.

use crate::config::{DatasetMode, FileMode};
use crate::element::{ElementKey, Segment};
use crate::error::{HioError, IoContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct DatasetHeader {
    pub name: String,
    pub id: u64,
    pub mode: DatasetMode,
    pub file_mode: FileMode,
    pub ctime: String,
    pub mtime: String,
    pub status: i32,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct ElementRecord {
    pub name: String,
    pub rank_tag: Option<u64>,
    pub size: u64,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ManifestDoc {
    pub header: DatasetHeader,
    pub elements: Vec<ElementRecord>,
}

impl ManifestDoc {
    pub fn empty(header: DatasetHeader) -> Self {
        ManifestDoc { header, elements: Vec::new() }
    }
}

// serde needs these on the config enums; kept here to avoid a serde
// dependency edge in config.rs, which stays pure parsing logic.
impl Serialize for DatasetMode {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DatasetMode::Unique => s.serialize_str("unique"),
            DatasetMode::Shared => s.serialize_str("shared"),
        }
    }
}
impl<'de> Deserialize<'de> for DatasetMode {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        match s.as_str() {
            "unique" => Ok(DatasetMode::Unique),
            "shared" => Ok(DatasetMode::Shared),
            other => Err(serde::de::Error::custom(format!("unknown dataset mode {other:?}"))),
        }
    }
}
impl Serialize for FileMode {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FileMode::Basic => s.serialize_str("basic"),
            FileMode::FilePerNode => s.serialize_str("file_per_node"),
            FileMode::Strided => s.serialize_str("strided"),
        }
    }
}
impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        match s.as_str() {
            "basic" => Ok(FileMode::Basic),
            "file_per_node" => Ok(FileMode::FilePerNode),
            "strided" => Ok(FileMode::Strided),
            other => Err(serde::de::Error::custom(format!("unknown file mode {other:?}"))),
        }
    }
}

fn is_compressed(path: &Path) -> bool {
    path.extension().map(|e| e == "bz2").unwrap_or(false)
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    File::open(path).io_context(format!("open {path:?}"))?.read_to_end(&mut raw).io_context(
        format!("read {path:?}"),
    )?;
    if is_compressed(path) {
        let mut decoder = bzip2::read::BzDecoder::new(&raw[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).io_context(format!("bunzip2 {path:?}"))?;
        Ok(out)
    } else {
        Ok(raw)
    }
}

pub fn read_header(path: &Path) -> Result<DatasetHeader> {
    let bytes = read_bytes(path)?;
    let doc: ManifestDoc = serde_json::from_slice(&bytes)
        .map_err(|e| HioError::BadState(format!("malformed manifest {path:?}: {e}")))?;
    Ok(doc.header)
}

pub fn parse(bytes: &[u8]) -> Result<ManifestDoc> {
    serde_json::from_slice(bytes)
        .map_err(|e| HioError::BadState(format!("malformed manifest bytes: {e}")))
}

/// Serializes a manifest document. `include_segments = false` produces
/// the lightweight top-level form (header + element sizes only); the
/// per-IO-master shards always carry their segments.
pub fn serialize(doc: &ManifestDoc, include_segments: bool) -> Result<Vec<u8>> {
    let doc_out = if include_segments {
        doc.clone()
    } else {
        ManifestDoc {
            header: doc.header.clone(),
            elements: doc
                .elements
                .iter()
                .map(|e| ElementRecord {
                    name: e.name.clone(),
                    rank_tag: e.rank_tag,
                    size: e.size,
                    segments: Vec::new(),
                })
                .collect(),
        }
    };
    serde_json::to_vec_pretty(&doc_out)
        .map_err(|e| HioError::BadState(format!("manifest serialization failed: {e}")))
}

/// Writes `bytes` atomically (temp file + rename); compresses with bzip2
/// first if `path` carries a `.bz2` suffix.
pub fn save(bytes: &[u8], path: &Path) -> Result<()> {
    let payload = if is_compressed(path) {
        let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        encoder.write_all(bytes).io_context(format!("bzip2 {path:?}"))?;
        encoder.finish().io_context(format!("bzip2 finish {path:?}"))?
    } else {
        bytes.to_vec()
    };
    let tmp = path.with_extension("tmp");
    {
        let mut f = File::create(&tmp).io_context(format!("create {tmp:?}"))?;
        f.write_all(&payload).io_context(format!("write {tmp:?}"))?;
        f.sync_all().io_context(format!("sync {tmp:?}"))?;
    }
    std::fs::rename(&tmp, path).io_context(format!("rename {tmp:?} -> {path:?}"))?;
    Ok(())
}

/// Union of elements by `(name, rank_tag)`, union of each element's
/// segments by `(file_id, file_offset)`; the header of `a` wins
/// (`spec.md` §6.2).
pub fn merge(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    let doc_a = parse(a)?;
    let doc_b = parse(b)?;

    let mut by_key: HashMap<(String, Option<u64>), ElementRecord> = HashMap::new();
    for e in doc_a.elements.into_iter().chain(doc_b.elements) {
        let key = (e.name.clone(), e.rank_tag);
        by_key
            .entry(key)
            .and_modify(|existing| {
                existing.size = existing.size.max(e.size);
                let mut seen: std::collections::HashSet<(u64, u64)> =
                    existing.segments.iter().map(|s| (s.file_id, s.file_offset)).collect();
                for s in &e.segments {
                    if seen.insert((s.file_id, s.file_offset)) {
                        existing.segments.push(*s);
                    }
                }
            })
            .or_insert(e);
    }
    let merged = ManifestDoc { header: doc_a.header, elements: by_key.into_values().collect() };
    serialize(&merged, true)
}

/// Peer-segment index built from a (merged) manifest, consulted by the
/// OPTIMIZED-mode read path once an element's own segments miss
/// (`spec.md` §4.E): segments other ranks wrote for the same element.
#[derive(Default)]
pub struct DatasetMap {
    segments: HashMap<(String, Option<u64>), BTreeMap<u64, Segment>>,
}

impl DatasetMap {
    pub fn from_doc(doc: &ManifestDoc) -> Self {
        let mut segments: HashMap<(String, Option<u64>), BTreeMap<u64, Segment>> = HashMap::new();
        for e in &doc.elements {
            let slot = segments.entry((e.name.clone(), e.rank_tag)).or_default();
            for s in &e.segments {
                slot.insert(s.logical_offset, *s);
            }
        }
        DatasetMap { segments }
    }

    pub fn find(&self, key: &ElementKey, offset: u64) -> Option<Segment> {
        self.segments
            .get(&(key.name.clone(), key.rank_tag))?
            .range(..=offset)
            .next_back()
            .map(|(_, s)| *s)
            .filter(|s| s.covers(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetMode;

    fn header() -> DatasetHeader {
        DatasetHeader {
            name: "ds".into(),
            id: 1,
            mode: DatasetMode::Shared,
            file_mode: FileMode::Basic,
            ctime: "t0".into(),
            mtime: "t0".into(),
            status: 0,
        }
    }

    #[test]
    fn round_trips_through_json() {
        let doc = ManifestDoc {
            header: header(),
            elements: vec![ElementRecord {
                name: "E".into(),
                rank_tag: None,
                size: 10,
                segments: vec![],
            }],
        };
        let bytes = serialize(&doc, true).unwrap();
        let back = parse(&bytes).unwrap();
        assert_eq!(back.elements[0].size, 10);
    }

    #[test]
    fn round_trips_through_bzip2_file() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("manifest.json.bz2");
        let doc = ManifestDoc { header: header(), elements: vec![] };
        let bytes = serialize(&doc, true).unwrap();
        save(&bytes, &path).unwrap();
        let back = read_header(&path).unwrap();
        assert_eq!(back.id, 1);
    }

    #[test]
    fn merge_unions_elements_and_keeps_first_header() {
        let mut h_a = header();
        h_a.status = 1;
        let mut h_b = header();
        h_b.status = 99;
        let doc_a = ManifestDoc {
            header: h_a,
            elements: vec![ElementRecord {
                name: "E".into(),
                rank_tag: None,
                size: 5,
                segments: vec![Segment { file_id: 0, file_offset: 0, logical_offset: 0, length: 5 }],
            }],
        };
        let doc_b = ManifestDoc {
            header: h_b,
            elements: vec![ElementRecord {
                name: "E".into(),
                rank_tag: None,
                size: 10,
                segments: vec![Segment {
                    file_id: 1,
                    file_offset: 0,
                    logical_offset: 5,
                    length: 5,
                }],
            }],
        };
        let a = serialize(&doc_a, true).unwrap();
        let b = serialize(&doc_b, true).unwrap();
        let merged = parse(&merge(&a, &b).unwrap()).unwrap();
        assert_eq!(merged.header.status, 1);
        assert_eq!(merged.elements.len(), 1);
        assert_eq!(merged.elements[0].size, 10);
        assert_eq!(merged.elements[0].segments.len(), 2);
    }

    #[test]
    fn lightweight_form_drops_segments() {
        let doc = ManifestDoc {
            header: header(),
            elements: vec![ElementRecord {
                name: "E".into(),
                rank_tag: None,
                size: 5,
                segments: vec![Segment { file_id: 0, file_offset: 0, logical_offset: 0, length: 5 }],
            }],
        };
        let bytes = serialize(&doc, false).unwrap();
        let back = parse(&bytes).unwrap();
        assert!(back.elements[0].segments.is_empty());
    }
}
