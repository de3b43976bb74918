//! Address translator (`spec.md` §4.E): maps an `(element, offset, length)`
//! request onto one physical `(file, file_offset, clipped_length)` access.
//! Callers loop, advancing `offset` by the returned `clipped_length`, until
//! the whole request is served — this module only ever answers for the
//! single contiguous run that starts at `offset`.

use crate::allocator::{self, Reservation};
use crate::cache::FileCache;
use crate::config::DatasetMode;
use crate::element::{Element, Segment};
use crate::error::{HioError, Result};
use crate::manifest::DatasetMap;
use crate::path;
use crate::shared::SharedControl;
use std::path::{Path, PathBuf};

pub struct Access {
    pub path: PathBuf,
    /// Open-file cache key (`spec.md` §4.D); unused for BASIC mode, which
    /// bypasses the cache entirely via `Element::basic_handle`.
    pub file_id: u64,
    pub file_offset: u64,
    pub length: u64,
}

/// BASIC mode: no clipping, the element's own file covers the whole
/// request (`spec.md` §4.E).
pub fn translate_basic(
    base: &Path,
    dataset_mode: DatasetMode,
    element_name: &str,
    rank: u64,
    offset: u64,
    length: u64,
) -> Access {
    let path = match dataset_mode {
        DatasetMode::Shared => path::basic_shared_path(base, element_name),
        DatasetMode::Unique => path::basic_unique_path(base, element_name, rank),
    };
    Access { path, file_id: 0, file_offset: offset, length }
}

/// STRIDED mode: round-robins fixed-size blocks across `file_count` files,
/// clipping at block boundaries (`spec.md` §4.E).
pub fn translate_strided(
    base: &Path,
    element_name: &str,
    block_size: u64,
    file_count: u64,
    offset: u64,
    length: u64,
) -> Access {
    let block_size = block_size.max(1);
    let file_count = file_count.max(1);
    let global_block = offset / block_size;
    let file_id = global_block % file_count;
    let block_within_file = global_block / file_count;
    let within_block = offset % block_size;
    let file_offset = block_within_file * block_size + within_block;
    let clipped = length.min(block_size - within_block);
    Access {
        path: path::strided_block_path(base, element_name, file_id),
        file_id,
        file_offset,
        length: clipped,
    }
}

/// OPTIMIZED-mode write: continues an in-progress segment when `offset`
/// falls inside one this rank already owns, otherwise reserves a fresh
/// stripe-aligned range from the node's shared allocator and records a new
/// `Segment` on the element (`spec.md` §4.E/§4.F).
pub fn translate_optimized_write(
    base: &Path,
    element: &mut Element,
    master_rank: u64,
    reservation: &mut Reservation,
    shared: &SharedControl,
    my_stripe: usize,
    stripe_count: u64,
    block_size: u64,
    offset: u64,
    length: u64,
) -> Access {
    if let Some(seg) = element.find_segment(offset) {
        let avail = seg.end() - offset;
        let clipped = length.min(avail);
        let file_offset = seg.file_offset + (offset - seg.logical_offset);
        return Access {
            path: path::optimized_data_path(base, seg.file_id),
            file_id: seg.file_id,
            file_offset,
            length: clipped,
        };
    }

    let mut requested = length;
    let phys_offset =
        allocator::reserve(reservation, shared, my_stripe, stripe_count, block_size, &mut requested);
    element.insert_segment(Segment {
        file_id: master_rank,
        file_offset: phys_offset,
        logical_offset: offset,
        length: requested,
    });
    Access {
        path: path::optimized_data_path(base, master_rank),
        file_id: master_rank,
        file_offset: phys_offset,
        length: requested,
    }
}

/// OPTIMIZED-mode read: this rank's own segments first, then the scattered
/// peer map; `NotFound` if neither has it. Falls back to the legacy
/// (pre-`data/`-prefix) path only when the peer map itself points there.
pub fn translate_optimized_read(
    base: &Path,
    element: &Element,
    dataset_map: Option<&DatasetMap>,
    offset: u64,
    length: u64,
    legacy_layout: bool,
) -> Result<Access> {
    if let Some(seg) = element.find_segment(offset) {
        let avail = seg.end() - offset;
        let clipped = length.min(avail);
        let file_offset = seg.file_offset + (offset - seg.logical_offset);
        let path = if legacy_layout {
            path::optimized_data_path_legacy(base, seg.file_id)
        } else {
            path::optimized_data_path(base, seg.file_id)
        };
        return Ok(Access { path, file_id: seg.file_id, file_offset, length: clipped });
    }

    if let Some(map) = dataset_map {
        if let Some(seg) = map.find(&element.key, offset) {
            let avail = seg.end() - offset;
            let clipped = length.min(avail);
            let file_offset = seg.file_offset + (offset - seg.logical_offset);
            let path = if legacy_layout {
                path::optimized_data_path_legacy(base, seg.file_id)
            } else {
                path::optimized_data_path(base, seg.file_id)
            };
            return Ok(Access { path, file_id: seg.file_id, file_offset, length: clipped });
        }
    }

    Err(HioError::NotFound(format!(
        "no segment covers offset {offset} of element {:?}",
        element.key.name
    )))
}

/// Opens (or reuses from `cache`) the file an `Access` names, seeking to
/// its `file_offset` before returning the handle (`spec.md` §4.D).
pub fn open_for_access<'a>(cache: &'a mut FileCache, access: &Access) -> Result<&'a mut std::fs::File> {
    use std::io::{Seek, SeekFrom};
    let (f, cached_offset) = cache.get(access.file_id, &access.path)?;
    if *cached_offset != access.file_offset {
        f.seek(SeekFrom::Start(access.file_offset)).map_err(|e| HioError::io("seek", e))?;
        *cached_offset = access.file_offset;
    }
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKey;

    #[test]
    fn strided_clips_at_block_boundary() {
        let base = Path::new("/ds");
        let a = translate_strided(base, "E", 100, 4, 90, 50);
        assert_eq!(a.file_offset, 90);
        assert_eq!(a.length, 10, "must clip to the block boundary at 100");
        assert_eq!(a.path, path::strided_block_path(base, "E", 0));
    }

    #[test]
    fn strided_round_robins_file_id() {
        let base = Path::new("/ds");
        let a0 = translate_strided(base, "E", 100, 4, 0, 100);
        let a1 = translate_strided(base, "E", 100, 4, 100, 100);
        let a4 = translate_strided(base, "E", 100, 4, 400, 100);
        assert_eq!(a0.path, path::strided_block_path(base, "E", 0));
        assert_eq!(a1.path, path::strided_block_path(base, "E", 1));
        assert_eq!(a4.path, path::strided_block_path(base, "E", 0), "wraps after file_count blocks");
        assert_eq!(a4.file_offset, 100, "second block in file 0");
    }

    #[test]
    fn optimized_write_then_read_own_segment() {
        let base = Path::new("/ds");
        let mut element = Element::new(ElementKey { name: "E".into(), rank_tag: None }, 1);
        let shared = SharedControl::create(1).unwrap();
        let mut reservation = Reservation::default();
        let w = translate_optimized_write(base, &mut element, 0, &mut reservation, &shared, 0, 1, 1 << 20, 0, 1024);
        assert_eq!(w.file_offset, 0);
        assert_eq!(w.length, 1024);

        let r = translate_optimized_read(base, &element, None, 0, 1024, false).unwrap();
        assert_eq!(r.file_offset, 0);
        assert_eq!(r.length, 1024);
    }

    #[test]
    fn optimized_read_misses_without_peer_map() {
        let base = Path::new("/ds");
        let element = Element::new(ElementKey { name: "E".into(), rank_tag: None }, 1);
        let err = translate_optimized_read(base, &element, None, 0, 10, false).unwrap_err();
        assert!(matches!(err, HioError::NotFound(_)));
    }
}
