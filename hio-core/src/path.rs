//! Pure, side-effect-free path derivation (`spec.md` §4.A).
//!
//! Everything a dataset touches on disk is built from `(root, context_id,
//! name, id)`; nothing in this module opens a file or stats a directory.

use std::path::{Path, PathBuf};

/// `<root>/<context_id>.hio/<name>/<id>`
pub fn dataset_path(root: &Path, context_id: u64, name: &str, id: u64) -> PathBuf {
    root.join(format!("{context_id}.hio")).join(name).join(id.to_string())
}

/// `<root>/<context_id>.hio/<name>` — the parent directory enumerated by
/// the dataset enumerator (`spec.md` §4.I) to list generations of `name`.
pub fn name_path(root: &Path, context_id: u64, name: &str) -> PathBuf {
    root.join(format!("{context_id}.hio")).join(name)
}

/// `<root>/<context_id>.hio` — enumerated to list dataset names.
pub fn context_path(root: &Path, context_id: u64) -> PathBuf {
    root.join(format!("{context_id}.hio"))
}

pub fn data_dir(base: &Path) -> PathBuf {
    base.join("data")
}

pub fn trace_dir(base: &Path) -> PathBuf {
    base.join("trace")
}

pub fn trace_file(base: &Path, rank: u64) -> PathBuf {
    trace_dir(base).join(format!("trace.{rank}"))
}

/// Top-level manifest path; `compressed` selects the `.bz2` suffix.
pub fn manifest_path(base: &Path, compressed: bool) -> PathBuf {
    if compressed {
        base.join("manifest.json.bz2")
    } else {
        base.join("manifest.json")
    }
}

/// Per-IO-master manifest shard, `manifest.<master_rank_hex>.json[.bz2]`.
pub fn shard_manifest_path(base: &Path, master_rank: u64, compressed: bool) -> PathBuf {
    if compressed {
        base.join(format!("manifest.{master_rank:x}.json.bz2"))
    } else {
        base.join(format!("manifest.{master_rank:x}.json"))
    }
}

/// BASIC/SHARED element file: `data/element_data.<elem>`.
pub fn basic_shared_path(base: &Path, element_name: &str) -> PathBuf {
    data_dir(base).join(format!("element_data.{element_name}"))
}

/// BASIC/UNIQUE element file: `data/element_data.<elem>.<rank:%08u>`.
pub fn basic_unique_path(base: &Path, element_name: &str, rank: u64) -> PathBuf {
    data_dir(base).join(format!("element_data.{element_name}.{rank:08}"))
}

/// STRIDED block file: `data/<elem>_block.<file_id:%08u>`.
pub fn strided_block_path(base: &Path, element_name: &str, file_id: u64) -> PathBuf {
    data_dir(base).join(format!("{element_name}_block.{file_id:08}"))
}

/// OPTIMIZED data file: `data/data.<master_rank:%x>`, with the legacy
/// (no `data/` prefix) fallback used only on reads of older datasets.
pub fn optimized_data_path(base: &Path, master_rank: u64) -> PathBuf {
    data_dir(base).join(format!("data.{master_rank:x}"))
}

pub fn optimized_data_path_legacy(base: &Path, master_rank: u64) -> PathBuf {
    base.join(format!("data.{master_rank:x}"))
}
