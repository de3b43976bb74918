//! Dataset enumerator (`spec.md` §4.I): pure listing of set-ids under a
//! dataset name directory, and of per-writer manifest shard ids under an
//! open dataset's `base_path`. Hidden entries (leading `.`) are skipped
//! everywhere, per `spec.md` §4.I.

use crate::error::{IoContext, Result};
use crate::manifest::{self, DatasetHeader};
use std::path::Path;

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Set-ids (generations) of dataset `name` under `<root>/<context_id>.hio/`,
/// sorted ascending. Directory entries that are not a bare `u64` are
/// skipped rather than treated as an error — a stray file under the name
/// directory should not abort enumeration.
pub fn list_set_ids(root: &Path, context_id: u64, name: &str) -> Result<Vec<u64>> {
    let dir = crate::path::name_path(root, context_id, name);
    let mut ids = Vec::new();
    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
        Err(e) => return Err(e).io_context(format!("read_dir {dir:?}")),
    };
    for entry in entries {
        let entry = entry.io_context(format!("read_dir entry under {dir:?}"))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_hidden(&name) {
            continue;
        }
        if let Ok(id) = name.parse::<u64>() {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Manifest shard ids (`spec.md` §4.I: "names matching `manifest.<hex>.json`
/// and sorts numerically") present directly under an open dataset's
/// `base_path`. Both the plain and `.bz2` forms name the same shard; each
/// hex id appears at most once in the result, sorted ascending.
pub fn list_manifest_shard_ids(base: &Path) -> Result<Vec<u64>> {
    let mut ids = std::collections::BTreeSet::new();
    let entries = match std::fs::read_dir(base) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).io_context(format!("read_dir {base:?}")),
    };
    for entry in entries {
        let entry = entry.io_context(format!("read_dir entry under {base:?}"))?;
        let name = entry.file_name();
        let name = name.to_string_lossy().into_owned();
        if is_hidden(&name) {
            continue;
        }
        if let Some(id) = parse_shard_filename(&name) {
            ids.insert(id);
        }
    }
    Ok(ids.into_iter().collect())
}

/// Parses `manifest.<hex>.json` or `manifest.<hex>.json.bz2`; returns
/// `None` for the top-level `manifest.json[.bz2]` (no hex component) or
/// any unrelated filename.
fn parse_shard_filename(name: &str) -> Option<u64> {
    let rest = name.strip_prefix("manifest.")?;
    if rest == "json" || rest == "json.bz2" {
        return None;
    }
    let (hex, ext) = rest.split_once('.')?;
    if ext != "json" && ext != "json.bz2" {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}

/// Reads the header of dataset generation `id` under `name`, trying the
/// compressed manifest first then the plain one (`spec.md` §4.H "list").
/// Returns `None` (with a warning, not an error) when neither is readable
/// or parseable, so a single corrupt dataset cannot abort `list_headers`.
pub fn read_generation_header(base: &Path) -> Option<DatasetHeader> {
    let bz2 = crate::path::manifest_path(base, true);
    let plain = crate::path::manifest_path(base, false);
    for path in [&bz2, &plain] {
        match manifest::read_header(path) {
            Ok(h) => return Some(h),
            Err(e) => {
                tracing::debug!(path = ?path, error = %e, "manifest not readable at this path");
            }
        }
    }
    tracing::warn!(base = ?base, "skipping dataset with no readable manifest");
    None
}

/// Lists every generation header of dataset `name`, skipping (with a
/// warning) any generation whose manifest cannot be read or parsed
/// (`spec.md` §7: "Manifest-read failures during listing skip the
/// offending dataset rather than abort the enumeration").
pub fn list_headers(root: &Path, context_id: u64, name: &str) -> Result<Vec<DatasetHeader>> {
    let ids = list_set_ids(root, context_id, name)?;
    let mut headers = Vec::with_capacity(ids.len());
    for id in ids {
        let base = crate::path::dataset_path(root, context_id, name, id);
        if let Some(h) = read_generation_header(&base) {
            headers.push(h);
        }
    }
    Ok(headers)
}
