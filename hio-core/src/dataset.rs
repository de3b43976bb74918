//! Dataset lifecycle (`spec.md` §4.H): `open`/`process_reqs`/`close`, plus
//! `unlink` and `list`. This is the component that drives every other one —
//! the FS attribute probe (§4.C) once at open, the directory bootstrapper
//! (§4.B) once if creating, the address translator and request processor
//! (§4.E/§4.G) per batch, and the manifest collaborator (§6.2) at close.

use crate::allocator::Reservation;
use crate::cache::FileCache;
use crate::config::{DatasetConfig, DatasetFlags, DatasetMode, FileMode};
use crate::directory;
use crate::element::{Element, ElementKey};
use crate::enumerator;
use crate::error::{HioError, IoContext, Result};
use crate::fsattrs::{self, FilesystemOps, FsAttrs};
use crate::manifest::{self, DatasetHeader, DatasetMap, ElementRecord, ManifestDoc};
use crate::path;
use crate::rankgroup::RankGroup;
use crate::request::{self, Layout};
use crate::shared::SharedControl;
use crate::trace::Tracer;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Everything `spec.md` §3's `Context`/`Dataset` carry that the core needs
/// to decide at `open` time. `root`/`context_id` are the two fields of the
/// out-of-scope `Context` object model this module actually consumes
/// (`SPEC_FULL.md` §3).
pub struct DatasetOpenOptions {
    pub root: PathBuf,
    pub context_id: u64,
    pub name: String,
    pub id: u64,
    pub flags: DatasetFlags,
    pub mode: DatasetMode,
    pub config: DatasetConfig,
    pub tracing_enabled: bool,
}

impl DatasetOpenOptions {
    pub fn new(
        root: impl Into<PathBuf>,
        context_id: u64,
        name: impl Into<String>,
        id: u64,
        flags: DatasetFlags,
        mode: DatasetMode,
    ) -> Self {
        DatasetOpenOptions {
            root: root.into(),
            context_id,
            name: name.into(),
            id,
            flags,
            mode,
            config: DatasetConfig::default(),
            tracing_enabled: false,
        }
    }

    pub fn with_config(mut self, config: DatasetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }
}

#[derive(Default, Clone, Copy, Debug)]
pub struct Stats {
    pub read_time_us: u64,
    pub write_time_us: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// A read's completion handle (`spec.md` §4.G/§9). Writes in this module
/// are synchronous, so by the time a caller can observe a completion it is
/// already filled in; the handle exists so callers written against an
/// async-shaped API still have something to poll. `Dataset::complete`
/// refuses to operate on a write's completion (`PERMISSION`, `spec.md` §7).
pub struct Completion {
    transferred: AtomicU64,
    complete: AtomicBool,
    status: AtomicI64,
    is_read: bool,
}

impl Completion {
    pub fn new(is_read: bool) -> Arc<Self> {
        Arc::new(Completion {
            transferred: AtomicU64::new(0),
            complete: AtomicBool::new(false),
            status: AtomicI64::new(0),
            is_read,
        })
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> i64 {
        self.status.load(Ordering::SeqCst)
    }
}

/// One side of a batched read or write; the buffer backs `count` blocks of
/// `element_size` bytes laid back-to-back, landing at logical offsets
/// `offset, offset+stride, offset+2*stride, ...` (`spec.md` §4.G).
pub enum RequestIo<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

pub struct Request<'a> {
    pub element: String,
    pub offset: u64,
    pub count: u64,
    pub element_size: u64,
    pub stride: u64,
    pub io: RequestIo<'a>,
    pub completion: Option<Arc<Completion>>,
    /// Filled in by `process_reqs`: positive = bytes transferred, negative
    /// = `-(error code)` (`spec.md` §4.G/§7).
    pub status: i64,
}

impl<'a> Request<'a> {
    pub fn write(element: impl Into<String>, offset: u64, buf: &'a [u8]) -> Self {
        Request {
            element: element.into(),
            offset,
            count: 1,
            element_size: buf.len() as u64,
            stride: 0,
            io: RequestIo::Write(buf),
            completion: None,
            status: 0,
        }
    }

    pub fn read(element: impl Into<String>, offset: u64, buf: &'a mut [u8]) -> Self {
        let element_size = buf.len() as u64;
        Request {
            element: element.into(),
            offset,
            count: 1,
            element_size,
            stride: 0,
            io: RequestIo::Read(buf),
            completion: None,
            status: 0,
        }
    }

    /// `count` blocks of `element_size` bytes at `offset + i*stride`,
    /// packed contiguously in the already-supplied buffer.
    pub fn with_blocks(mut self, count: u64, element_size: u64, stride: u64) -> Self {
        self.count = count;
        self.element_size = element_size;
        self.stride = stride;
        self
    }

    pub fn with_completion(mut self, completion: Arc<Completion>) -> Self {
        self.completion = Some(completion);
        self
    }

    fn is_write(&self) -> bool {
        matches!(self.io, RequestIo::Write(_))
    }
}

/// An open dataset (`spec.md` §3). Owns its elements, open-file cache, and
/// node-local shared-memory handle; released wholesale by `close`.
pub struct Dataset {
    name: String,
    id: u64,
    flags: DatasetFlags,
    mode: DatasetMode,
    file_mode: FileMode,
    block_size: u64,
    file_count: u64,
    fs_attrs: FsAttrs,
    base_path: PathBuf,
    rank: u64,
    master_rank: u64,
    my_stripe: usize,
    stripe_count: u64,
    shared: Arc<SharedControl>,
    reservation: Reservation,
    cache: FileCache,
    elements: HashMap<ElementKey, Element>,
    next_element_id: u64,
    dataset_map: Option<DatasetMap>,
    use_bzip: bool,
    tracer: Tracer,
    ctime: String,
    status: i32,
    legacy_layout: bool,
    stats: Stats,
}

impl Dataset {
    /// Opens (or creates) a dataset generation. Drives, in order: rank-0
    /// truncate, the FS attribute probe (§4.C), rank-0 directory bootstrap
    /// or manifest load + broadcast, node-local master election, and (in
    /// OPTIMIZED mode, on reopen) the manifest-shard scatter.
    pub fn open(
        fs: &dyn FilesystemOps,
        rg: &dyn RankGroup,
        opts: DatasetOpenOptions,
    ) -> Result<Dataset> {
        let mode = opts.mode;
        let mut file_mode = opts.config.file_mode.unwrap_or_default();

        // Mode-mismatch downgrades: policy, not failure (`spec.md` §7).
        if mode == DatasetMode::Unique && file_mode == FileMode::Strided {
            tracing::warn!("STRIDED is incompatible with an UNIQUE dataset; downgrading to BASIC");
            file_mode = FileMode::Basic;
        }
        if file_mode == FileMode::FilePerNode && rg.size() < 2 {
            tracing::warn!(
                job_size = rg.size(),
                "OPTIMIZED mode needs at least 2 ranks; downgrading to BASIC"
            );
            file_mode = FileMode::Basic;
        }

        let base_path = path::dataset_path(&opts.root, opts.context_id, &opts.name, opts.id);

        // Invariant 5: TRUNCATE|CREATE starts from an empty base_path.
        if opts.flags.contains(DatasetFlags::TRUNCATE) && rg.rank() == 0 {
            match std::fs::remove_dir_all(&base_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(HioError::io(format!("truncate {base_path:?}"), e)),
            }
        }
        rg.barrier()?;

        let probed = fs.query(&opts.root)?;
        let max_stripe_count = probed.max_stripe_count;
        let mut block_size = opts.config.block_size.unwrap_or(crate::config::DEFAULT_BLOCK_SIZE);
        let node_local_size = rg.shared_size() as u32;
        let attrs =
            fsattrs::finalize(mode, file_mode, probed, &mut block_size, node_local_size, &opts.config);

        let file_count = match file_mode {
            FileMode::Strided => opts
                .config
                .file_count
                .unwrap_or_else(|| rg.size().min(32 * max_stripe_count as u64)),
            _ => 1,
        };

        let now = chrono::Utc::now().to_rfc3339();
        let mut header_bytes = Vec::new();
        if rg.rank() == 0 {
            if opts.flags.contains(DatasetFlags::CREATE) {
                directory::bootstrap(fs, &base_path, opts.tracing_enabled, &attrs)?;
                let header = DatasetHeader {
                    name: opts.name.clone(),
                    id: opts.id,
                    mode,
                    file_mode,
                    ctime: now.clone(),
                    mtime: now.clone(),
                    status: 0,
                };
                header_bytes = manifest::serialize(&ManifestDoc::empty(header), false)?;
            } else {
                let compressed = path::manifest_path(&base_path, true);
                let plain = path::manifest_path(&base_path, false);
                header_bytes = manifest::read_bytes(&compressed).or_else(|_| manifest::read_bytes(&plain)).map_err(
                    |_| HioError::NotFound(format!("manifest not found under {base_path:?}")),
                )?;
            }
        }
        rg.broadcast(0, &mut header_bytes)?;
        let doc = manifest::parse(&header_bytes)?;
        let header = doc.header;

        let mut elements = HashMap::new();
        let mut next_element_id = 0u64;
        for rec in &doc.elements {
            let key = ElementKey { name: rec.name.clone(), rank_tag: rec.rank_tag };
            let mut el = Element::new(key.clone(), next_element_id);
            next_element_id += 1;
            el.size = rec.size;
            elements.insert(key, el);
        }

        let shared = rg.shared_memory_region(attrs.stripe_count as usize)?;
        let my_stripe = (rg.shared_rank() as usize) % shared.stripe_count();
        let stripe_count = shared.stripe_count() as u64;
        if rg.shared_rank() == 0 {
            shared.claim_master(rg.rank());
        }
        rg.barrier()?;
        let master_rank = shared
            .master()
            .ok_or_else(|| HioError::BadState("node master was never claimed".into()))?;

        let legacy_layout = file_mode == FileMode::FilePerNode
            && !opts.flags.contains(DatasetFlags::CREATE)
            && !path::optimized_data_path(&base_path, master_rank).exists()
            && path::optimized_data_path_legacy(&base_path, master_rank).exists();

        let dataset_map = if file_mode == FileMode::FilePerNode
            && mode == DatasetMode::Shared
            && !opts.flags.contains(DatasetFlags::CREATE)
        {
            load_manifest_map(&base_path, rg)?
        } else {
            None
        };

        let tracer =
            if opts.tracing_enabled { Tracer::open(&base_path, rg.rank()) } else { Tracer::disabled() };

        Ok(Dataset {
            name: opts.name,
            id: opts.id,
            flags: opts.flags,
            mode,
            file_mode,
            block_size,
            file_count,
            fs_attrs: attrs,
            base_path,
            rank: rg.rank(),
            master_rank,
            my_stripe,
            stripe_count,
            shared,
            reservation: Reservation::default(),
            cache: FileCache::new(opts.flags.contains(DatasetFlags::WRITE)),
            elements,
            next_element_id,
            dataset_map,
            use_bzip: opts.config.use_bzip.unwrap_or(false),
            tracer,
            ctime: header.ctime,
            status: header.status,
            legacy_layout,
            stats: Stats::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn mode(&self) -> DatasetMode {
        self.mode
    }
    pub fn file_mode(&self) -> FileMode {
        self.file_mode
    }
    pub fn fs_attrs(&self) -> FsAttrs {
        self.fs_attrs
    }
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
    pub fn stats(&self) -> Stats {
        self.stats
    }
    pub fn open_file_count(&self) -> usize {
        self.cache.open_count()
    }

    fn element_key(&self, name: &str) -> ElementKey {
        ElementKey {
            name: name.to_string(),
            rank_tag: if self.mode == DatasetMode::Unique { Some(self.rank) } else { None },
        }
    }

    /// Request processor (`spec.md` §4.G). Stops at the first request
    /// whose status goes negative and returns that status; `0` means every
    /// request in the batch succeeded.
    pub fn process_reqs(&mut self, reqs: &mut [Request<'_>]) -> i64 {
        for req in reqs.iter_mut() {
            if req.is_write() && !self.flags.contains(DatasetFlags::WRITE) {
                req.status = crate::error::status_code(&HioError::Permission(
                    "write on a read-only dataset".into(),
                ));
                return req.status;
            }

            let key = self.element_key(&req.element);
            let next_id = &mut self.next_element_id;
            let element = self.elements.entry(key.clone()).or_insert_with(|| {
                let id = *next_id;
                *next_id += 1;
                Element::new(key, id)
            });

            let layout = Layout {
                base: &self.base_path,
                file_mode: self.file_mode,
                dataset_mode: self.mode,
                block_size: self.block_size,
                file_count: self.file_count,
                master_rank: self.master_rank,
                my_stripe: self.my_stripe,
                stripe_count: self.stripe_count,
                rank: self.rank,
                legacy_layout: self.legacy_layout,
            };

            let is_write = req.is_write();
            let mut transferred = 0u64;
            let mut status = 0i64;

            for i in 0..req.count {
                let blk_offset = req.offset + i * req.stride;
                let start = (i * req.element_size) as usize;
                let end = start + req.element_size as usize;
                let start_us = crate::trace::now_us();

                let outcome = match &mut req.io {
                    RequestIo::Write(buf) => request::write(
                        &layout,
                        element,
                        &mut self.cache,
                        &mut self.reservation,
                        &self.shared,
                        blk_offset,
                        &buf[start..end],
                    ),
                    RequestIo::Read(buf) => request::read(
                        &layout,
                        element,
                        &mut self.cache,
                        self.dataset_map.as_ref(),
                        blk_offset,
                        &mut buf[start..end],
                    ),
                };

                let stop_us = crate::trace::now_us();
                let event = if is_write { "write" } else { "read" };
                self.tracer.record(event, element.id, "block", outcome.bytes as i64, outcome.status, start_us, stop_us);
                if is_write {
                    self.stats.write_time_us += stop_us.saturating_sub(start_us);
                    self.stats.bytes_written += outcome.bytes;
                } else {
                    self.stats.read_time_us += stop_us.saturating_sub(start_us);
                    self.stats.bytes_read += outcome.bytes;
                }

                transferred += outcome.bytes;
                if outcome.status < 0 {
                    status = outcome.status;
                    break;
                }
            }

            if let Some(completion) = &req.completion {
                completion.transferred.store(transferred, Ordering::SeqCst);
                completion
                    .status
                    .store(if status < 0 { status } else { transferred as i64 }, Ordering::SeqCst);
                completion.complete.store(true, Ordering::SeqCst);
            }

            req.status = if status < 0 { status } else { transferred as i64 };
            if status < 0 {
                return status;
            }
        }
        0
    }

    /// Only legal against a read's completion handle (`spec.md` §9).
    pub fn complete(&self, completion: &Completion) -> Result<()> {
        if !completion.is_read {
            return Err(HioError::Permission(
                "complete() is only valid for a read's completion handle".into(),
            ));
        }
        Ok(())
    }

    fn header(&self) -> DatasetHeader {
        DatasetHeader {
            name: self.name.clone(),
            id: self.id,
            mode: self.mode,
            file_mode: self.file_mode,
            ctime: self.ctime.clone(),
            mtime: chrono::Utc::now().to_rfc3339(),
            status: self.status,
        }
    }

    fn save_manifests(&self, rg: &dyn RankGroup) -> Result<()> {
        let header = self.header();
        let lightweight: Vec<ElementRecord> = self
            .elements
            .values()
            .map(|e| ElementRecord {
                name: e.key.name.clone(),
                rank_tag: e.key.rank_tag,
                size: e.size,
                segments: Vec::new(),
            })
            .collect();
        let top_doc = ManifestDoc { header: header.clone(), elements: lightweight };
        let top_bytes = manifest::serialize(&top_doc, false)?;

        let top_compress = self.use_bzip && self.file_mode == FileMode::FilePerNode;
        if let Some(gathered) = rg.gather(0, &top_bytes)? {
            let merged = merge_all(gathered)?.unwrap_or(top_bytes);
            let path = path::manifest_path(&self.base_path, top_compress);
            manifest::save(&merged, &path)?;
        }

        if self.file_mode == FileMode::FilePerNode {
            let full: Vec<ElementRecord> = self
                .elements
                .values()
                .map(|e| ElementRecord {
                    name: e.key.name.clone(),
                    rank_tag: e.key.rank_tag,
                    size: e.size,
                    segments: e.segments.values().copied().collect(),
                })
                .collect();
            let shard_doc = ManifestDoc { header, elements: full };
            let shard_bytes = manifest::serialize(&shard_doc, true)?;
            if let Some(gathered) = rg.gather(self.master_rank, &shard_bytes)? {
                if let Some(merged) = merge_all(gathered)? {
                    let path = path::shard_manifest_path(&self.base_path, self.master_rank, self.use_bzip);
                    manifest::save(&merged, &path)?;
                }
            }
        }
        Ok(())
    }

    /// Closes cached file slots, gathers and saves manifests if the
    /// dataset was opened for WRITE, and all-reduces the minimum status
    /// across the rank group so any rank's failure surfaces everywhere
    /// (`spec.md` §4.H/§7).
    pub fn close(mut self, rg: &dyn RankGroup) -> Result<i32> {
        self.cache.close_all();
        let local_status: i32 = if self.flags.contains(DatasetFlags::WRITE) {
            match self.save_manifests(rg) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::warn!(error = %e, "manifest save failed at close");
                    -1
                }
            }
        } else {
            0
        };
        let min_status = rg.allreduce_min(local_status as i64)?;
        Ok(min_status as i32)
    }
}

fn merge_all(shards: Vec<Vec<u8>>) -> Result<Option<Vec<u8>>> {
    let mut merged: Option<Vec<u8>> = None;
    for bytes in shards {
        if bytes.is_empty() {
            continue;
        }
        merged = Some(match merged {
            None => bytes,
            Some(m) => manifest::merge(&m, &bytes)?,
        });
    }
    Ok(merged)
}

/// Manifest-shard scatter (`spec.md` §4.H). The shipped `RankGroup`s are
/// always single-node (`node_count() == 1`), so the "scatter ids to node
/// leaders" step collapses to rank 0 doing all the reading and merging
/// directly, then broadcasting the merged bytes to the whole group; see
/// DESIGN.md for the Open Question this resolves.
fn load_manifest_map(base: &Path, rg: &dyn RankGroup) -> Result<Option<DatasetMap>> {
    if rg.node_count() > 1 {
        return Err(HioError::NotAvailable(
            "manifest-shard scatter across multiple nodes needs a node-leader sub-group, which this RankGroup cannot express".into(),
        ));
    }

    let mut merged_bytes = if rg.rank() == 0 {
        let ids = enumerator::list_manifest_shard_ids(base)?;
        let mut merged: Option<Vec<u8>> = None;
        for id in ids {
            let bz2 = path::shard_manifest_path(base, id, true);
            let plain = path::shard_manifest_path(base, id, false);
            let bytes = manifest::read_bytes(&bz2).or_else(|_| manifest::read_bytes(&plain))?;
            merged = Some(match merged {
                None => bytes,
                Some(m) => manifest::merge(&m, &bytes)?,
            });
        }
        merged.unwrap_or_default()
    } else {
        Vec::new()
    };
    rg.broadcast(0, &mut merged_bytes)?;
    if merged_bytes.is_empty() {
        return Ok(None);
    }
    let doc = manifest::parse(&merged_bytes)?;
    Ok(Some(DatasetMap::from_doc(&doc)))
}

/// `spec.md` §4.H "unlink": rank-0-only, depth-first directory removal.
pub fn unlink(root: &Path, context_id: u64, name: &str, id: u64, rank: u64) -> Result<()> {
    if rank != 0 {
        return Err(HioError::NotAvailable("unlink must be called on rank 0".into()));
    }
    let base = path::dataset_path(root, context_id, name, id);
    match std::fs::remove_dir_all(&base) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).io_context(format!("unlink {base:?}")),
    }
}

/// `spec.md` §4.H "list": rank 0 enumerates and parses headers, then
/// broadcasts the serialized result so every rank returns the same list —
/// a JSON broadcast sidesteps the source's "broadcasts inside an
/// `if using_mpi` guard but unconditionally frees `headers`" ambiguity
/// (`spec.md` §9 Open Question) entirely, since there is no raw buffer
/// whose ownership could be mishandled on a non-broadcasting path.
pub fn list(root: &Path, context_id: u64, name: &str, rg: &dyn RankGroup) -> Result<Vec<DatasetHeader>> {
    let mut bytes = if rg.rank() == 0 {
        let headers = enumerator::list_headers(root, context_id, name)?;
        serde_json::to_vec(&headers).map_err(|e| HioError::BadState(format!("encode headers: {e}")))?
    } else {
        Vec::new()
    };
    rg.broadcast(0, &mut bytes)?;
    serde_json::from_slice(&bytes).map_err(|e| HioError::BadState(format!("decode headers: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatasetFlags;
    use crate::fsattrs::PosixFs;
    use crate::rankgroup::LocalRankGroup;

    fn create_flags() -> DatasetFlags {
        DatasetFlags::CREATE | DatasetFlags::TRUNCATE | DatasetFlags::READ | DatasetFlags::WRITE
    }

    #[test]
    fn basic_shared_round_trip_s1() {
        let td = tempfile::tempdir().unwrap();
        let fs = PosixFs::new();
        let rg = LocalRankGroup::new().unwrap();

        let opts =
            DatasetOpenOptions::new(td.path(), 1, "ds", 1, create_flags(), DatasetMode::Shared);
        let mut ds = Dataset::open(&fs, &rg, opts).unwrap();
        assert_eq!(ds.file_mode(), FileMode::Basic);

        let status = ds.process_reqs(&mut [
            Request::write("E", 0, b"hello"),
            Request::write("E", 100, b"world"),
        ]);
        assert_eq!(status, 0);
        ds.close(&rg).unwrap();

        let opts = DatasetOpenOptions::new(td.path(), 1, "ds", 1, DatasetFlags::READ, DatasetMode::Shared);
        let mut ds = Dataset::open(&fs, &rg, opts).unwrap();
        let mut buf = [0u8; 5];
        let mut reqs = [Request::read("E", 0, &mut buf)];
        let status = ds.process_reqs(&mut reqs);
        assert_eq!(status, 0);
        assert_eq!(reqs[0].status, 5, "per-request status carries bytes transferred");
        assert_eq!(&buf, b"hello");

        let mut buf2 = [0u8; 5];
        let mut reqs2 = [Request::read("E", 100, &mut buf2)];
        let status = ds.process_reqs(&mut reqs2);
        assert_eq!(status, 0);
        assert_eq!(reqs2[0].status, 5);
        assert_eq!(&buf2, b"world");
        ds.close(&rg).unwrap();
    }

    #[test]
    fn downgrade_optimized_on_single_rank_s4() {
        let td = tempfile::tempdir().unwrap();
        let fs = PosixFs::new();
        let rg = LocalRankGroup::new().unwrap();
        let mut config = DatasetConfig::default();
        config.file_mode = Some(FileMode::FilePerNode);
        let opts = DatasetOpenOptions::new(td.path(), 1, "ds", 1, create_flags(), DatasetMode::Shared)
            .with_config(config);
        let ds = Dataset::open(&fs, &rg, opts).unwrap();
        assert_eq!(ds.file_mode(), FileMode::Basic, "single-rank job cannot use OPTIMIZED");
    }

    #[test]
    fn truncate_then_create_empties_data_dir_s5() {
        let td = tempfile::tempdir().unwrap();
        let fs = PosixFs::new();
        let rg = LocalRankGroup::new().unwrap();

        let opts = DatasetOpenOptions::new(td.path(), 1, "ds", 1, create_flags(), DatasetMode::Shared);
        let mut ds = Dataset::open(&fs, &rg, opts).unwrap();
        ds.process_reqs(&mut [Request::write("E", 0, b"stale")]);
        ds.close(&rg).unwrap();

        let opts = DatasetOpenOptions::new(td.path(), 1, "ds", 1, create_flags(), DatasetMode::Shared);
        let ds = Dataset::open(&fs, &rg, opts).unwrap();
        let entries: Vec<_> = std::fs::read_dir(path::data_dir(ds.base_path())).unwrap().collect();
        assert!(entries.is_empty(), "data/ must be empty right after CREATE|TRUNCATE");
    }

    #[test]
    fn unlink_removes_base_path_s7() {
        let td = tempfile::tempdir().unwrap();
        let fs = PosixFs::new();
        let rg = LocalRankGroup::new().unwrap();
        let opts = DatasetOpenOptions::new(td.path(), 1, "ds", 1, create_flags(), DatasetMode::Shared);
        let ds = Dataset::open(&fs, &rg, opts).unwrap();
        let base = ds.base_path().to_path_buf();
        ds.close(&rg).unwrap();
        assert!(base.exists());
        unlink(td.path(), 1, "ds", 1, 0).unwrap();
        assert!(!base.exists());
    }

    #[test]
    fn unlink_refuses_non_zero_rank() {
        let td = tempfile::tempdir().unwrap();
        let err = unlink(td.path(), 1, "ds", 1, 3).unwrap_err();
        assert!(matches!(err, HioError::NotAvailable(_)));
    }

    #[test]
    fn list_sees_every_generation_after_close() {
        let td = tempfile::tempdir().unwrap();
        let fs = PosixFs::new();
        let rg = LocalRankGroup::new().unwrap();
        for id in [1u64, 2, 3] {
            let opts = DatasetOpenOptions::new(td.path(), 9, "ds", id, create_flags(), DatasetMode::Shared);
            let ds = Dataset::open(&fs, &rg, opts).unwrap();
            ds.close(&rg).unwrap();
        }
        let headers = list(td.path(), 9, "ds", &rg).unwrap();
        let mut ids: Vec<u64> = headers.iter().map(|h| h.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn read_only_dataset_rejects_writes() {
        let td = tempfile::tempdir().unwrap();
        let fs = PosixFs::new();
        let rg = LocalRankGroup::new().unwrap();
        let opts = DatasetOpenOptions::new(td.path(), 1, "ds", 1, create_flags(), DatasetMode::Shared);
        let ds = Dataset::open(&fs, &rg, opts).unwrap();
        ds.close(&rg).unwrap();

        let opts = DatasetOpenOptions::new(td.path(), 1, "ds", 1, DatasetFlags::READ, DatasetMode::Shared);
        let mut ds = Dataset::open(&fs, &rg, opts).unwrap();
        let status = ds.process_reqs(&mut [Request::write("E", 0, b"nope")]);
        assert!(status < 0);
    }
}
