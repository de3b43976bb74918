//! Open-file cache (`spec.md` §4.D): a fixed `N = 32` slot, direct-mapped
//! table of open data files, shared by STRIDED and OPTIMIZED address
//! translation. BASIC mode does not use this cache — each element owns its
//! file handle directly (`Element::basic_handle`) — but is keyed into the
//! same id space (its monotonic `Element::id`) so the spec's collision
//! policy reads uniformly across modes.

use crate::config::DEFAULT_OPEN_FILE_SLOTS as SLOTS;
use crate::directory::default_mode;
use crate::error::{IoContext, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

struct Slot {
    file_id: Option<u64>,
    path: Option<PathBuf>,
    handle: Option<File>,
    offset: u64,
}

impl Slot {
    fn empty() -> Self {
        Slot { file_id: None, path: None, handle: None, offset: 0 }
    }
}

pub struct FileCache {
    slots: Vec<Slot>,
    writable: bool,
}

impl FileCache {
    pub fn new(writable: bool) -> Self {
        FileCache { slots: (0..SLOTS).map(|_| Slot::empty()).collect(), writable }
    }

    fn index(file_id: u64) -> usize {
        (file_id as usize) % SLOTS
    }

    /// Returns the handle and current seek offset for `file_id`, opening
    /// (or evicting a colliding occupant) as needed. Invariant 1: at most
    /// one open slot per `file_id`.
    pub fn get(&mut self, file_id: u64, path: &Path) -> Result<(&mut File, &mut u64)> {
        let idx = Self::index(file_id);
        let slot = &mut self.slots[idx];
        if slot.file_id != Some(file_id) {
            // Direct-mapped eviction: whoever was here is closed
            // unconditionally, no LRU ranking (spec.md §4.D).
            slot.handle = None;
            let mut opts = OpenOptions::new();
            if self.writable {
                opts.create(true).write(true).read(true);
            } else {
                opts.read(true);
            }
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                opts.mode(default_mode());
            }
            let f = opts.open(path).io_context(format!("open {path:?}"))?;
            slot.handle = Some(f);
            slot.file_id = Some(file_id);
            slot.path = Some(path.to_path_buf());
            slot.offset = 0;
        }
        Ok((slot.handle.as_mut().expect("just opened"), &mut slot.offset))
    }

    /// Advances the cached slot's seek offset after I/O, so the next access
    /// to the same file at a contiguous offset skips the `seek` call in
    /// `translate::open_for_access`.
    pub fn advance(&mut self, file_id: u64, len: u64) {
        let idx = Self::index(file_id);
        let slot = &mut self.slots[idx];
        if slot.file_id == Some(file_id) {
            slot.offset += len;
        }
    }

    pub fn close_all(&mut self) {
        for s in &mut self.slots {
            s.handle = None;
            s.file_id = None;
            s.path = None;
        }
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.handle.is_some()).count()
    }
}
