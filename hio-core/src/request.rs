//! Request processor (`spec.md` §4.G): turns one logical read or write on
//! an element into a loop of `translate` calls plus real file I/O,
//! updating the element's size high-water mark and status code as it goes.

use crate::allocator::Reservation;
use crate::cache::FileCache;
use crate::config::{DatasetMode, FileMode};
use crate::element::Element;
use crate::error::{status_code, HioError, IoContext, Result};
use crate::manifest::DatasetMap;
use crate::shared::SharedControl;
use crate::translate::{self, Access};
use std::io::{Read, Write};
use std::path::Path;

/// Static layout parameters a request needs but that do not change across
/// calls within one open dataset.
pub struct Layout<'a> {
    pub base: &'a Path,
    pub file_mode: FileMode,
    pub dataset_mode: DatasetMode,
    pub block_size: u64,
    pub file_count: u64,
    pub master_rank: u64,
    pub my_stripe: usize,
    pub stripe_count: u64,
    pub rank: u64,
    pub legacy_layout: bool,
}

/// Outcome of a request (`spec.md` §4.G): `bytes` served and a signed
/// `status` (0 on success, `error::status_code` otherwise).
pub struct Outcome {
    pub bytes: u64,
    pub status: i64,
}

pub fn write(
    layout: &Layout,
    element: &mut Element,
    cache: &mut FileCache,
    reservation: &mut Reservation,
    shared: &SharedControl,
    offset: u64,
    buf: &[u8],
) -> Outcome {
    match write_inner(layout, element, cache, reservation, shared, offset, buf) {
        Ok(bytes) => {
            element.bump_size(offset, bytes);
            Outcome { bytes, status: 0 }
        }
        Err(e) => Outcome { bytes: 0, status: status_code(&e) },
    }
}

fn write_inner(
    layout: &Layout,
    element: &mut Element,
    cache: &mut FileCache,
    reservation: &mut Reservation,
    shared: &SharedControl,
    offset: u64,
    buf: &[u8],
) -> Result<u64> {
    let mut done: u64 = 0;
    while (done as usize) < buf.len() {
        let cur_offset = offset + done;
        let remaining = (buf.len() as u64) - done;
        let access = next_write_access(layout, element, reservation, shared, cur_offset, remaining);

        if layout.file_mode == FileMode::Basic {
            let handle = basic_handle_mut(layout, element, cache)?;
            handle
                .write_all(&buf[done as usize..(done + access.length) as usize])
                .io_context("write basic element")?;
        } else {
            let f = translate::open_for_access(cache, &access)?;
            f.write_all(&buf[done as usize..(done + access.length) as usize])
                .io_context(format!("write {:?}", access.path))?;
            cache.advance(access.file_id, access.length);
        }
        done += access.length;
    }
    Ok(done)
}

fn next_write_access(
    layout: &Layout,
    element: &mut Element,
    reservation: &mut Reservation,
    shared: &SharedControl,
    offset: u64,
    remaining: u64,
) -> Access {
    match layout.file_mode {
        FileMode::Basic => {
            translate::translate_basic(
                layout.base,
                layout.dataset_mode,
                &element.key.name,
                layout.rank,
                offset,
                remaining,
            )
        }
        FileMode::Strided => translate::translate_strided(
            layout.base,
            &element.key.name,
            layout.block_size,
            layout.file_count,
            offset,
            remaining,
        ),
        FileMode::FilePerNode => translate::translate_optimized_write(
            layout.base,
            element,
            layout.master_rank,
            reservation,
            shared,
            layout.my_stripe,
            layout.stripe_count,
            layout.block_size,
            offset,
            remaining,
        ),
    }
}

pub fn read(
    layout: &Layout,
    element: &mut Element,
    cache: &mut FileCache,
    dataset_map: Option<&DatasetMap>,
    offset: u64,
    buf: &mut [u8],
) -> Outcome {
    match read_inner(layout, element, cache, dataset_map, offset, buf) {
        Ok(bytes) => Outcome { bytes, status: 0 },
        Err(e) => Outcome { bytes: 0, status: status_code(&e) },
    }
}

fn read_inner(
    layout: &Layout,
    element: &mut Element,
    cache: &mut FileCache,
    dataset_map: Option<&DatasetMap>,
    offset: u64,
    buf: &mut [u8],
) -> Result<u64> {
    if offset >= element.size {
        return Err(HioError::NotFound(format!(
            "offset {offset} past element size {}",
            element.size
        )));
    }
    let want = (buf.len() as u64).min(element.size - offset);
    let mut done: u64 = 0;
    while done < want {
        let cur_offset = offset + done;
        let remaining = want - done;
        let access = match layout.file_mode {
            FileMode::Basic => translate::translate_basic(
                layout.base,
                layout.dataset_mode,
                &element.key.name,
                layout.rank,
                cur_offset,
                remaining,
            ),
            FileMode::Strided => translate::translate_strided(
                layout.base,
                &element.key.name,
                layout.block_size,
                layout.file_count,
                cur_offset,
                remaining,
            ),
            FileMode::FilePerNode => translate::translate_optimized_read(
                layout.base,
                element,
                dataset_map,
                cur_offset,
                remaining,
                layout.legacy_layout,
            )?,
        };

        if layout.file_mode == FileMode::Basic {
            let handle = basic_handle_mut(layout, element, cache)?;
            handle
                .read_exact(&mut buf[done as usize..(done + access.length) as usize])
                .io_context("read basic element")?;
        } else {
            let f = translate::open_for_access(cache, &access)?;
            f.read_exact(&mut buf[done as usize..(done + access.length) as usize])
                .io_context(format!("read {:?}", access.path))?;
            cache.advance(access.file_id, access.length);
        }
        done += access.length;
    }
    Ok(done)
}

/// Lazily opens (and remembers) an element's dedicated BASIC-mode handle.
fn basic_handle_mut<'a>(
    layout: &Layout,
    element: &'a mut Element,
    _cache: &mut FileCache,
) -> Result<&'a mut std::fs::File> {
    if element.basic_handle.is_none() {
        let path = match layout.dataset_mode {
            DatasetMode::Shared => crate::path::basic_shared_path(layout.base, &element.key.name),
            DatasetMode::Unique => {
                crate::path::basic_unique_path(layout.base, &element.key.name, layout.rank)
            }
        };
        let mode = crate::directory::default_mode();
        let mut opts = std::fs::OpenOptions::new();
        opts.create(true).read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(mode);
        }
        let f = opts.open(&path).io_context(format!("open {path:?}"))?;
        element.basic_handle = Some(f);
    }
    Ok(element.basic_handle.as_mut().expect("just opened"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementKey;

    fn layout_basic(base: &Path) -> Layout {
        Layout {
            base,
            file_mode: FileMode::Basic,
            dataset_mode: DatasetMode::Shared,
            block_size: 1 << 20,
            file_count: 1,
            master_rank: 0,
            my_stripe: 0,
            stripe_count: 1,
            rank: 0,
            legacy_layout: false,
        }
    }

    #[test]
    fn basic_write_then_read_round_trips() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(td.path().join("data")).unwrap();
        let layout = layout_basic(td.path());
        let mut element = Element::new(ElementKey { name: "E".into(), rank_tag: None }, 1);
        let mut cache = FileCache::new(true);
        let mut reservation = Reservation::default();
        let shared = SharedControl::create(1).unwrap();

        let data = b"hello world";
        let out = write(&layout, &mut element, &mut cache, &mut reservation, &shared, 0, data);
        assert_eq!(out.status, 0);
        assert_eq!(out.bytes, data.len() as u64);
        assert_eq!(element.size, data.len() as u64);

        let mut buf = vec![0u8; data.len()];
        let out = read(&layout, &mut element, &mut cache, None, 0, &mut buf);
        assert_eq!(out.status, 0);
        assert_eq!(&buf, data);
    }

    #[test]
    fn read_past_size_is_not_found() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(td.path().join("data")).unwrap();
        let layout = layout_basic(td.path());
        let mut element = Element::new(ElementKey { name: "E".into(), rank_tag: None }, 1);
        let mut cache = FileCache::new(true);
        let mut buf = vec![0u8; 4];
        let out = read(&layout, &mut element, &mut cache, None, 0, &mut buf);
        assert_ne!(out.status, 0);
    }

    #[test]
    fn strided_write_spans_multiple_files_transparently() {
        let td = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(td.path().join("data")).unwrap();
        let mut layout = layout_basic(td.path());
        layout.file_mode = FileMode::Strided;
        layout.block_size = 16;
        layout.file_count = 2;

        let mut element = Element::new(ElementKey { name: "E".into(), rank_tag: None }, 1);
        let mut cache = FileCache::new(true);
        let mut reservation = Reservation::default();
        let shared = SharedControl::create(1).unwrap();

        let data: Vec<u8> = (0..40u8).collect();
        let out = write(&layout, &mut element, &mut cache, &mut reservation, &shared, 0, &data);
        assert_eq!(out.status, 0);
        assert_eq!(out.bytes, 40);

        assert!(td.path().join("data/E_block.00000000").exists());
        assert!(td.path().join("data/E_block.00000001").exists());
    }
}
