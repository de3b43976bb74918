//! Property 8 ("FD budget") at the whole-`Dataset` level — STRIDED mode
//! touches many more physical files than the 32-slot cache holds — plus a
//! UNIQUE-mode round trip (property 1) across two ranks writing to their
//! own per-rank files.

use hio_core::{
    Dataset, DatasetConfig, DatasetFlags, DatasetMode, DatasetOpenOptions, FileMode, PosixFs,
    Request, ThreadRankGroup,
};
use std::thread;

fn create_flags() -> DatasetFlags {
    DatasetFlags::CREATE | DatasetFlags::TRUNCATE | DatasetFlags::READ | DatasetFlags::WRITE
}

#[test]
fn strided_writes_never_exceed_the_open_file_budget() {
    let td = tempfile::tempdir().unwrap();
    let fs = PosixFs::new();
    let rg = hio_core::LocalRankGroup::new().unwrap();

    let mut config = DatasetConfig::default();
    config.file_mode = Some(FileMode::Strided);
    config.block_size = Some(64);
    config.file_count = Some(64);

    let opts = DatasetOpenOptions::new(td.path(), 1, "ds", 1, create_flags(), DatasetMode::Shared)
        .with_config(config);
    let mut ds = Dataset::open(&fs, &rg, opts).unwrap();

    for block in 0..64u64 {
        let payload = vec![block as u8; 64];
        let mut reqs = [Request::write("E", block * 64, &payload)];
        ds.process_reqs(&mut reqs);
        assert!(ds.open_file_count() <= 32, "must never exceed the 32-descriptor budget");
    }
    ds.close(&rg).unwrap();
}

#[test]
fn unique_mode_keeps_each_ranks_writes_in_its_own_file() {
    let td = tempfile::tempdir().unwrap();
    let root = td.path().to_path_buf();
    let fleet = ThreadRankGroup::fleet(2).unwrap();

    let handles: Vec<_> = fleet
        .into_iter()
        .enumerate()
        .map(|(rank, rg)| {
            let root = root.clone();
            thread::spawn(move || {
                let fs = PosixFs::new();
                let opts = DatasetOpenOptions::new(
                    root,
                    1,
                    "ds",
                    1,
                    create_flags(),
                    DatasetMode::Unique,
                );
                let mut ds = Dataset::open(&fs, &rg, opts).unwrap();
                let payload = vec![rank as u8; 16];
                let mut reqs = [Request::write("E", 0, &payload)];
                ds.process_reqs(&mut reqs);
                ds.close(&rg).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // DatasetMode::Unique tags the element file by rank, so rank 0's and
    // rank 1's writes must have landed in two separate files on disk.
    let base = hio_core::path::dataset_path(&root, 1, "ds", 1);
    for rank in 0..2u64 {
        let path = base.join(format!("data/element_data.E.{rank:08}"));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.iter().all(|&b| b == rank as u8));
    }
}
