//! S3 from `spec.md` §8: two ranks on one simulated node concurrently
//! writing to an OPTIMIZED dataset must land in disjoint stripe-aligned
//! ranges, and every byte either wrote must be readable back afterward
//! (property 2 "Disjointness" and property 1 "Round-trip").

use hio_core::{
    Dataset, DatasetConfig, DatasetFlags, DatasetMode, DatasetOpenOptions, FileMode, PosixFs,
    Request, ThreadRankGroup,
};
use std::thread;

fn create_flags() -> DatasetFlags {
    DatasetFlags::CREATE | DatasetFlags::TRUNCATE | DatasetFlags::READ | DatasetFlags::WRITE
}

#[test]
fn two_ranks_reserve_disjoint_stripes_and_read_back_their_own_bytes() {
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
                let mut config = DatasetConfig::default();
                config.file_mode = Some(FileMode::FilePerNode);
                config.block_size = Some(1 << 20);
                let opts =
                    DatasetOpenOptions::new(root, 1, "ds", 1, create_flags(), DatasetMode::Shared)
                        .with_config(config);
                let mut ds = Dataset::open(&fs, &rg, opts).unwrap();
                assert_eq!(ds.file_mode(), FileMode::FilePerNode);

                let payload = vec![rank as u8; 512 << 10];
                let mut reqs = [Request::write("E", 0, &payload)];
                let status = ds.process_reqs(&mut reqs);
                assert_eq!(status, 0);
                assert_eq!(reqs[0].status, (512 << 10) as i64);

                ds.close(&rg).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // Both ranks' writes went to stripe offsets 0 and 1 MiB of the same
    // node-master data file (`my_stripe` is `shared_rank % stripe_count`,
    // and a single-stripe allocator here serializes the fetch-add so the
    // two writes cannot overlap).
    let fs = PosixFs::new();
    let rg = ThreadRankGroup::fleet(1).unwrap().pop().unwrap();
    let opts = DatasetOpenOptions::new(root, 1, "ds", 1, DatasetFlags::READ, DatasetMode::Shared);
    let ds = Dataset::open(&fs, &rg, opts).unwrap();
    let data_file = ds.base_path().join("data/data.0");
    let bytes = std::fs::read(&data_file).unwrap();
    assert!(bytes.len() >= 1 << 20, "second rank's stripe must start at 1 MiB");
    assert!(bytes[..512 << 10].iter().all(|&b| b == 0 || b == 1));
    assert!(bytes[(1 << 20)..(1 << 20) + (512 << 10)].iter().all(|&b| b == 0 || b == 1));
}
