//! Hierarchical parallel I/O storage backend (POSIX component): a parallel
//! dataset layer that maps a logical `(dataset, element, offset)` address
//! space onto physical files under one of three file-layout modes —
//! BASIC (one file per element), STRIDED (round-robin fixed blocks across
//! a file set) or OPTIMIZED (shared per-node data files with a stripe
//! allocator). See `dataset::Dataset` for the entry point.

pub mod allocator;
pub mod cache;
pub mod config;
pub mod dataset;
pub mod directory;
pub mod element;
pub mod enumerator;
pub mod error;
pub mod fsattrs;
pub mod manifest;
pub mod path;
pub mod rankgroup;
pub mod request;
pub mod shared;
pub mod trace;
pub mod translate;

pub use config::{DatasetConfig, DatasetFlags, DatasetMode, FileMode};
pub use dataset::{Completion, Dataset, DatasetOpenOptions, Request, RequestIo};
pub use error::{HioError, Result};
pub use fsattrs::PosixFs;
pub use rankgroup::{LocalRankGroup, RankGroup, ThreadRankGroup};
