//! Dataset configuration (`spec.md` §6.5): the recognized options a
//! context's configuration registry would hand the core. The registry
//! itself (naming, defaults merging across scopes) is out of scope per
//! `spec.md` §1 — this module only types and parses the resolved values.

use crate::error::{HioError, Result};
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FileMode {
    #[default]
    Basic,
    FilePerNode,
    Strided,
}

impl FileMode {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "basic" => Ok(FileMode::Basic),
            "file_per_node" => Ok(FileMode::FilePerNode),
            "strided" => Ok(FileMode::Strided),
            other => Err(HioError::BadState(format!("unknown dataset_file_mode {other:?}"))),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DatasetMode {
    Unique,
    Shared,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct DatasetFlags: u32 {
        const CREATE   = 0b0001;
        const TRUNCATE = 0b0010;
        const READ     = 0b0100;
        const WRITE    = 0b1000;
    }
}

/// Typed view of `spec.md` §6.5's recognized options, after a registry has
/// resolved them to strings.
#[derive(Clone, Debug, Default)]
pub struct DatasetConfig {
    pub file_mode: Option<FileMode>,
    pub block_size: Option<u64>,
    pub file_count: Option<u64>,
    pub use_bzip: Option<bool>,
    pub stripe_count: Option<u32>,
    pub stripe_size: Option<u64>,
    pub raid_level: Option<u32>,
}

impl DatasetConfig {
    pub fn from_options(opts: &HashMap<String, String>) -> Result<Self> {
        let mut cfg = DatasetConfig::default();
        for (k, v) in opts {
            match k.as_str() {
                "dataset_file_mode" => cfg.file_mode = Some(FileMode::parse(v)?),
                "dataset_block_size" => {
                    cfg.block_size = Some(parse_u64(v, "dataset_block_size")?)
                }
                "dataset_file_count" => {
                    let n = parse_u64(v, "dataset_file_count")?;
                    if n == 0 {
                        return Err(HioError::BadState("dataset_file_count must be > 0".into()));
                    }
                    cfg.file_count = Some(n);
                }
                "dataset_use_bzip" => cfg.use_bzip = Some(parse_bool(v)?),
                "stripe_count" => cfg.stripe_count = Some(parse_u64(v, "stripe_count")? as u32),
                "stripe_size" => cfg.stripe_size = Some(parse_u64(v, "stripe_size")?),
                "raid_level" => cfg.raid_level = Some(parse_u64(v, "raid_level")? as u32),
                other => {
                    tracing::warn!(option = other, "ignoring unrecognized dataset option");
                }
            }
        }
        Ok(cfg)
    }
}

fn parse_u64(s: &str, field: &str) -> Result<u64> {
    s.parse().map_err(|_| HioError::BadState(format!("{field} is not a valid integer: {s:?}")))
}

fn parse_bool(s: &str) -> Result<bool> {
    match s {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(HioError::BadState(format!("not a boolean: {other:?}"))),
    }
}

pub const DEFAULT_OPEN_FILE_SLOTS: usize = 32;
pub const DEFAULT_BLOCK_SIZE: u64 = 8 << 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recognized_options() {
        let mut m = HashMap::new();
        m.insert("dataset_file_mode".into(), "strided".into());
        m.insert("dataset_block_size".into(), "65536".into());
        m.insert("dataset_use_bzip".into(), "true".into());
        let cfg = DatasetConfig::from_options(&m).unwrap();
        assert_eq!(cfg.file_mode, Some(FileMode::Strided));
        assert_eq!(cfg.block_size, Some(65536));
        assert_eq!(cfg.use_bzip, Some(true));
    }

    #[test]
    fn rejects_zero_file_count() {
        let mut m = HashMap::new();
        m.insert("dataset_file_count".into(), "0".into());
        assert!(DatasetConfig::from_options(&m).is_err());
    }
}
