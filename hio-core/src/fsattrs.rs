//! FS attribute probe and striping setup (`spec.md` §4.C) plus the
//! filesystem collaborator (`spec.md` §6.4).

use crate::config::{DatasetConfig, DatasetMode, FileMode};
use crate::error::{IoContext, Result};
use std::path::Path;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct FsCapability: u32 {
        const SUPPORTS_STRIPING = 0b01;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FsAttrs {
    pub stripe_count: u32,
    pub stripe_size: u64,
    pub stripe_unit: u64,
    pub max_stripe_count: u32,
    pub max_stripe_size: u64,
    pub raid_level: u32,
    pub capability: FsCapability,
}

impl Default for FsAttrs {
    /// A conservative, non-striping baseline. Real Lustre/GPFS striping
    /// ioctls are not available from portable safe Rust; `PosixFs::query`
    /// returns this unless the caller's `DatasetConfig` supplies explicit
    /// stripe values, in which case `SUPPORTS_STRIPING` is set instead
    /// (see `SPEC_FULL.md` §4.A/B/C).
    fn default() -> Self {
        FsAttrs {
            stripe_count: 1,
            stripe_size: 1 << 20,
            stripe_unit: 64 << 10,
            max_stripe_count: 1,
            max_stripe_size: 1 << 20,
            raid_level: 0,
            capability: FsCapability::empty(),
        }
    }
}

/// Filesystem collaborator (`spec.md` §6.4).
pub trait FilesystemOps: Send + Sync {
    fn query(&self, path: &Path) -> Result<FsAttrs>;
    fn set_stripe(&self, path: &Path, attrs: &FsAttrs) -> Result<()>;
    fn mkpath(&self, path: &Path, mode: u32) -> Result<()>;
}

pub struct PosixFs {
    overrides: Option<FsAttrs>,
}

impl PosixFs {
    pub fn new() -> Self {
        Self { overrides: None }
    }

    /// Build a probe that reports striping capability with the given
    /// baseline attrs, standing in for a real Lustre/GPFS query.
    pub fn with_overrides(attrs: FsAttrs) -> Self {
        Self { overrides: Some(attrs) }
    }
}

impl Default for PosixFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FilesystemOps for PosixFs {
    fn query(&self, _path: &Path) -> Result<FsAttrs> {
        Ok(self.overrides.unwrap_or_default())
    }

    fn set_stripe(&self, _path: &Path, attrs: &FsAttrs) -> Result<()> {
        if !attrs.capability.contains(FsCapability::SUPPORTS_STRIPING) {
            return Ok(());
        }
        // No portable striping ioctl exists; honoring the hint is a no-op
        // beyond recording that it was requested, which callers observe
        // through the `FsAttrs` they already hold.
        Ok(())
    }

    fn mkpath(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::DirBuilderExt;
        match std::fs::DirBuilder::new().recursive(true).mode(mode).create(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e).io_context(format!("mkpath {path:?}")),
        }
    }
}

/// Per-mode defaults (`spec.md` §4.C), applied on top of a probed
/// baseline, then clamped against the probe's `max_stripe_count`/
/// `max_stripe_size` and rounded to a `stripe_unit` multiple.
pub fn finalize(
    mode: DatasetMode,
    file_mode: FileMode,
    probed: FsAttrs,
    block_size: &mut u64,
    node_local_size: u32,
    user: &DatasetConfig,
) -> FsAttrs {
    let mut attrs = probed;

    match file_mode {
        FileMode::Basic => {
            attrs.stripe_size = 1 << 20;
            attrs.stripe_count = if mode == DatasetMode::Shared {
                (0.9 * attrs.max_stripe_count as f64).floor().max(1.0) as u32
            } else {
                1
            };
        }
        FileMode::FilePerNode => {
            attrs.stripe_size = 16 << 20;
            attrs.stripe_count = node_local_size.min(attrs.max_stripe_count).max(1);
            if *block_size < attrs.stripe_size {
                *block_size = attrs.stripe_size;
            }
        }
        FileMode::Strided => {
            attrs.stripe_size = *block_size;
            attrs.stripe_count = 16;
        }
    }

    if let Some(sc) = user.stripe_count {
        attrs.stripe_count = sc;
    }
    if let Some(ss) = user.stripe_size {
        attrs.stripe_size = ss;
    }
    if let Some(rl) = user.raid_level {
        attrs.raid_level = rl;
    }
    if user.stripe_count.is_some() || user.stripe_size.is_some() {
        attrs.capability |= FsCapability::SUPPORTS_STRIPING;
    }

    if attrs.stripe_count > attrs.max_stripe_count {
        tracing::warn!(
            requested = attrs.stripe_count,
            max = attrs.max_stripe_count,
            "clamping stripe_count to max_stripe_count"
        );
        attrs.stripe_count = attrs.max_stripe_count;
    }

    if attrs.stripe_unit > 0 {
        let rounded = attrs.stripe_size.div_ceil(attrs.stripe_unit) * attrs.stripe_unit;
        if rounded != attrs.stripe_size {
            tracing::warn!(
                from = attrs.stripe_size,
                to = rounded,
                "rounding stripe_size up to a stripe_unit multiple"
            );
        }
        attrs.stripe_size = rounded;
    }
    if attrs.stripe_size > attrs.max_stripe_size {
        tracing::warn!(
            requested = attrs.stripe_size,
            max = attrs.max_stripe_size,
            "clamping stripe_size to max_stripe_size"
        );
        attrs.stripe_size = attrs.max_stripe_size;
    }

    if !attrs.capability.contains(FsCapability::SUPPORTS_STRIPING) {
        attrs.stripe_count = 1;
    }

    attrs
}
