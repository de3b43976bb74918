//! Directory bootstrapper (`spec.md` §4.B). Rank-0-only, CREATE-only.

use crate::fsattrs::{FilesystemOps, FsAttrs, FsCapability};
use crate::error::Result;
use std::path::Path;

/// `0777 & ~umask`, captured once as the module's default creation mode
/// (`spec.md` §4.B/§4.D). Querying the umask requires briefly setting and
/// restoring it; there is no read-only accessor in POSIX.
pub fn default_mode() -> u32 {
    use nix::sys::stat::{umask, Mode};
    let prev = umask(Mode::empty());
    umask(prev);
    0o777 & !prev.bits()
}

/// Creates `<base>/data/` (always) and `<base>/trace/` (if tracing is
/// enabled), applying the dataset's stripe hint to `data/` when the
/// filesystem supports striping. Pre-existing directories are accepted
/// silently (`EEXIST` is not an error, `spec.md` §7).
pub fn bootstrap(
    fs: &dyn FilesystemOps,
    base: &Path,
    tracing_enabled: bool,
    attrs: &FsAttrs,
) -> Result<()> {
    let mode = default_mode();
    let data = crate::path::data_dir(base);
    fs.mkpath(&data, mode)?;
    if tracing_enabled {
        fs.mkpath(&crate::path::trace_dir(base), mode)?;
    }
    if attrs.capability.contains(FsCapability::SUPPORTS_STRIPING) {
        fs.set_stripe(&data, attrs)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsattrs::PosixFs;

    #[test]
    fn creates_data_and_trace_dirs() {
        let td = tempfile::tempdir().unwrap();
        let base = td.path().join("ds");
        let fs = PosixFs::new();
        bootstrap(&fs, &base, true, &FsAttrs::default()).unwrap();
        assert!(base.join("data").is_dir());
        assert!(base.join("trace").is_dir());
    }

    #[test]
    fn is_idempotent() {
        let td = tempfile::tempdir().unwrap();
        let base = td.path().join("ds");
        let fs = PosixFs::new();
        bootstrap(&fs, &base, false, &FsAttrs::default()).unwrap();
        bootstrap(&fs, &base, false, &FsAttrs::default()).unwrap();
        assert!(base.join("data").is_dir());
        assert!(!base.join("trace").exists());
    }
}
