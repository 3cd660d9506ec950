//! Small filesystem helpers shared by the strategy engines.
//!
//! Permission bits come from the store configuration and are passed
//! explicitly to every creation site; nothing here touches the process
//! umask. On non-Unix targets the mode arguments compile to no-ops.

use std::io;
use std::path::Path;

/// Parent directory of `path`, falling back to `.` for bare filenames so
/// directory creation never sees an empty path.
pub(crate) fn parent_of(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Create `path` and any missing ancestors, applying `dmode` to each
/// directory this call creates.
#[cfg(unix)]
pub(crate) fn create_dir_all_mode(path: &Path, dmode: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true).mode(dmode);
    builder.create(path)
}

#[cfg(not(unix))]
pub(crate) fn create_dir_all_mode(path: &Path, _dmode: u32) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

/// Apply `fmode` to an existing file.
#[cfg(unix)]
pub(crate) fn set_file_mode(path: &Path, fmode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(fmode))
}

#[cfg(not(unix))]
pub(crate) fn set_file_mode(_path: &Path, _fmode: u32) -> io::Result<()> {
    Ok(())
}

/// Create a symbolic link at `link` pointing at `target`.
#[cfg(unix)]
pub(crate) fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
pub(crate) fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
