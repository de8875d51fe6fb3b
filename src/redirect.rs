//! Opening the files named by redirections.
//!
//! Files created through `>` or `>>` ask for mode `0o777`; the process umask
//! is the only thing narrowing that down.

use crate::parser::{RedirectKind, RedirectionSpec};
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;

/// Creation mode requested for new output files.
pub const CREATE_MODE: u32 = 0o777;

fn options_for(kind: RedirectKind) -> OpenOptions {
    let mut options = OpenOptions::new();
    match kind {
        RedirectKind::Read => {
            options.read(true);
        }
        RedirectKind::Write => {
            options.write(true).create(true).truncate(true).mode(CREATE_MODE);
        }
        RedirectKind::Append => {
            options.append(true).create(true).mode(CREATE_MODE);
        }
    }
    options
}

/// Open the file behind a redirection with the access its kind calls for.
pub fn open_target(spec: &RedirectionSpec) -> io::Result<File> {
    tracing::debug!(path = %spec.path, kind = ?spec.kind, "opening redirection target");
    options_for(spec.kind).open(&spec.path)
}

/// Create or truncate `path` immediately, as `>` does at parse time.
pub fn truncate_now(path: &str) -> io::Result<()> {
    options_for(RedirectKind::Write).open(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::unix::fs::PermissionsExt;

    fn spec(kind: RedirectKind, path: &std::path::Path) -> RedirectionSpec {
        RedirectionSpec {
            kind,
            path: path.to_string_lossy().into_owned(),
        }
    }

    #[test]
    fn write_truncates_and_append_extends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, "old old old").unwrap();

        open_target(&spec(RedirectKind::Write, &path))
            .unwrap()
            .write_all(b"one\n")
            .unwrap();
        open_target(&spec(RedirectKind::Append, &path))
            .unwrap()
            .write_all(b"two\n")
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn read_opens_existing_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input");
        assert!(open_target(&spec(RedirectKind::Read, &path)).is_err());

        std::fs::write(&path, "hello").unwrap();
        let mut contents = String::new();
        open_target(&spec(RedirectKind::Read, &path))
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "hello");
    }

    #[test]
    fn new_files_get_broad_permissions_under_umask() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created");
        truncate_now(&path.to_string_lossy()).unwrap();

        let umask = nix::sys::stat::umask(nix::sys::stat::Mode::empty());
        nix::sys::stat::umask(umask);

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, CREATE_MODE & !umask.bits());
    }
}
