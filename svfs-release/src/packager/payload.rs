//! The gzip-compressed odc cpio `Payload` of a macOS flat package.
//!
//! Same stream as `find . | cpio -o --format odc --owner 0:80 | gzip -c` run
//! inside the staging root. The entry list comes from a sorted walk, `cpio`
//! writes the archive to stdout and the result is compressed with `flate2`.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{ReleaseError, Result};
use crate::process::Cmd;
use crate::target::Target;

/// Owner recorded for every archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Newline separated entries under `root`: `.` first, then `./<relative path>`
/// in sorted walk order.
pub fn entry_list(root: &Path) -> Result<String> {
    let mut list = String::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ReleaseError::fs(path, io::Error::other(e))
        })?;
        let path = entry.path();

        let relative = path.strip_prefix(root).map_err(|_| {
            ReleaseError::Config(format!("{} is outside {}", path.display(), root.display()))
        })?;
        if relative.as_os_str().is_empty() {
            list.push('.');
        } else {
            list.push_str("./");
            list.push_str(&relative.to_string_lossy());
        }
        list.push('\n');
    }

    Ok(list)
}

/// `cpio -o --format odc --owner <uid>:<gid>`, run in `root`.
pub fn archive_command(cpio: &str, root: &Path, owner: Owner) -> Cmd {
    Cmd::new(cpio)
        .args(["-o", "--format", "odc", "--owner"])
        .arg(owner.to_string())
        .dir(root)
}

/// Archive the tree under `root` with `cpio` and write it gzip-compressed
/// to `dest`.
pub fn write_payload(
    cpio: &str,
    root: &Path,
    dest: &Path,
    owner: Owner,
    target: &Target,
) -> Result<()> {
    let cmd = archive_command(cpio, root, owner).input(entry_list(root)?);
    let result = cmd.run()?;

    if !result.success() {
        return Err(ReleaseError::PackagerFailure {
            tool: cmd.program(),
            target: target.to_string(),
            code: result.code(),
            stderr: result.diagnostics(),
        });
    }

    let file = File::create(dest).map_err(|e| ReleaseError::fs(dest, e))?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder
        .write_all(&result.stdout)
        .map_err(|e| ReleaseError::fs(dest, e))?;
    encoder.finish().map_err(|e| ReleaseError::fs(dest, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Os, PackageFormat};
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;
    use tempfile::tempdir;

    const OWNER: Owner = Owner { uid: 0, gid: 80 };

    fn staged_root() -> tempfile::TempDir {
        let root = tempdir().unwrap();
        fs::create_dir_all(root.path().join("usr/local/bin")).unwrap();
        fs::write(root.path().join("usr/local/bin/svfs"), b"svfs binary").unwrap();
        fs::write(root.path().join("usr/local/bin/mount_svfs"), b"#!/bin/sh\n").unwrap();
        root
    }

    #[test]
    fn test_entry_list() {
        let root = staged_root();
        assert_eq!(
            entry_list(root.path()).unwrap(),
            ".\n./usr\n./usr/local\n./usr/local/bin\n./usr/local/bin/mount_svfs\n./usr/local/bin/svfs\n"
        );
    }

    #[test]
    fn test_entry_list_of_empty_root() {
        let root = tempdir().unwrap();
        assert_eq!(entry_list(root.path()).unwrap(), ".\n");
    }

    #[test]
    fn test_archive_command() {
        let cmd = archive_command("cpio", Path::new("/stage/root"), OWNER);
        assert_eq!(cmd.to_string(), "cpio -o --format odc --owner 0:80");
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("cpio");
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    fn target() -> Target {
        Target::new(Os::Darwin, PackageFormat::Pkg, "amd64")
    }

    #[cfg(unix)]
    #[test]
    fn test_write_payload_compresses_archive_output() {
        let root = staged_root();
        let tools = tempdir().unwrap();
        // stand-in archiver: arguments on the first line, then the entry list
        let cpio = script(tools.path(), "#!/bin/sh\necho \"$@\"\ncat\n");

        let dest = tools.path().join("Payload");
        write_payload(&cpio, root.path(), &dest, OWNER, &target()).unwrap();

        let mut archive = String::new();
        GzDecoder::new(File::open(&dest).unwrap())
            .read_to_string(&mut archive)
            .unwrap();
        let mut lines = archive.lines();
        assert_eq!(lines.next(), Some("-o --format odc --owner 0:80"));
        assert_eq!(
            lines.collect::<Vec<_>>(),
            vec![
                ".",
                "./usr",
                "./usr/local",
                "./usr/local/bin",
                "./usr/local/bin/mount_svfs",
                "./usr/local/bin/svfs",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_archiver_failure() {
        let root = staged_root();
        let tools = tempdir().unwrap();
        let cpio = script(tools.path(), "#!/bin/sh\necho \"cpio: bad format\" >&2\nexit 2\n");

        let dest = tools.path().join("Payload");
        let err = write_payload(&cpio, root.path(), &dest, OWNER, &target()).unwrap_err();

        match err {
            ReleaseError::PackagerFailure {
                target,
                code,
                stderr,
                ..
            } => {
                assert_eq!(target, "darwin/pkg/amd64");
                assert_eq!(code, 2);
                assert_eq!(stderr, "cpio: bad format");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dest.exists());
    }
}
