//! Writer for property files.
//!
//! Rendering is the exact inverse of [`crate::parser::split_lines`], and files
//! are replaced atomically so a crash never leaves a half-written tracker.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Join lines back into file content.
pub fn render(lines: &[String], trailing_newline: bool) -> String {
    if lines.is_empty() {
        return String::new();
    }

    let mut output = lines.join("\n");
    if trailing_newline {
        output.push('\n');
    }
    output
}

/// Replace `path` with `content` through a sibling temporary file.
///
/// Permission bits of an existing file are carried over to the new one.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let write_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let tmp = temp_path(path);
    let existing = fs::metadata(path).ok();

    let mut file = fs::File::create(&tmp).map_err(write_err)?;
    file.write_all(content.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    drop(file);

    if let Some(metadata) = existing {
        fs::set_permissions(&tmp, metadata.permissions()).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            // Only root may give a file away; keep going as the caller otherwise
            let _ = std::os::unix::fs::chown(&tmp, Some(metadata.uid()), Some(metadata.gid()));
        }
    }

    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        write_err(source)
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::split_lines;
    use tempfile::TempDir;

    #[test]
    fn test_render_inverse_of_split() {
        for content in ["", "\n", "a=1", "a=1\n", "# header\n\na=1\nb=2\n", "x\r\ny\r\n"] {
            let (lines, trailing) = split_lines(content);
            assert_eq!(render(&lines, trailing), content);
        }
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry");
        fs::write(&path, "old\n").unwrap();

        write_atomic(&path, "new\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert!(!temp_path(&path).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_keeps_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("CS.cfg");
        fs::write(&path, "a=1\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&path, "a=2\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }
}
