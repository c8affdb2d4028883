use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Extensions accepted without looking at the file contents.
pub const SLICE_EXTENSIONS: [&str; 2] = ["dcm", "dicom"];

/// Length of the DICOM file preamble preceding the magic code.
pub const PREAMBLE_LEN: u64 = 128;

pub const DICOM_MAGIC: &[u8; 4] = b"DICM";

/// Decide whether `path` looks like a DICOM slice file.
///
/// A known extension is enough. Otherwise the four bytes following the
/// 128-byte preamble must read `DICM`. Files that cannot be opened or are
/// too short are rejected rather than reported.
pub fn is_slice_file(path: &Path) -> bool {
    let has_known_extension = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| SLICE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)));

    has_known_extension || has_magic(path).unwrap_or(false)
}

fn has_magic(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(PREAMBLE_LEN))?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    Ok(&magic == DICOM_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn accepts_known_extensions_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_slice_file(&write(dir.path(), "a.dcm", b"")));
        assert!(is_slice_file(&write(dir.path(), "b.DICOM", b"")));
        assert!(!is_slice_file(&write(dir.path(), "c.txt", b"hello")));
    }

    #[test]
    fn accepts_magic_after_preamble() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = vec![0u8; 128];
        bytes.extend_from_slice(b"DICM");
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(is_slice_file(&write(dir.path(), "IM0001", &bytes)));

        bytes[128] = b'X';
        assert!(!is_slice_file(&write(dir.path(), "IM0002", &bytes)));
    }

    #[test]
    fn short_or_missing_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_slice_file(&write(dir.path(), "short", &[0u8; 130])));
        assert!(!is_slice_file(&dir.path().join("does-not-exist")));
    }
}
