//! File utilities for reading resumes and knowledge documents.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Default upper bound for files read from disk (10 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Calculate SHA-256 checksum of content.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// Check if a file is likely a plain-text document.
///
/// Binary document formats (PDF, Office) are reported as non-text; their
/// extraction happens outside this crate.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if is_binary_extension(&ext) {
            return false;
        }
        if is_text_extension(&ext) {
            return true;
        }
    }

    // Sniff the first bytes for NULs
    if let Ok(file) = fs::File::open(path) {
        let mut buffer = [0u8; 512];
        let mut reader = std::io::BufReader::new(file);
        if let Ok(n) = reader.read(&mut buffer) {
            return n == 0 || !buffer[..n].contains(&0);
        }
    }

    false
}

/// Read file content with size limit.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "pdf"
            | "doc"
            | "docx"
            | "odt"
            | "rtf"
            | "xls"
            | "xlsx"
            | "ppt"
            | "pptx"
            | "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "bmp"
            | "webp"
            | "zip"
            | "tar"
            | "gz"
            | "7z"
            | "exe"
            | "dll"
            | "so"
            | "dylib"
            | "bin"
    )
}

fn is_text_extension(ext: &str) -> bool {
    matches!(
        ext,
        "txt" | "md" | "markdown" | "rst" | "adoc" | "org"
            | "html" | "htm" | "xml" | "json" | "yaml" | "yml" | "toml" | "csv" | "tsv"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_calculate_checksum() {
        let checksum = calculate_checksum("hello world");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, calculate_checksum("hello world"));
        assert_ne!(checksum, calculate_checksum("hello world!"));
    }

    #[test]
    fn test_is_text_file_by_extension() {
        assert!(is_text_file(&PathBuf::from("resume.txt")));
        assert!(is_text_file(&PathBuf::from("notes.md")));
        assert!(!is_text_file(&PathBuf::from("resume.pdf")));
        assert!(!is_text_file(&PathBuf::from("resume.docx")));
    }

    #[test]
    fn test_is_text_file_sniffs_content() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("resume");
        std::fs::write(&text, "Senior engineer").unwrap();
        assert!(is_text_file(&text));

        let binary = dir.path().join("blob");
        let mut file = std::fs::File::create(&binary).unwrap();
        file.write_all(&[0x89, 0x00, 0x01, 0x02]).unwrap();
        assert!(!is_text_file(&binary));
    }

    #[test]
    fn test_read_file_content_enforces_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.txt");
        std::fs::write(&path, "x".repeat(100)).unwrap();

        assert_eq!(read_file_content(&path, 1000).unwrap().len(), 100);
        let err = read_file_content(&path, 10).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
