//! Scheme-qualified resource names, e.g. `jar:file:///tmp/app.jar!/`.

use std::ffi::OsString;
use std::fmt;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

use crate::error::{ArchiveError, Result};

/// Separator between an archive's backing URI and the entry inside it.
pub const ENTRY_SEPARATOR: &str = "!/";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    uri: String,
    scheme_len: usize,
}

impl Locator {
    pub fn parse(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        let scheme_len = uri
            .find(':')
            .filter(|&idx| idx > 0 && is_valid_scheme(&uri[..idx]))
            .ok_or_else(|| ArchiveError::InvalidLocator(uri.clone()))?;
        Ok(Locator { uri, scheme_len })
    }

    pub fn scheme(&self) -> &str {
        &self.uri[..self.scheme_len]
    }

    /// Everything after `scheme:`.
    pub fn scheme_specific_part(&self) -> &str {
        &self.uri[self.scheme_len + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Locator for an archive mount of `path`, using `scheme` as the archive
    /// scheme. Literal `!/` sequences in the path are escaped so the entry
    /// separator stays unambiguous.
    pub fn for_archive(scheme: &str, path: &Path) -> Result<Self> {
        let file_uri = file_uri(path)?.replace(ENTRY_SEPARATOR, "%21/");
        Locator::parse(format!("{scheme}:{file_uri}{ENTRY_SEPARATOR}"))
    }

    /// The backing file of an archive locator built by [`Locator::for_archive`].
    pub fn archive_file_path(&self) -> Result<PathBuf> {
        let ssp = self.scheme_specific_part();
        let file_uri = match ssp.find(ENTRY_SEPARATOR) {
            Some(idx) => &ssp[..idx],
            None => ssp,
        };
        file_path_from_uri(file_uri).ok_or_else(|| ArchiveError::InvalidLocator(self.uri.clone()))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// `file://` URI for an absolute form of `path`, percent-encoding every byte
/// that may not appear literally in a URI path.
pub fn file_uri(path: &Path) -> Result<String> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut uri = String::from("file://");
    for &byte in absolute.as_os_str().as_bytes() {
        if is_path_char(byte) {
            uri.push(byte as char);
        } else {
            uri.push_str(&format!("%{byte:02X}"));
        }
    }
    Ok(uri)
}

/// Inverse of [`file_uri`]. Returns `None` for anything but a well-formed
/// `file://` URI with an absolute path.
pub fn file_path_from_uri(uri: &str) -> Option<PathBuf> {
    let encoded = uri.strip_prefix("file://")?;
    if !encoded.starts_with('/') {
        return None;
    }

    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let hex = encoded.get(idx + 1..idx + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            idx += 3;
        } else {
            decoded.push(bytes[idx]);
            idx += 1;
        }
    }
    Some(PathBuf::from(OsString::from_vec(decoded)))
}

fn is_path_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'/' | b'-' | b'.' | b'_' | b'~' | b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*'
                | b'+' | b',' | b';' | b'=' | b':' | b'@'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_scheme() {
        let locator = Locator::parse("jar:file:///tmp/a.jar!/").unwrap();
        assert_eq!(locator.scheme(), "jar");
        assert_eq!(locator.scheme_specific_part(), "file:///tmp/a.jar!/");
    }

    #[test]
    fn test_parse_rejects_missing_scheme() {
        assert!(Locator::parse("/tmp/a.jar").is_err());
        assert!(Locator::parse(":oops").is_err());
        assert!(Locator::parse("1ab:x").is_err());
    }

    #[test]
    fn test_for_archive_escapes_entry_separator() {
        let locator = Locator::for_archive("jar", Path::new("/tmp/odd!/dir/a.jar")).unwrap();
        assert_eq!(locator.as_str(), "jar:file:///tmp/odd%21/dir/a.jar!/");
        assert_eq!(
            locator.archive_file_path().unwrap(),
            PathBuf::from("/tmp/odd!/dir/a.jar")
        );
    }

    #[test]
    fn test_file_uri_encodes_special_characters() {
        let uri = file_uri(Path::new("/tmp/zip utils?test#1.jar")).unwrap();
        assert_eq!(uri, "file:///tmp/zip%20utils%3Ftest%231.jar");
        assert_eq!(
            file_path_from_uri(&uri).unwrap(),
            PathBuf::from("/tmp/zip utils?test#1.jar")
        );
    }

    #[test]
    fn test_file_path_from_uri_rejects_garbage() {
        assert!(file_path_from_uri("http://host/a").is_none());
        assert!(file_path_from_uri("file://relative").is_none());
        assert!(file_path_from_uri("file:///bad%2").is_none());
    }
}
