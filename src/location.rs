//! Local paths and the `file://` URLs the engine addresses them by.
//!
//! The engine runs in its own process, possibly with a different working
//! directory, so every location handed to it must be absolute.

use crate::error::ConvertError;
use std::path::{Component, Path, PathBuf};

/// Check that `path` exists and is readable, and return its canonical form.
pub fn resolve_source(path: &Path) -> Result<PathBuf, ConvertError> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConvertError::SourceNotFound {
            path: path.to_path_buf(),
        },
    })?;
    if !meta.is_file() {
        return Err(ConvertError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    // Probe read permission the same way the engine will need it.
    std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => ConvertError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ConvertError::SourceNotFound {
            path: path.to_path_buf(),
        },
    })?;

    std::fs::canonicalize(path).map_err(|_| ConvertError::SourceNotFound {
        path: path.to_path_buf(),
    })
}

/// Make `path` absolute against the current directory without touching
/// the filesystem (the destination usually does not exist yet).
pub fn absolute(path: &Path) -> Result<PathBuf, ConvertError> {
    std::path::absolute(path).map_err(|e| ConvertError::InvalidLocation {
        location: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// `file://` URL for an absolute path.
///
/// `.` and `..` components are resolved lexically and every component is
/// percent-encoded, so names with spaces or `#` survive the trip.
pub fn file_url(path: &Path) -> Result<String, ConvertError> {
    if !path.is_absolute() {
        return Err(ConvertError::InvalidLocation {
            location: path.display().to_string(),
            reason: "path must be absolute".to_string(),
        });
    }

    let mut parts: Vec<String> = Vec::new();
    let mut prefix = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => {
                prefix = p.as_os_str().to_string_lossy().replace('\\', "/");
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(name) => {
                parts.push(urlencoding::encode(&name.to_string_lossy()).into_owned());
            }
        }
    }

    let mut url = String::from("file://");
    if !prefix.is_empty() {
        url.push('/');
        url.push_str(&prefix);
    }
    url.push('/');
    url.push_str(&parts.join("/"));
    Ok(url)
}

/// Local path addressed by a `file://` URL, or `None` for any other scheme.
pub fn path_from_file_url(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file://")?;
    let decoded = urlencoding::decode(rest).ok()?;
    // file:///C:/x on Windows
    let trimmed = match decoded.as_bytes() {
        [b'/', drive, b':', ..] if drive.is_ascii_alphabetic() && cfg!(windows) => &decoded[1..],
        _ => &decoded[..],
    };
    Some(PathBuf::from(trimmed))
}

/// `true` for URLs the engine can resolve without a base: a scheme
/// followed by `:`, or the engine's `private:` namespace.
pub fn is_absolute_url(url: &str) -> bool {
    match url.split_once(':') {
        Some((scheme, rest)) => {
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
                && (scheme == "private" || rest.starts_with("//"))
        }
        None => false,
    }
}

/// Destination for `input` inside `out_dir`: same stem, `.pdf` extension.
pub fn destination_for(input: &Path, out_dir: &Path) -> PathBuf {
    let mut name = input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "document".into());
    name.push(".pdf");
    out_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn file_url_encodes_and_normalises() {
        let url = file_url(Path::new("/tmp/my decks/./old/../Q3 #1.odp")).unwrap();
        assert_eq!(url, "file:///tmp/my%20decks/Q3%20%231.odp");
        assert_eq!(
            path_from_file_url(&url).unwrap(),
            PathBuf::from("/tmp/my decks/Q3 #1.odp")
        );
    }

    #[test]
    fn file_url_rejects_relative_paths() {
        let err = file_url(Path::new("slides/deck.odp")).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidLocation { .. }));
    }

    #[test]
    fn absolute_url_detection() {
        assert!(is_absolute_url("file:///tmp/a.odp"));
        assert!(is_absolute_url("private:factory/swriter"));
        assert!(is_absolute_url("http://example.com/a.odp"));
        assert!(!is_absolute_url("deck.odp"));
        assert!(!is_absolute_url("/tmp/deck.odp"));
        assert!(!is_absolute_url("C:\\deck.odp"));
    }

    #[test]
    fn destination_keeps_stem() {
        assert_eq!(
            destination_for(Path::new("/in/Quarterly.Review.pptx"), Path::new("/out")),
            PathBuf::from("/out/Quarterly.Review.pdf")
        );
        assert_eq!(
            destination_for(Path::new("/in/notes"), Path::new("/out")),
            PathBuf::from("/out/notes.pdf")
        );
    }

    #[test]
    fn resolve_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_source(&dir.path().join("absent.odp")).unwrap_err();
        assert!(matches!(err, ConvertError::SourceNotFound { .. }));

        // a directory is not a document
        let err = resolve_source(dir.path()).unwrap_err();
        assert!(matches!(err, ConvertError::SourceNotFound { .. }));
    }

    #[test]
    fn resolve_source_canonicalises() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("deck.odp");
        std::fs::write(&file, b"PK").unwrap();
        let resolved = resolve_source(&dir.path().join(".").join("deck.odp")).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved.file_name().unwrap(), "deck.odp");
    }
}
