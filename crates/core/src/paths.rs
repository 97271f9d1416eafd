//! Path-safety helpers for artifact serving and error sanitization.
//!
//! Client-influenced file names are reduced to a single validated path
//! component, and resolved artifact paths are canonicalized and checked
//! against the job's output directory before anything is read from disk.

use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;

/// Maximum accepted file name length in bytes.
const MAX_FILE_NAME_LEN: usize = 255;

/// Maximum length of a client-facing error message.
const MAX_MESSAGE_LEN: usize = 500;

// ---------------------------------------------------------------------------
// File name validation
// ---------------------------------------------------------------------------

/// Validate a client-supplied artifact file name.
///
/// Rules:
/// - Must not be empty and must not exceed [`MAX_FILE_NAME_LEN`] bytes.
/// - Must be a single normal path component: no `/` or `\`, no `.` / `..`,
///   no NUL bytes, not absolute.
pub fn validate_file_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "File name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "File name must not exceed {MAX_FILE_NAME_LEN} bytes"
        )));
    }
    if name.contains('\0') || name.contains('/') || name.contains('\\') {
        return Err(CoreError::Validation(
            "File name must be a single path component".to_string(),
        ));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(CoreError::Validation(
            "File name must be a single path component".to_string(),
        )),
    }
}

/// Reduce an uploaded file name to a safe basename.
///
/// Browsers may send relative paths in multipart file names; only the final
/// component is kept. Falls back to `upload.bin` when nothing usable
/// remains.
pub fn upload_basename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "");
    if base.is_empty() || base == "." || base == ".." {
        "upload.bin".to_string()
    } else {
        base
    }
}

// ---------------------------------------------------------------------------
// Artifact resolution
// ---------------------------------------------------------------------------

/// Resolve `file_name` inside `output_dir`, defending against traversal.
///
/// The file name is validated, the joined path canonicalized, and the
/// result is required to stay inside the canonicalized output directory.
/// Returns `Ok(None)` when the file (or the directory itself) does not
/// exist — the caller maps that to a 404.
pub fn resolve_artifact(output_dir: &Path, file_name: &str) -> Result<Option<PathBuf>, CoreError> {
    validate_file_name(file_name)?;

    let dir = match output_dir.canonicalize() {
        Ok(dir) => dir,
        Err(_) => return Ok(None),
    };

    let resolved = match dir.join(file_name).canonicalize() {
        Ok(path) => path,
        Err(_) => return Ok(None),
    };

    // A symlink inside the output dir could still point elsewhere; the
    // canonical form must stay under the canonical directory.
    if !resolved.starts_with(&dir) {
        return Err(CoreError::Validation(
            "Resolved path escapes the job output directory".to_string(),
        ));
    }

    Ok(Some(resolved))
}

// ---------------------------------------------------------------------------
// Error message sanitization
// ---------------------------------------------------------------------------

/// Strip filesystem paths from a failure message before it becomes part of
/// the client-facing job projection.
///
/// Whitespace-separated tokens that look like absolute paths (Unix or
/// Windows) are replaced with `<path>`; the result is truncated to
/// [`MAX_MESSAGE_LEN`] characters.
pub fn sanitize_message(message: &str) -> String {
    let cleaned: Vec<&str> = message
        .split_whitespace()
        .map(|token| {
            let trimmed = token.trim_matches(|c: char| matches!(c, '"' | '\'' | '(' | ')' | ':' | ','));
            if looks_like_path(trimmed) {
                "<path>"
            } else {
                token
            }
        })
        .collect();

    let mut result = cleaned.join(" ");
    if result.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result.truncate(cut);
    }
    result
}

fn looks_like_path(token: &str) -> bool {
    token.starts_with('/')
        || token.starts_with("\\\\")
        || token.starts_with("~/")
        || (token.len() >= 3 && token.as_bytes()[1] == b':' && matches!(token.as_bytes()[2], b'\\' | b'/'))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
