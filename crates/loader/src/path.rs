//! Script source resolution.
//!
//! Turns a page-relative script reference (`/assets/vendor/opencv.js`,
//! `lib/pdf.js?v=3`) into a path relative to a web root, rejecting anything
//! that would escape that root or that points at another origin.

use crate::error::{ErrorKind, Result};
use std::path::PathBuf;

/// Returns `true` for references that can only be fetched over the network:
/// anything with a URL scheme, or a scheme-relative `//host/...` reference.
pub(crate) fn is_remote(source: &str) -> bool {
    if source.starts_with("//") {
        return true;
    }
    // A scheme is everything before the first `:`, as long as no `/` came
    // first (`./a:b.js` is a relative path, `data:...` is not).
    match (source.find(':'), source.find('/')) {
        (Some(colon), Some(slash)) => colon < slash,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Resolves a local script reference to a normalized path relative to the
/// web root.
///
/// The reference is treated as a URL path: `/`-separated, with query strings
/// and fragments dropped and a leading `/` meaning "relative to the web
/// root". `.` and empty segments collapse, `..` steps back but never past the
/// root.
pub(crate) fn resolve(source: &str) -> Result<PathBuf> {
    if is_remote(source) {
        exn::bail!(ErrorKind::UnsupportedSource(source.to_string()));
    }
    let path = source.split(['?', '#']).next().unwrap_or_default();
    let segments = path.split('/').try_fold(Vec::new(), |mut segments, segment| {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop()?;
            },
            _ => segments.push(segment),
        }
        Some(segments)
    });
    match segments {
        Some(segments) if !segments.is_empty() && !path.contains('\0') => Ok(segments.into_iter().collect()),
        _ => exn::bail!(ErrorKind::InvalidPath(source.to_string())),
    }
}
