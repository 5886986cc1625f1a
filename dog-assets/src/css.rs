//! Stylesheet `url()` references rewritten to the hashed names of the files
//! they point at.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::fingerprint::split_url_suffix;
use crate::types::file_extension;
use crate::{AssetError, AssetResult};

static URL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn url_pattern() -> AssetResult<&'static Regex> {
    if let Some(pattern) = URL_PATTERN.get() {
        return Ok(pattern);
    }
    let pattern = Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^'"()\s]*))\s*\)"#)
        .map_err(|e| AssetError::configuration(format!("invalid url pattern: {e}")))?;
    Ok(URL_PATTERN.get_or_init(|| pattern))
}

pub fn is_stylesheet(name: &str) -> bool {
    file_extension(name).as_deref() == Some("css")
}

/// Rewrites every `url()` in `content` whose target `hashed_for` knows.
///
/// Relative references resolve against the directory of `stylesheet`;
/// absolute ones must start with `static_url`. External, data and fragment
/// references are kept as written, as is any `?query` / `#fragment` suffix.
pub fn rewrite_urls<F>(stylesheet: &str, content: &str, static_url: &str, hashed_for: F) -> AssetResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern = url_pattern()?;
    let base = stylesheet.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");

    let rewritten = pattern.replace_all(content, |caps: &Captures<'_>| {
        let (reference, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
            (Some(m), _, _) => (m.as_str(), "\""),
            (_, Some(m), _) => (m.as_str(), "'"),
            (_, _, Some(m)) => (m.as_str(), ""),
            _ => return caps[0].to_string(),
        };
        match hashed_reference(base, reference, static_url, &hashed_for) {
            Some(replacement) => format!("url({quote}{replacement}{quote})"),
            None => caps[0].to_string(),
        }
    });
    Ok(rewritten.into_owned())
}

fn hashed_reference<F>(base: &str, reference: &str, static_url: &str, hashed_for: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if is_external(reference) {
        return None;
    }
    let (path, suffix) = split_url_suffix(reference);
    let target = resolve(base, path, static_url)?;
    let hashed = hashed_for(&target)?;

    let hashed_file = hashed.rsplit_once('/').map(|(_, file)| file).unwrap_or(&hashed);
    let replaced = match path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{hashed_file}"),
        None => hashed_file.to_string(),
    };
    Some(format!("{replaced}{suffix}"))
}

fn is_external(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    reference.is_empty()
        || reference.starts_with('#')
        || reference.starts_with("//")
        || lower.starts_with("data:")
        || lower.starts_with("about:")
        || reference.contains("://")
}

/// Static name `path` points at, `None` when it leaves the static tree
fn resolve(base: &str, path: &str, static_url: &str) -> Option<String> {
    let relative = match path.strip_prefix('/') {
        Some(absolute) => match static_url.trim_matches('/') {
            "" => absolute.to_string(),
            root => absolute.strip_prefix(root)?.strip_prefix('/')?.to_string(),
        },
        None if base.is_empty() => path.to_string(),
        None => format!("{base}/{path}"),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            segment => segments.push(segment),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}
