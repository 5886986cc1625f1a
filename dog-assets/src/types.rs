use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::AssetError;

/// How the remote service classifies and transforms an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Raw,
    Video,
}

impl ResourceKind {
    /// Every kind the remote service knows about
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Image, ResourceKind::Raw, ResourceKind::Video];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Raw => "raw",
            ResourceKind::Video => "video",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(ResourceKind::Image),
            "raw" => Ok(ResourceKind::Raw),
            "video" => Ok(ResourceKind::Video),
            other => Err(AssetError::validation(format!("unknown resource kind: {other}"))),
        }
    }
}

/// Content a caller asks to store
#[derive(Debug, Clone)]
pub struct Asset {
    pub name: String,
    pub kind: ResourceKind,
    /// Overrides the storage's configured tag when set
    pub tag: Option<String>,
    pub content: Bytes,
}

impl Asset {
    pub fn new<S: Into<String>, B: Into<Bytes>>(name: S, kind: ResourceKind, content: B) -> Self {
        Self {
            name: name.into(),
            kind,
            tag: None,
            content: content.into(),
        }
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Converts Windows separators to forward slashes.
pub fn normalise_name(name: &str) -> String {
    name.replace('\\', "/")
}

/// Canonical forward-slash form of a relative name: separators unified,
/// empty and `.` segments dropped.
pub fn clean_name(name: &str) -> String {
    let unified = normalise_name(name);
    let leading = unified.starts_with('/');
    let trailing = unified.ends_with('/') && unified.len() > 1;
    let joined = unified
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");

    let mut cleaned = String::with_capacity(joined.len() + 2);
    if leading {
        cleaned.push('/');
    }
    cleaned.push_str(&joined);
    if trailing && !joined.is_empty() {
        cleaned.push('/');
    }
    cleaned
}

/// Lowercased text after the last `.`, or `None` when the name has no dot.
pub fn file_extension(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// Ensures a non-empty path ends with `/`.
pub fn directory_path(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Prepends `prefix` (leading slashes stripped, trailing slash ensured)
/// unless `name` already starts with it.
pub fn prepend_prefix(prefix: &str, name: &str) -> String {
    let prefix = directory_path(prefix.trim_start_matches('/'));
    if name.starts_with(&prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_round_trips_through_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("audio".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("css\\style.css"), "css/style.css");
        assert_eq!(clean_name("./css//./style.css"), "css/style.css");
        assert_eq!(clean_name("/static/a.js"), "/static/a.js");
        assert_eq!(clean_name("dir/"), "dir/");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("logo.PNG"), Some("png".to_string()));
        assert_eq!(file_extension("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(file_extension("LICENSE"), None);
    }

    #[test]
    fn test_prepend_prefix() {
        assert_eq!(prepend_prefix("/media/", "a.png"), "media/a.png");
        assert_eq!(prepend_prefix("media", "a.png"), "media/a.png");
        assert_eq!(prepend_prefix("media/", "media/a.png"), "media/a.png");
        assert_eq!(prepend_prefix("", "a.png"), "a.png");
    }
}
