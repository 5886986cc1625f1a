//! Content fingerprints and hashed file names.
//!
//! The fingerprint is an MD5 digest of the full content, which is also the
//! digest the remote service reports as an object's ETag. Hashed names embed
//! the first [`SHORT_LEN`] hex characters of it.

use std::io::{Read, Seek, SeekFrom};

use md5::{Digest, Md5};

/// Number of hex characters embedded in hashed names
pub const SHORT_LEN: usize = 12;

/// Deterministic digest of an asset's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Full lowercase hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part embedded in hashed names
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }
}

impl std::fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn fingerprint(content: &[u8]) -> ContentFingerprint {
    ContentFingerprint(hex::encode(Md5::digest(content)))
}

/// Fingerprints everything `reader` holds, then puts the read position back
/// where it was.
pub fn fingerprint_reader<R: Read + Seek>(reader: &mut R) -> std::io::Result<ContentFingerprint> {
    let original = reader.stream_position()?;
    reader.seek(SeekFrom::Start(0))?;

    let mut hasher = Md5::new();
    let mut buffer = [0u8; 64 * 1024];
    let result = loop {
        match reader.read(&mut buffer) {
            Ok(0) => break Ok(()),
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };

    reader.seek(SeekFrom::Start(original))?;
    result?;
    Ok(ContentFingerprint(hex::encode(hasher.finalize())))
}

/// Hashed name of `name` for the given content.
pub fn hashed_name(name: &str, content: &[u8]) -> String {
    hashed_name_with(name, &fingerprint(content))
}

/// Inserts `.{short fingerprint}` between stem and extension of the file
/// component, keeping the directory part and any `?query` / `#fragment`
/// suffix untouched.
pub fn hashed_name_with(name: &str, fingerprint: &ContentFingerprint) -> String {
    let decoded = urlencoding::decode(name)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| name.to_string());

    let (path, suffix) = split_url_suffix(&decoded);
    let path = path.trim();
    let (directory, file) = match path.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, path),
    };
    let (stem, ext) = split_extension(file);

    let hashed_file = format!("{stem}.{}{ext}", fingerprint.short());
    match directory {
        Some(dir) => format!("{dir}/{hashed_file}{suffix}"),
        None => format!("{hashed_file}{suffix}"),
    }
}

/// Path part of a name, and the untouched `?…`/`#…` remainder.
pub(crate) fn split_url_suffix(name: &str) -> (&str, &str) {
    match name.find(['?', '#']) {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}

/// Splits `file` into stem and extension (with its dot); leading dots
/// belong to the stem.
fn split_extension(file: &str) -> (&str, &str) {
    let body_start = file.len() - file.trim_start_matches('.').len();
    match file[body_start..].rfind('.') {
        Some(idx) => file.split_at(body_start + idx),
        None => (file, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(fingerprint(b"body { }"), fingerprint(b"body { }"));
        assert_ne!(fingerprint(b"A"), fingerprint(b"B"));
        // md5("") is well known
        assert_eq!(fingerprint(b"").as_str(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(fingerprint(b"").short(), "d41d8cd98f00");
    }

    #[test]
    fn test_hashed_name_inserts_before_extension() {
        let digest = fingerprint(b"A");
        let short = digest.short().to_string();
        assert_eq!(hashed_name("style.css", b"A"), format!("style.{short}.css"));
        assert_eq!(hashed_name("css/site/style.css", b"A"), format!("css/site/style.{short}.css"));
        assert_eq!(hashed_name("LICENSE", b"A"), format!("LICENSE.{short}"));
        assert_eq!(hashed_name("lib.tar.gz", b"A"), format!("lib.tar.{short}.gz"));
        assert_eq!(hashed_name(".htaccess", b"A"), format!(".htaccess.{short}"));
    }

    #[test]
    fn test_hashed_name_keeps_url_suffix() {
        let short = fingerprint(b"font").short().to_string();
        assert_eq!(
            hashed_name("fonts/font.eot?#iefix", b"font"),
            format!("fonts/font.{short}.eot?#iefix")
        );
        assert_eq!(hashed_name("font.woff?v=2", b"font"), format!("font.{short}.woff?v=2"));
        assert_eq!(hashed_name("icons.svg#logo", b"font"), format!("icons.{short}.svg#logo"));
    }

    #[test]
    fn test_hashed_name_decodes_percent_escapes() {
        let short = fingerprint(b"x").short().to_string();
        assert_eq!(hashed_name("my%20file.js", b"x"), format!("my file.{short}.js"));
    }

    #[test]
    fn test_fingerprint_reader_restores_position() {
        let mut cursor = Cursor::new(b"0123456789".to_vec());
        cursor.set_position(4);
        let digest = fingerprint_reader(&mut cursor).unwrap();
        assert_eq!(digest, fingerprint(b"0123456789"));
        assert_eq!(cursor.position(), 4);
    }
}
