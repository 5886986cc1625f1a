use crate::{AssetError, AssetResult};

/// Bytes inspected when sniffing content
pub const SNIFF_LEN: usize = 1024;

const ASF_GUID: [u8; 8] = [0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11];
const TS_PACKET: usize = 188;

/// Best-effort MIME type of `content` from its leading bytes.
///
/// Only recognises the container formats uploads are checked against.
pub fn sniff_mime(content: &[u8]) -> Option<&'static str> {
    let head = &content[..content.len().min(SNIFF_LEN)];

    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return Some(match &head[8..12] {
            b"M4A " | b"M4B " | b"M4P " | b"F4A " | b"F4B " => "audio/mp4",
            b"heic" | b"heix" | b"mif1" | b"msf1" => "image/heic",
            b"avif" | b"avis" => "image/avif",
            b"qt  " => "video/quicktime",
            brand if brand.starts_with(b"3g2") => "video/3gpp2",
            brand if brand.starts_with(b"3gp") => "video/3gpp",
            _ => "video/mp4",
        });
    }
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(if contains(head, b"webm") {
            "video/webm"
        } else {
            "video/x-matroska"
        });
    }
    if head.len() >= 12 && head.starts_with(b"RIFF") {
        return match &head[8..12] {
            b"AVI " => Some("video/x-msvideo"),
            b"WAVE" => Some("audio/x-wav"),
            b"WEBP" => Some("image/webp"),
            _ => None,
        };
    }
    if head.starts_with(b"FLV") {
        return Some("video/x-flv");
    }
    if head.starts_with(&[0x00, 0x00, 0x01, 0xBA]) || head.starts_with(&[0x00, 0x00, 0x01, 0xB3]) {
        return Some("video/mpeg");
    }
    if head.first() == Some(&0x47) && head.get(TS_PACKET) == Some(&0x47) {
        return Some("video/mp2t");
    }
    if head.starts_with(&ASF_GUID) {
        return Some("video/x-ms-asf");
    }
    if head.starts_with(b"OggS") {
        return Some(if contains(head, b"\x80theora") {
            "video/ogg"
        } else {
            "audio/ogg"
        });
    }
    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Fails with `message` unless `content` looks like a video
pub fn validate_video(content: &[u8], message: &str) -> AssetResult<()> {
    match sniff_mime(content) {
        Some(mime) if mime.starts_with("video/") => Ok(()),
        detected => {
            tracing::debug!(?detected, "rejected video upload");
            Err(AssetError::validation(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
        let mut content = vec![0x00, 0x00, 0x00, 0x18];
        content.extend_from_slice(b"ftyp");
        content.extend_from_slice(brand);
        content.extend_from_slice(&[0; 12]);
        content
    }

    #[test]
    fn test_sniff_mp4_family() {
        assert_eq!(sniff_mime(&ftyp(b"isom")), Some("video/mp4"));
        assert_eq!(sniff_mime(&ftyp(b"qt  ")), Some("video/quicktime"));
        assert_eq!(sniff_mime(&ftyp(b"3gp5")), Some("video/3gpp"));
        assert_eq!(sniff_mime(&ftyp(b"M4A ")), Some("audio/mp4"));
    }

    #[test]
    fn test_sniff_other_containers() {
        let mut webm = vec![0x1A, 0x45, 0xDF, 0xA3, 0x9F, 0x42, 0x82, 0x84];
        webm.extend_from_slice(b"webm");
        assert_eq!(sniff_mime(&webm), Some("video/webm"));

        let mut avi = b"RIFF".to_vec();
        avi.extend_from_slice(&[0; 4]);
        avi.extend_from_slice(b"AVI LIST");
        assert_eq!(sniff_mime(&avi), Some("video/x-msvideo"));

        let mut ts = vec![0u8; TS_PACKET * 2];
        ts[0] = 0x47;
        ts[TS_PACKET] = 0x47;
        assert_eq!(sniff_mime(&ts), Some("video/mp2t"));

        assert_eq!(sniff_mime(b"FLV\x01\x05"), Some("video/x-flv"));
        assert_eq!(sniff_mime(b"\x89PNG\r\n\x1a\n"), None);
    }

    #[test]
    fn test_validate_video() {
        assert!(validate_video(&ftyp(b"mp42"), "bad").is_ok());
        let err = validate_video(b"plain text", "Please upload a valid video file.").unwrap_err();
        assert!(matches!(err, AssetError::Validation { ref message } if message == "Please upload a valid video file."));
        assert!(validate_video(&ftyp(b"M4A "), "bad").is_err());
    }
}
