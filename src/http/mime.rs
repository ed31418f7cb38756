//! MIME type detection module
//!
//! Content-Type comes from the file extension (case-insensitive); files
//! with an unknown extension are sniffed as text or binary.

use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";
const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// How many leading bytes the sniffer looks at
pub const SNIFF_LEN: usize = 512;

/// Content-Type for a file, given its path and leading bytes
pub fn content_type_for(path: &Path, head: &[u8]) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    lookup_extension(extension.as_deref()).unwrap_or_else(|| sniff(head))
}

/// Known extensions only
pub fn lookup_extension(extension: Option<&str>) -> Option<&'static str> {
    let content_type = match extension? {
        // Text
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "txt" | "md" | "log" => PLAIN_TEXT,
        "csv" => "text/csv; charset=utf-8",
        "xml" => "text/xml; charset=utf-8",
        "yaml" | "yml" => "application/yaml",
        "toml" => "application/toml",

        // JavaScript/WASM
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "wasm" => "application/wasm",

        // Images
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "avif" => "image/avif",

        // Video
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "ogv" => "video/ogg",
        "mov" => "video/quicktime",

        // Audio
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",

        // Fonts
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",

        // Archives and documents
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "bz2" => "application/x-bzip2",
        "xz" => "application/x-xz",
        "7z" => "application/x-7z-compressed",

        _ => return None,
    };
    Some(content_type)
}

/// Text if the leading bytes are UTF-8 without control characters other
/// than whitespace, binary otherwise. Empty content counts as text.
fn sniff(head: &[u8]) -> &'static str {
    let head = &head[..head.len().min(SNIFF_LEN)];
    // A multi-byte character may be cut at the sniff boundary
    let text = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(e) if e.error_len().is_none() => {
            std::str::from_utf8(&head[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return OCTET_STREAM,
    };

    if text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\x0c'))
    {
        OCTET_STREAM
    } else {
        PLAIN_TEXT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_types() {
        let ct = |name: &str| content_type_for(Path::new(name), b"");
        assert_eq!(ct("index.html"), "text/html; charset=utf-8");
        assert_eq!(ct("site.css"), "text/css; charset=utf-8");
        assert_eq!(ct("app.js"), "text/javascript; charset=utf-8");
        assert_eq!(ct("data.json"), "application/json");
        assert_eq!(ct("logo.png"), "image/png");
        assert_eq!(ct("clip.mp4"), "video/mp4");
        assert_eq!(ct("backup.tar"), "application/x-tar");
    }

    #[test]
    fn test_extension_case_insensitive() {
        assert_eq!(content_type_for(Path::new("PHOTO.JPG"), b""), "image/jpeg");
        assert_eq!(content_type_for(Path::new("Report.PDF"), b""), "application/pdf");
    }

    #[test]
    fn test_sniff_unknown_extension() {
        assert_eq!(
            content_type_for(Path::new("README"), b"plain words\nsecond line\n"),
            PLAIN_TEXT
        );
        assert_eq!(
            content_type_for(Path::new("blob.xyz"), &[0x7f, b'E', b'L', b'F', 0, 1, 2]),
            OCTET_STREAM
        );
        assert_eq!(content_type_for(Path::new("empty"), b""), PLAIN_TEXT);
    }

    #[test]
    fn test_sniff_truncated_utf8() {
        // "é" is two bytes; cut after the first one
        let mut head = vec![b'a'; SNIFF_LEN - 1];
        head.extend_from_slice("é".as_bytes());
        assert_eq!(sniff(&head), PLAIN_TEXT);
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(lookup_extension(Some("xyz")), None);
        assert_eq!(lookup_extension(None), None);
    }
}
