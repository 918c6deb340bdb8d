//! MIME type detection utilities.
//!
//! Two tiers, in order of precedence:
//! 1. [`sniff`]: magic-byte signatures of the file contents
//! 2. [`guess_type`]: file extension, with compression suffixes such as
//!    `.gz` reported as an encoding
//!
//! [`classify`] combines both and falls back to `text/plain`.

use std::{fs::File, io, io::Read, path::Path};

/// Common MIME type constants.
pub mod types {
    // Text
    pub const HTML: &str = "text/html";
    pub const PLAIN: &str = "text/plain";
    pub const CSS: &str = "text/css";
    pub const JAVASCRIPT: &str = "text/javascript";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const MARKDOWN: &str = "text/markdown";
    pub const CSV: &str = "text/csv";
    pub const PYTHON: &str = "text/x-python";

    // Documents
    pub const PDF: &str = "application/pdf";

    // Binary / archives
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const WASM: &str = "application/wasm";
    pub const ZIP: &str = "application/zip";
    pub const GZIP: &str = "application/gzip";
    pub const BZIP2: &str = "application/x-bzip2";
    pub const XZ: &str = "application/x-xz";
    pub const SEVEN_ZIP: &str = "application/x-7z-compressed";
    pub const TAR: &str = "application/x-tar";
    pub const NOTEBOOK: &str = "application/x-ipynb+json";

    // Images
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";
    pub const BMP: &str = "image/bmp";
    pub const TIFF: &str = "image/tiff";

    // Audio
    pub const MP3: &str = "audio/mpeg";
    pub const WAV: &str = "audio/wav";
    pub const OGG: &str = "audio/ogg";
    pub const FLAC: &str = "audio/flac";

    // Video
    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";
    pub const AVI: &str = "video/x-msvideo";

    // Fonts
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";
    pub const OTF: &str = "font/otf";
}

/// Bytes read from a file before sniffing (covers the tar header at 257).
const SNIFF_LEN: usize = 512;

// ============================================================================
// Magic-byte sniffing
// ============================================================================

/// Signatures matched at offset 0.
const PREFIX_SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", types::PNG),
    (b"\xff\xd8\xff", types::JPEG),
    (b"GIF87a", types::GIF),
    (b"GIF89a", types::GIF),
    (b"%PDF-", types::PDF),
    (b"PK\x03\x04", types::ZIP),
    (b"PK\x05\x06", types::ZIP),
    (b"PK\x07\x08", types::ZIP),
    (b"\x1f\x8b", types::GZIP),
    (b"BZh", types::BZIP2),
    (b"\xfd7zXZ\x00", types::XZ),
    (b"7z\xbc\xaf\x27\x1c", types::SEVEN_ZIP),
    (b"\x00asm", types::WASM),
    (b"\x00\x00\x01\x00", types::ICO),
    (b"II*\x00", types::TIFF),
    (b"MM\x00*", types::TIFF),
    (b"ID3", types::MP3),
    (b"OggS", types::OGG),
    (b"fLaC", types::FLAC),
    (b"\x1a\x45\xdf\xa3", types::WEBM),
    (b"wOFF", types::WOFF),
    (b"wOF2", types::WOFF2),
    (b"\x00\x01\x00\x00\x00", types::TTF),
    (b"OTTO", types::OTF),
];

/// Detect a MIME type from the leading bytes of a file.
pub fn sniff(buf: &[u8]) -> Option<&'static str> {
    if let Some((_, mime)) = PREFIX_SIGNATURES
        .iter()
        .find(|(magic, _)| buf.starts_with(magic))
    {
        return Some(*mime);
    }

    // RIFF containers carry their format at offset 8
    if buf.len() >= 12 && buf.starts_with(b"RIFF") {
        return match &buf[8..12] {
            b"WEBP" => Some(types::WEBP),
            b"WAVE" => Some(types::WAV),
            b"AVI " => Some(types::AVI),
            _ => None,
        };
    }

    if buf.len() >= 12 && &buf[4..8] == b"ftyp" {
        return Some(types::MP4);
    }

    if buf.len() >= 262 && &buf[257..262] == b"ustar" {
        return Some(types::TAR);
    }

    None
}

/// Sniff the first bytes of the file at `path`.
pub fn sniff_file(path: &Path) -> io::Result<Option<&'static str>> {
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut buf)?;
    Ok(sniff(&buf))
}

// ============================================================================
// Extension guessing
// ============================================================================

/// Compound suffixes rewritten before guessing.
const SUFFIX_ALIASES: &[(&str, &str)] = &[
    ("tgz", "tar.gz"),
    ("taz", "tar.gz"),
    ("tz", "tar.gz"),
    ("tbz2", "tar.bz2"),
    ("txz", "tar.xz"),
    ("svgz", "svg.gz"),
];

/// Suffixes that name a content encoding rather than a type.
fn encoding_for(ext: &str) -> Option<&'static str> {
    match ext {
        "Z" => Some("compress"),
        _ => match ext.to_ascii_lowercase().as_str() {
            "gz" => Some("gzip"),
            "bz2" => Some("bzip2"),
            "xz" => Some("xz"),
            "br" => Some("br"),
            _ => None,
        },
    }
}

/// Guess MIME type from a lowercase file extension.
pub fn from_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        // Web / Text
        "html" | "htm" => types::HTML,
        "css" => types::CSS,
        "js" | "mjs" | "cjs" => types::JAVASCRIPT,
        "json" | "map" => types::JSON,
        "xml" => types::XML,
        "csv" => types::CSV,
        "txt" | "text" | "log" => types::PLAIN,
        "md" => types::MARKDOWN,
        "py" => types::PYTHON,
        "ipynb" => types::NOTEBOOK,

        // Images
        "svg" => types::SVG,
        "png" => types::PNG,
        "jpg" | "jpeg" => types::JPEG,
        "gif" => types::GIF,
        "webp" => types::WEBP,
        "ico" => types::ICO,
        "bmp" => types::BMP,
        "tif" | "tiff" => types::TIFF,

        // Audio / Video
        "mp3" => types::MP3,
        "wav" => types::WAV,
        "ogg" | "oga" => types::OGG,
        "flac" => types::FLAC,
        "mp4" | "m4v" => types::MP4,
        "webm" => types::WEBM,
        "avi" => types::AVI,

        // Fonts
        "woff" => types::WOFF,
        "woff2" => types::WOFF2,
        "ttf" => types::TTF,
        "otf" => types::OTF,

        // Documents / Binary
        "pdf" => types::PDF,
        "wasm" => types::WASM,
        "zip" => types::ZIP,
        "tar" => types::TAR,
        "7z" => types::SEVEN_ZIP,
        "bin" | "exe" | "so" => types::OCTET_STREAM,

        _ => return None,
    })
}

/// Guess `(type, encoding)` from the file name alone.
///
/// `archive.tar.gz` yields `(Some("application/x-tar"), Some("gzip"))`.
pub fn guess_type(path: &Path) -> (Option<&'static str>, Option<&'static str>) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return (None, None);
    };

    let mut name = name.to_string();
    if let Some((stem, ext)) = name.rsplit_once('.')
        && let Some((_, full)) = SUFFIX_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(ext))
    {
        name = format!("{stem}.{full}");
    }

    let mut encoding = None;
    if let Some((stem, ext)) = name.rsplit_once('.')
        && !stem.is_empty()
        && let Some(enc) = encoding_for(ext)
    {
        let keep = stem.len();
        encoding = Some(enc);
        name.truncate(keep);
    }

    let mime = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => from_extension(&ext.to_ascii_lowercase()),
        _ => None,
    };
    (mime, encoding)
}

// ============================================================================
// classify
// ============================================================================

/// Determine `(mime_type, encoding)` for the file at `path`.
///
/// A sniffed signature wins outright. Otherwise the extension decides:
/// a gzip encoding reports `application/gzip`, any other encoding reports
/// `application/octet-stream`. Unknown files are `text/plain`.
pub fn classify(path: &Path) -> io::Result<(&'static str, Option<&'static str>)> {
    if let Some(mime) = sniff_file(path)? {
        return Ok((mime, None));
    }

    let mime = match guess_type(path) {
        (_, Some("gzip")) => types::GZIP,
        (_, Some(_)) => types::OCTET_STREAM,
        (Some(mime), None) => mime,
        (None, None) => types::PLAIN,
    };
    Ok((mime, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    #[test]
    fn test_sniff_signatures() {
        assert_eq!(sniff(PNG_HEADER), Some(types::PNG));
        assert_eq!(sniff(b"PK\x03\x04rest"), Some(types::ZIP));
        assert_eq!(sniff(b"BZh91AY&SY"), Some(types::BZIP2));
        assert_eq!(sniff(b"\x1f\x8b\x08\x00"), Some(types::GZIP));
        assert_eq!(sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(types::WEBP));
        assert_eq!(sniff(b"\x00\x00\x00\x18ftypmp42"), Some(types::MP4));
        assert_eq!(sniff(b"hello world"), None);
        assert_eq!(sniff(b""), None);
    }

    #[test]
    fn test_sniff_tar() {
        let mut header = vec![0u8; 512];
        header[..9].copy_from_slice(b"file.txt\0");
        header[257..262].copy_from_slice(b"ustar");
        assert_eq!(sniff(&header), Some(types::TAR));
    }

    #[test]
    fn test_guess_type() {
        assert_eq!(guess_type(Path::new("index.html")), (Some(types::HTML), None));
        assert_eq!(guess_type(Path::new("INDEX.HTM")), (Some(types::HTML), None));
        assert_eq!(
            guess_type(Path::new("data.tar.gz")),
            (Some(types::TAR), Some("gzip"))
        );
        assert_eq!(
            guess_type(Path::new("data.tgz")),
            (Some(types::TAR), Some("gzip"))
        );
        assert_eq!(
            guess_type(Path::new("notes.txt.bz2")),
            (Some(types::PLAIN), Some("bzip2"))
        );
        assert_eq!(guess_type(Path::new("Makefile")), (None, None));
        assert_eq!(guess_type(Path::new(".gz")), (None, None));
    }

    #[test]
    fn test_png_sniffed_regardless_of_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("picture.txt");
        fs::write(&path, PNG_HEADER).unwrap();

        assert_eq!(classify(&path).unwrap(), (types::PNG, None));
    }

    #[test]
    fn test_txt_falls_back_to_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readme.txt");
        fs::write(&path, "just words").unwrap();

        assert_eq!(classify(&path).unwrap(), (types::PLAIN, None));
    }

    #[test]
    fn test_encoding_rules() {
        let dir = TempDir::new().unwrap();

        let gz = dir.path().join("notes.txt.gz");
        fs::write(&gz, "not really gzip").unwrap();
        assert_eq!(classify(&gz).unwrap(), (types::GZIP, None));

        let bz = dir.path().join("notes.txt.bz2");
        fs::write(&bz, "not really bzip2").unwrap();
        assert_eq!(classify(&bz).unwrap(), (types::OCTET_STREAM, None));
    }

    #[test]
    fn test_unknown_is_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("LICENSE");
        fs::write(&path, "MIT").unwrap();

        assert_eq!(classify(&path).unwrap(), (types::PLAIN, None));
    }

    #[test]
    fn test_classify_missing_file() {
        assert!(classify(Path::new("/definitely/not/here.txt")).is_err());
    }
}
