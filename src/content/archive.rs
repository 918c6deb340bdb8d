//! Archive detection and extraction (zip, tar.bz2, tar.gz).

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::{
    fmt,
    fs::{self, File},
    io::{self, BufReader},
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::utils::mime;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot read archive `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid zip archive `{path}`")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarBz2,
    TarGz,
}

impl ArchiveKind {
    /// Detect from the file name (`.zip`, `.tar.bz2`, `.tar.gz`).
    pub fn from_suffix(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();

        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }

    /// Map a sniffed MIME type to an archive format.
    ///
    /// Compressed streams are assumed to wrap a tarball.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            mime::types::ZIP => Some(Self::Zip),
            mime::types::BZIP2 => Some(Self::TarBz2),
            mime::types::GZIP => Some(Self::TarGz),
            _ => None,
        }
    }

    /// Detect from the leading bytes of the file.
    pub fn sniff(path: &Path) -> io::Result<Option<Self>> {
        Ok(mime::sniff_file(path)?.and_then(Self::from_mime))
    }

    /// File suffix without the leading dot.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarBz2 => "tar.bz2",
            Self::TarGz => "tar.gz",
        }
    }

    /// Unpack `archive` into `dest`, creating `dest` if needed.
    ///
    /// Entries that would land outside `dest` are skipped by both
    /// the zip and tar unpackers.
    pub fn extract(self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
        let io_err = |source| ArchiveError::Io {
            path: archive.to_path_buf(),
            source,
        };

        fs::create_dir_all(dest).map_err(io_err)?;
        let reader = BufReader::new(File::open(archive).map_err(io_err)?);

        match self {
            Self::Zip => {
                let zip_err = |source| ArchiveError::Zip {
                    path: archive.to_path_buf(),
                    source,
                };
                let mut zip = zip::ZipArchive::new(reader).map_err(zip_err)?;
                zip.extract(dest).map_err(zip_err)
            }
            Self::TarBz2 => tar::Archive::new(BzDecoder::new(reader))
                .unpack(dest)
                .map_err(io_err),
            Self::TarGz => tar::Archive::new(GzDecoder::new(reader))
                .unpack(dest)
                .map_err(io_err),
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Test fixtures for building archives on disk.
#[cfg(test)]
pub mod fixtures {
    use std::{fs::File, io::Write, path::Path};
    use zip::write::SimpleFileOptions;

    /// Write a zip containing `(name, contents)` entries.
    pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    /// Write a gzip-compressed tarball containing `(name, contents)` entries.
    pub fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let encoder =
            flate2::write::GzEncoder::new(File::create(path).unwrap(), flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        append_all(&mut builder, entries);
        builder.into_inner().unwrap().finish().unwrap();
    }

    /// Write a bzip2-compressed tarball containing `(name, contents)` entries.
    pub fn write_tar_bz2(path: &Path, entries: &[(&str, &[u8])]) {
        let encoder =
            bzip2::write::BzEncoder::new(File::create(path).unwrap(), bzip2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        append_all(&mut builder, entries);
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn append_all<W: Write>(builder: &mut tar::Builder<W>, entries: &[(&str, &[u8])]) {
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_suffix() {
        assert_eq!(ArchiveKind::from_suffix(Path::new("/a/b.zip")), Some(ArchiveKind::Zip));
        assert_eq!(
            ArchiveKind::from_suffix(Path::new("content.TAR.GZ")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(
            ArchiveKind::from_suffix(Path::new("content.tar.bz2")),
            Some(ArchiveKind::TarBz2)
        );
        assert_eq!(ArchiveKind::from_suffix(Path::new("content")), None);
        assert_eq!(ArchiveKind::from_suffix(Path::new("content.gz")), None);
    }

    #[test]
    fn test_sniff_ignores_file_name() {
        let dir = TempDir::new().unwrap();

        let zip = dir.path().join("download");
        write_zip(&zip, &[("a.txt", b"a")]);
        assert_eq!(ArchiveKind::sniff(&zip).unwrap(), Some(ArchiveKind::Zip));

        let gz = dir.path().join("looks.zip");
        write_tar_gz(&gz, &[("a.txt", b"a")]);
        assert_eq!(ArchiveKind::sniff(&gz).unwrap(), Some(ArchiveKind::TarGz));

        let bz = dir.path().join("x");
        write_tar_bz2(&bz, &[("a.txt", b"a")]);
        assert_eq!(ArchiveKind::sniff(&bz).unwrap(), Some(ArchiveKind::TarBz2));

        let text = dir.path().join("notes.tar.gz");
        fs::write(&text, "plain text").unwrap();
        assert_eq!(ArchiveKind::sniff(&text).unwrap(), None);
    }

    #[test]
    fn test_extract_each_format() {
        let dir = TempDir::new().unwrap();
        let entries: &[(&str, &[u8])] = &[("tutorial/index.html", b"<h1>hi</h1>")];

        for kind in [ArchiveKind::Zip, ArchiveKind::TarGz, ArchiveKind::TarBz2] {
            let archive = dir.path().join(format!("content.{}", kind.extension()));
            match kind {
                ArchiveKind::Zip => write_zip(&archive, entries),
                ArchiveKind::TarGz => write_tar_gz(&archive, entries),
                ArchiveKind::TarBz2 => write_tar_bz2(&archive, entries),
            }

            let dest = dir.path().join(format!("out-{}", kind.extension()));
            kind.extract(&archive, &dest).unwrap();
            assert_eq!(
                fs::read_to_string(dest.join("tutorial/index.html")).unwrap(),
                "<h1>hi</h1>"
            );
        }
    }

    #[test]
    fn test_extract_corrupt_zip() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"PK\x03\x04 but not really").unwrap();

        let result = ArchiveKind::Zip.extract(&archive, &dir.path().join("out"));
        assert!(matches!(result, Err(ArchiveError::Zip { .. })));
    }
}
