//! Image thumbnails and archive inspection.

use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use protocol::{ArchiveEntry, ArchiveListing};
use thiserror::Error;
use tracing::debug;

use super::format::format_size;

/// Extensions accepted by [`PreviewService::thumbnail`].
pub const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "ico"];

/// MIME type used when content cannot be identified.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Errors that can occur while building previews.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// The file does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The path is not a regular file.
    #[error("not a file: {0}")]
    NotAFile(PathBuf),

    /// The file type has no preview support.
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    /// The archive could not be read.
    #[error("not a valid {format} archive: {reason}")]
    InvalidArchive {
        /// Expected archive format.
        format: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// No member of that name exists in the archive.
    #[error("entry not found in archive: {0}")]
    EntryNotFound(String),

    /// The member is a directory or link.
    #[error("cannot extract {0}: not a regular file")]
    NotExtractable(String),

    /// The file or member exceeds the extraction limit.
    #[error("{name} is {size} bytes, limit is {limit}")]
    TooLarge {
        /// File or member name.
        name: String,
        /// Member size.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Image decoding or encoding failed.
    #[error("failed to generate thumbnail: {0}")]
    Image(#[from] image::ImageError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Archive formats recognised by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// PKZIP.
    Zip,
    /// Uncompressed tar.
    Tar,
    /// Gzip-compressed tar.
    TarGz,
    /// Bzip2-compressed tar.
    TarBz2,
    /// 7-Zip, recognised but not readable.
    SevenZip,
    /// RAR, recognised but not readable.
    Rar,
}

impl ArchiveFormat {
    /// Detect the format from a file name, case-insensitively.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        let extension = name.rsplit_once('.').map(|(_, ext)| ext)?;

        match extension {
            "zip" => Some(Self::Zip),
            "tar" => Some(Self::Tar),
            "tgz" | "gz" => Some(Self::TarGz),
            "tbz2" | "bz2" => Some(Self::TarBz2),
            "7z" => Some(Self::SevenZip),
            "rar" => Some(Self::Rar),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar | Self::TarGz | Self::TarBz2 => "tar",
            Self::SevenZip => "7z",
            Self::Rar => "rar",
        }
    }
}

/// An encoded thumbnail.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// MIME type of `data`.
    pub mime: String,
}

/// Bytes of a single archive member.
#[derive(Debug, Clone)]
pub struct ArchiveBlob {
    /// Member name.
    pub name: String,
    /// Member contents.
    pub data: Vec<u8>,
    /// Detected MIME type.
    pub mime: String,
}

/// Contents of a regular file.
#[derive(Debug, Clone)]
pub struct FileBlob {
    /// File contents.
    pub data: Vec<u8>,
    /// Detected MIME type.
    pub mime: String,
}

/// Builds previews of image and archive files.
///
/// Paths are expected to have passed the path guard already.
#[derive(Debug, Clone)]
pub struct PreviewService {
    thumbnail_size: u32,
    max_extract_size: u64,
}

impl PreviewService {
    /// Create a preview service.
    pub fn new(thumbnail_size: u32, max_extract_size: u64) -> Self {
        Self {
            thumbnail_size,
            max_extract_size,
        }
    }

    /// Scale an image down to fit a `thumbnail_size` square.
    ///
    /// Images already within bounds keep their size. The result is encoded
    /// in the source format when possible, PNG otherwise.
    pub fn thumbnail(&self, path: &Path) -> Result<Thumbnail, PreviewError> {
        require_file(path)?;

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(PreviewError::UnsupportedType(format!(
                "not a supported image type: .{extension}"
            )));
        }

        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format();
        let image = reader.decode()?;

        let bound = self.thumbnail_size;
        let image = if image.width() > bound || image.height() > bound {
            image.thumbnail(bound, bound)
        } else {
            image
        };

        if let Some(format) = format.filter(ImageFormat::writing_enabled) {
            match encode(&image, format) {
                Ok(data) => {
                    return Ok(Thumbnail {
                        data,
                        mime: format.to_mime_type().to_string(),
                    })
                }
                Err(e) => debug!(format = ?format, error = %e, "Re-encoding failed, using PNG"),
            }
        }

        Ok(Thumbnail {
            data: encode(&image, ImageFormat::Png)?,
            mime: ImageFormat::Png.to_mime_type().to_string(),
        })
    }

    /// Read a whole regular file, up to `max_extract_size` bytes.
    ///
    /// Anything that is not a regular file, directories included, reports
    /// [`PreviewError::NotFound`].
    pub fn read_file(&self, path: &Path) -> Result<FileBlob, PreviewError> {
        let metadata = match fs::metadata(path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(PreviewError::NotFound(path.to_path_buf())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PreviewError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut file = File::open(path)?;
        let data = self.read_limited(&name, metadata.len(), &mut file)?;
        debug!(path = %path.display(), size = data.len(), "Read file");

        let mime = detect_mime(&name, &data);
        Ok(FileBlob { data, mime })
    }

    /// List the members of an archive, directories first.
    pub fn list_archive(&self, path: &Path) -> Result<ArchiveListing, PreviewError> {
        require_file(path)?;
        let format = readable_format(path)?;

        let mut entries = match format {
            ArchiveFormat::Zip => list_zip(path)?,
            _ => list_tar(path, format)?,
        };

        entries.sort_by_cached_key(|e| (!e.is_dir, e.name.to_lowercase()));

        let total_dirs = entries.iter().filter(|e| e.is_dir).count();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(ArchiveListing {
            filename,
            total_files: entries.len() - total_dirs,
            total_dirs,
            entries,
        })
    }

    /// Extract a single regular member into memory.
    pub fn read_archive_entry(
        &self,
        path: &Path,
        entry: &str,
    ) -> Result<ArchiveBlob, PreviewError> {
        require_file(path)?;
        let format = readable_format(path)?;

        let data = match format {
            ArchiveFormat::Zip => self.read_zip_entry(path, entry)?,
            _ => self.read_tar_entry(path, format, entry)?,
        };

        let mime = detect_mime(entry, &data);
        Ok(ArchiveBlob {
            name: entry.to_string(),
            data,
            mime,
        })
    }

    fn read_zip_entry(&self, path: &Path, entry: &str) -> Result<Vec<u8>, PreviewError> {
        let mut archive = open_zip(path)?;
        let mut file = match archive.by_name(entry) {
            Ok(file) => file,
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(PreviewError::EntryNotFound(entry.to_string()))
            }
            Err(e) => return Err(invalid_archive(ArchiveFormat::Zip, e)),
        };

        if file.is_dir() {
            return Err(PreviewError::NotExtractable(entry.to_string()));
        }

        self.read_limited(entry, file.size(), &mut file)
    }

    fn read_tar_entry(
        &self,
        path: &Path,
        format: ArchiveFormat,
        entry: &str,
    ) -> Result<Vec<u8>, PreviewError> {
        let wanted = entry.trim_end_matches('/');
        let mut archive = tar::Archive::new(open_tar_stream(path, format)?);

        for member in archive.entries().map_err(|e| invalid_archive(format, e))? {
            let mut member = member.map_err(|e| invalid_archive(format, e))?;
            let name = member_name(&member).map_err(|e| invalid_archive(format, e))?;
            if name != wanted {
                continue;
            }

            if !member.header().entry_type().is_file() {
                return Err(PreviewError::NotExtractable(entry.to_string()));
            }

            let size = member.size();
            return self.read_limited(entry, size, &mut member);
        }

        Err(PreviewError::EntryNotFound(entry.to_string()))
    }

    /// Read at most `max_extract_size` bytes, failing if the reader has more.
    fn read_limited(
        &self,
        name: &str,
        declared: u64,
        reader: &mut impl Read,
    ) -> Result<Vec<u8>, PreviewError> {
        let too_large = |size| PreviewError::TooLarge {
            name: name.to_string(),
            size,
            limit: self.max_extract_size,
        };

        if declared > self.max_extract_size {
            return Err(too_large(declared));
        }

        let mut data = Vec::with_capacity(declared as usize);
        reader
            .take(self.max_extract_size.saturating_add(1))
            .read_to_end(&mut data)?;

        if data.len() as u64 > self.max_extract_size {
            return Err(too_large(data.len() as u64));
        }

        Ok(data)
    }
}

fn require_file(path: &Path) -> Result<(), PreviewError> {
    match fs::metadata(path) {
        Ok(m) if m.is_file() => Ok(()),
        Ok(_) => Err(PreviewError::NotAFile(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(PreviewError::NotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

fn readable_format(path: &Path) -> Result<ArchiveFormat, PreviewError> {
    match ArchiveFormat::detect(path) {
        Some(ArchiveFormat::SevenZip) => Err(PreviewError::UnsupportedType(
            "7z archives are not supported".to_string(),
        )),
        Some(ArchiveFormat::Rar) => Err(PreviewError::UnsupportedType(
            "RAR archives are not supported".to_string(),
        )),
        Some(format) => Ok(format),
        None => Err(PreviewError::UnsupportedType(
            "unsupported archive format".to_string(),
        )),
    }
}

fn invalid_archive(format: ArchiveFormat, err: impl std::fmt::Display) -> PreviewError {
    PreviewError::InvalidArchive {
        format: format.name(),
        reason: err.to_string(),
    }
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, image::ImageError> {
    let mut data = Vec::new();
    image.write_to(&mut Cursor::new(&mut data), format)?;
    Ok(data)
}

fn open_zip(path: &Path) -> Result<zip::ZipArchive<BufReader<File>>, PreviewError> {
    let file = BufReader::new(File::open(path)?);
    zip::ZipArchive::new(file).map_err(|e| invalid_archive(ArchiveFormat::Zip, e))
}

fn list_zip(path: &Path) -> Result<Vec<ArchiveEntry>, PreviewError> {
    let mut archive = open_zip(path)?;

    (0..archive.len())
        .map(|index| {
            let file = archive
                .by_index(index)
                .map_err(|e| invalid_archive(ArchiveFormat::Zip, e))?;
            Ok(archive_entry(
                file.name().to_string(),
                file.size(),
                file.compressed_size(),
                file.is_dir(),
            ))
        })
        .collect()
}

fn open_tar_stream(path: &Path, format: ArchiveFormat) -> Result<Box<dyn Read>, PreviewError> {
    let file = BufReader::new(File::open(path)?);
    Ok(match format {
        ArchiveFormat::TarGz => Box::new(GzDecoder::new(file)),
        ArchiveFormat::TarBz2 => Box::new(BzDecoder::new(file)),
        _ => Box::new(file),
    })
}

fn list_tar(path: &Path, format: ArchiveFormat) -> Result<Vec<ArchiveEntry>, PreviewError> {
    let mut archive = tar::Archive::new(open_tar_stream(path, format)?);
    let mut entries = Vec::new();

    for member in archive.entries().map_err(|e| invalid_archive(format, e))? {
        let member = member.map_err(|e| invalid_archive(format, e))?;
        let name = member_name(&member).map_err(|e| invalid_archive(format, e))?;
        let is_dir = member.header().entry_type().is_dir();
        let size = member.size();
        entries.push(archive_entry(name, size, size, is_dir));
    }

    Ok(entries)
}

fn member_name<R: Read>(member: &tar::Entry<'_, R>) -> io::Result<String> {
    let path = member.path()?;
    Ok(path.to_string_lossy().trim_end_matches('/').to_string())
}

fn archive_entry(name: String, size: u64, compressed: u64, is_dir: bool) -> ArchiveEntry {
    let fmt = |bytes| {
        if is_dir {
            "-".to_string()
        } else {
            format_size(bytes)
        }
    };

    ArchiveEntry {
        size_fmt: fmt(size),
        compressed_fmt: fmt(compressed),
        name,
        size,
        compressed,
        is_dir,
    }
}

/// Sniff content first, then fall back to the member's extension for text
/// formats that carry no magic bytes.
fn detect_mime(name: &str, data: &[u8]) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    let extension = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mime = match extension.as_str() {
        "txt" | "log" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        _ => FALLBACK_MIME,
    };
    mime.to_string()
}
