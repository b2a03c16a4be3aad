//! Storage module for uploaded image files.
//!
//! Files live flat under the root directory as `<uuid>.<ext>`, where the
//! extension comes from sniffing the bytes. Stored names are opaque, so nothing
//! a client sends ever becomes part of a path except through [`Storage::resolve`].

use image::{ImageFormat, ImageReader};
use std::{
    error::Error,
    fmt::Display,
    fs::{self},
    path::PathBuf,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Storage {
    root_path: PathBuf,
}

/// What [`Storage::create_file`] learned about a file it stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// The generated name, relative to the storage root.
    pub file_name: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

impl Storage {
    /// Creates a new `Storage` instance with the specified root path.
    ///
    /// The directory is created lazily on the first write.
    pub fn new(root: PathBuf) -> Storage {
        Storage { root_path: root }
    }

    /// Validates and saves an uploaded image.
    ///
    /// The bytes are written unchanged once they are known to be a raster
    /// image the `image` crate can read the dimensions of.
    ///
    /// # Errors
    /// - `StorageError::UnsupportedFile` if the bytes are not a recognised image format.
    /// - `StorageError::Image` if the image header cannot be decoded.
    /// - `StorageError::Io` if directory creation or file writing fails.
    pub fn create_file(&self, bytes: &[u8]) -> Result<StoredFile, StorageError> {
        let kind = infer::get(bytes).ok_or(StorageError::UnsupportedFile { kind: None })?;
        if kind.matcher_type() != infer::MatcherType::Image
            || ImageFormat::from_extension(kind.extension()).is_none()
        {
            return Err(StorageError::UnsupportedFile { kind: Some(kind) });
        }

        let (width, height) = ImageReader::new(std::io::Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()?;

        fs::create_dir_all(&self.root_path)?;

        let file_name = format!("{}.{}", Uuid::new_v4(), kind.extension());
        fs::write(self.root_path.join(&file_name), bytes)?;

        Ok(StoredFile {
            file_name,
            mime_type: kind.mime_type().to_string(),
            width,
            height,
            size: bytes.len() as u64,
        })
    }

    /// Reads a stored file and sniffs its MIME type.
    pub fn read_file(&self, file_name: &str) -> Result<(Vec<u8>, String), StorageError> {
        let path = self.resolve(file_name)?;

        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::FileNotFound {
                file_name: file_name.to_string(),
            },
            _ => StorageError::Io(e),
        })?;
        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream")
            .to_string();

        Ok((bytes, mime_type))
    }

    /// Ensures that the named file does not exist.
    ///
    /// If the file does not exist, this function still succeeds.
    pub fn ensure_deleted(&self, file_name: &str) -> Result<(), StorageError> {
        let path = self.resolve(file_name)?;

        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Maps a client supplied name onto a path directly under the root.
    ///
    /// Anything that is not a single plain path component counts as not found.
    fn resolve(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        let invalid = file_name.is_empty()
            || file_name.contains(&['/', '\\'][..])
            || file_name.contains("..")
            || file_name.starts_with('.');

        if invalid {
            return Err(StorageError::FileNotFound {
                file_name: file_name.to_string(),
            });
        }

        Ok(self.root_path.join(file_name))
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// File format could not be determined or is not a supported image.
    UnsupportedFile {
        kind: Option<infer::Type>,
    },
    /// No stored file has this name, or the name is not a valid stored name.
    FileNotFound {
        file_name: String,
    },
    /// Filesystem IO error.
    Io(std::io::Error),
    /// Image decoding error.
    Image(image::ImageError),
}

/// Allows automatic conversion from std::io::Error.
impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value)
    }
}

/// Allows automatic conversion from image::ImageError.
impl From<image::ImageError> for StorageError {
    fn from(value: image::ImageError) -> Self {
        StorageError::Image(value)
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::UnsupportedFile { kind } => {
                if let Some(kind) = kind {
                    write!(f, "Unsupported file format: {}", kind.mime_type())
                } else {
                    write!(f, "Unsupported or unrecognized file format")
                }
            }
            StorageError::FileNotFound { file_name } => write!(f, "File not found: {}", file_name),
            StorageError::Io(inner) => write!(f, "Filesystem error: {}", inner),
            StorageError::Image(inner) => write!(f, "Image error: {}", inner),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Io(inner) => Some(inner),
            StorageError::Image(inner) => Some(inner),
            _ => None,
        }
    }
}
