use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::error::{ConfigError, ValidationError};
use crate::ImageMime;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// A file the user dropped or selected, not yet checked.
///
/// `size_bytes` comes from the file handle. Contents are only loaded when
/// the file fits the size limit it was opened with.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub file_name: String,
    pub declared_mime: Option<String>,
    size_bytes: u64,
    data: Vec<u8>,
}

impl CandidateFile {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            declared_mime: None,
            size_bytes: data.len() as u64,
            data,
        }
    }

    pub fn with_declared_mime(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime = Some(mime.into());
        self
    }

    /// Reads at most `max_bytes + 1` bytes. A file whose metadata already
    /// exceeds `max_bytes` is not read at all.
    pub async fn from_path(path: &Path, max_bytes: u64) -> std::io::Result<Self> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        if len > max_bytes {
            debug!(file = %file_name, size_bytes = len, "skipping read of oversized file");
            return Ok(Self {
                file_name,
                declared_mime: None,
                size_bytes: len,
                data: Vec::new(),
            });
        }

        let mut data = Vec::with_capacity(len as usize);
        file.take(max_bytes.saturating_add(1)).read_to_end(&mut data).await?;
        Ok(Self::new(file_name, data))
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn extension(&self) -> Option<&str> {
        Path::new(&self.file_name).extension().and_then(|ext| ext.to_str())
    }
}

/// A validated upload. Only `UploadPolicy::validate` constructs one.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    file_name: String,
    mime: ImageMime,
    data: Arc<[u8]>,
}

impl UploadRequest {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    max_bytes: u64,
    extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

impl UploadPolicy {
    pub fn new(max_bytes: u64, extensions: Vec<String>) -> Result<Self, ConfigError> {
        if max_bytes == 0 {
            return Err(ConfigError::invalid("upload.max_bytes", "must be greater than zero"));
        }

        let mut normalized = Vec::with_capacity(extensions.len());
        for ext in extensions {
            let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if ImageMime::from_extension(&ext).is_none() {
                return Err(ConfigError::invalid(
                    "upload.extensions",
                    format!("{ext:?} is not a PNG or JPEG extension"),
                ));
            }
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        if normalized.is_empty() {
            return Err(ConfigError::invalid("upload.extensions", "must not be empty"));
        }

        Ok(Self {
            max_bytes,
            extensions: normalized,
        })
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn accepted_list(&self) -> String {
        self.extensions
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn accepts_mime(&self, mime: ImageMime) -> bool {
        self.extensions
            .iter()
            .any(|ext| ImageMime::from_extension(ext) == Some(mime))
    }

    fn resolve_mime(&self, file: &CandidateFile) -> Option<ImageMime> {
        match file.declared_mime.as_deref() {
            Some(declared) => ImageMime::from_declared(declared).filter(|mime| self.accepts_mime(*mime)),
            None => {
                let ext = file.extension()?.to_ascii_lowercase();
                if self.extensions.contains(&ext) {
                    ImageMime::from_extension(&ext)
                } else {
                    None
                }
            }
        }
    }

    /// Type is checked before size.
    pub fn validate(&self, file: CandidateFile) -> Result<UploadRequest, ValidationError> {
        let Some(mime) = self.resolve_mime(&file) else {
            warn!(file = %file.file_name, "rejected unsupported file type");
            return Err(ValidationError::UnsupportedType {
                file_name: file.file_name,
                accepted: self.accepted_list(),
            });
        };

        let size_bytes = file.size_bytes;
        if size_bytes > self.max_bytes {
            warn!(file = %file.file_name, size_bytes, max_bytes = self.max_bytes, "rejected oversized file");
            return Err(ValidationError::FileTooLarge {
                file_name: file.file_name,
                size_bytes,
                max_bytes: self.max_bytes,
            });
        }

        Ok(UploadRequest {
            file_name: file.file_name,
            mime,
            data: file.data.into(),
        })
    }
}
