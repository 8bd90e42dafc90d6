//! Multipart upload handling: text fields plus at most one stored image.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::stream;
use spin_sdk::http::Request;
use tracing::{debug, warn};

use crate::core::errors::ApiError;
use crate::core::form::{header_str, FormData};
use crate::core::helpers::new_id;

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct Uploaded {
    pub file: Option<StoredFile>,
    pub body: FormData,
}

impl Uploaded {
    /// Remove the stored file, if any. Used when the surrounding form fails
    /// validation after the file already hit the disk.
    pub fn discard(&self) {
        if let Some(file) = &self.file {
            if let Err(e) = std::fs::remove_file(&file.path) {
                warn!(path = %file.path.display(), "failed to remove upload: {}", e);
            }
        }
    }
}

pub struct Upload<'a> {
    /// Multipart field carrying the file.
    pub field: &'a str,
    pub destination: &'a Path,
    /// Base name for the stored file; the original extension is appended.
    pub new_name: String,
    pub max_bytes: usize,
}

impl<'a> Upload<'a> {
    pub fn new(field: &'a str, destination: &'a Path, max_bytes: usize) -> Self {
        Self {
            field,
            destination,
            new_name: new_id().replace('-', ""),
            max_bytes,
        }
    }

    /// Consume the request body. Requests that are not multipart are read as
    /// plain forms with no file attached.
    pub fn save(&self, req: &Request) -> Result<Uploaded, ApiError> {
        let content_type = header_str(req, "content-type").unwrap_or_default();
        if !content_type.starts_with("multipart/form-data") {
            return Ok(Uploaded {
                file: None,
                body: FormData::from_request(req)?,
            });
        }

        let boundary = multer::parse_boundary(content_type)
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?;
        let body = Bytes::copy_from_slice(req.body());

        futures::executor::block_on(self.read_parts(body, boundary))
    }

    async fn read_parts(&self, body: Bytes, boundary: String) -> Result<Uploaded, ApiError> {
        let mut uploaded = Uploaded {
            file: None,
            body: FormData::default(),
        };
        // A file already on disk must not outlive a body that fails later on.
        match self.collect_parts(body, boundary, &mut uploaded).await {
            Ok(()) => Ok(uploaded),
            Err(err) => {
                uploaded.discard();
                Err(err)
            }
        }
    }

    async fn collect_parts(
        &self,
        body: Bytes,
        boundary: String,
        uploaded: &mut Uploaded,
    ) -> Result<(), ApiError> {
        let chunks = stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
        let mut multipart = multer::Multipart::new(chunks, boundary);

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let original = field.file_name().map(str::to_string);

            match original {
                Some(original) if name == self.field => {
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Invalid upload: {}", e)))?;
                    // Browsers send an empty part when no file was picked.
                    if original.is_empty() && data.is_empty() {
                        continue;
                    }
                    if uploaded.file.is_some() {
                        return Err(ApiError::BadRequest(format!(
                            "Only one {} file is accepted",
                            self.field
                        )));
                    }
                    uploaded.file = Some(self.store_file(&original, &data)?);
                }
                Some(_) => {
                    debug!(field = %name, "ignoring unexpected file field");
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Invalid field: {}", e)))?;
                    uploaded.body.insert(&name, text);
                }
            }
        }
        Ok(())
    }

    fn store_file(&self, original: &str, data: &[u8]) -> Result<StoredFile, ApiError> {
        if data.len() > self.max_bytes {
            return Err(ApiError::BadRequest(format!(
                "File exceeds {} bytes",
                self.max_bytes
            )));
        }
        let mime = mime_guess::from_path(original).first_or_octet_stream();
        if mime.type_() != mime_guess::mime::IMAGE {
            return Err(ApiError::BadRequest("Only image uploads are accepted".to_string()));
        }

        let filename = match Path::new(original).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", self.new_name, ext.to_lowercase()),
            None => self.new_name.clone(),
        };
        let path = self.destination.join(&filename);

        std::fs::create_dir_all(self.destination)
            .and_then(|_| std::fs::write(&path, data))
            .map_err(|e| ApiError::InternalError(format!("writing {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), bytes = data.len(), "stored upload");

        Ok(StoredFile { filename, path })
    }
}
