//! Car photo uploads.
//!
//! The car add and edit screens accept either a urlencoded form or `multipart/form-data`
//! carrying the photo in an `image` part. A photo has to decode as JPEG, PNG, GIF or
//! WebP. It is written to `cars/<upload year>/` under the media root, and the car keeps
//! the path relative to that root.

use std::io;
use std::path::{Path, PathBuf};

use axum::Form;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{Datelike, Utc};
use image::ImageFormat;
use uuid::Uuid;

use crate::entities::car::CarForm;
use crate::errors::ApiError;
use crate::validation::{Validatable, ValidationError};

pub const IMAGE_FIELD: &str = "image";
/// Directory under the media root holding car photos
pub const CAR_IMAGE_DIR: &str = "cars";
/// Request body limit for the car forms
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A photo that decoded cleanly and is waiting to be stored
#[derive(Debug, Clone)]
pub struct ImageUpload {
    format: ImageFormat,
    bytes: Bytes,
}

impl ImageUpload {
    /// Check one uploaded file part.
    ///
    /// An empty part is what a browser sends for a file input left blank; that is no
    /// upload rather than an error.
    ///
    /// # Errors
    ///
    /// Fails on the `image` field when the part is not a decodable image in one of the
    /// accepted formats, or declares a non-image content type.
    pub fn from_part(
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<Option<Self>, ValidationError> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let invalid = || ValidationError::new(IMAGE_FIELD, INVALID_IMAGE);

        if let Some(content_type) = content_type
            && !content_type.starts_with("image/")
            && content_type != "application/octet-stream"
        {
            return Err(invalid());
        }

        let format = image::guess_format(&bytes).map_err(|_| invalid())?;
        if !matches!(
            format,
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
        ) {
            return Err(invalid());
        }
        image::load_from_memory_with_format(&bytes, format).map_err(|_| invalid())?;

        Ok(Some(Self { format, bytes }))
    }

    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            _ => "webp",
        }
    }
}

/// Filesystem area for uploaded files, also served under `/media/`
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it is missing.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Absolute location of a stored media path
    #[must_use]
    pub fn path_of(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write `upload` under `cars/<current year>/` with a fresh name.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if the file cannot be written.
    pub async fn save_car_image(&self, upload: &ImageUpload) -> Result<String, ApiError> {
        let dir = format!("{CAR_IMAGE_DIR}/{}", Utc::now().year());
        let relative = format!("{dir}/{}.{}", Uuid::new_v4().simple(), upload.extension());

        tokio::fs::create_dir_all(self.root.join(&dir))
            .await
            .map_err(storage_error)?;
        tokio::fs::write(self.path_of(&relative), &upload.bytes)
            .await
            .map_err(storage_error)?;

        tracing::info!(path = %relative, bytes = upload.bytes.len(), "Stored car image");
        Ok(relative)
    }

    /// Delete a stored file; failures are logged and otherwise ignored
    pub async fn remove(&self, relative: &str) {
        if let Err(err) = tokio::fs::remove_file(self.path_of(relative)).await {
            tracing::warn!(path = %relative, error = %err, "Could not remove media file");
        }
    }
}

fn storage_error(err: io::Error) -> ApiError {
    ApiError::internal("Could not store the uploaded image", Some(err.to_string()))
}

/// Body of a car add or edit submission
pub struct CarSubmission {
    form: CarForm,
    image: Result<Option<ImageUpload>, ValidationError>,
}

impl CarSubmission {
    /// Validate the fields and the photo together, then store the photo.
    ///
    /// Nothing is written to disk while any field is invalid. On success the returned
    /// form carries the stored media path in `image`, or `None` without an upload.
    ///
    /// # Errors
    ///
    /// Every field error including the photo's, or a storage failure.
    pub async fn into_form(self, media: &MediaStore) -> Result<CarForm, ApiError> {
        let Self { mut form, image } = self;
        match image {
            Err(image_error) => {
                let mut errors = form.validate().err().unwrap_or_default();
                errors.add(image_error);
                Err(errors.into())
            }
            Ok(None) => Ok(form),
            Ok(Some(upload)) => {
                form.validate()?;
                form.image = Some(media.save_car_image(&upload).await?);
                Ok(form)
            }
        }
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"))
}

impl<S> FromRequest<S> for CarSubmission
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Form(form) = Form::<CarForm>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self {
                form,
                image: Ok(None),
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let mut fields = serde_json::Map::new();
        let mut image = Ok(None);

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(IntoResponse::into_response)?
        {
            let Some(name) = field.name().map(ToString::to_string) else {
                continue;
            };
            if name == IMAGE_FIELD {
                let content_type = field.content_type().map(ToString::to_string);
                let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
                image = ImageUpload::from_part(content_type.as_deref(), bytes);
            } else {
                let value = field.text().await.map_err(IntoResponse::into_response)?;
                fields.insert(name, serde_json::Value::String(value));
            }
        }

        let form = serde_json::from_value(serde_json::Value::Object(fields)).map_err(|err| {
            (StatusCode::BAD_REQUEST, format!("Invalid form submission: {err}")).into_response()
        })?;
        Ok(Self { form, image })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Bytes {
        let mut out = Cursor::new(Vec::new());
        image::RgbImage::new(2, 2)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_png_is_accepted() {
        let upload = ImageUpload::from_part(Some("image/png"), png_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(upload.extension(), "png");
    }

    #[test]
    fn test_empty_part_is_no_upload() {
        assert!(
            ImageUpload::from_part(Some("application/octet-stream"), Bytes::new())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_text_and_truncated_images_are_rejected() {
        let err = ImageUpload::from_part(Some("text/plain"), Bytes::from_static(b"hello"))
            .unwrap_err();
        assert_eq!(err.field, "image");
        assert_eq!(err.message, INVALID_IMAGE);

        // Right magic bytes, declared as an image, but not decodable
        let err =
            ImageUpload::from_part(Some("image/png"), png_bytes().slice(..12)).unwrap_err();
        assert_eq!(err.message, INVALID_IMAGE);

        // A real image sent with a non-image content type
        assert!(ImageUpload::from_part(Some("text/plain"), png_bytes()).is_err());
    }

    #[tokio::test]
    async fn test_save_car_image_writes_under_year_directory() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path());
        let upload = ImageUpload::from_part(None, png_bytes()).unwrap().unwrap();

        let relative = media.save_car_image(&upload).await.unwrap();

        let prefix = format!("cars/{}/", Utc::now().year());
        assert!(relative.starts_with(&prefix), "{relative}");
        assert!(relative.ends_with(".png"));
        assert!(relative.len() <= 100);
        assert_eq!(
            tokio::fs::read(media.path_of(&relative)).await.unwrap(),
            png_bytes().to_vec()
        );

        media.remove(&relative).await;
        assert!(!media.path_of(&relative).exists());
    }
}
