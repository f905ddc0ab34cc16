//! Image ingestion: turn an uploaded file into a decoded bitmap, and the
//! bitmap into a canonical PNG for transport to the model service.

use crate::error::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat, ImageOutputFormat};
use std::fmt::Debug;
use std::io::Cursor;

/// Raw bytes of an upload together with the format it was declared as
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub format: DeclaredFormat,
}

impl Debug for UploadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "UploadedImage {{ bytes: <{} bytes>, format: {:?} }}",
            self.bytes.len(),
            self.format
        )
    }
}

/// The upload formats the front end accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredFormat {
    Png,
    Jpeg,
}

impl DeclaredFormat {
    /// Parse a declared extension (`png`, `jpg`, `jpeg`), case-insensitive,
    /// with or without a leading dot
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(DeclaredFormat::Png),
            "jpg" | "jpeg" => Ok(DeclaredFormat::Jpeg),
            other => Err(Error::Upload(format!(
                "unsupported file type {other:?}: expected png, jpg or jpeg"
            ))),
        }
    }

    /// Take the declared format from a file name's extension
    pub fn from_filename(name: &str) -> Result<Self> {
        match name.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Err(Error::Upload(format!("file {name:?} has no extension"))),
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            DeclaredFormat::Png => ImageFormat::Png,
            DeclaredFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, format: DeclaredFormat) -> Self {
        UploadedImage { bytes, format }
    }

    /// Build an upload from a file name and its contents
    pub fn from_file(name: &str, bytes: Vec<u8>) -> Result<Self> {
        Ok(UploadedImage::new(bytes, DeclaredFormat::from_filename(name)?))
    }

    /// Decode the upload. Fails with `Error::Upload` for empty or oversized
    /// input and with `Error::Decode` if the bytes are not a valid image of
    /// the declared format.
    pub fn decode(&self, max_bytes: usize) -> Result<IngestedImage> {
        if self.bytes.is_empty() {
            return Err(Error::Upload("the uploaded file is empty".into()));
        }
        if self.bytes.len() > max_bytes {
            return Err(Error::Upload(format!(
                "the uploaded file is too large: {} bytes (max: {} bytes)",
                self.bytes.len(),
                max_bytes
            )));
        }

        let image = image::load_from_memory_with_format(&self.bytes, self.format.image_format())?;
        Ok(IngestedImage { image })
    }
}

/// A decoded upload. Holds only the bitmap: the original bytes are dropped,
/// so every PNG produced from it is a fresh, canonical encoding.
#[derive(Clone)]
pub struct IngestedImage {
    image: DynamicImage,
}

impl Debug for IngestedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IngestedImage {{ width: {}, height: {} }}",
            self.width(),
            self.height()
        )
    }
}

impl From<DynamicImage> for IngestedImage {
    fn from(image: DynamicImage) -> Self {
        IngestedImage { image }
    }
}

impl IngestedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Losslessly serialize the bitmap as PNG
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut png: Vec<u8> = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)?;
        Ok(png)
    }

    /// Encode a fresh payload for one classification request
    pub fn encode(&self) -> Result<EncodedPayload> {
        Ok(EncodedPayload::from_png(self.to_png()?))
    }
}

/// A PNG buffer and its base 64 text. Derived per request, never cached.
pub struct EncodedPayload {
    pub png: Vec<u8>,
    pub base64: String,
}

impl Debug for EncodedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedPayload {{ png: <{} bytes> }}", self.png.len())
    }
}

impl EncodedPayload {
    pub fn from_png(png: Vec<u8>) -> Self {
        let base64 = general_purpose::STANDARD.encode(&png);
        EncodedPayload { png, base64 }
    }

    /// `data:image/png;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:image/png;base64,{}", self.base64)
    }
}
