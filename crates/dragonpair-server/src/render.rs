//! Pairing token to QR image rendering

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dragonpair_core::PairingToken;
use image::ImageFormat;
use qrcode::QrCode;
use std::io::Cursor;
use thiserror::Error;

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("QR encoding failed: {0}")]
    Qr(#[from] qrcode::types::QrError),
    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Render task failed: {0}")]
    Task(String),
}

/// A rendered pairing image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedQr {
    /// PNG bytes
    pub png: Vec<u8>,
    /// `data:image/png;base64,...` form of `png`
    pub data_url: String,
}

/// Renders tokens as square PNG QR codes
#[derive(Debug, Clone, Copy)]
pub struct QrRenderer {
    size: u32,
}

impl QrRenderer {
    pub fn new(size: u32) -> Self {
        Self { size: size.max(1) }
    }

    /// Render a token. Output depends only on the token and the size.
    pub fn render(&self, token: &PairingToken) -> Result<RenderedQr, RenderError> {
        let code = QrCode::new(token.as_str().as_bytes())?;
        let image = code.render::<image::Luma<u8>>().quiet_zone(true).build();

        let resized = image::imageops::resize(
            &image,
            self.size,
            self.size,
            image::imageops::FilterType::Nearest,
        );

        let mut buffer = Cursor::new(Vec::new());
        resized.write_to(&mut buffer, ImageFormat::Png)?;
        let png = buffer.into_inner();

        let data_url = format!("data:image/png;base64,{}", BASE64.encode(&png));
        Ok(RenderedQr { png, data_url })
    }
}
