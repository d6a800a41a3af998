pub mod emv;
pub mod image;
pub mod key;

use crate::domain::error::EngineError;

/// The value handed to the buyer: copy-paste text plus the rendered QR.
/// Immutable once generated; identical inputs produce identical bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixQrPayload {
    pub text: String,
    pub png: Vec<u8>,
}

impl PixQrPayload {
    pub fn png_base64(&self) -> String {
        image::png_base64(&self.png)
    }
}

pub fn generate(request: &emv::PixQrRequest) -> Result<PixQrPayload, EngineError> {
    let text = emv::encode(request)?;
    let png = image::render_png(&text)?;
    Ok(PixQrPayload { text, png })
}
