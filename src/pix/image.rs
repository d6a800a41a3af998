use {
    crate::domain::error::EngineError,
    base64::{Engine as _, engine::general_purpose::STANDARD},
    image::{DynamicImage, ImageFormat, Luma},
    qrcode::{EcLevel, QrCode},
    std::io::Cursor,
};

/// Render the EMV payload as a PNG. Error correction level M, matching what
/// banking apps are calibrated against.
pub fn render_png(payload: &str) -> Result<Vec<u8>, EngineError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::M)
        .map_err(|e| EngineError::Validation(format!("QR encoding failed: {e}")))?;

    let img = code
        .render::<Luma<u8>>()
        .min_dimensions(512, 512)
        .quiet_zone(true)
        .build();

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| EngineError::Validation(format!("QR PNG rendering failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Base64 form for JSON transport (the bot displays it inline).
pub fn png_base64(png: &[u8]) -> String {
    STANDARD.encode(png)
}
