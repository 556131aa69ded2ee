use chrono::{DateTime, Utc};
use qrcode::render::svg;
use qrcode::QrCode;
use uuid::Uuid;

use crate::services::signature;

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    PngEncodingError(String),
}

/// The string that gets signed to form the pass credential.
///
/// Binding the validity end into the signed payload means a token issued
/// for an earlier approval stops verifying if the pass is ever re-issued
/// with a different window.
pub fn credential_payload(pass_id: Uuid, valid_until: DateTime<Utc>) -> String {
    format!("{}:{}", pass_id, valid_until.to_rfc3339())
}

/// Issues the QR credential token for an approved pass
pub fn credential_token(pass_id: Uuid, valid_until: DateTime<Utc>, key: &[u8]) -> String {
    signature::sign(&credential_payload(pass_id, valid_until), key)
}

/// Verifies a scanned credential token against the pass it claims to be for
pub fn verify_credential(
    pass_id: Uuid,
    valid_until: DateTime<Utc>,
    token: &str,
    key: &[u8],
) -> bool {
    signature::verify(&credential_payload(pass_id, valid_until), token, key)
}

/// The URL encoded into the QR image; the gate scanner decodes this and
/// posts it back to the validation endpoint.
pub fn payload_url(base_url: &str, pass_id: Uuid, token: &str) -> String {
    format!(
        "{}/security/validate?pass={}&token={}",
        base_url.trim_end_matches('/'),
        pass_id,
        token
    )
}

/// Renders the payload URL as an SVG QR code
pub fn generate_qr_svg(payload: &str) -> Result<String, QrGenerationError> {
    let code = QrCode::new(payload.as_bytes())?;
    let svg = code.render::<svg::Color>().min_dimensions(200, 200).build();

    Ok(svg)
}

/// Renders the payload URL as a PNG QR code
pub fn generate_qr_png(payload: &str) -> Result<Vec<u8>, QrGenerationError> {
    use image::{ImageBuffer, Luma};

    let code = QrCode::new(payload.as_bytes())?;

    // Each module is 10x10 pixels
    let module_size = 10u32;
    let width = code.width() as u32;
    let img_size = width * module_size;

    let mut img = ImageBuffer::<Luma<u8>, Vec<u8>>::new(img_size, img_size);

    for (x, y, color) in img.enumerate_pixels_mut() {
        let module_x = x / module_size;
        let module_y = y / module_size;
        let module_color = code[(module_x as usize, module_y as usize)];
        let pixel_value = match module_color {
            qrcode::types::Color::Dark => Luma([0u8]),
            qrcode::types::Color::Light => Luma([255u8]),
        };
        *color = pixel_value;
    }

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut png_data),
            image::ImageFormat::Png,
        )
        .map_err(|e| QrGenerationError::PngEncodingError(e.to_string()))?;

    Ok(png_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_round_trip() {
        let key = b"test-signing-key";
        let pass_id = Uuid::new_v4();
        let valid_until = Utc::now();

        let token = credential_token(pass_id, valid_until, key);

        assert!(verify_credential(pass_id, valid_until, &token, key));
    }

    #[test]
    fn credential_bound_to_pass_id() {
        let key = b"test-signing-key";
        let valid_until = Utc::now();

        let token = credential_token(Uuid::new_v4(), valid_until, key);

        assert!(!verify_credential(Uuid::new_v4(), valid_until, &token, key));
    }

    #[test]
    fn credential_bound_to_window() {
        let key = b"test-signing-key";
        let pass_id = Uuid::new_v4();
        let valid_until = Utc::now();

        let token = credential_token(pass_id, valid_until, key);
        let shifted = valid_until + chrono::Duration::hours(1);

        assert!(!verify_credential(pass_id, shifted, &token, key));
    }

    #[test]
    fn payload_url_shape() {
        let pass_id = Uuid::new_v4();
        let url = payload_url("http://localhost:8080/", pass_id, "abc123");

        assert_eq!(
            url,
            format!("http://localhost:8080/security/validate?pass={}&token=abc123", pass_id)
        );
    }

    #[test]
    fn svg_generation() {
        let svg = generate_qr_svg("http://localhost:8080/security/validate?pass=x&token=y");

        let svg_str = svg.unwrap();
        assert!(svg_str.contains("<svg"));
        assert!(svg_str.contains("</svg>"));
    }

    #[test]
    fn png_generation() {
        let png = generate_qr_png("http://localhost:8080/security/validate?pass=x&token=y").unwrap();

        // PNG magic bytes
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
