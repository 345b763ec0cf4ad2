use eframe::egui::ColorImage;
use log::warn;

use crate::backend::APP_USER_AGENT;

/// Downloads and decodes the preview image the backend reported for the current URL.
/// Blocking; run it on the runtime's blocking pool.
pub fn fetch_thumbnail(url: &str) -> Option<ColorImage> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(APP_USER_AGENT)
        .build()
        .ok()?;
    let bytes = match client.get(url).send().and_then(|resp| resp.error_for_status()) {
        Ok(resp) => resp.bytes().ok()?,
        Err(err) => {
            warn!("Thumbnail fetch failed for {url}: {err}");
            return None;
        }
    };
    decode_thumbnail(&bytes)
}

/// Any format the `image` crate understands, converted to unpremultiplied RGBA
pub fn decode_thumbnail(bytes: &[u8]) -> Option<ColorImage> {
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img.to_rgba8(),
        Err(err) => {
            warn!("Thumbnail could not be decoded: {err}");
            return None;
        }
    };
    let size = [img.width() as usize, img.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageOutputFormat, Rgba, RgbaImage};

    use super::*;

    #[test]
    fn decodes_png_into_color_image() {
        let mut png = Vec::new();
        RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 255]))
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();

        let decoded = decode_thumbnail(&png).unwrap();
        assert_eq!(decoded.size, [4, 2]);
        assert_eq!(decoded.pixels[0], eframe::egui::Color32::RED);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_thumbnail(b"<html>not an image</html>").is_none());
    }
}
