//! PDF埋め込み用の写真取得・縮小
//!
//! 取得・デコードに失敗した写真は警告を出して省略する（PDF全体は失敗させない）。

use crate::cli::PdfQuality;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use observer_common::export::ImageData;
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{debug, warn};

/// 写真をまとめて取得し、参照ごとに縮小済みJPEGを返す
pub async fn fetch_images<'a, I>(refs: I, quality: PdfQuality) -> HashMap<String, ImageData>
where
    I: IntoIterator<Item = &'a str>,
{
    let client = reqwest::Client::new();
    let mut images = HashMap::new();

    for reference in refs {
        if images.contains_key(reference) {
            continue;
        }
        let bytes = match fetch_bytes(&client, reference).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(reference, error = %e, "写真を取得できないため省略します");
                continue;
            }
        };
        match prepare_image(&bytes, quality) {
            Some(data) => {
                debug!(reference, width = data.width_px, height = data.height_px, "写真を準備");
                images.insert(reference.to_string(), data);
            }
            None => warn!(reference, "写真をデコードできないため省略します"),
        }
    }
    images
}

async fn fetch_bytes(client: &reqwest::Client, reference: &str) -> crate::error::Result<Vec<u8>> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        let response = client.get(reference).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    } else {
        let path = reference.strip_prefix("file://").unwrap_or(reference);
        Ok(tokio::fs::read(path).await?)
    }
}

/// デコードして最大幅まで縮小し、JPEGに再圧縮
pub fn prepare_image(bytes: &[u8], quality: PdfQuality) -> Option<ImageData> {
    let decoded = image::load_from_memory(bytes).ok()?;
    let max_width = quality.max_width();
    let resized = if decoded.width() > max_width {
        let height = (decoded.height() as f64 * max_width as f64 / decoded.width() as f64).round() as u32;
        decoded.resize_exact(max_width, height.max(1), FilterType::Triangle)
    } else {
        decoded
    };
    let rgb = resized.to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.jpeg_quality());
    rgb.write_with_encoder(encoder).ok()?;

    Some(ImageData {
        data: buffer.into_inner(),
        width_px: rgb.width(),
        height_px: rgb.height(),
    })
}
