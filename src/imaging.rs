//! PNG re-encoding with embedded metadata.
//!
//! Downloaded PNGs are decoded and written back with tEXt chunks carrying
//! the prompt, author and timestamps, so the archive stays searchable even
//! without the JSON sidecar files.

use crate::error::ArchiveError;
use crate::types::Job;

/// tEXt fields written into archived PNGs. Empty fields are omitted.
#[derive(Debug, Clone, Default)]
pub struct PngMetadata {
    pub title: String,
    pub author: String,
    pub description: String,
    pub copyright: String,
    pub creation_time: String,
    pub software: String,
}

impl PngMetadata {
    pub fn for_job(job: &Job) -> Self {
        let username = job.username.clone().unwrap_or_default();
        Self {
            title: job.prompt.clone().unwrap_or_default(),
            author: username.clone(),
            description: job.full_command.clone().unwrap_or_default(),
            copyright: username,
            creation_time: job.enqueue_time.clone(),
            software: "Midjourney".to_string(),
        }
    }

    fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Title", self.title.as_str()),
            ("Author", self.author.as_str()),
            ("Description", self.description.as_str()),
            ("Copyright", self.copyright.as_str()),
            ("Creation Time", self.creation_time.as_str()),
            ("Software", self.software.as_str()),
        ]
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }
}

/// Decode an image payload and re-encode it as RGBA PNG with metadata
/// chunks. Fails on payloads the decoder rejects; callers fall back to a
/// raw byte write.
pub fn encode_png_with_metadata(
    data: &[u8],
    meta: &PngMetadata,
) -> Result<Vec<u8>, ArchiveError> {
    let img = image::load_from_memory(data).map_err(|e| ArchiveError::Image(e.to_string()))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        for (key, value) in meta.entries() {
            encoder
                .add_text_chunk(key.to_string(), value.to_string())
                .map_err(|e| ArchiveError::Image(e.to_string()))?;
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| ArchiveError::Image(e.to_string()))?;
        writer
            .write_image_data(rgba.as_raw())
            .map_err(|e| ArchiveError::Image(e.to_string()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([200u8, 10, 10, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_encode_embeds_text_chunks() {
        let meta = PngMetadata {
            title: "a red fox".into(),
            author: "someone".into(),
            creation_time: "2023-01-01 10:00:00.000000".into(),
            software: "Midjourney".into(),
            ..Default::default()
        };

        let out = encode_png_with_metadata(&sample_png(), &meta).unwrap();

        let decoder = png::Decoder::new(&out[..]);
        let reader = decoder.read_info().unwrap();
        let texts = &reader.info().uncompressed_latin1_text;
        let title = texts.iter().find(|t| t.keyword == "Title").unwrap();
        assert_eq!(title.text, "a red fox");
        let software = texts.iter().find(|t| t.keyword == "Software").unwrap();
        assert_eq!(software.text, "Midjourney");
        // empty fields stay out
        assert!(texts.iter().all(|t| t.keyword != "Description"));
    }

    #[test]
    fn test_encode_preserves_pixels() {
        let out = encode_png_with_metadata(&sample_png(), &PngMetadata::default()).unwrap();
        let img = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 4));
        assert_eq!(img.get_pixel(0, 0), &image::Rgba([200u8, 10, 10, 255]));
    }

    #[test]
    fn test_encode_rejects_garbage() {
        let err = encode_png_with_metadata(b"fishy png", &PngMetadata::default()).unwrap_err();
        assert!(matches!(err, ArchiveError::Image(_)));
    }

    #[test]
    fn test_metadata_for_job() {
        let job: Job = serde_json::from_value(serde_json::json!({
            "id": "j1",
            "enqueue_time": "2023-01-01 10:00:00.000000",
            "prompt": "a red fox",
            "full_command": "/imagine a red fox",
            "username": "someone"
        }))
        .unwrap();

        let meta = PngMetadata::for_job(&job);
        assert_eq!(meta.title, "a red fox");
        assert_eq!(meta.author, "someone");
        assert_eq!(meta.copyright, "someone");
        assert_eq!(meta.description, "/imagine a red fox");
        assert_eq!(meta.software, "Midjourney");
    }
}
