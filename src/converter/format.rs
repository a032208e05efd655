use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::Serialize;
use strum_macros::Display;

use crate::job::MediaKind;

pub const IMAGE_FORMATS: [TargetFormat; 7] = [
    TargetFormat::JPG,
    TargetFormat::PNG,
    TargetFormat::WebP,
    TargetFormat::GIF,
    TargetFormat::BMP,
    TargetFormat::TIFF,
    TargetFormat::ICO,
];

pub const VIDEO_FORMATS: [TargetFormat; 7] = [
    TargetFormat::MP4,
    TargetFormat::MOV,
    TargetFormat::AVI,
    TargetFormat::WebM,
    TargetFormat::MKV,
    TargetFormat::FLV,
    TargetFormat::WMV,
];

lazy_static! {
    pub static ref FORMATS: HashMap<String, TargetFormat> = IMAGE_FORMATS
        .iter()
        .chain(VIDEO_FORMATS.iter())
        .map(|format| (format.extension(), *format))
        .collect();
}

/// A format offered on the "convert all to" grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, Serialize)]
pub enum TargetFormat {
    JPG,
    PNG,
    WebP,
    GIF,
    BMP,
    TIFF,
    ICO,
    MP4,
    MOV,
    AVI,
    WebM,
    MKV,
    FLV,
    WMV,
}

impl TargetFormat {
    /// Looks a format up by extension or label, ignoring case and a leading dot.
    pub fn from_extension(s: &str) -> Option<Self> {
        let ext = s.trim().trim_start_matches('.').to_lowercase();
        FORMATS.get(&ext).copied()
    }

    /// The extension written on exported files, e.g. `webp` for `WebP`.
    pub fn extension(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// Formats offered for the media kinds currently in the session, image list
/// first and without duplicates. With nothing loaded the image list is offered.
pub fn available_formats<I>(kinds: I) -> Vec<TargetFormat>
where
    I: IntoIterator<Item = MediaKind>,
{
    let (mut has_image, mut has_video) = (false, false);
    for kind in kinds {
        match kind {
            MediaKind::Image => has_image = true,
            MediaKind::Video => has_video = true,
            MediaKind::Pdf => {}
        }
    }

    let mut formats: Vec<TargetFormat> = Vec::new();
    let lists = [(has_image, &IMAGE_FORMATS), (has_video, &VIDEO_FORMATS)];
    for (present, list) in lists {
        if !present {
            continue;
        }
        for format in list.iter() {
            if !formats.contains(format) {
                formats.push(*format);
            }
        }
    }

    if formats.is_empty() {
        formats.extend_from_slice(&IMAGE_FORMATS);
    }
    formats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_session_offers_image_formats() {
        assert_eq!(available_formats(Vec::new()), IMAGE_FORMATS.to_vec());
    }

    #[test]
    fn mixed_session_offers_union_images_first() {
        let formats = available_formats([MediaKind::Video, MediaKind::Image, MediaKind::Video]);
        assert_eq!(formats.len(), 14);
        assert_eq!(formats[0], TargetFormat::JPG);
        assert_eq!(formats[7], TargetFormat::MP4);
    }

    #[test]
    fn video_only_session_offers_video_formats() {
        assert_eq!(available_formats([MediaKind::Video]), VIDEO_FORMATS.to_vec());
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(TargetFormat::from_extension(".WEBP"), Some(TargetFormat::WebP));
        assert_eq!(TargetFormat::from_extension("mkv"), Some(TargetFormat::MKV));
        assert_eq!(TargetFormat::from_extension("heic"), None);
        assert_eq!(TargetFormat::WebM.extension(), "webm");
        assert!(IMAGE_FORMATS.contains(&TargetFormat::TIFF));
    }
}
