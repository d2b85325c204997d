//! Image compression.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{
    ColorType, ImageEncoder, ImageFormat,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType, PngEncoder},
    },
};
use rayon::prelude::*;
use sitekiln_core::Config;
use tracing::{debug, info};

use crate::{
    error::{Result, TaskError},
    files::expand,
};

/// Totals for one image run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStats {
    pub files: usize,
    pub original_bytes: u64,
    pub written_bytes: u64,
}

impl ImageStats {
    /// Bytes saved across all files.
    pub fn saved(&self) -> u64 {
        self.original_bytes.saturating_sub(self.written_bytes)
    }
}

/// Compress every image directly inside the image source directory into
/// the image destination directory.
pub fn minimize_images(config: &Config) -> Result<ImageStats> {
    let files = expand(&config.paths.images)?;
    let dest = Path::new(&config.paths.dest_img);
    let quality = config.settings.images.jpeg_quality;

    if !files.is_empty() {
        fs::create_dir_all(dest).map_err(|source| TaskError::io(dest, source))?;
    }

    let results: Vec<Result<(u64, u64)>> = files
        .par_iter()
        .map(|file| minimize_file(file, dest, quality))
        .collect();

    let mut stats = ImageStats::default();
    for result in results {
        let (original, written) = result?;
        stats.files += 1;
        stats.original_bytes += original;
        stats.written_bytes += written;
    }

    info!(
        files = stats.files,
        saved = stats.saved(),
        "images minimized"
    );
    Ok(stats)
}

fn minimize_file(file: &Path, dest: &Path, quality: u8) -> Result<(u64, u64)> {
    let original = fs::read(file).map_err(|source| TaskError::io(file, source))?;
    let optimized = optimize(file, &original, quality)?;

    let bytes = match &optimized {
        Some(candidate) if candidate.len() < original.len() => candidate.as_slice(),
        _ => original.as_slice(),
    };

    let output: PathBuf = match file.file_name() {
        Some(name) => dest.join(name),
        None => return Err(TaskError::io(file, std::io::Error::other("image has no file name"))),
    };
    fs::write(&output, bytes).map_err(|source| TaskError::io(&output, source))?;

    let (before, after) = (original.len() as u64, bytes.len() as u64);
    debug!(image = %file.display(), saved = before - after, "saved {} bytes", before - after);
    Ok((before, after))
}

/// Re-encode `bytes` by format. `None` means the file is copied as is.
pub fn optimize(path: &Path, bytes: &[u8], jpeg_quality: u8) -> Result<Option<Vec<u8>>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if extension == "svg" {
        return Ok(std::str::from_utf8(bytes).ok().map(|svg| strip_svg(svg).into_bytes()));
    }

    let image_error = |source: image::ImageError| TaskError::Image {
        path: path.to_path_buf(),
        source,
    };

    match ImageFormat::from_extension(&extension) {
        Some(ImageFormat::Png) => {
            let img = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(image_error)?;
            let mut out = Vec::new();
            PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive)
                .write_image(img.as_bytes(), img.width(), img.height(), img.color())
                .map_err(image_error)?;
            Ok(Some(out))
        }
        Some(ImageFormat::Jpeg) => {
            let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg).map_err(image_error)?;
            let rgb = img.to_rgb8();
            let mut out = Vec::new();
            JpegEncoder::new_with_quality(&mut out, jpeg_quality)
                .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                .map_err(image_error)?;
            Ok(Some(with_metadata(out, &jpeg_metadata(bytes))))
        }
        _ => Ok(None),
    }
}

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

/// APP1 (Exif, XMP) and APP2 (ICC profile) segments of a JPEG, in file order.
fn jpeg_metadata(bytes: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    if !bytes.starts_with(&SOI) {
        return segments;
    }

    let mut pos = SOI.len();
    while pos + 4 <= bytes.len() && bytes[pos] == 0xFF {
        let marker = bytes[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == SOS || marker == EOI {
            break;
        }
        let len = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
        let end = pos + 2 + len;
        if len < 2 || end > bytes.len() {
            break;
        }
        if marker == APP1 || marker == APP2 {
            segments.push(&bytes[pos..end]);
        }
        pos = end;
    }
    segments
}

/// Insert `segments` into `encoded` after its SOI and APP0 (JFIF) header.
fn with_metadata(encoded: Vec<u8>, segments: &[&[u8]]) -> Vec<u8> {
    if segments.is_empty() || !encoded.starts_with(&SOI) {
        return encoded;
    }

    let mut at = SOI.len();
    while at + 4 <= encoded.len() && encoded[at] == 0xFF && encoded[at + 1] == APP0 {
        at += 2 + usize::from(u16::from_be_bytes([encoded[at + 2], encoded[at + 3]]));
    }
    let at = at.min(encoded.len());

    let extra: usize = segments.iter().map(|segment| segment.len()).sum();
    let mut out = Vec::with_capacity(encoded.len() + extra);
    out.extend_from_slice(&encoded[..at]);
    for segment in segments {
        out.extend_from_slice(segment);
    }
    out.extend_from_slice(&encoded[at..]);
    out
}

/// Elements whose whitespace-only text is rendered.
const TEXT_ELEMENTS: [&str; 3] = ["text", "tspan", "textPath"];

/// Drop comments and whitespace-only text between tags.
///
/// Whitespace inside text elements and under `xml:space="preserve"` is kept.
pub fn strip_svg(svg: &str) -> String {
    let mut out = String::with_capacity(svg.len());
    let mut rest = svg.trim();

    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        rest = match rest[start..].find("-->") {
            Some(end) => &rest[start + end + 3..],
            None => "",
        };
    }
    out.push_str(rest);

    let mut compact = String::with_capacity(out.len());
    // One entry per open element: whether its text whitespace is kept.
    let mut preserve: Vec<bool> = Vec::new();
    let mut rest = out.as_str();

    while !rest.is_empty() {
        let text_end = rest.find('<').unwrap_or(rest.len());
        let (text, tail) = rest.split_at(text_end);
        let keep = preserve.last().copied().unwrap_or(false);
        if keep || !text.trim().is_empty() {
            compact.push_str(text);
        }
        if tail.is_empty() {
            break;
        }

        let tag_len = tag_end(tail);
        let tag = &tail[..tag_len];
        compact.push_str(tag);
        rest = &tail[tag_len..];

        let inner = tag.trim_start_matches('<').trim_end_matches('>');
        if inner.starts_with('/') {
            preserve.pop();
        } else if !(inner.starts_with('?') || inner.starts_with('!') || inner.ends_with('/')) {
            let name = inner
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or_default();
            let keeps = keep
                || TEXT_ELEMENTS.contains(&name)
                || inner.contains("xml:space=\"preserve\"")
                || inner.contains("xml:space='preserve'");
            preserve.push(keeps);
        }
    }
    compact
}

/// Length of the tag starting at `input[0] == '<'`, skipping `>` inside
/// quoted attribute values.
fn tag_end(input: &str) -> usize {
    let mut quote = None;
    for (idx, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return idx + 1,
            (None, _) => {}
        }
    }
    input.len()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use sitekiln_core::{Mode, Settings};

    use super::*;

    fn project() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("src/assets/img")).expect("create img dir");
        let config = Config::new(dir.path(), Mode::Development, Settings::default());
        (dir, config)
    }

    fn fast_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(64, 64, |x, _| Rgba([(x * 4) as u8, 0, 0, 255]));
        let mut bytes = Vec::new();
        PngEncoder::new_with_quality(Cursor::new(&mut bytes), CompressionType::Fast, FilterType::NoFilter)
            .write_image(img.as_raw(), 64, 64, ColorType::Rgba8)
            .expect("encode png");
        bytes
    }

    fn best_jpeg() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, 100)
            .write_image(img.as_raw(), 64, 64, ColorType::Rgb8)
            .expect("encode jpeg");
        bytes
    }

    #[test]
    fn test_strip_svg() {
        let svg = "<?xml version=\"1.0\"?>\n<!-- Generator: tool -->\n<svg xmlns=\"http://www.w3.org/2000/svg\">\n  <g>\n    <text>a b</text>\n  </g>\n</svg>\n";
        assert_eq!(
            strip_svg(svg),
            "<?xml version=\"1.0\"?><svg xmlns=\"http://www.w3.org/2000/svg\"><g><text>a b</text></g></svg>"
        );
    }

    #[test]
    fn test_strip_svg_keeps_text_whitespace() {
        let svg = "<svg>\n  <text x=\"0\">\n    <tspan>a</tspan> <tspan>b</tspan>\n  </text>\n  <g>\n    <rect/>\n  </g>\n</svg>";
        assert_eq!(
            strip_svg(svg),
            "<svg><text x=\"0\">\n    <tspan>a</tspan> <tspan>b</tspan>\n  </text><g><rect/></g></svg>"
        );
    }

    #[test]
    fn test_strip_svg_respects_xml_space_preserve() {
        let svg = "<svg>\n  <g xml:space=\"preserve\"><a>x</a> <a>y</a></g>\n  <g><a>x</a> <a>y</a></g>\n</svg>";
        assert_eq!(
            strip_svg(svg),
            "<svg><g xml:space=\"preserve\"><a>x</a> <a>y</a></g><g><a>x</a><a>y</a></g></svg>"
        );
    }

    #[test]
    fn test_strip_svg_quoted_angle_bracket() {
        let svg = "<svg>\n  <text data-op=\"a>b\"> <tspan>c</tspan></text>\n</svg>";
        assert_eq!(
            strip_svg(svg),
            "<svg><text data-op=\"a>b\"> <tspan>c</tspan></text></svg>"
        );
    }

    fn exif_orientation(orientation: u8) -> Vec<u8> {
        let mut segment = vec![0xFF, APP1, 0x00, 0x22];
        segment.extend_from_slice(b"Exif\0\0");
        // Big-endian TIFF header, IFD0 with a single Orientation (0x0112) SHORT entry.
        segment.extend_from_slice(b"MM\0\x2a\0\0\0\x08");
        segment.extend_from_slice(&[0x00, 0x01]);
        segment.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, orientation, 0x00, 0x00]);
        segment.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        segment
    }

    fn icc_profile() -> Vec<u8> {
        let mut payload = b"ICC_PROFILE\0\x01\x01".to_vec();
        payload.extend_from_slice(&[0x5A; 32]);
        let len = (payload.len() + 2) as u16;
        let mut segment = vec![0xFF, APP2];
        segment.extend_from_slice(&len.to_be_bytes());
        segment.extend_from_slice(&payload);
        segment
    }

    fn with_segments(jpeg: &[u8], segments: &[&[u8]]) -> Vec<u8> {
        let mut bytes = SOI.to_vec();
        for segment in segments {
            bytes.extend_from_slice(segment);
        }
        bytes.extend_from_slice(&jpeg[SOI.len()..]);
        bytes
    }

    #[test]
    fn test_jpeg_keeps_orientation_and_color_profile() {
        let exif = exif_orientation(6);
        let icc = icc_profile();
        let original = with_segments(&best_jpeg(), &[&exif, &icc]);
        assert_eq!(jpeg_metadata(&original), vec![exif.as_slice(), icc.as_slice()]);

        let optimized = optimize(Path::new("portrait.jpg"), &original, 80)
            .expect("optimize")
            .expect("jpeg is re-encoded");

        assert!(optimized.len() < original.len());
        assert_eq!(jpeg_metadata(&optimized), vec![exif.as_slice(), icc.as_slice()]);
        let decoded = image::load_from_memory(&optimized).expect("decode optimized");
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_jpeg_without_metadata_unchanged_header() {
        let optimized = optimize(Path::new("plain.jpg"), &best_jpeg(), 80)
            .expect("optimize")
            .expect("jpeg is re-encoded");
        assert!(jpeg_metadata(&optimized).is_empty());
    }

    #[test]
    fn test_png_recompressed_losslessly() {
        let original = fast_png();
        let optimized = optimize(Path::new("a.png"), &original, 80)
            .expect("optimize")
            .expect("png is re-encoded");
        assert!(optimized.len() < original.len());

        let before = image::load_from_memory(&original).expect("decode original");
        let after = image::load_from_memory(&optimized).expect("decode optimized");
        assert_eq!(before.as_bytes(), after.as_bytes());
    }

    #[test]
    fn test_jpeg_quality() {
        let original = best_jpeg();
        let optimized = optimize(Path::new("photo.JPG"), &original, 80)
            .expect("optimize")
            .expect("jpeg is re-encoded");
        assert!(optimized.len() < original.len());
    }

    #[test]
    fn test_minimize_images_directory() {
        let (dir, config) = project();
        let img = dir.path().join("src/assets/img");
        fs::write(img.join("logo.png"), fast_png()).expect("write png");
        fs::write(img.join("icon.svg"), "<svg>\n  <!-- x -->\n  <path/>\n</svg>").expect("write svg");
        fs::write(img.join("anim.gif"), b"GIF89a-not-really").expect("write gif");
        fs::write(img.join(".hidden.png"), b"junk").expect("write hidden");
        fs::create_dir_all(img.join("nested")).expect("create nested");
        fs::write(img.join("nested/deep.png"), fast_png()).expect("write nested");

        let stats = minimize_images(&config).expect("minimize");
        assert_eq!(stats.files, 3);
        assert!(stats.saved() > 0);

        let out = dir.path().join("dist/img");
        assert_eq!(fs::read_to_string(out.join("icon.svg")).expect("svg"), "<svg><path/></svg>");
        assert_eq!(fs::read(out.join("anim.gif")).expect("gif"), b"GIF89a-not-really");
        assert!(out.join("logo.png").exists());
        assert!(!out.join(".hidden.png").exists());
        assert!(!out.join("nested").exists());
        assert!(!out.join("deep.png").exists());
    }

    #[test]
    fn test_original_kept_when_not_smaller() {
        let (dir, config) = project();
        let svg = "<svg/>";
        fs::write(dir.path().join("src/assets/img/dot.svg"), svg).expect("write svg");

        let stats = minimize_images(&config).expect("minimize");
        assert_eq!(stats.saved(), 0);
        assert_eq!(fs::read_to_string(dir.path().join("dist/img/dot.svg")).expect("svg"), svg);
    }

    #[test]
    fn test_corrupt_png_fails() {
        let (dir, config) = project();
        fs::write(dir.path().join("src/assets/img/broken.png"), b"not a png").expect("write");

        let err = minimize_images(&config).expect_err("decode fails");
        assert!(matches!(err, TaskError::Image { .. }));
    }
}
