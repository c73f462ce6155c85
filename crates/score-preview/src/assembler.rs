//! Build an A4 PDF from a sequence of encoded images.

use std::borrow::Cow;
use std::io::{Cursor, Write};

use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};
use tracing::{debug, warn};

use crate::geometry::{crop_to_fill, PageSize};
use crate::pdf::{EmbeddedImage, PdfStreamWriter};
use crate::types::{AssemblyReport, PreviewError, PreviewResult};

/// Turn encoded image bytes into something the PDF writer can embed.
///
/// Baseline JPEGs in RGB or grayscale are embedded as-is with `DCTDecode`.
/// Anything else the `image` crate can read, CMYK and YCCK JPEGs included, is
/// decoded to 8-bit RGB.
pub fn prepare_image(bytes: &[u8]) -> PreviewResult<EmbeddedImage<'_>> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;

    if reader.format() == Some(ImageFormat::Jpeg) {
        // 4-component frames decode as Rgb8; the SOF header holds the real count
        let components = jpeg_components(bytes);
        let decoder = reader.into_decoder()?;
        let (width, height) = decoder.dimensions();
        let color_space = match (components, decoder.color_type()) {
            (Some(1), ColorType::L8) => Some("DeviceGray"),
            (Some(3), ColorType::Rgb8) => Some("DeviceRGB"),
            _ => None,
        };
        if let Some(color_space) = color_space {
            return Ok(EmbeddedImage {
                width,
                height,
                color_space,
                filter: Some("DCTDecode"),
                data: Cow::Borrowed(bytes),
            });
        }
        debug!("JPEG with {components:?} component(s), re-encoding as RGB");
    }

    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(PreviewError::InvalidInput("image has no pixels".to_string()));
    }
    Ok(EmbeddedImage {
        width,
        height,
        color_space: "DeviceRGB",
        filter: None,
        data: Cow::Owned(rgb.into_raw()),
    })
}

/// Component count declared by the first start-of-frame segment of a JPEG.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut pos = 2;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        while *bytes.get(pos + 1)? == 0xFF {
            pos += 1;
        }
        let marker = bytes[pos + 1];
        pos += 2;

        match marker {
            // standalone markers carry no length
            0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            // SOFn: length(2) precision(1) height(2) width(2) components(1)
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return bytes.get(pos + 7).copied();
            }
            _ => {
                let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]);
                pos = pos.checked_add(usize::from(len))?;
            }
        }
    }
}

/// Lays images out one per page, cropped to fill.
#[derive(Debug, Clone, Default)]
pub struct DocumentAssembler {
    page: PageSize,
    title: Option<String>,
}

impl DocumentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page: PageSize) -> Self {
        self.page = page;
        self
    }

    /// Record `title` in the document information dictionary. Blank titles
    /// are ignored.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = if title.trim().is_empty() {
            None
        } else {
            Some(title)
        };
        self
    }

    pub fn page_size(&self) -> PageSize {
        self.page
    }

    /// Write a PDF with one page per decodable buffer, in order, to `out`.
    ///
    /// Undecodable buffers are skipped and counted in the report. An empty
    /// input still produces a well-formed document with zero pages.
    pub fn assemble<'a, I, W>(&self, buffers: I, out: W) -> PreviewResult<AssemblyReport>
    where
        I: IntoIterator<Item = &'a [u8]>,
        W: Write,
    {
        let mut writer = PdfStreamWriter::new(out, self.page)?;
        if let Some(title) = &self.title {
            writer.set_title(title)?;
        }

        let mut report = AssemblyReport::default();
        for (position, bytes) in buffers.into_iter().enumerate() {
            let image = match prepare_image(bytes) {
                Ok(image) => image,
                Err(e) => {
                    warn!("Skipping image {position}: {e}");
                    report.pages_skipped += 1;
                    continue;
                }
            };
            let placement = crop_to_fill(image.width, image.height, self.page);
            writer.add_image_page(&image, placement)?;
            report.pages_written += 1;
        }

        writer.finish()?;
        debug!(
            "Assembled PDF: {} page(s), {} skipped",
            report.pages_written, report.pages_skipped
        );
        Ok(report)
    }
}
