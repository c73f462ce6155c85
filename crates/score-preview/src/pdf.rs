//! Incremental PDF writer.
//!
//! Each page (image XObject, content stream, page object) is serialized to
//! the underlying writer as soon as it is added, so memory use does not grow
//! with the document. The page tree, catalog and cross-reference table are
//! written by [`PdfStreamWriter::finish`]. Pages point at the page tree by a
//! reserved object number, which is legal before that object is written.

use std::borrow::Cow;
use std::io::{self, Write};

use lopdf::content::{Content, Operation};
use lopdf::xref::{Xref, XrefEntry, XrefType};
use lopdf::{dictionary, Dictionary, Object, ObjectId, StringFormat};

use crate::geometry::{PageSize, Placement};
use crate::types::{PreviewError, PreviewResult};

const PDF_VERSION: &str = "1.7";
const PAGES_ID: ObjectId = (1, 0);
const CATALOG_ID: ObjectId = (2, 0);
const IMAGE_NAME: &str = "Im0";

/// Image data ready to embed as an XObject.
#[derive(Debug, Clone)]
pub struct EmbeddedImage<'a> {
    pub width: u32,
    pub height: u32,
    /// `DeviceRGB` or `DeviceGray`.
    pub color_space: &'static str,
    /// `Some("DCTDecode")` for JPEG passthrough, `None` for raw samples.
    pub filter: Option<&'static str>,
    pub data: Cow<'a, [u8]>,
}

/// Tracks the byte offset of everything written, for the xref table.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streams a one-image-per-page PDF to `W`.
pub struct PdfStreamWriter<W: Write> {
    out: CountingWriter<W>,
    xref: Xref,
    next_id: u32,
    page_ids: Vec<ObjectId>,
    page_size: PageSize,
    info_id: Option<ObjectId>,
}

impl<W: Write> PdfStreamWriter<W> {
    /// Write the file header and return a writer ready for pages.
    pub fn new(writer: W, page_size: PageSize) -> io::Result<Self> {
        let mut out = CountingWriter {
            inner: writer,
            written: 0,
        };
        write!(out, "%PDF-{PDF_VERSION}\n")?;
        out.write_all(b"%\xE2\xE3\xCF\xD3\n")?;

        Ok(Self {
            out,
            xref: Xref::new(0, XrefType::CrossReferenceTable),
            next_id: CATALOG_ID.0 + 1,
            page_ids: Vec::new(),
            page_size,
            info_id: None,
        })
    }

    /// Number of pages written so far.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Write a document information dictionary carrying `title`.
    pub fn set_title(&mut self, title: &str) -> io::Result<()> {
        let id = self.alloc_id();
        let producer = concat!("score-preview ", env!("CARGO_PKG_VERSION"));
        let info = dictionary! {
            "Title" => Object::String(utf16_text(title), StringFormat::Hexadecimal),
            "Producer" => Object::string_literal(producer),
        };
        self.write_object(id, &Object::Dictionary(info))?;
        self.info_id = Some(id);
        Ok(())
    }

    /// Add one page showing `image` at `placement`.
    pub fn add_image_page(
        &mut self,
        image: &EmbeddedImage<'_>,
        placement: Placement,
    ) -> PreviewResult<ObjectId> {
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(placement.width as f32),
                        0.into(),
                        0.into(),
                        Object::Real(placement.height as f32),
                        Object::Real(placement.x as f32),
                        Object::Real(placement.y as f32),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content = content
            .encode()
            .map_err(|e| PreviewError::Pdf(format!("content stream encoding failed: {e}")))?;

        let image_id = self.alloc_id();
        let content_id = self.alloc_id();
        let page_id = self.alloc_id();

        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width),
            "Height" => i64::from(image.height),
            "ColorSpace" => image.color_space,
            "BitsPerComponent" => 8,
        };
        if let Some(filter) = image.filter {
            image_dict.set("Filter", filter);
        }
        self.write_stream(image_id, image_dict, &image.data)?;
        self.write_stream(content_id, Dictionary::new(), &content)?;

        let page = dictionary! {
            "Type" => "Page",
            "Parent" => PAGES_ID,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(self.page_size.width as f32),
                Object::Real(self.page_size.height as f32),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
            "Contents" => content_id,
        };
        self.write_object(page_id, &Object::Dictionary(page))?;
        self.page_ids.push(page_id);

        Ok(page_id)
    }

    /// Write the page tree, catalog, xref and trailer, then flush.
    pub fn finish(mut self) -> io::Result<W> {
        let kids: Vec<Object> = self.page_ids.iter().map(|&id| Object::from(id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.write_object(PAGES_ID, &Object::Dictionary(pages))?;

        let catalog = dictionary! { "Type" => "Catalog", "Pages" => PAGES_ID };
        self.write_object(CATALOG_ID, &Object::Dictionary(catalog))?;

        // ids are allocated densely, so one subsection covers the table
        let xref_start = self.out.written;
        self.xref.size = self.next_id;
        writeln!(self.out, "xref")?;
        writeln!(self.out, "0 {}", self.xref.size)?;
        self.out.write_all(b"0000000000 65535 f \n")?;
        for id in 1..self.xref.size {
            match self.xref.get(id) {
                Some(XrefEntry::Normal { offset, generation }) => {
                    writeln!(self.out, "{offset:010} {generation:05} n ")?
                }
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::Other,
                        format!("object {id} was never written"),
                    ))
                }
            }
        }

        let mut trailer = dictionary! {
            "Size" => i64::from(self.xref.size),
            "Root" => CATALOG_ID,
        };
        if let Some(info) = self.info_id {
            trailer.set("Info", info);
        }
        writeln!(self.out, "trailer")?;
        write_dictionary(&mut self.out, &trailer)?;
        write!(self.out, "\nstartxref\n{xref_start}\n%%EOF\n")?;

        self.out.flush()?;
        Ok(self.out.inner)
    }

    fn alloc_id(&mut self) -> ObjectId {
        let id = (self.next_id, 0);
        self.next_id += 1;
        id
    }

    /// Record that object `id` starts at the current output position.
    fn mark_offset(&mut self, id: ObjectId) -> io::Result<()> {
        let offset = u32::try_from(self.out.written).map_err(|_| {
            io::Error::new(io::ErrorKind::Other, "document too large for an xref table")
        })?;
        self.xref.insert(
            id.0,
            XrefEntry::Normal {
                offset,
                generation: id.1,
            },
        );
        Ok(())
    }

    fn write_object(&mut self, id: ObjectId, object: &Object) -> io::Result<()> {
        self.mark_offset(id)?;
        write!(self.out, "{} {} obj\n", id.0, id.1)?;
        write_object(&mut self.out, object)?;
        self.out.write_all(b"\nendobj\n")
    }

    fn write_stream(&mut self, id: ObjectId, mut dict: Dictionary, data: &[u8]) -> io::Result<()> {
        self.mark_offset(id)?;
        dict.set("Length", data.len() as i64);
        write!(self.out, "{} {} obj\n", id.0, id.1)?;
        write_dictionary(&mut self.out, &dict)?;
        self.out.write_all(b"\nstream\n")?;
        self.out.write_all(data)?;
        self.out.write_all(b"\nendstream\nendobj\n")
    }
}

/// UTF-16BE with byte-order mark, the PDF text-string encoding for non-Latin titles.
fn utf16_text(text: &str) -> Vec<u8> {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

fn write_object(writer: &mut dyn Write, object: &Object) -> io::Result<()> {
    match object {
        Object::Null => writer.write_all(b"null"),
        Object::Boolean(b) => writer.write_all(if *b { b"true" } else { b"false" }),
        Object::Integer(i) => write!(writer, "{i}"),
        Object::Real(r) => write!(writer, "{r:.3}"),
        Object::Name(n) => {
            writer.write_all(b"/")?;
            writer.write_all(n)
        }
        Object::String(s, StringFormat::Literal) => {
            writer.write_all(b"(")?;
            for &byte in s {
                if matches!(byte, b'(' | b')' | b'\\') {
                    writer.write_all(b"\\")?;
                }
                writer.write_all(&[byte])?;
            }
            writer.write_all(b")")
        }
        Object::String(s, StringFormat::Hexadecimal) => {
            writer.write_all(b"<")?;
            for byte in s {
                write!(writer, "{byte:02X}")?;
            }
            writer.write_all(b">")
        }
        Object::Array(items) => {
            writer.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    writer.write_all(b" ")?;
                }
                write_object(writer, item)?;
            }
            writer.write_all(b"]")
        }
        Object::Dictionary(dict) => write_dictionary(writer, dict),
        Object::Stream(stream) => {
            let mut dict = stream.dict.clone();
            dict.set("Length", stream.content.len() as i64);
            write_dictionary(writer, &dict)?;
            writer.write_all(b"\nstream\n")?;
            writer.write_all(&stream.content)?;
            writer.write_all(b"\nendstream")
        }
        Object::Reference(id) => write!(writer, "{} {} R", id.0, id.1),
    }
}

fn write_dictionary(writer: &mut dyn Write, dict: &Dictionary) -> io::Result<()> {
    writer.write_all(b"<<")?;
    for (key, value) in dict.iter() {
        writer.write_all(b"/")?;
        writer.write_all(key)?;
        writer.write_all(b" ")?;
        write_object(writer, value)?;
        writer.write_all(b" ")?;
    }
    writer.write_all(b">>")
}
