//! Streaming PDF response bodies.
//!
//! The document is encoded on a blocking thread. Bytes travel to the response
//! body through a bounded channel, so a slow client stalls the encoder instead
//! of buffering the whole document in memory.

use std::io::{self, BufWriter, Write};

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use score_preview::{AssemblyReport, PreviewResult};

use crate::types::{ApiError, ApiResult};

/// Chunks buffered between encoder and body.
const CHANNEL_CAPACITY: usize = 16;
/// Size of each chunk sent to the body.
const CHUNK_SIZE: usize = 64 * 1024;

type Chunk = Result<Bytes, io::Error>;

/// `Write` adapter feeding a response body channel.
pub struct ChannelWriter {
    tx: mpsc::Sender<Chunk>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writer handed to the document builder.
pub type PdfSink = BufWriter<ChannelWriter>;

/// Start `build` on a blocking thread and return a streaming `application/pdf`
/// response, plus a handle that resolves once the document is complete.
///
/// If `build` fails partway, the body is terminated with an error so the
/// client sees a truncated transfer rather than a silently short file.
pub fn pdf_response<F>(
    filename: &str,
    build: F,
) -> ApiResult<(Response, JoinHandle<PreviewResult<AssemblyReport>>)>
where
    F: FnOnce(PdfSink) -> PreviewResult<AssemblyReport> + Send + 'static,
{
    let disposition = HeaderValue::from_str(&content_disposition(filename))
        .map_err(|e| ApiError::Internal(format!("bad Content-Disposition: {e}")))?;

    let (tx, rx) = mpsc::channel::<Chunk>(CHANNEL_CAPACITY);
    let error_tx = tx.clone();

    let task = tokio::task::spawn_blocking(move || {
        let sink = BufWriter::with_capacity(CHUNK_SIZE, ChannelWriter { tx });
        let result = build(sink);
        if let Err(e) = &result {
            // the receiver may already be gone
            let err = io::Error::new(io::ErrorKind::Other, e.to_string());
            let _ = error_tx.blocking_send(Err(err));
        }
        result
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((response, task))
}

/// Download filename for a cached item: `{identifier}[ - {title}].pdf`.
pub fn document_filename(identifier: &str, title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        format!("{identifier}.pdf")
    } else {
        format!("{identifier} - {title}.pdf")
    }
}

/// `attachment` disposition with an ASCII `filename` and, when needed, a
/// UTF-8 `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    if fallback == filename {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_with_title() {
        assert_eq!(
            document_filename("M20815", "Joyful Ring"),
            "M20815 - Joyful Ring.pdf"
        );
    }

    #[test]
    fn test_filename_without_title() {
        assert_eq!(document_filename("M20815", ""), "M20815.pdf");
        assert_eq!(document_filename("M20815", "   "), "M20815.pdf");
    }

    #[test]
    fn test_plain_disposition() {
        assert_eq!(
            content_disposition("M1 - Title.pdf"),
            "attachment; filename=\"M1 - Title.pdf\""
        );
    }

    #[test]
    fn test_quotes_are_replaced() {
        assert_eq!(
            content_disposition("M1 - \"Hi\".pdf"),
            "attachment; filename=\"M1 - _Hi_.pdf\"; filename*=UTF-8''M1%20-%20%22Hi%22.pdf"
        );
    }

    #[test]
    fn test_non_ascii_gets_extended_form() {
        let value = content_disposition("M1 - Noël.pdf");
        assert!(value.starts_with("attachment; filename=\"M1 - No_l.pdf\""));
        assert!(value.ends_with("filename*=UTF-8''M1%20-%20No%C3%ABl.pdf"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[tokio::test]
    async fn test_body_carries_written_bytes() {
        let (response, task) = pdf_response("x.pdf", |mut sink| {
            sink.write_all(b"%PDF-test")?;
            sink.flush()?;
            Ok(AssemblyReport::default())
        })
        .unwrap();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"%PDF-test");
        assert!(task.await.unwrap().is_ok());
    }
}
