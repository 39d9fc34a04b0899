//! Form body parsing
//!
//! Turns a `multipart/form-data` or `application/x-www-form-urlencoded` request body
//! into [`FormData`]. Every value is tagged up front as either a plain text field or
//! an uploaded attachment, so handlers never have to guess what they were given.
//! Attachments are spooled to anonymous temporary files as they arrive and are
//! never held in memory as a whole.

use futures::{Stream, StreamExt};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use multer::{Constraints, Multipart, SizeLimit};
use std::error::Error as StdError;
use std::io::{self, SeekFrom};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::error::{FsApiError, Result};
use crate::logger;

/// One form value
#[derive(Debug)]
pub enum FieldValue {
    /// Plain text field
    Text(String),
    /// Uploaded file
    File(Attachment),
}

/// An uploaded file backed by a temporary file that disappears on drop
#[derive(Debug)]
pub struct Attachment {
    file_name: String,
    spool: std::fs::File,
    size: u64,
}

impl Attachment {
    /// Write every chunk of `chunks` to a fresh temporary file
    pub async fn spool<S>(file_name: String, chunks: S) -> Result<Self>
    where
        S: Stream<Item = Result<Bytes>>,
    {
        let spool = tokio::task::spawn_blocking(tempfile::tempfile)
            .await
            .map_err(io::Error::other)??;
        let mut writer = File::from_std(spool);
        let mut size = 0u64;

        let mut chunks = std::pin::pin!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        writer.flush().await?;

        Ok(Self {
            file_name,
            spool: writer.into_std().await,
            size,
        })
    }

    /// Client-side name of the upload
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Reader positioned at the first byte
    pub async fn open(&self) -> io::Result<File> {
        let mut reader = File::from_std(self.spool.try_clone()?);
        reader.seek(SeekFrom::Start(0)).await?;
        Ok(reader)
    }
}

/// Bytes to store for a `content` field
#[derive(Debug, Clone, Copy)]
pub enum Content<'a> {
    Text(&'a str),
    File(&'a Attachment),
}

impl Content<'_> {
    /// Copy everything into `dest` and flush it; returns the byte count
    pub async fn write_to(self, dest: &mut File) -> io::Result<u64> {
        let written = match self {
            Self::Text(text) => {
                dest.write_all(text.as_bytes()).await?;
                text.len() as u64
            }
            Self::File(attachment) => {
                let mut reader = attachment.open().await?;
                tokio::io::copy(&mut reader, dest).await?
            }
        };
        dest.flush().await?;
        Ok(written)
    }
}

/// Parsed form fields in body order
#[derive(Debug, Default)]
pub struct FormData {
    fields: Vec<(String, FieldValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field (later duplicates never shadow earlier ones)
    #[must_use]
    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.push((name.to_string(), value));
        self
    }

    #[must_use]
    pub fn with_text(self, name: &str, value: &str) -> Self {
        self.with(name, FieldValue::Text(value.to_string()))
    }

    /// First non-empty text field with this name
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|(n, v)| match v {
            FieldValue::Text(t) if n == name && !t.is_empty() => Some(t.as_str()),
            _ => None,
        })
    }

    /// First attachment with this name
    pub fn file(&self, name: &str) -> Option<&Attachment> {
        self.fields.iter().find_map(|(n, v)| match v {
            FieldValue::File(attachment) if n == name => Some(attachment),
            _ => None,
        })
    }

    /// Content for `name`: an attachment wins over a text field
    pub fn content(&self, name: &str) -> Option<Content<'_>> {
        self.file(name)
            .map(Content::File)
            .or_else(|| self.text(name).map(Content::Text))
    }

    /// Read and parse a request body
    ///
    /// `content_type` is the raw `Content-Type` header. Bodies of any other type
    /// yield an empty form. At most `limit` bytes are read.
    pub async fn from_body<B>(content_type: Option<&str>, body: B, limit: usize) -> Result<Self>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let Some(content_type) = content_type else {
            return Ok(Self::new());
        };

        match media_type(content_type).as_str() {
            "multipart/form-data" => {
                let boundary = multer::parse_boundary(content_type)
                    .map_err(|e| FsApiError::BadRequest(format!("invalid multipart body: {e}")))?;
                parse_multipart(body, boundary, limit).await
            }
            "application/x-www-form-urlencoded" => {
                let bytes = read_body(body, limit).await?;
                Ok(parse_urlencoded(&bytes))
            }
            _ => Ok(Self::new()),
        }
    }
}

/// Collect a body, refusing anything over `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(FsApiError::PayloadTooLarge)
        }
        Err(e) => Err(FsApiError::BadRequest(format!("failed to read body: {e}"))),
    }
}

fn parse_urlencoded(bytes: &[u8]) -> FormData {
    form_urlencoded::parse(bytes).fold(FormData::new(), |form, (k, v)| form.with_text(&k, &v))
}

async fn parse_multipart<B>(body: B, boundary: String, limit: usize) -> Result<FormData>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let constraints =
        Constraints::new().size_limit(SizeLimit::new().whole_stream(limit as u64));
    let mut multipart =
        Multipart::with_constraints(body.into_data_stream(), boundary, constraints);
    let mut form = FormData::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(ToString::to_string) else {
            continue;
        };

        let value = match field.file_name().map(ToString::to_string) {
            Some(file_name) => {
                let attachment =
                    Attachment::spool(file_name, field.map(|c| c.map_err(multipart_error)))
                        .await?;
                logger::log_debug(&format!(
                    "Spooled attachment '{}' for field '{name}' ({} bytes)",
                    attachment.file_name(),
                    attachment.size()
                ));
                FieldValue::File(attachment)
            }
            None => {
                let data = field.bytes().await.map_err(multipart_error)?;
                let text = String::from_utf8(data.to_vec()).map_err(|_| {
                    FsApiError::BadRequest(format!("field '{name}' is not valid UTF-8"))
                })?;
                FieldValue::Text(text)
            }
        };
        form = form.with(&name, value);
    }

    Ok(form)
}

#[allow(clippy::needless_pass_by_value)]
fn multipart_error(e: multer::Error) -> FsApiError {
    match e {
        multer::Error::StreamSizeExceeded { .. } => FsApiError::PayloadTooLarge,
        other => FsApiError::BadRequest(format!("invalid multipart body: {other}")),
    }
}

/// Lowercased media type without parameters
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use tokio::io::AsyncReadExt;

    const BOUNDARY: &str = "X-BOUNDARY";

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Full<Bytes> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Full::new(Bytes::from(body))
    }

    fn multipart_type() -> String {
        format!("multipart/form-data; boundary={BOUNDARY}")
    }

    async fn read_attachment(attachment: &Attachment) -> Vec<u8> {
        let mut buf = Vec::new();
        attachment
            .open()
            .await
            .unwrap()
            .read_to_end(&mut buf)
            .await
            .unwrap();
        buf
    }

    async fn content_bytes(content: Content<'_>) -> Vec<u8> {
        match content {
            Content::Text(text) => text.as_bytes().to_vec(),
            Content::File(attachment) => read_attachment(attachment).await,
        }
    }

    #[tokio::test]
    async fn test_multipart_tags_files_and_text() {
        let body = multipart_body(&[
            ("type", None, b"inode/directory"),
            ("content", Some("a.bin"), &[0, 1, 2, 255]),
        ]);
        let form = FormData::from_body(Some(&multipart_type()), body, 1024)
            .await
            .unwrap();

        assert_eq!(form.text("type"), Some("inode/directory"));
        let attachment = form.file("content").unwrap();
        assert_eq!(attachment.file_name(), "a.bin");
        assert_eq!(attachment.size(), 4);
        assert_eq!(read_attachment(attachment).await, [0, 1, 2, 255]);
    }

    #[tokio::test]
    async fn test_attachment_beats_text_field() {
        let body = multipart_body(&[
            ("content", None, b"from text"),
            ("content", Some("c.txt"), b"from file"),
        ]);
        let form = FormData::from_body(Some(&multipart_type()), body, 1024)
            .await
            .unwrap();

        let content = form.content("content").unwrap();
        assert_eq!(content_bytes(content).await, b"from file");
    }

    #[tokio::test]
    async fn test_attachment_can_be_read_twice() {
        let chunks = futures::stream::iter([
            Ok(Bytes::from_static(b"chunk one, ")),
            Ok(Bytes::from_static(b"chunk two")),
        ]);
        let attachment = Attachment::spool("two.txt".to_string(), chunks).await.unwrap();

        assert_eq!(attachment.size(), 20);
        assert_eq!(read_attachment(&attachment).await, b"chunk one, chunk two");
        assert_eq!(read_attachment(&attachment).await, b"chunk one, chunk two");
    }

    #[tokio::test]
    async fn test_content_write_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("out.bin");

        let chunks = futures::stream::iter([Ok(Bytes::from_static(&[9, 8, 7]))]);
        let attachment = Attachment::spool("in.bin".to_string(), chunks).await.unwrap();
        let mut file = File::create(&target).await.unwrap();
        let written = Content::File(&attachment).write_to(&mut file).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(std::fs::read(&target).unwrap(), [9, 8, 7]);
    }

    #[tokio::test]
    async fn test_urlencoded_fields() {
        let body = Full::new(Bytes::from("path=%2Fnew%2Fname.txt&content=hello+world"));
        let form = FormData::from_body(
            Some("application/x-www-form-urlencoded; charset=UTF-8"),
            body,
            1024,
        )
        .await
        .unwrap();

        assert_eq!(form.text("path"), Some("/new/name.txt"));
        assert_eq!(content_bytes(form.content("content").unwrap()).await, b"hello world");
        assert!(form.file("content").is_none());
    }

    #[tokio::test]
    async fn test_empty_text_counts_as_absent() {
        let form = FormData::new().with_text("content", "");
        assert!(form.content("content").is_none());

        let empty = Attachment::spool("empty.txt".to_string(), futures::stream::empty())
            .await
            .unwrap();
        let form = FormData::new().with("content", FieldValue::File(empty));
        let content = form.content("content").unwrap();
        assert!(matches!(content, Content::File(a) if a.size() == 0));
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_empty() {
        let body = Full::new(Bytes::from("{\"content\":\"x\"}"));
        let form = FormData::from_body(Some("application/json"), body, 1024)
            .await
            .unwrap();
        assert!(form.content("content").is_none());

        let form = FormData::from_body(None, Full::new(Bytes::new()), 1024)
            .await
            .unwrap();
        assert!(form.fields.is_empty());
    }

    #[tokio::test]
    async fn test_body_over_limit() {
        let body = Full::new(Bytes::from("content=0123456789"));
        let err = FormData::from_body(Some("application/x-www-form-urlencoded"), body, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, FsApiError::PayloadTooLarge));
    }

    #[tokio::test]
    async fn test_multipart_over_limit() {
        let body = multipart_body(&[("content", Some("big.bin"), &[0u8; 4096])]);
        let err = FormData::from_body(Some(&multipart_type()), body, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, FsApiError::PayloadTooLarge));
    }

    #[tokio::test]
    async fn test_missing_boundary_is_bad_request() {
        let body = Full::new(Bytes::from("whatever"));
        let err = FormData::from_body(Some("multipart/form-data"), body, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, FsApiError::BadRequest(_)));
    }
}
