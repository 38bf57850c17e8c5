//! Streamed upload parts and the multipart/form-data adapter

use crate::error::{RuntimeError, RuntimeResult};
use bytes::Bytes;
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use std::fmt;

pub type PartBody = BoxStream<'static, RuntimeResult<Bytes>>;

/// Parts in arrival order. Each part must be consumed or dropped before the
/// next one is polled.
pub type PartStream = BoxStream<'static, RuntimeResult<UploadedPart>>;

/// One named part of an upload; the body is read at most once.
pub struct UploadedPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    body: PartBody,
}

impl fmt::Debug for UploadedPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedPart")
            .field("name", &self.name)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl UploadedPart {
    pub fn new<S>(
        name: impl Into<String>,
        filename: Option<String>,
        content_type: Option<String>,
        body: S,
    ) -> Self
    where
        S: Stream<Item = RuntimeResult<Bytes>> + Send + 'static,
    {
        // A failed multipart field keeps erroring on every poll.
        let body = body.scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        });
        Self { name: name.into(), filename, content_type, body: body.boxed() }
    }

    /// Plain text field
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::from_bytes(name, None, None, Bytes::from(value.into()))
    }

    /// Field carrying a JSON document
    pub fn json(name: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::from_bytes(
            name,
            None,
            Some("application/json".to_string()),
            Bytes::from(value.to_string()),
        )
    }

    /// File part with an in-memory body
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: Option<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self::from_bytes(name, Some(filename.into()), content_type, data.into())
    }

    pub fn from_bytes(
        name: impl Into<String>,
        filename: Option<String>,
        content_type: Option<String>,
        data: Bytes,
    ) -> Self {
        Self::new(name, filename, content_type, stream::once(async move { Ok(data) }))
    }

    pub fn is_file(&self) -> bool {
        self.filename.as_deref().is_some_and(|f| !f.is_empty())
    }

    /// Next body chunk, `None` once the part is drained
    pub async fn chunk(&mut self) -> Option<RuntimeResult<Bytes>> {
        self.body.next().await
    }

    fn from_field(field: multer::Field<'static>) -> Self {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.to_string());
        let part_name = name.clone();
        let body = field.map_err(move |err| {
            RuntimeError::malformed(format!("Failed to read part '{part_name}': {err}"))
        });
        Self::new(name, filename, content_type, body)
    }
}

/// Wrap already-built parts as a stream
pub fn part_stream(parts: Vec<UploadedPart>) -> PartStream {
    stream::iter(parts.into_iter().map(Ok)).boxed()
}

/// Decode a multipart/form-data body incrementally.
pub fn multipart_stream<S, O, E>(body: S, boundary: impl Into<String>) -> PartStream
where
    S: Stream<Item = Result<O, E>> + Send + 'static,
    O: Into<Bytes> + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let multipart = multer::Multipart::new(body, boundary);
    stream::unfold(Some(multipart), |state| async move {
        let mut multipart = state?;
        match multipart.next_field().await {
            Ok(Some(field)) => Some((Ok(UploadedPart::from_field(field)), Some(multipart))),
            Ok(None) => None,
            Err(err) => {
                Some((Err(RuntimeError::malformed(format!("Invalid multipart body: {err}"))), None))
            }
        }
    })
    .boxed()
}

/// Extract the boundary from a `multipart/form-data; boundary=...` header value
pub fn boundary_from_content_type(content_type: &str) -> RuntimeResult<String> {
    multer::parse_boundary(content_type)
        .map_err(|err| RuntimeError::malformed(format!("Invalid multipart content type: {err}")))
}
