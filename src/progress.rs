//! Upload progress reporting for outbound request bodies
//!
//! [`ProgressBody`] decorates any [`RequestBody`] and counts the bytes
//! written through it, invoking an [`UploadListener`] once per chunk without
//! altering the bytes delivered downstream. Most useful for tracking the
//! upload of large multipart requests.
//!
//! The write path runs on whichever single thread drives the transport
//! (typically a background I/O thread); the listener is invoked inline with
//! each chunk and must not block materially or it will throttle the write.

use std::io::{self, Write};

/// An outbound request body
///
/// Collaborator contract consumed by the decorator. `content_length` returns
/// `None` when the total size is unknown (a streaming source); `write_to`
/// pushes every byte through the provided sink in one or more chunks.
pub trait RequestBody: Send {
    /// MIME type of the body, if known
    fn content_type(&self) -> Option<&str>;

    /// Total length in bytes, or `None` when unknown
    fn content_length(&self) -> Option<u64>;

    /// Write the entire body to `sink`
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the sink unchanged.
    fn write_to(&self, sink: &mut dyn Write) -> io::Result<()>;
}

/// Receiver of upload progress
///
/// Invoked once per chunk with the running total, the resolved total length
/// (`None` when unknown), and whether the upload just finished. Implemented
/// for any matching closure.
pub trait UploadListener: Send + Sync {
    /// One chunk of `bytes_written - previous` bytes was written
    fn on_upload(&self, bytes_written: u64, total_length: Option<u64>, done: bool);
}

impl<F> UploadListener for F
where
    F: Fn(u64, Option<u64>, bool) + Send + Sync,
{
    fn on_upload(&self, bytes_written: u64, total_length: Option<u64>, done: bool) {
        self(bytes_written, total_length, done);
    }
}

/// Per-write counting state
///
/// Owned by the counting sink for the duration of one `write_to`. The total
/// length is resolved lazily on the first chunk and cached: one authoritative
/// query per write, even if the delegate's answer is expensive or unstable.
#[derive(Debug, Default)]
struct ProgressState {
    bytes_written: u64,
    /// `None` until resolved; `Some(None)` when the delegate reported unknown
    total_length: Option<Option<u64>>,
    done_fired: bool,
}

/// Decorates a request body to report upload progress
///
/// Transparent: `content_type`, `content_length`, and the bytes written
/// downstream are all unchanged. With a known content length, `done` is true
/// on exactly the chunk where the running total first reaches it. With an
/// unknown length the equality rule can never fire, so one final
/// `on_upload(total_written, None, true)` is emitted after the delegate's
/// write completes successfully; nothing extra is emitted on the error path.
///
/// # Examples
///
/// ```
/// use call_guard::{BytesBody, ProgressBody, RequestBody};
///
/// # fn main() -> std::io::Result<()> {
/// let body = BytesBody::new(vec![0u8; 1024]).with_content_type("application/octet-stream");
/// let progress = ProgressBody::new(body, |written: u64, total: Option<u64>, done: bool| {
///     println!("{written} of {total:?} (done: {done})");
/// });
///
/// let mut sink = Vec::new();
/// progress.write_to(&mut sink)?;
/// assert_eq!(sink.len(), 1024);
/// # Ok(())
/// # }
/// ```
pub struct ProgressBody<B, L> {
    delegate: B,
    listener: L,
}

impl<B, L> ProgressBody<B, L>
where
    B: RequestBody,
    L: UploadListener,
{
    /// Wrap `delegate`, reporting each chunk written to `listener`
    pub fn new(delegate: B, listener: L) -> Self {
        Self { delegate, listener }
    }

    /// Unwrap, returning the delegate body
    pub fn into_inner(self) -> B {
        self.delegate
    }
}

impl<B, L> RequestBody for ProgressBody<B, L>
where
    B: RequestBody,
    L: UploadListener,
{
    fn content_type(&self) -> Option<&str> {
        self.delegate.content_type()
    }

    fn content_length(&self) -> Option<u64> {
        self.delegate.content_length()
    }

    fn write_to(&self, sink: &mut dyn Write) -> io::Result<()> {
        let mut state = ProgressState::default();
        let mut counting = CountingSink {
            inner: sink,
            body: &self.delegate,
            listener: &self.listener,
            state: &mut state,
        };
        self.delegate.write_to(&mut counting)?;
        counting.flush()?;

        // End-of-stream: when the total length is unknown the per-chunk
        // equality rule cannot fire, so signal completion here instead.
        if !state.done_fired {
            let total = match state.total_length {
                Some(total) => total,
                // Empty body: no chunk ever resolved the length
                None => self.delegate.content_length(),
            };
            if total.is_none() {
                state.done_fired = true;
                tracing::debug!(
                    bytes_written = state.bytes_written,
                    "upload of unknown length finished"
                );
                self.listener.on_upload(state.bytes_written, None, true);
            }
        }
        Ok(())
    }
}

/// Forwarding sink that counts what actually got written
struct CountingSink<'a, B, L> {
    inner: &'a mut dyn Write,
    body: &'a B,
    listener: &'a L,
    state: &'a mut ProgressState,
}

impl<B, L> Write for CountingSink<'_, B, L>
where
    B: RequestBody,
    L: UploadListener,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Count only bytes the inner sink accepted; on error, progress
        // already reported stands and the error passes through untouched.
        let written = self.inner.write(buf)?;
        self.state.bytes_written += written as u64;

        if self.state.total_length.is_none() {
            self.state.total_length = Some(self.body.content_length());
        }
        let total = self.state.total_length.flatten();

        let done = !self.state.done_fired && total == Some(self.state.bytes_written);
        if done {
            self.state.done_fired = true;
        }

        tracing::trace!(
            chunk = written,
            bytes_written = self.state.bytes_written,
            "body chunk written"
        );
        self.listener.on_upload(self.state.bytes_written, total, done);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// In-memory request body backed by a byte buffer
///
/// The simplest [`RequestBody`]; its content length is always known.
pub struct BytesBody {
    data: Vec<u8>,
    content_type: Option<String>,
}

impl BytesBody {
    /// Create a body from a byte buffer
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            content_type: None,
        }
    }

    /// Set the MIME type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl RequestBody for BytesBody {
    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn write_to(&self, sink: &mut dyn Write) -> io::Result<()> {
        sink.write_all(&self.data)
    }
}
