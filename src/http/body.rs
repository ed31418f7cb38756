//! Response bodies
//!
//! Every response carries a boxed body: small generated bodies are `Full`,
//! files are streamed from disk in block-sized chunks.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::BytesMut;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes, Frame, SizeHint};
use tokio::fs::File;
use tokio_util::io::poll_read_buf;

pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

const DEFAULT_READ_BUF_SIZE: usize = 8_192;

/// In-memory body
pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty() -> ResponseBody {
    full(Bytes::new())
}

/// Streams exactly `len` bytes of a file, starting at its current position
pub struct FileBody {
    file: File,
    remaining: u64,
    buf: BytesMut,
    buf_size: usize,
}

impl FileBody {
    pub fn new(file: File, len: u64) -> Self {
        // Files smaller than the buffer don't need the whole buffer
        let buf_size = usize::try_from(len)
            .unwrap_or(DEFAULT_READ_BUF_SIZE)
            .clamp(1, DEFAULT_READ_BUF_SIZE);
        Self {
            file,
            remaining: len,
            buf: BytesMut::new(),
            buf_size,
        }
    }

    pub fn boxed(self) -> ResponseBody {
        BodyExt::boxed_unsync(self)
    }
}

impl Body for FileBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Ready(None);
        }
        if this.buf.capacity() - this.buf.len() < this.buf_size {
            this.buf.reserve(this.buf_size);
        }

        let n = match ready!(poll_read_buf(Pin::new(&mut this.file), cx, &mut this.buf)) {
            Ok(n) => n as u64,
            Err(err) => {
                tracing::debug!("file read error: {err}");
                return Poll::Ready(Some(Err(err)));
            }
        };
        if n == 0 {
            tracing::debug!("file read found EOF before expected length");
            this.remaining = 0;
            return Poll::Ready(None);
        }

        let mut chunk = this.buf.split().freeze();
        if n > this.remaining {
            // File grew since it was stat'ed; the announced length wins
            chunk.truncate(usize::try_from(this.remaining).unwrap_or(usize::MAX));
            this.remaining = 0;
        } else {
            this.remaining -= n;
        }
        Poll::Ready(Some(Ok(Frame::data(chunk))))
    }

    fn is_end_stream(&self) -> bool {
        self.remaining == 0
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }
}
