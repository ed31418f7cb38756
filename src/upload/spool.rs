//! Spooled part buffer
//!
//! A multipart file part is buffered in memory up to a threshold and
//! spills to an anonymous temporary file beyond it. Either way the result
//! is readable and seekable, which the size probe relies on.

use std::io::{self, Cursor, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, AsyncWriteExt, ReadBuf};

enum Storage {
    Memory(Cursor<Vec<u8>>),
    Disk(File),
}

/// Part content held in memory or in a temporary file
pub struct SpooledFile {
    storage: Storage,
    max_memory: usize,
}

impl SpooledFile {
    pub const fn new(max_memory: usize) -> Self {
        Self {
            storage: Storage::Memory(Cursor::new(Vec::new())),
            max_memory,
        }
    }

    /// Whether the content has spilled to disk
    pub const fn is_spilled(&self) -> bool {
        matches!(self.storage, Storage::Disk(_))
    }

    /// Append a chunk, spilling to disk once the threshold is crossed
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        match &mut self.storage {
            Storage::Memory(cursor) if cursor.get_ref().len() + chunk.len() <= self.max_memory => {
                cursor.get_mut().extend_from_slice(chunk);
                Ok(())
            }
            Storage::Memory(cursor) => {
                let buffered = std::mem::take(cursor.get_mut());
                let mut file = spill_file().await?;
                file.write_all(&buffered).await?;
                file.write_all(chunk).await?;
                self.storage = Storage::Disk(file);
                Ok(())
            }
            Storage::Disk(file) => file.write_all(chunk).await,
        }
    }

    /// Flush buffered writes and rewind so the content can be read back
    pub async fn finish(&mut self) -> io::Result<()> {
        if let Storage::Disk(file) = &mut self.storage {
            file.flush().await?;
        }
        self.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }
}

async fn spill_file() -> io::Result<File> {
    let file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(io::Error::other)??;
    Ok(File::from_std(file))
}

/// Size of a seekable stream: seek to the end, note the offset, seek back
/// to the start.
pub async fn probe_size<S>(content: &mut S) -> io::Result<u64>
where
    S: AsyncSeek + Unpin + ?Sized,
{
    let size = content.seek(SeekFrom::End(0)).await?;
    content.seek(SeekFrom::Start(0)).await?;
    Ok(size)
}

impl AsyncRead for SpooledFile {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().storage {
            Storage::Memory(cursor) => Pin::new(cursor).poll_read(cx, buf),
            Storage::Disk(file) => Pin::new(file).poll_read(cx, buf),
        }
    }
}

impl AsyncSeek for SpooledFile {
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        match &mut self.get_mut().storage {
            Storage::Memory(cursor) => Pin::new(cursor).start_seek(position),
            Storage::Disk(file) => Pin::new(file).start_seek(position),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        match &mut self.get_mut().storage {
            Storage::Memory(cursor) => Pin::new(cursor).poll_complete(cx),
            Storage::Disk(file) => Pin::new(file).poll_complete(cx),
        }
    }
}
