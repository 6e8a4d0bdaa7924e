//! Async plumbing: a translating writer and a reader-to-writer pump.

use crate::{Rules, Translator};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read size used by [`pump`].
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Writer that translates everything written through it.
///
/// Bytes that might still complete a needle are buffered internally, so the
/// writer must be consumed with [`TranslatingWriter::finish`] to emit them.
#[derive(Debug)]
pub struct TranslatingWriter<W> {
    inner: W,
    translator: Translator,
    buf: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> TranslatingWriter<W> {
    /// Wrap `inner` with the given rules.
    pub fn new(inner: W, rules: Arc<Rules>) -> Self {
        Self {
            inner,
            translator: Translator::new(rules),
            buf: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    /// Translate and forward a chunk.
    ///
    /// # Errors
    ///
    /// Returns the underlying writer's error.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.buf.clear();
        self.translator.feed(chunk, &mut self.buf);
        if self.buf.is_empty() {
            return Ok(());
        }
        self.inner.write_all(&self.buf).await
    }

    /// Emit any held-back bytes, flush, and hand back the inner writer.
    ///
    /// # Errors
    ///
    /// Returns the underlying writer's error.
    pub async fn finish(mut self) -> io::Result<W> {
        self.buf.clear();
        self.translator.finish(&mut self.buf);
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf).await?;
        }
        self.inner.flush().await?;
        Ok(self.inner)
    }
}

/// Copy `reader` to `writer` through the rules until end of input.
///
/// The writer is always finished, including when reading fails part way;
/// the read error then takes precedence over any error from finishing.
///
/// # Errors
///
/// Returns the first read or write error encountered.
pub async fn pump<R, W>(mut reader: R, writer: W, rules: Arc<Rules>) -> io::Result<W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut writer = TranslatingWriter::new(writer, rules);
    let mut chunk = vec![0u8; CHUNK_SIZE];

    let copied = loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break Ok(()),
            Ok(n) => {
                if let Err(e) = writer.write_chunk(&chunk[..n]).await {
                    break Err(e);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => break Err(e),
        }
    };

    let finished = writer.finish().await;
    if let Err(e) = copied {
        tracing::debug!(error = %e, "translated stream ended with an error");
        return Err(e);
    }
    finished
}
