//! # Line framing
//!
//! Commands arrive one per line on stdin. Fragments leave as one JSON value
//! followed by a blank line on stdout, flushed as soon as they are written so
//! a downstream reader sees them while the command is still running.

use crate::error::{input_invalid, serialization_error, Error, Result};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Frame terminator after each JSON fragment
pub const FRAME_SUFFIX: &[u8] = b"\n\n";

/// Reads commands from a line-oriented byte stream.
pub struct CommandReader<R> {
    inner: R,
    buf: Vec<u8>,
    lines_read: usize,
}

impl<R: AsyncBufRead + Unpin> CommandReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            lines_read: 0,
        }
    }

    /// Read the next command, or `None` once the input is closed.
    ///
    /// A line that is not valid UTF-8 is consumed and reported as an
    /// `InputInvalid` error; the following call continues with the next line.
    pub async fn next_command(&mut self) -> Result<Option<String>> {
        self.buf.clear();
        let n = self
            .inner
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| Error::from(e).with_operation("wire::next_command"))?;
        if n == 0 {
            return Ok(None);
        }
        self.lines_read += 1;

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        match String::from_utf8(std::mem::take(&mut self.buf)) {
            Ok(line) => Ok(Some(line)),
            Err(e) => {
                let reason = e.utf8_error().to_string();
                Err(input_invalid(self.lines_read, reason).set_source(e))
            }
        }
    }

    /// Number of lines consumed so far, including undecodable ones
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }
}

/// Writes serialized fragments, flushing after each one.
pub struct FragmentWriter<W> {
    inner: W,
    written: usize,
}

impl<W: AsyncWrite + Unpin> FragmentWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub async fn write<T: Serialize + ?Sized>(&mut self, fragment: &T) -> Result<()> {
        let mut frame = serde_json::to_vec(fragment).map_err(serialization_error)?;
        frame.extend_from_slice(FRAME_SUFFIX);

        self.inner
            .write_all(&frame)
            .await
            .map_err(|e| Error::from(e).with_operation("wire::write"))?;
        self.inner
            .flush()
            .await
            .map_err(|e| Error::from(e).with_operation("wire::flush"))?;

        self.written += 1;
        Ok(())
    }

    /// Number of fragments written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fragment::ResponseFragment;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_reads_lines_until_eof() {
        let input: &[u8] = b"list files\r\n\nlast line without newline";
        let mut reader = CommandReader::new(input);

        assert_eq!(reader.next_command().await.unwrap().as_deref(), Some("list files"));
        assert_eq!(reader.next_command().await.unwrap().as_deref(), Some(""));
        assert_eq!(
            reader.next_command().await.unwrap().as_deref(),
            Some("last line without newline")
        );
        assert_eq!(reader.next_command().await.unwrap(), None);
        assert_eq!(reader.lines_read(), 3);
    }

    #[tokio::test]
    async fn test_line_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"what time ")
            .read(b"is it?\nnext")
            .read(b"\n")
            .build();
        let mut reader = CommandReader::new(BufReader::new(mock));

        assert_eq!(reader.next_command().await.unwrap().as_deref(), Some("what time is it?"));
        assert_eq!(reader.next_command().await.unwrap().as_deref(), Some("next"));
        assert_eq!(reader.next_command().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_skipped() {
        let input: &[u8] = b"ok\n\xff\xfe\nafter\n";
        let mut reader = CommandReader::new(input);

        assert_eq!(reader.next_command().await.unwrap().as_deref(), Some("ok"));

        let err = reader.next_command().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InputInvalid);
        assert_eq!(err.context()[0], ("line", "2".to_string()));

        assert_eq!(reader.next_command().await.unwrap().as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_fragment_framing() {
        let mut writer = FragmentWriter::new(Vec::new());
        writer.write(&ResponseFragment::Message("hi".into())).await.unwrap();
        writer.write(&ResponseFragment::EndOfExecution(true)).await.unwrap();
        assert_eq!(writer.written(), 2);

        let out = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(out, "{\"message\":\"hi\"}\n\n{\"end_of_execution\":true}\n\n");
    }

    #[tokio::test]
    async fn test_opaque_values_pass_through() {
        let mut writer = FragmentWriter::new(Vec::new());
        writer.write(&serde_json::json!({"anything": [1, 2]})).await.unwrap();
        assert_eq!(writer.into_inner(), b"{\"anything\":[1,2]}\n\n");
    }
}
