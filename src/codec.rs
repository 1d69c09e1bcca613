//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Wire helpers for POP3 multi-line responses
//!
//! Multi-line responses are terminated by a line containing only `.` and
//! require transparency: a body line that begins with `.` is sent with an
//! extra leading `.` (RFC 1939 §3). [`DotWriter`] implements the stuffing
//! and the terminator for streamed bodies (RETR); [`copy_headers_and_body`]
//! implements the header/body truncation used by TOP.

use bytes::{BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Staged bytes are written through once the buffer grows past this.
const FLUSH_THRESHOLD: usize = 8 * 1024;

/// Dot-stuffing writer for streamed multi-line response bodies.
///
/// Bytes fed to [`write`](Self::write) are normalized so every line ends
/// with CRLF (a bare LF becomes CRLF, a CR followed by LF passes through,
/// a lone CR is forwarded verbatim) and any line-initial `.` is doubled.
/// [`close`](Self::close) terminates an unterminated final line, writes the
/// `.` terminator exactly once (it consumes the writer) and flushes.
pub struct DotWriter<'a, W: AsyncWrite + Unpin> {
    inner: &'a mut W,
    buf: BytesMut,
    at_line_start: bool,
    pending_cr: bool,
}

impl<'a, W: AsyncWrite + Unpin> DotWriter<'a, W> {
    /// Create a writer staging into an internal buffer over `inner`.
    pub fn new(inner: &'a mut W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(FLUSH_THRESHOLD + 16),
            at_line_start: true,
            pending_cr: false,
        }
    }

    /// Process and stage a chunk of message bytes.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        for &byte in data {
            match byte {
                b'\n' => {
                    self.pending_cr = false;
                    self.buf.put_slice(b"\r\n");
                    self.at_line_start = true;
                }
                b'\r' => {
                    if self.pending_cr {
                        // lone CR, not a line ending
                        self.buf.put_u8(b'\r');
                    }
                    self.pending_cr = true;
                    self.at_line_start = false;
                }
                _ => {
                    if self.pending_cr {
                        self.buf.put_u8(b'\r');
                        self.pending_cr = false;
                    }
                    if byte == b'.' && self.at_line_start {
                        self.buf.put_slice(b"..");
                    } else {
                        self.buf.put_u8(byte);
                    }
                    self.at_line_start = false;
                }
            }
        }
        if self.buf.len() >= FLUSH_THRESHOLD {
            self.flush_staged().await?;
        }
        Ok(())
    }

    /// Finish the body: terminate the last line if needed, write `.` CRLF
    /// and flush everything through.
    pub async fn close(mut self) -> io::Result<()> {
        if self.pending_cr {
            self.buf.put_u8(b'\r');
            self.at_line_start = false;
        }
        if !self.at_line_start {
            self.buf.put_slice(b"\r\n");
        }
        self.buf.put_slice(b".\r\n");
        self.flush_staged().await?;
        self.inner.flush().await
    }

    async fn flush_staged(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf).await?;
            self.buf.clear();
        }
        Ok(())
    }
}

/// Copy email headers and a limited number of body lines from `r` to `w`.
///
/// Every line up to and including the first empty line (the header/body
/// separator) is copied, then at most `line_limit` body lines. Emitted
/// lines are re-terminated with CRLF regardless of the input's endings.
/// Input that ends inside the headers is copied as-is; no separator is
/// synthesized. The caller writes the `.` terminator.
pub async fn copy_headers_and_body<W, R>(w: &mut W, r: R, line_limit: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(r);
    let mut line = Vec::new();
    let mut headers_done = false;
    let mut body_lines = 0usize;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.ends_with(b"\n") {
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
        }

        if !headers_done {
            if line.is_empty() {
                headers_done = true;
            }
        } else {
            body_lines += 1;
            if body_lines > line_limit {
                break;
            }
        }

        w.write_all(&line).await?;
        w.write_all(b"\r\n").await?;
    }

    Ok(())
}
