//! Owned, growable byte buffer used to stage one HTTP message at a time.
//!
//! Grounded in `original_source/server/cmd/proxy/buffer.go`'s `Buffer` type
//! (`buffer []byte`, `length int`, `Recv`/`Recvall`/`Send`), reworked as an
//! owned `Vec<u8>` rather than the teacher's `'static`-lifetime zero-copy
//! slices (`src/http/types.rs`): a `WireRewriter` pass can replace the buffer
//! wholesale on an operator `Forward`, which the teacher's connection-reuse
//! invariants don't need to support. What's kept from the teacher is the
//! shape: a fixed starting capacity, geometric growth on overflow, and a
//! `valid_length` distinct from the backing allocation's capacity.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Starting capacity for a freshly constructed `ByteBuffer` (spec.md §6).
pub const DEFAULT_CAPACITY: usize = 65_535;

/// One HTTP message's raw bytes, read from or destined for a socket.
pub struct ByteBuffer {
    buffer: Vec<u8>,
    valid_length: usize,
}

impl ByteBuffer {
    /// A buffer pre-sized to `DEFAULT_CAPACITY`, empty.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buffer: vec![0u8; capacity],
            valid_length: 0,
        }
    }

    /// Wrap pre-existing bytes, e.g. an operator's `Forward` replacement.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let valid_length = bytes.len();
        ByteBuffer {
            buffer: bytes,
            valid_length,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.valid_length]
    }

    pub fn len(&self) -> usize {
        self.valid_length
    }

    pub fn is_empty(&self) -> bool {
        self.valid_length == 0
    }

    pub fn clear(&mut self) {
        self.valid_length = 0;
    }

    /// One `read()` call's worth of bytes. Returns `Ok(0)` on EOF, matching
    /// the teacher's `Recv`/the Go original's single-shot `conn.Read`.
    pub async fn recv_once(&mut self, conn: &mut TcpStream) -> io::Result<usize> {
        if self.valid_length == self.buffer.len() {
            self.grow();
        }
        let n = conn.read(&mut self.buffer[self.valid_length..]).await?;
        self.valid_length += n;
        Ok(n)
    }

    /// Read until the peer closes its write half, growing geometrically as
    /// needed. Mirrors `Recvall`'s loop over `ReadAll`; unlike the Go
    /// original this does not assume a framing boundary — callers that need
    /// exactly one HTTP message must stop pulling once `WireRewriter` reports
    /// the message as complete (see `wire::message_complete`).
    pub async fn recv_all(&mut self, conn: &mut TcpStream) -> io::Result<usize> {
        let start = self.valid_length;
        loop {
            if self.valid_length == self.buffer.len() {
                self.grow();
            }
            let n = conn.read(&mut self.buffer[self.valid_length..]).await?;
            if n == 0 {
                break;
            }
            self.valid_length += n;
        }
        Ok(self.valid_length - start)
    }

    pub async fn send(&self, conn: &mut TcpStream) -> io::Result<()> {
        conn.write_all(self.as_slice()).await?;
        conn.flush().await
    }

    fn grow(&mut self) {
        let new_len = (self.buffer.len() * 2).max(DEFAULT_CAPACITY);
        self.buffer.resize(new_len, 0);
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}
