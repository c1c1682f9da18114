//! gzip (deflate) compression using flate2
//!
//! Vault payloads are compressed before encryption; ciphertext is high-entropy
//! and would not shrink.

use bytes::{BufMut, Bytes, BytesMut};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{self, Read, Write};

// smallest buffer we will create to uncompress into
const MIN_UNCOMPRESS_BUFSIZE: usize = 8196;

#[derive(Debug, Default)]
pub struct Compressor {
    level: Compression,
}

impl Compressor {
    pub fn new() -> Self {
        Self {
            level: Compression::default(),
        }
    }

    /// Compress the slice into a gzip stream.
    /// Pass in a writer, ideally preallocated to the expected size of compressed output.
    pub fn from_buf(&self, reader: &[u8], writer: &mut BytesMut) -> Result<(), io::Error> {
        let mut enc = GzEncoder::new(writer.writer(), self.level);
        enc.write_all(reader)?;
        let _ = enc.finish()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Uncompressor {}

impl Uncompressor {
    /// Create a new uncompressor
    pub fn new() -> Self {
        Self {}
    }

    /// Uncompress the slice.
    /// 'writer' grows as needed; its initial capacity is only a hint.
    pub fn from_slice(&self, reader: &[u8], writer: &mut BytesMut) -> Result<(), io::Error> {
        let mut out = Vec::with_capacity(std::cmp::max(writer.capacity(), MIN_UNCOMPRESS_BUFSIZE));
        let _ = GzDecoder::new(reader).read_to_end(&mut out)?;
        writer.extend_from_slice(&out);
        Ok(())
    }
}

/// Compress bytes with default settings
pub fn compress(data: &[u8]) -> Result<Bytes, io::Error> {
    let mut buf = BytesMut::with_capacity(data.len() / 2 + 64);
    Compressor::new().from_buf(data, &mut buf)?;
    Ok(buf.freeze())
}

/// Uncompress bytes produced by `compress`
pub fn decompress(data: &[u8]) -> Result<Bytes, io::Error> {
    let mut buf = BytesMut::new();
    Uncompressor::new().from_slice(data, &mut buf)?;
    Ok(buf.freeze())
}
