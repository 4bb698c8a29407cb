//! Trailing SHA-1 checksums
//!
//! The index, pack and pack index files all end with the SHA-1 of every byte
//! that precedes it.

use crate::errors::{Error, Result};
use sha1::{Digest, Sha1};
use std::io::Write;

pub const CHECKSUM_SIZE: usize = 20;

/// Writer that hashes everything passing through it
#[derive(Debug)]
pub struct Checksum<W> {
    inner: W,
    digest: Sha1,
    written: u64,
}

impl<W: Write> Checksum<W> {
    pub fn new(inner: W) -> Self {
        Checksum {
            inner,
            digest: Sha1::new(),
            written: 0,
        }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.digest.update(data);
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes written so far, excluding the trailer
    pub fn position(&self) -> u64 {
        self.written
    }

    /// Append the checksum and hand back the inner writer with the digest
    pub fn write_checksum(mut self) -> Result<(W, [u8; CHECKSUM_SIZE])> {
        let checksum: [u8; CHECKSUM_SIZE] = self.digest.clone().finalize().into();
        self.inner.write_all(&checksum)?;
        Ok((self.inner, checksum))
    }
}

/// Check the trailing checksum of `data` and return the covered bytes
pub fn verify<'a>(data: &'a [u8], what: &str) -> Result<&'a [u8]> {
    if data.len() < CHECKSUM_SIZE {
        return Err(Error::corrupt(what, "file too short for checksum"));
    }
    let (body, expected) = data.split_at(data.len() - CHECKSUM_SIZE);

    let actual = Sha1::digest(body);
    if actual.as_slice() != expected {
        return Err(Error::corrupt(
            what,
            "checksum does not match value stored on disk",
        ));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn written_trailer_verifies() {
        let mut checksum = Checksum::new(Vec::new());
        checksum.write(b"DIRC").unwrap();
        checksum.write(b"payload").unwrap();
        assert_eq!(checksum.position(), 11);

        let (data, _) = checksum.write_checksum().unwrap();
        assert_eq!(verify(&data, "index").unwrap(), b"DIRCpayload");
    }

    #[test]
    fn flipped_byte_is_corrupt() {
        let mut checksum = Checksum::new(Vec::new());
        checksum.write(b"content").unwrap();
        let (mut data, _) = checksum.write_checksum().unwrap();
        data[0] ^= 1;

        assert!(verify(&data, "index").is_err());
        assert!(verify(b"short", "index").is_err());
    }
}
