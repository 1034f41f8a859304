use std::io::{self, Read};

use flate2::read::GzDecoder;

const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Inflate gzip input, passing anything else through. Output larger than `limit` is an error.
pub fn uncompress(bytes: &[u8], limit: usize) -> io::Result<Vec<u8>> {
    if !is_gzip(bytes) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)?;
    if out.len() > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("uncompressed bytecode exceeds {limit} bytes"),
        ));
    }
    Ok(out)
}
