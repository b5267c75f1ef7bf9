//! Compression sniffing and decompression.
//!
//! Nitro resources inside archives are frequently stored BIOS-compressed.
//! There is no container-level "compressed" flag; the only signal is that a
//! blob's leading bytes are not a known resource magic. Callers therefore
//! sniff with [`is_likely_compressed`] and, when it fires, run
//! [`decompress`] before handing the bytes to a parser.
//!
//! ## Submodules
//!
//! | Module | Algorithm | Typical use in nitrokit |
//! |--------|-----------|-------------------------|
//! | [`lz`] | BIOS LZSS (type 0x10) and its extended-length variant (type 0x11) | Archive sub-files |
//!
//! Decompression failure is a hard [`crate::Error::Decompress`]; the archive
//! decoder records it on the affected member instead of aborting the whole
//! archive.

pub mod lz;

use crate::Result;
use crate::formats::is_known_tag;

/// Heuristic: does this blob need decompression before parsing?
///
/// True whenever the leading 4 bytes do not match any known resource magic.
/// Blobs shorter than a magic tag cannot be sniffed and are reported as not
/// compressed; parsing them fails on its own terms.
pub fn is_likely_compressed(data: &[u8]) -> bool {
    match data.first_chunk::<4>() {
        Some(tag) => !is_known_tag(tag),
        None => false,
    }
}

/// Decompress a BIOS-compressed blob.
///
/// Dispatches on the stream type byte: `0x10` for LZSS, `0x11` for the
/// extended-length variant. Any other type byte, malformed token, or
/// output-length mismatch yields [`crate::Error::Decompress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    lz::decompress_lz(data)
}
