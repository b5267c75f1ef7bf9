//! Parsers for Nitro binary resource formats.
//!
//! Each submodule targets one format family. All parsers follow the same
//! conventions:
//!
//! * **Generic over** [`std::io::Read`] + [`std::io::Seek`] - pass a
//!   [`std::fs::File`], a [`std::io::Cursor`], a memory-mapped region, or
//!   anything else that implements both traits.
//! * **Common header first** - every resource opens with the shared 16-byte
//!   header parsed by [`nitro::NitroHeader`]; sections inside a resource are
//!   located with [`nitro::find_section`], a read-only probe that restores
//!   the reader position.
//! * **Indices, not pixels** - decoders produce palette indices and opaque
//!   attribute words; color lookup and rendering belong to the consumer
//!   (see [`crate::palette`]).
//! * **Compression is separate** - parsers receive already-decompressed
//!   bytes. The [`decode`] front door sniffs and decompresses before
//!   dispatching; hand a parser raw bytes only when you know they are plain.
//!
//! ## Format overview
//!
//! | Module   | Magic  | Description |
//! |----------|--------|-------------|
//! | [`narc`] | `NARC` | Flat asset archive; fans out to the other decoders |
//! | [`ncgr`] | `RGCN` | Indexed 8×8 tile graphics, 4 or 8 bpp |
//! | [`ncer`] | `RECN` | Sprite cell bank (OAM entry groups) |
//! | [`nscr`] | `RCSN` | Tilemap over a companion tile set |
//! | [`nclr`] | `RLCN` | BGR555 palette |

pub mod narc;
pub mod ncer;
pub mod ncgr;
pub mod nclr;
pub mod nitro;
pub mod nscr;

use std::io::Cursor;

use crate::compression;
use crate::{Error, Result};

/// Any decoded Nitro resource.
///
/// A closed union: adding a format means adding a case here and a row to
/// the dispatch registry, nothing else.
#[derive(Debug)]
pub enum Resource {
    /// A NARC archive, members already decoded.
    Archive(narc::Narc),
    /// NCER sprite cell bank.
    Cells(ncer::Ncer),
    /// NCLR palette.
    Palette(nclr::Nclr),
    /// NSCR tilemap.
    Screen(nscr::Nscr),
    /// NCGR tile graphics.
    Tiles(ncgr::Ncgr),
}

/// A decode entry point selected by magic tag.
pub type DecodeFn = fn(&[u8]) -> Result<Resource>;

fn decode_archive(bytes: &[u8]) -> Result<Resource> {
    narc::Narc::parse(&mut Cursor::new(bytes)).map(Resource::Archive)
}

fn decode_cells(bytes: &[u8]) -> Result<Resource> {
    ncer::Ncer::parse(&mut Cursor::new(bytes)).map(Resource::Cells)
}

fn decode_palette(bytes: &[u8]) -> Result<Resource> {
    nclr::Nclr::parse(&mut Cursor::new(bytes)).map(Resource::Palette)
}

fn decode_screen(bytes: &[u8]) -> Result<Resource> {
    nscr::Nscr::parse(&mut Cursor::new(bytes)).map(Resource::Screen)
}

fn decode_tiles(bytes: &[u8]) -> Result<Resource> {
    ncgr::Ncgr::parse(&mut Cursor::new(bytes)).map(Resource::Tiles)
}

/// Magic tag to decoder, one row per supported format.
const REGISTRY: [([u8; 4], DecodeFn); 5] = [
    (narc::MAGIC, decode_archive),
    (ncer::MAGIC, decode_cells),
    (nclr::MAGIC, decode_palette),
    (nscr::MAGIC, decode_screen),
    (ncgr::MAGIC, decode_tiles),
];

/// Look up the decoder for a magic tag.
///
/// Returns [`None`] for an unsupported tag; [`decode`] turns that into
/// [`Error::UnknownFormat`].
pub fn resolve(tag: &[u8; 4]) -> Option<DecodeFn> {
    REGISTRY.iter().find(|(t, _)| t == tag).map(|&(_, f)| f)
}

/// Whether `tag` names a format this library can decode.
pub fn is_known_tag(tag: &[u8; 4]) -> bool {
    resolve(tag).is_some()
}

/// Decode any supported resource from `bytes`.
///
/// Sniffs for BIOS compression first (a blob whose leading bytes are no
/// known magic), decompresses when warranted, then dispatches on the magic
/// tag. This is the entry point the archive decoder uses for every member.
pub fn decode(bytes: &[u8]) -> Result<Resource> {
    if compression::is_likely_compressed(bytes) {
        let plain = compression::decompress(bytes)?;
        return decode_plain(&plain);
    }
    decode_plain(bytes)
}

fn decode_plain(bytes: &[u8]) -> Result<Resource> {
    let tag = bytes.first_chunk::<4>().ok_or(Error::UnexpectedEof)?;
    match resolve(tag) {
        Some(decode_fn) => decode_fn(bytes),
        None => Err(Error::UnknownFormat(*tag)),
    }
}
