//! NCGR (Nitro Character Graphic Resource) - indexed tile graphics.
//!
//! Stores the pixel data of an image as 8×8 tiles of palette indices,
//! bit-packed at 4 or 8 bits per pixel. Consumed together with an NCLR
//! palette and, for sprites, an NCER cell bank.
//!
//! ## Layout
//! ```text
//! [0x00] Nitro header, magic "RGCN"   (0x10 bytes)
//! [CHAR] Character data section "RAHC"
//!        [0x00] Magic "RAHC"          (4 bytes)
//!        [0x04] SectionSize           (u32 LE)
//!        [0x08] TilesHigh             (u16 LE, 0xFFFF when undeclared)
//!        [0x0A] TilesWide             (u16 LE, 0xFFFF when undeclared)
//!        [0x0C] BitDepth              (u32 LE; 3 = 4bpp, 4 = 8bpp)
//!        [0x10] Unknown               (u16 LE)
//!        [0x12] MappingType           (u16 LE; non-zero = 1D VRAM mapping)
//!        [0x14] TileOrder             (u32 LE; low byte 0 = horizontal)
//!        [0x18] DataSize              (u32 LE)
//!        [0x1C] DataOffset            (u32 LE, always 0x18)
//!        [0x20] Packed pixel data     (DataSize bytes)
//! ```
//!
//! ## Tile count and grid re-derivation
//! Some producers under-declare the grid (or write 0xFFFF), so the tile
//! count actually present in the data - `DataSize / 32`, halved again at
//! 8bpp - is authoritative whenever the resource is 1D-mapped or the
//! declared grid disagrees with it. The grid is then rebuilt: 32 tiles wide
//! when the count divides evenly, otherwise the widest factor pair.
//!
//! ## Tile order
//! *Lineal* storage keeps each tile contiguous (the decoder's native
//! order). *Horizontal* storage interleaves tile rows into full-image
//! scanlines and is remapped to lineal before unpacking.

use std::io::{Read, Seek, SeekFrom};

use crate::formats::nitro::{NitroHeader, find_section};
use crate::utils::{bytesv, le_u16, le_u32};
use crate::{Error, Result};

/// Resource magic as present in the data.
pub const MAGIC: [u8; 4] = *b"RGCN";

const CHAR_TAG: [u8; 4] = *b"RAHC";

/// One 8×8 cell of palette indices, one byte per pixel regardless of the
/// source bit depth.
pub type Tile = [u8; 64];

/// Bits per pixel of the packed tile data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitDepth {
    /// 4 bits per pixel; two pixels per byte, low nibble first.
    Four,
    /// 8 bits per pixel.
    Eight,
}

impl BitDepth {
    pub(crate) fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            3 => Ok(BitDepth::Four),
            4 => Ok(BitDepth::Eight),
            _ => Err(Error::Parse("unknown tile bit depth")),
        }
    }

    /// Bytes occupied by one row of one tile.
    fn tile_row_bytes(self) -> usize {
        match self {
            BitDepth::Four => 4,
            BitDepth::Eight => 8,
        }
    }

    /// Bytes occupied by one full tile.
    fn tile_bytes(self) -> usize {
        self.tile_row_bytes() * 8
    }
}

/// Serialization order of the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrder {
    /// Tiles stored row-major, each tile fully contiguous.
    Lineal,
    /// Tile rows interleaved into full-image scanlines.
    Horizontal,
}

/// Parsed NCGR tile graphics.
#[derive(Debug)]
pub struct Ncgr {
    /// Unpacked tiles in lineal order.
    pub tiles: Vec<Tile>,
    /// Final grid width in tiles (re-derived when the declaration is
    /// untrustworthy).
    pub tiles_wide: usize,
    /// Final grid height in tiles.
    pub tiles_high: usize,
    /// Source bit depth.
    pub depth: BitDepth,
    /// Whether the resource targets 1D VRAM mapping.
    pub mapping_1d: bool,
    /// Storage order the data used on disk.
    pub order: TileOrder,
}

impl Ncgr {
    /// Parse an NCGR resource from `r`.
    ///
    /// `r` must be positioned at the start of the Nitro header.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let header = NitroHeader::parse(r)?;
        header.check_magic(&MAGIC)?;

        let char_sec = find_section(r, &header, &CHAR_TAG)?
            .ok_or(Error::Parse("missing character data section"))?;
        r.seek(SeekFrom::Start(char_sec.payload()))?;

        let declared_high = le_u16(r)? as usize;
        let declared_wide = le_u16(r)? as usize;
        let depth = BitDepth::from_raw(le_u32(r)?)?;
        let _unknown = le_u16(r)?;
        let mapping_1d = le_u16(r)? != 0;
        let order = if le_u32(r)? & 0xFF == 0 {
            TileOrder::Horizontal
        } else {
            TileOrder::Lineal
        };
        let data_size = le_u32(r)? as usize;
        let _data_offset = le_u32(r)?;

        let mut data = bytesv(r, data_size)?;

        // The data length, not the declared grid, decides how many tiles
        // exist: 32 bytes per tile at 4bpp, 64 at 8bpp.
        let mut present = data.len() >> 5;
        if depth == BitDepth::Eight {
            present >>= 1;
        }

        let declared = declared_high * declared_wide;
        let (tiles_wide, tiles_high) = if mapping_1d || present != declared {
            derive_grid(present)
        } else {
            (declared_wide, declared_high)
        };

        if order == TileOrder::Horizontal {
            data = horizontal_to_lineal(&data, tiles_wide, tiles_high, depth.tile_row_bytes());
        }

        let tiles = unpack_tiles(&data, present, depth);

        Ok(Self {
            tiles,
            tiles_wide,
            tiles_high,
            depth,
            mapping_1d,
            order,
        })
    }

    /// Image width in pixels.
    pub fn width(&self) -> usize {
        self.tiles_wide * 8
    }

    /// Image height in pixels.
    pub fn height(&self) -> usize {
        self.tiles_high * 8
    }
}

/// Rebuild the tile grid from the tile count actually present.
///
/// 32 wide when the count divides evenly; otherwise the widest factor pair
/// (larger cofactor as the width).
fn derive_grid(tile_count: usize) -> (usize, usize) {
    if tile_count == 0 {
        return (0, 0);
    }
    if tile_count % 32 == 0 {
        return (32, tile_count / 32);
    }
    let mut small = 1;
    let mut f = 1;
    while f * f <= tile_count {
        if tile_count % f == 0 {
            small = f;
        }
        f += 1;
    }
    (tile_count / small, small)
}

/// Flat index of byte `(w, h)` of tile `(wt, ht)` in the horizontal layout.
fn horizontal_index(
    w: usize,
    h: usize,
    wt: usize,
    ht: usize,
    tiles_x: usize,
    row_bytes: usize,
) -> usize {
    w + h * row_bytes * tiles_x + wt * row_bytes + ht * tiles_x * 8 * row_bytes
}

/// Remap horizontally stored tile data into lineal order.
///
/// The remap is a bijection for a fixed grid; indices that fall outside the
/// buffer (inputs shorter than the nominal grid) are skipped, not an error.
fn horizontal_to_lineal(data: &[u8], tiles_x: usize, tiles_y: usize, row_bytes: usize) -> Vec<u8> {
    let mut out = vec![0u8; data.len()];
    let mut dst = 0;
    for ht in 0..tiles_y {
        for wt in 0..tiles_x {
            for h in 0..8 {
                for w in 0..row_bytes {
                    let src = horizontal_index(w, h, wt, ht, tiles_x, row_bytes);
                    if src < data.len() && dst < out.len() {
                        out[dst] = data[src];
                    }
                    dst += 1;
                }
            }
        }
    }
    out
}

/// Inverse of [`horizontal_to_lineal`]; used to verify the remap is a
/// bijection.
#[cfg(test)]
fn lineal_to_horizontal(data: &[u8], tiles_x: usize, tiles_y: usize, row_bytes: usize) -> Vec<u8> {
    let mut out = vec![0u8; data.len()];
    let mut src = 0;
    for ht in 0..tiles_y {
        for wt in 0..tiles_x {
            for h in 0..8 {
                for w in 0..row_bytes {
                    let dst = horizontal_index(w, h, wt, ht, tiles_x, row_bytes);
                    if src < data.len() && dst < out.len() {
                        out[dst] = data[src];
                    }
                    src += 1;
                }
            }
        }
    }
    out
}

/// Unpack `count` tiles of lineal data into one-byte-per-pixel form.
fn unpack_tiles(data: &[u8], count: usize, depth: BitDepth) -> Vec<Tile> {
    let mut tiles = Vec::with_capacity(count);
    match depth {
        BitDepth::Four => {
            for chunk in data.chunks_exact(depth.tile_bytes()).take(count) {
                let mut tile = [0u8; 64];
                for (i, &b) in chunk.iter().enumerate() {
                    tile[i * 2] = b & 0xF;
                    tile[i * 2 + 1] = b >> 4;
                }
                tiles.push(tile);
            }
        }
        BitDepth::Eight => {
            for chunk in data.chunks_exact(depth.tile_bytes()).take(count) {
                let mut tile = [0u8; 64];
                tile.copy_from_slice(chunk);
                tiles.push(tile);
            }
        }
    }
    tiles
}
