//! NCLR (Nitro Color Resource) - palette.
//!
//! BGR555 hardware colors, 16 per row at 4bpp or 256 at 8bpp. Tile and
//! cell decoders never consult a palette (indices stay indices); an NCLR is
//! handed to consumers as the [`PaletteProvider`] backing a draw.
//!
//! ## Layout
//! ```text
//! [0x00] Nitro header, magic "RLCN"   (0x10 bytes)
//! [PLTT] Palette data section "TTLP"
//!        [0x00] Magic "TTLP"          (4 bytes)
//!        [0x04] SectionSize           (u32 LE)
//!        [0x08] BitDepth              (u32 LE; 3 = 4bpp, 4 = 8bpp)
//!        [0x0C] Padding               (u32 LE)
//!        [0x10] DataSize              (u32 LE, frequently over-declared)
//!        [0x14] ColorsOffset          (u32 LE, always 0x10)
//!        [0x18] Colors                (u16 LE each, BGR555)
//! ```
//!
//! `DataSize` routinely exceeds the colors actually stored (producers wrote
//! the full 0x200 regardless), so the count is clamped to the bytes the
//! section really contains.

use std::io::{Read, Seek, SeekFrom};

use crate::formats::ncgr::BitDepth;
use crate::formats::nitro::{NitroHeader, find_section};
use crate::palette::{PaletteProvider, Rgba, TRANSPARENT};
use crate::utils::{le_u16, le_u32};
use crate::{Error, Result};

/// Resource magic as present in the data.
pub const MAGIC: [u8; 4] = *b"RLCN";

const PLTT_TAG: [u8; 4] = *b"TTLP";

/// Parsed NCLR palette.
#[derive(Debug)]
pub struct Nclr {
    /// Raw BGR555 colors in storage order.
    pub colors: Vec<u16>,
    /// Bit depth the palette targets; decides the row size (16 or 256).
    pub depth: BitDepth,
}

impl Nclr {
    /// Parse an NCLR resource from `r`.
    ///
    /// `r` must be positioned at the start of the Nitro header.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let header = NitroHeader::parse(r)?;
        header.check_magic(&MAGIC)?;

        let pltt = find_section(r, &header, &PLTT_TAG)?
            .ok_or(Error::Parse("missing palette data section"))?;
        r.seek(SeekFrom::Start(pltt.payload()))?;

        let depth = BitDepth::from_raw(le_u32(r)?)?;
        let _padding = le_u32(r)?;
        let data_size = le_u32(r)?;
        let _colors_offset = le_u32(r)?;

        let fields = if header.legacy { 16 } else { 24 };
        let available = pltt.size.saturating_sub(fields);
        let count = data_size.min(available) as usize / 2;

        let mut colors = Vec::with_capacity(count);
        for _ in 0..count {
            colors.push(le_u16(r)?);
        }

        Ok(Self { colors, depth })
    }

    /// The color at `index` as RGBA, or [`TRANSPARENT`] when out of range.
    pub fn rgba_at(&self, index: usize) -> Rgba {
        self.colors
            .get(index)
            .map(|&raw| Rgba::from_bgr555(raw))
            .unwrap_or(TRANSPARENT)
    }
}

impl PaletteProvider for Nclr {
    fn color_at(&self, index: usize) -> Rgba {
        self.rgba_at(index)
    }
}
