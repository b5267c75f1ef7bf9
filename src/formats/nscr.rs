//! NSCR (Nitro Screen Resource) - tilemap.
//!
//! A flat grid of 16-bit placement entries, each referencing a tile in a
//! companion NCGR together with flip flags and a palette row.
//!
//! ## Layout
//! ```text
//! [0x00] Nitro header, magic "RCSN"   (0x10 bytes)
//! [SCRN] Screen data section "NRCS"
//!        [0x00] Magic "NRCS"          (4 bytes)
//!        [0x04] SectionSize           (u32 LE)
//!        [0x08] Width                 (u16 LE, pixels)
//!        [0x0A] Height                (u16 LE, pixels)
//!        [0x0C] Padding               (u32 LE)
//!        [0x10] DataSize              (u32 LE)
//!        [0x14] Entries               (DataSize / 2 × u16 LE)
//! ```
//!
//! ## Entry bitfields
//! ```text
//! [ 0- 9] TileIndex
//! [10]    Horizontal flip
//! [11]    Vertical flip
//! [12-15] PaletteIndex
//! ```
//!
//! ## Tile base
//! Tile indices are relative to a movable VRAM window, not necessarily the
//! start of the companion tile set; a map can legitimately reference
//! indices past the set's end. [`Nscr::tile_base`] yields the shift that
//! brings the highest referenced index back into range.

use std::io::{Read, Seek, SeekFrom};

use crate::formats::nitro::{NitroHeader, find_section};
use crate::utils::{le_u16, le_u32};
use crate::{Error, Result};

/// Resource magic as present in the data.
pub const MAGIC: [u8; 4] = *b"RCSN";

const SCRN_TAG: [u8; 4] = *b"NRCS";

/// One decoded tilemap grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenEntry {
    /// Index into the companion tile set, before tile-base adjustment.
    pub tile_index: u16,
    /// Mirror horizontally.
    pub h_flip: bool,
    /// Mirror vertically.
    pub v_flip: bool,
    /// Palette row to draw this cell with.
    pub palette_index: u8,
}

impl ScreenEntry {
    fn from_raw(raw: u16) -> Self {
        Self {
            tile_index: raw & 0x3FF,
            h_flip: raw & 0x400 != 0,
            v_flip: raw & 0x800 != 0,
            palette_index: (raw >> 12) as u8,
        }
    }
}

/// Parsed NSCR tilemap.
#[derive(Debug)]
pub struct Nscr {
    /// Map width in pixels.
    pub width: u16,
    /// Map height in pixels.
    pub height: u16,
    /// Placement entries in reading order, one per 8×8 cell.
    pub entries: Vec<ScreenEntry>,
    /// Highest tile index referenced by any entry; 0 on an empty map.
    pub max_tile_index: u16,
}

impl Nscr {
    /// Parse an NSCR resource from `r`.
    ///
    /// `r` must be positioned at the start of the Nitro header.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let header = NitroHeader::parse(r)?;
        header.check_magic(&MAGIC)?;

        let scrn = find_section(r, &header, &SCRN_TAG)?
            .ok_or(Error::Parse("missing screen data section"))?;
        r.seek(SeekFrom::Start(scrn.payload()))?;

        let width = le_u16(r)?;
        let height = le_u16(r)?;
        let _padding = le_u32(r)?;
        let data_size = le_u32(r)?;

        let count = data_size as usize / 2;
        let mut entries = Vec::with_capacity(count);
        let mut max_tile_index = 0;
        for _ in 0..count {
            let entry = ScreenEntry::from_raw(le_u16(r)?);
            max_tile_index = max_tile_index.max(entry.tile_index);
            entries.push(entry);
        }

        Ok(Self {
            width,
            height,
            entries,
            max_tile_index,
        })
    }

    /// The smallest non-negative shift that makes every referenced tile
    /// index a valid index into a companion tile set of `tile_count` tiles.
    ///
    /// Zero when the set already covers the highest reference.
    pub fn tile_base(&self, tile_count: usize) -> usize {
        let max = self.max_tile_index as usize;
        if tile_count > 0 && max >= tile_count {
            max + 1 - tile_count
        } else {
            0
        }
    }
}
