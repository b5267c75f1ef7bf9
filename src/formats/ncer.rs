//! NCER (Nitro Cell Resource) - sprite cell bank.
//!
//! Groups hardware sprite placements (OAM entries) into named "cells", each
//! one renderable object. OAM words are carried opaquely; interpreting
//! position/shape/tile bits is the consumer's job.
//!
//! ## Layout
//! ```text
//! [0x00] Nitro header, magic "RECN"   (0x10 bytes)
//! [CEBK] Cell bank section "KBEC"
//!        [0x00] Magic "KBEC"          (4 bytes)
//!        [0x04] SectionSize           (u32 LE)
//!        [0x08] CellCount             (u16 LE)
//!        [0x0A] BankType              (u16 LE; 1 = cells carry a bounding box)
//!        [0x0C] DataOffset            (u32 LE, from section offset 0x08)
//!        [0x10] MappingType           (u32 LE, low byte significant)
//!        [0x14] PartitionOffset       (i32 LE; non-zero = VRAM-transfer table present)
//!        [...]  Cell records          (CellCount × 8 or × 16 bytes)
//!        [...]  OAM attribute area    (3 × u16 per entry)
//!        [...]  VRAM-transfer table   (optional)
//! [LABL] Cell name labels             (optional, raw)
//! [UEXT] User extension              (optional, raw)
//! ```
//!
//! ## Cell record
//! ```text
//! [0x00] OamCount          (u16 LE; 0 = empty cell, a valid no-render marker)
//! [0x02] CellAttributes    (u16 LE)
//! [0x04] AttributeOffset   (i32 LE, relative to the end of the cell array)
//! [0x08] MaxX, MaxY, MinX, MinY   (4 × i16 LE, BankType 1 only)
//! ```

use std::io::{Read, Seek, SeekFrom};

use crate::formats::nitro::{NitroHeader, Section, find_section};
use crate::utils::{bytesv, le_i16, le_i32, le_u16, le_u32};
use crate::{Error, Result};

/// Resource magic as present in the data.
pub const MAGIC: [u8; 4] = *b"RECN";

const CEBK_TAG: [u8; 4] = *b"KBEC";
const LABL_TAG: [u8; 4] = *b"LBAL";
const UEXT_TAG: [u8; 4] = *b"TXEU";

/// VRAM addressing mode a cell bank targets.
///
/// Raw values 0-4; anything larger falls back to the first 1D mode rather
/// than erroring (matches hardware tooling behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMapping {
    OneD32k,
    OneD64k,
    OneD128k,
    OneD256k,
    TwoD,
}

impl CellMapping {
    fn from_raw(raw: u32) -> Self {
        match raw & 0xFF {
            0 => CellMapping::OneD32k,
            1 => CellMapping::OneD64k,
            2 => CellMapping::OneD128k,
            3 => CellMapping::OneD256k,
            4 => CellMapping::TwoD,
            _ => CellMapping::OneD32k,
        }
    }
}

/// One hardware sprite attribute record: three platform-defined 16-bit
/// words. Opaque to this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OamEntry {
    pub attr0: u16,
    pub attr1: u16,
    pub attr2: u16,
}

/// Bounding rectangle carried by cells of a type-1 bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub max_x: i16,
    pub max_y: i16,
    pub min_x: i16,
    pub min_y: i16,
}

/// One sprite cell: an ordered list of OAM entries.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Per-cell attribute word.
    pub attributes: u16,
    /// OAM entries in draw order; empty for a no-render cell.
    pub oam: Vec<OamEntry>,
    /// Bounding rectangle, present on type-1 banks only.
    pub bounds: Option<CellBounds>,
}

impl Cell {
    /// Whether this is an empty (no-render) cell.
    pub fn is_empty(&self) -> bool {
        self.oam.is_empty()
    }
}

/// Optional per-cell video-memory upload window.
///
/// Cells without a meaningful transfer carry `(0, 0)`; absence is
/// represented structurally, never with a nullable entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VramPartition {
    pub offset: u32,
    pub size: u32,
}

/// VRAM-transfer partition table, one entry per cell.
#[derive(Debug, Clone)]
pub struct VramTransfer {
    /// Largest partition size the bank declares.
    pub max_size: u32,
    /// One `(offset, size)` pair per cell, in cell order.
    pub partitions: Vec<VramPartition>,
}

/// Parsed NCER cell bank.
#[derive(Debug)]
pub struct Ncer {
    /// All cells in bank order.
    pub cells: Vec<Cell>,
    /// VRAM addressing mode.
    pub mapping: CellMapping,
    /// VRAM-transfer table; present iff the bank's partition offset field
    /// is non-zero.
    pub vram_transfer: Option<VramTransfer>,
    /// Raw LABL payload (cell name labels), if present.
    pub labels: Option<Vec<u8>>,
    /// Raw UEXT payload (user extension), if present.
    pub user_ext: Option<Vec<u8>>,
}

impl Ncer {
    /// Parse an NCER resource from `r`.
    ///
    /// `r` must be positioned at the start of the Nitro header.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let header = NitroHeader::parse(r)?;
        header.check_magic(&MAGIC)?;

        let cebk = find_section(r, &header, &CEBK_TAG)?
            .ok_or(Error::Parse("missing cell bank section"))?;
        r.seek(SeekFrom::Start(cebk.payload()))?;

        let cell_count = le_u16(r)?;
        let bank_type = le_u16(r)?;
        let data_offset = le_u32(r)?;
        let mapping = CellMapping::from_raw(le_u32(r)?);
        let partition_offset = le_i32(r)?;

        let with_bounds = bank_type == 1;
        let stride: u64 = if with_bounds { 16 } else { 8 };
        let cell_base = cebk.payload() + data_offset as u64;
        let attr_base = cell_base + cell_count as u64 * stride;

        let mut cells = Vec::with_capacity(cell_count as usize);
        for i in 0..cell_count as u64 {
            r.seek(SeekFrom::Start(cell_base + i * stride))?;
            let oam_count = le_u16(r)?;
            let attributes = le_u16(r)?;
            let attr_offset = le_i32(r)?;
            let bounds = if with_bounds {
                Some(CellBounds {
                    max_x: le_i16(r)?,
                    max_y: le_i16(r)?,
                    min_x: le_i16(r)?,
                    min_y: le_i16(r)?,
                })
            } else {
                None
            };

            // An empty cell is a terminal state: no attribute read at all.
            let mut oam = Vec::with_capacity(oam_count as usize);
            if oam_count > 0 {
                let pos = attr_base as i64 + attr_offset as i64;
                if pos < 0 {
                    return Err(Error::InvalidRange);
                }
                r.seek(SeekFrom::Start(pos as u64))?;
                for _ in 0..oam_count {
                    oam.push(OamEntry {
                        attr0: le_u16(r)?,
                        attr1: le_u16(r)?,
                        attr2: le_u16(r)?,
                    });
                }
            }

            cells.push(Cell {
                attributes,
                oam,
                bounds,
            });
        }

        let vram_transfer = if partition_offset != 0 {
            Some(parse_partitions(r, &cebk, cell_count, partition_offset)?)
        } else {
            None
        };

        let labels = read_blob(r, &header, &LABL_TAG)?;
        let user_ext = read_blob(r, &header, &UEXT_TAG)?;

        Ok(Self {
            cells,
            mapping,
            vram_transfer,
            labels,
            user_ext,
        })
    }

    /// Best-effort parse of the LABL payload into cell names.
    ///
    /// The payload is an offset table followed by null-terminated strings;
    /// the boundary between the two is not recorded, so this uses the
    /// conventional strictly-increasing-offsets reading. Returns [`None`]
    /// when no LABL section exists or the payload does not follow the
    /// convention - labels are auxiliary and never fail a decode.
    pub fn label_names(&self) -> Option<Vec<String>> {
        let data = self.labels.as_deref()?;

        let mut offsets: Vec<usize> = Vec::new();
        let mut pos = 0;
        while pos + 4 <= data.len() {
            let v = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                as usize;
            let expected_first = offsets.is_empty() && v == 0;
            let increasing = offsets.last().is_some_and(|&last| v > last);
            if !(expected_first || increasing) || v >= data.len() {
                break;
            }
            offsets.push(v);
            pos += 4;
        }
        if offsets.is_empty() {
            return None;
        }

        let strings_base = offsets.len() * 4;
        let mut names = Vec::with_capacity(offsets.len());
        for off in offsets {
            let slice = data.get(strings_base + off..)?;
            let end = slice.iter().position(|&b| b == 0)?;
            names.push(String::from_utf8_lossy(&slice[..end]).into_owned());
        }
        Some(names)
    }
}

fn parse_partitions<R: Read + Seek>(
    r: &mut R,
    cebk: &Section,
    cell_count: u16,
    partition_offset: i32,
) -> Result<VramTransfer> {
    let pos = cebk.offset as i64 + partition_offset as i64 + 8;
    if pos < 0 {
        return Err(Error::InvalidRange);
    }
    r.seek(SeekFrom::Start(pos as u64))?;

    let max_size = le_u32(r)?;
    let first_offset = le_u32(r)?;
    // first_offset counts from the sub-header start; 8 bytes are consumed.
    r.seek(SeekFrom::Current(first_offset as i64 - 8))?;

    let mut partitions = Vec::with_capacity(cell_count as usize);
    for _ in 0..cell_count {
        let offset = le_u32(r)?;
        let size = le_u32(r)?;
        partitions.push(VramPartition { offset, size });
    }

    Ok(VramTransfer {
        max_size,
        partitions,
    })
}

/// Copy an optional section's payload verbatim; absence is not an error.
fn read_blob<R: Read + Seek>(
    r: &mut R,
    header: &NitroHeader,
    tag: &[u8; 4],
) -> Result<Option<Vec<u8>>> {
    let Some(section) = find_section(r, header, tag)? else {
        return Ok(None);
    };
    r.seek(SeekFrom::Start(section.payload()))?;
    let len = if header.legacy {
        section.size
    } else {
        section.size.saturating_sub(8)
    };
    Ok(Some(bytesv(r, len as usize)?))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    struct BankDesc<'a> {
        bank_type: u16,
        mapping: u32,
        partition_offset: i32,
        cells: &'a [(u16, u16, i32, Option<[i16; 4]>)],
        tail: &'a [u8],
    }

    /// Assemble an NCER with one KBEC section plus `extra` trailing
    /// sections.
    fn ncer_bytes(bank: &BankDesc<'_>, extra: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let stride = if bank.bank_type == 1 { 16 } else { 8 };
        let payload_len = 16 + bank.cells.len() * stride + bank.tail.len();
        let kbec_size = 8 + payload_len as u32;
        let extra_size: u32 = extra.iter().map(|(_, p)| 8 + p.len() as u32).sum();
        let file_size = 16 + kbec_size + extra_size;

        let mut b = Vec::new();
        b.extend_from_slice(b"RECN");
        b.extend_from_slice(&0xFEFFu16.to_le_bytes());
        b.extend_from_slice(&0x0100u16.to_le_bytes());
        b.extend_from_slice(&file_size.to_le_bytes());
        b.extend_from_slice(&16u16.to_le_bytes());
        b.extend_from_slice(&(1 + extra.len() as u16).to_le_bytes());

        b.extend_from_slice(b"KBEC");
        b.extend_from_slice(&kbec_size.to_le_bytes());
        b.extend_from_slice(&(bank.cells.len() as u16).to_le_bytes());
        b.extend_from_slice(&bank.bank_type.to_le_bytes());
        b.extend_from_slice(&16u32.to_le_bytes()); // cells follow the fields
        b.extend_from_slice(&bank.mapping.to_le_bytes());
        b.extend_from_slice(&bank.partition_offset.to_le_bytes());
        for (count, attrs, attr_offset, bounds) in bank.cells {
            b.extend_from_slice(&count.to_le_bytes());
            b.extend_from_slice(&attrs.to_le_bytes());
            b.extend_from_slice(&attr_offset.to_le_bytes());
            if let Some(bounds) = bounds {
                for v in bounds {
                    b.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        b.extend_from_slice(bank.tail);

        for (tag, payload) in extra {
            b.extend_from_slice(*tag);
            b.extend_from_slice(&(8 + payload.len() as u32).to_le_bytes());
            b.extend_from_slice(payload);
        }
        b
    }

    fn oam_words(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn type0_bank_uses_8_byte_stride() {
        // Two cells; the second one's record sits 8 bytes after the first.
        let tail = oam_words(&[0x00AA, 0x1000, 0x0002, 0x00BB, 0x2000, 0x0005]);
        let bytes = ncer_bytes(
            &BankDesc {
                bank_type: 0,
                mapping: 0,
                partition_offset: 0,
                cells: &[(1, 0, 0, None), (1, 7, 6, None)],
                tail: &tail,
            },
            &[],
        );
        let ncer = Ncer::parse(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(ncer.cells.len(), 2);
        assert!(ncer.cells.iter().all(|c| c.bounds.is_none()));
        assert_eq!(
            ncer.cells[0].oam,
            vec![OamEntry {
                attr0: 0x00AA,
                attr1: 0x1000,
                attr2: 0x0002
            }]
        );
        assert_eq!(ncer.cells[1].attributes, 7);
        assert_eq!(ncer.cells[1].oam[0].attr0, 0x00BB);
        assert_eq!(ncer.mapping, CellMapping::OneD32k);
        assert!(ncer.vram_transfer.is_none());
    }

    #[test]
    fn type1_bank_reads_bounding_boxes() {
        let tail = oam_words(&[1, 2, 3]);
        let bytes = ncer_bytes(
            &BankDesc {
                bank_type: 1,
                mapping: 4,
                partition_offset: 0,
                cells: &[(1, 0, 0, Some([8, 7, -1, -2]))],
                tail: &tail,
            },
            &[],
        );
        let ncer = Ncer::parse(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(
            ncer.cells[0].bounds,
            Some(CellBounds {
                max_x: 8,
                max_y: 7,
                min_x: -1,
                min_y: -2
            })
        );
        assert_eq!(ncer.mapping, CellMapping::TwoD);
    }

    #[test]
    fn empty_cell_reads_no_attributes() {
        // No OAM area exists at all; an empty cell must not try to read one.
        let bytes = ncer_bytes(
            &BankDesc {
                bank_type: 0,
                mapping: 0,
                partition_offset: 0,
                cells: &[(0, 9, 0, None)],
                tail: &[],
            },
            &[],
        );
        let ncer = Ncer::parse(&mut Cursor::new(bytes)).unwrap();

        assert!(ncer.cells[0].is_empty());
        assert_eq!(ncer.cells[0].attributes, 9);
    }

    #[test]
    fn out_of_range_mapping_falls_back() {
        let bytes = ncer_bytes(
            &BankDesc {
                bank_type: 0,
                mapping: 0x2C05, // low byte 5: out of range
                partition_offset: 0,
                cells: &[(0, 0, 0, None)],
                tail: &[],
            },
            &[],
        );
        let ncer = Ncer::parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(ncer.mapping, CellMapping::OneD32k);
    }

    #[test]
    fn partition_table_yields_one_entry_per_cell() {
        // Tail: 6 OAM words for two cells, then the partition sub-header
        // and two (offset, size) pairs.
        let mut tail = oam_words(&[1, 2, 3, 4, 5, 6]);
        // The sub-header lands after the 16 header bytes, two 8-byte cell
        // records, and 12 OAM bytes of payload.
        let partition_offset = (16 + 16 + 12) as i32;
        tail.extend_from_slice(&0x80u32.to_le_bytes()); // max partition size
        tail.extend_from_slice(&8u32.to_le_bytes()); // first partition offset
        for (off, size) in [(0u32, 0x20u32), (0, 0)] {
            tail.extend_from_slice(&off.to_le_bytes());
            tail.extend_from_slice(&size.to_le_bytes());
        }

        let bytes = ncer_bytes(
            &BankDesc {
                bank_type: 0,
                mapping: 0,
                partition_offset,
                cells: &[(1, 0, 0, None), (1, 0, 6, None)],
                tail: &tail,
            },
            &[],
        );
        let ncer = Ncer::parse(&mut Cursor::new(bytes)).unwrap();

        let transfer = ncer.vram_transfer.unwrap();
        assert_eq!(transfer.max_size, 0x80);
        assert_eq!(
            transfer.partitions,
            vec![
                VramPartition {
                    offset: 0,
                    size: 0x20
                },
                VramPartition { offset: 0, size: 0 },
            ]
        );
    }

    #[test]
    fn optional_label_and_extension_blobs_are_carried() {
        // LABL: offsets 0 and 4, then two null-terminated names.
        let mut labl = Vec::new();
        labl.extend_from_slice(&0u32.to_le_bytes());
        labl.extend_from_slice(&4u32.to_le_bytes());
        labl.extend_from_slice(b"one\0two\0");

        let bytes = ncer_bytes(
            &BankDesc {
                bank_type: 0,
                mapping: 0,
                partition_offset: 0,
                cells: &[(0, 0, 0, None)],
                tail: &[],
            },
            &[(b"LBAL", &labl), (b"TXEU", &[0xDE, 0xAD])],
        );
        let ncer = Ncer::parse(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(ncer.labels.as_deref(), Some(labl.as_slice()));
        assert_eq!(ncer.user_ext.as_deref(), Some(&[0xDE, 0xAD][..]));
        assert_eq!(
            ncer.label_names(),
            Some(vec!["one".to_string(), "two".to_string()])
        );
    }

    #[test]
    fn absent_optional_sections_are_none() {
        let bytes = ncer_bytes(
            &BankDesc {
                bank_type: 0,
                mapping: 0,
                partition_offset: 0,
                cells: &[(0, 0, 0, None)],
                tail: &[],
            },
            &[],
        );
        let ncer = Ncer::parse(&mut Cursor::new(bytes)).unwrap();
        assert!(ncer.labels.is_none());
        assert!(ncer.user_ext.is_none());
        assert!(ncer.label_names().is_none());
    }
}
