//! NARC (Nitro ARChive) - flat asset archive.
//!
//! The container every other resource travels in: an allocation table, an
//! opaque name tree, and one raw-data region holding the concatenated
//! sub-files. Unlike the other formats, the three sections always exist and
//! always appear in the same order, so their offsets are computed rather
//! than scanned for.
//!
//! Sub-files are frequently BIOS-compressed; each member is sniffed,
//! decompressed when warranted, and dispatched through
//! [`crate::formats::decode`]. One malformed member never poisons the rest:
//! its error is recorded on the member and decoding continues.
//!
//! ## Layout
//! ```text
//! [0x00] Nitro header, magic "NARC"   (0x10 bytes)
//! [BTAF] Allocation table
//!        [0x00] Magic "BTAF"          (4 bytes)
//!        [0x04] SectionSize           (u32 LE)
//!        [0x08] FileCount             (u32 LE)
//!        [0x0C] Entries               (FileCount × {Start(u32), End(u32)})
//! [BTNF] Name tree
//!        [0x00] Magic "BTNF"          (4 bytes)
//!        [0x04] SectionSize           (u32 LE)
//!        [0x08] Opaque payload        (consumed by external name resolution)
//! [GMIF] Raw data
//!        [0x00] Magic "GMIF"          (4 bytes)
//!        [0x04] SectionSize           (u32 LE)
//!        [0x08] Concatenated sub-file bytes
//! ```
//!
//! Member *i*'s bytes are `raw[Start..End]`. Entries carry no
//! cross-references, so members decode independently; with the `parallel`
//! feature they decode on a rayon pool, output order always matching table
//! order.

use std::io::{Read, Seek, SeekFrom};

use crate::formats::{self, Resource, nitro::NitroHeader};
use crate::utils::{bytesv, le_u32, magic};
use crate::{Error, Result};

/// Resource magic as present in the data.
pub const MAGIC: [u8; 4] = *b"NARC";

const FATB_TAG: [u8; 4] = *b"BTAF";
const FNTB_TAG: [u8; 4] = *b"BTNF";
const FIMG_TAG: [u8; 4] = *b"GMIF";

/// One archived sub-file.
#[derive(Debug)]
pub struct NarcMember {
    /// Start offset into the raw-data region.
    pub start: u32,
    /// End offset into the raw-data region (exclusive).
    pub end: u32,
    /// Name assigned via [`Narc::apply_names`]; the archive itself stores
    /// names only in the opaque tree.
    pub name: Option<String>,
    /// This member's raw bytes (still compressed if they were stored so).
    pub data: Vec<u8>,
    /// The dispatch result: a decoded resource, or the error that one
    /// member produced without aborting its siblings.
    pub resource: Result<Resource>,
}

/// Parsed NARC archive.
#[derive(Debug)]
pub struct Narc {
    /// All members in allocation-table order.
    pub members: Vec<NarcMember>,
    /// Opaque name-tree payload for an external resolver.
    pub name_table: Vec<u8>,
}

impl Narc {
    /// Parse a NARC archive from `r`, decoding every member.
    ///
    /// `r` must be positioned at the start of the Nitro header.
    pub fn parse<R: Read + Seek>(r: &mut R) -> Result<Self> {
        let header = NitroHeader::parse(r)?;
        header.check_magic(&MAGIC)?;

        // Allocation table.
        let fatb_offset = header.base + header.header_size as u64;
        r.seek(SeekFrom::Start(fatb_offset))?;
        magic(r, &FATB_TAG)?;
        let fatb_size = le_u32(r)?;
        let file_count = le_u32(r)?;
        let mut entries = Vec::with_capacity(file_count as usize);
        for _ in 0..file_count {
            let start = le_u32(r)?;
            let end = le_u32(r)?;
            entries.push((start, end));
        }

        // Name tree; the internal structure stays opaque here.
        let fntb_offset = fatb_offset + fatb_size as u64;
        r.seek(SeekFrom::Start(fntb_offset))?;
        magic(r, &FNTB_TAG)?;
        let fntb_size = le_u32(r)?;
        if fntb_size < 8 {
            return Err(Error::InvalidRange);
        }
        let name_table = bytesv(r, fntb_size as usize - 8)?;

        // Raw data.
        let fimg_offset = fntb_offset + fntb_size as u64;
        r.seek(SeekFrom::Start(fimg_offset))?;
        magic(r, &FIMG_TAG)?;
        let fimg_size = le_u32(r)?;
        if fimg_size < 8 {
            return Err(Error::InvalidRange);
        }
        let raw = bytesv(r, fimg_size as usize - 8)?;

        let members = decode_members(&raw, &entries);

        Ok(Self {
            members,
            name_table,
        })
    }

    /// Number of archived sub-files.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the archive holds no sub-files.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Assign externally resolved names to the members, in table order.
    ///
    /// The whole batch is validated first: a count mismatch yields
    /// [`Error::Consistency`] and no member is renamed.
    pub fn apply_names(&mut self, names: &[String]) -> Result<()> {
        if names.len() != self.members.len() {
            return Err(Error::Consistency("name count does not match file count"));
        }
        for (member, name) in self.members.iter_mut().zip(names) {
            member.name = Some(name.clone());
        }
        Ok(())
    }
}

/// Slice and dispatch every member. Members are disjoint buffers with no
/// shared state, so the `parallel` feature fans them out on a rayon pool;
/// output order matches table order either way.
fn decode_members(raw: &[u8], entries: &[(u32, u32)]) -> Vec<NarcMember> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        entries
            .par_iter()
            .map(|&(start, end)| decode_member(raw, start, end))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        entries
            .iter()
            .map(|&(start, end)| decode_member(raw, start, end))
            .collect()
    }
}

fn decode_member(raw: &[u8], start: u32, end: u32) -> NarcMember {
    let (data, resource) = match raw.get(start as usize..end as usize) {
        Some(slice) => (slice.to_vec(), formats::decode(slice)),
        None => (Vec::new(), Err(Error::InvalidRange)),
    };
    NarcMember {
        start,
        end,
        name: None,
        data,
        resource,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Assemble a NARC around the given table entries and raw-data region.
    fn narc_bytes(entries: &[(u32, u32)], raw: &[u8]) -> Vec<u8> {
        let fatb_size = 8 + 4 + entries.len() as u32 * 8;
        let fntb_payload = [0u8; 8];
        let fntb_size = 8 + fntb_payload.len() as u32;
        let fimg_size = 8 + raw.len() as u32;
        let file_size = 16 + fatb_size + fntb_size + fimg_size;

        let mut b = Vec::new();
        b.extend_from_slice(b"NARC");
        b.extend_from_slice(&0xFFFEu16.to_le_bytes());
        b.extend_from_slice(&[0x01, 0x00]); // version 0x0100, stored BE
        b.extend_from_slice(&file_size.to_le_bytes());
        b.extend_from_slice(&16u16.to_le_bytes());
        b.extend_from_slice(&3u16.to_le_bytes());

        b.extend_from_slice(b"BTAF");
        b.extend_from_slice(&fatb_size.to_le_bytes());
        b.extend_from_slice(&(entries.len() as u32).to_le_bytes());
        for (start, end) in entries {
            b.extend_from_slice(&start.to_le_bytes());
            b.extend_from_slice(&end.to_le_bytes());
        }

        b.extend_from_slice(b"BTNF");
        b.extend_from_slice(&fntb_size.to_le_bytes());
        b.extend_from_slice(&fntb_payload);

        b.extend_from_slice(b"GMIF");
        b.extend_from_slice(&fimg_size.to_le_bytes());
        b.extend_from_slice(raw);
        b
    }

    /// A minimal valid NCLR resource to embed as a member.
    fn nclr_member() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"RLCN");
        b.extend_from_slice(&0xFEFFu16.to_le_bytes());
        b.extend_from_slice(&0x0100u16.to_le_bytes());
        b.extend_from_slice(&(16u32 + 8 + 16 + 4).to_le_bytes());
        b.extend_from_slice(&16u16.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(b"TTLP");
        b.extend_from_slice(&(8u32 + 16 + 4).to_le_bytes());
        b.extend_from_slice(&3u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&4u32.to_le_bytes());
        b.extend_from_slice(&0x10u32.to_le_bytes());
        b.extend_from_slice(&0x001Fu16.to_le_bytes());
        b.extend_from_slice(&0x7C00u16.to_le_bytes());
        b
    }

    /// Store `data` as an uncompressed-friendly BIOS LZSS stream
    /// (all-literal groups).
    fn lz10_store(data: &[u8]) -> Vec<u8> {
        let mut out = ((data.len() as u32) << 8 | 0x10).to_le_bytes().to_vec();
        for chunk in data.chunks(8) {
            out.push(0x00);
            out.extend_from_slice(chunk);
        }
        out
    }

    #[test]
    fn slices_members_by_table_entries() {
        let raw: Vec<u8> = (0u8..30).collect();
        let bytes = narc_bytes(&[(0, 10), (10, 25), (25, 30)], &raw);
        let narc = Narc::parse(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(narc.len(), 3);
        let lengths: Vec<usize> = narc.members.iter().map(|m| m.data.len()).collect();
        assert_eq!(lengths, vec![10, 15, 5]);
        assert_eq!(narc.members[1].data, &raw[10..25]);
        assert_eq!(narc.name_table, [0u8; 8]);
    }

    #[test]
    fn one_bad_member_does_not_abort_the_rest() {
        let good = nclr_member();
        let mut raw = good.clone();
        raw.extend_from_slice(&[0xAB; 6]); // garbage member
        let end = good.len() as u32;
        let bytes = narc_bytes(&[(0, end), (end, end + 6)], &raw);
        let narc = Narc::parse(&mut Cursor::new(bytes)).unwrap();

        assert!(matches!(
            narc.members[0].resource,
            Ok(Resource::Palette(_))
        ));
        assert!(narc.members[1].resource.is_err());
    }

    #[test]
    fn out_of_range_entry_is_recorded_per_member() {
        let raw = [0u8; 4];
        let bytes = narc_bytes(&[(0, 10)], &raw);
        let narc = Narc::parse(&mut Cursor::new(bytes)).unwrap();
        assert!(matches!(
            narc.members[0].resource,
            Err(Error::InvalidRange)
        ));
        assert!(narc.members[0].data.is_empty());
    }

    #[test]
    fn compressed_member_is_sniffed_and_decoded() {
        let raw = lz10_store(&nclr_member());
        let end = raw.len() as u32;
        let bytes = narc_bytes(&[(0, end)], &raw);
        let narc = Narc::parse(&mut Cursor::new(bytes)).unwrap();

        let Ok(Resource::Palette(nclr)) = &narc.members[0].resource else {
            panic!("expected a decoded palette");
        };
        assert_eq!(nclr.colors, vec![0x001F, 0x7C00]);
    }

    #[test]
    fn nested_archives_decode_recursively() {
        let inner = narc_bytes(&[(0, 4)], &[0xEE; 4]);
        let end = inner.len() as u32;
        let bytes = narc_bytes(&[(0, end)], &inner);
        let narc = Narc::parse(&mut Cursor::new(bytes)).unwrap();

        let Ok(Resource::Archive(inner)) = &narc.members[0].resource else {
            panic!("expected a nested archive");
        };
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn name_application_validates_count_first() {
        let raw: Vec<u8> = (0u8..10).collect();
        let bytes = narc_bytes(&[(0, 5), (5, 10)], &raw);
        let mut narc = Narc::parse(&mut Cursor::new(bytes)).unwrap();

        let short = vec!["a".to_string()];
        assert!(matches!(
            narc.apply_names(&short),
            Err(Error::Consistency(_))
        ));
        assert!(narc.members.iter().all(|m| m.name.is_none()));

        let names = vec!["a".to_string(), "b".to_string()];
        narc.apply_names(&names).unwrap();
        assert_eq!(narc.members[1].name.as_deref(), Some("b"));
    }
}
