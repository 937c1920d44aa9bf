//! Data descriptor (DD) blocks: the tag/ref directory at the head of every HDF4 file.
//!
//! Layout (big-endian):
//! - 4 bytes: signature `0e 03 13 01`
//! - DD block: `u16 ndds`, `u32 next_block_offset`, then `ndds` descriptors of
//!   `u16 tag, u16 ref, u32 offset, u32 length`
//!
//! Blocks are chained through `next_block_offset` until it is zero.

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, trace, warn};
use std::collections::{HashMap, HashSet};

use super::source::Source;
use crate::errors::{Hdf4Error, Result};

pub const SIGNATURE: [u8; 4] = [0x0e, 0x03, 0x13, 0x01];

const DD_BLOCK_HEADER_SIZE: usize = 6;
const DD_SIZE: usize = 12;
/// Bit set on the tag of an element stored through a special-element header.
pub const SPECIAL_TAG_BIT: u16 = 0x4000;

pub mod tags {
    pub const NULL: u16 = 1;
    pub const RLE: u16 = 11;
    pub const LINKED: u16 = 20;
    pub const VERSION: u16 = 30;
    pub const COMPRESSED: u16 = 40;
    pub const CHUNK: u16 = 61;
    pub const FID: u16 = 100;
    pub const FD: u16 = 101;
    pub const DIL: u16 = 104;
    pub const DIA: u16 = 105;
    pub const NT: u16 = 106;
    pub const ID8: u16 = 200;
    pub const IP8: u16 = 201;
    pub const RI8: u16 = 202;
    pub const CI8: u16 = 203;
    pub const ID: u16 = 300;
    pub const LUT: u16 = 301;
    pub const RI: u16 = 302;
    pub const CI: u16 = 303;
    pub const RIG: u16 = 306;
    pub const LD: u16 = 307;
    pub const SDG: u16 = 700;
    pub const SDD: u16 = 701;
    pub const SD: u16 = 702;
    pub const NDG: u16 = 720;
    pub const FV: u16 = 732;
    pub const VH: u16 = 1962;
    pub const VS: u16 = 1963;
    pub const VG: u16 = 1965;
}

/// One directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descriptor {
    /// Tag with the special bit stripped.
    pub tag: u16,
    pub reference: u16,
    pub offset: u32,
    pub length: u32,
    pub special: bool,
}

impl Descriptor {
    pub fn raw_tag(&self) -> u16 {
        if self.special {
            self.tag | SPECIAL_TAG_BIT
        } else {
            self.tag
        }
    }
}

/// Arena of descriptors, indexed by `(tag, ref)`.
#[derive(Debug, Default)]
pub struct Directory {
    descriptors: Vec<Descriptor>,
    index: HashMap<(u16, u16), usize>,
}

impl Directory {
    pub fn read(source: &dyn Source) -> Result<Self> {
        let file_len = source.len();
        let mut signature = [0u8; 4];
        source
            .read_at(0, &mut signature)
            .map_err(|err| Hdf4Error::from(err).truncated("file signature"))?;
        if signature != SIGNATURE {
            return Err(Hdf4Error::format("missing HDF4 signature"));
        }

        let mut directory = Directory::default();
        let mut visited = HashSet::new();
        let mut block_offset = SIGNATURE.len() as u64;
        while block_offset != 0 {
            if !visited.insert(block_offset) {
                return Err(Hdf4Error::format(format!(
                    "DD block chain loops back to offset {block_offset}"
                )));
            }
            if block_offset + DD_BLOCK_HEADER_SIZE as u64 > file_len {
                return Err(Hdf4Error::format(format!(
                    "DD block offset {block_offset} is beyond end of file ({file_len})"
                )));
            }
            block_offset = directory.read_block(source, block_offset, file_len)?;
        }

        debug!(
            "directory holds {} descriptors in {} DD blocks",
            directory.descriptors.len(),
            visited.len()
        );
        Ok(directory)
    }

    /// Reads one DD block and returns the offset of the next one.
    fn read_block(&mut self, source: &dyn Source, offset: u64, file_len: u64) -> Result<u64> {
        let mut header = [0u8; DD_BLOCK_HEADER_SIZE];
        source
            .read_at(offset, &mut header)
            .map_err(|err| Hdf4Error::from(err).truncated("DD block header"))?;
        let mut reader = &header[..];
        let ndds = reader.read_u16::<BigEndian>()? as usize;
        let next = reader.read_u32::<BigEndian>()? as u64;
        trace!("DD block at {offset}: {ndds} descriptors, next at {next}");

        let mut entries = vec![0u8; ndds * DD_SIZE];
        source
            .read_at(offset + DD_BLOCK_HEADER_SIZE as u64, &mut entries)
            .map_err(|err| Hdf4Error::from(err).truncated("DD block"))?;
        let mut reader = entries.as_slice();
        for _ in 0..ndds {
            let raw_tag = reader.read_u16::<BigEndian>()?;
            let reference = reader.read_u16::<BigEndian>()?;
            let element_offset = reader.read_u32::<BigEndian>()?;
            let length = reader.read_u32::<BigEndian>()?;
            if raw_tag == tags::NULL {
                continue;
            }
            // Empty elements may carry an offset of -1. Truncated ones stay listed
            // and fail when read.
            if length > 0 && element_offset as u64 + length as u64 > file_len {
                warn!("element (tag {raw_tag}, ref {reference}) extends beyond end of file");
            }
            let special = raw_tag & SPECIAL_TAG_BIT != 0;
            self.push(Descriptor {
                tag: raw_tag & !SPECIAL_TAG_BIT,
                reference,
                offset: element_offset,
                length,
                special,
            });
        }
        Ok(next)
    }

    fn push(&mut self, descriptor: Descriptor) {
        // First occurrence wins, as with the HDF library's DD search.
        self.index
            .entry((descriptor.tag, descriptor.reference))
            .or_insert(self.descriptors.len());
        self.descriptors.push(descriptor);
    }

    pub fn get(&self, tag: u16, reference: u16) -> Option<&Descriptor> {
        self.index
            .get(&(tag, reference))
            .map(|idx| &self.descriptors[*idx])
    }

    pub fn contains(&self, tag: u16, reference: u16) -> bool {
        self.index.contains_key(&(tag, reference))
    }

    /// Descriptors carrying `tag`, in directory order.
    pub fn with_tag(&self, tag: u16) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter().filter(move |dd| dd.tag == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
