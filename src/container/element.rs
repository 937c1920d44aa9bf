//! Element storage: plain byte ranges and the special-element variants
//! (linked blocks, compressed, chunked) that wrap them.

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use log::{debug, trace};
use std::{collections::HashMap, io::Read};

use super::{
    directory::tags,
    records::{TagRef, VdataHeader},
    Container,
};
use crate::errors::{Hdf4Error, Result};

const SPECIAL_LINKED: u16 = 1;
const SPECIAL_EXT: u16 = 2;
const SPECIAL_COMP: u16 = 3;
const SPECIAL_CHUNKED: u16 = 5;

const RLE_MIN_RUN: usize = 3;
const RLE_MIN_MIX: usize = 1;
/// Longest output of one RLE packet per input byte.
const RLE_MAX_EXPANSION: usize = 65;

/// Product of sizes read from the file, as a format error on overflow.
pub(crate) fn checked_size(what: &str, factors: &[usize]) -> Result<usize> {
    factors
        .iter()
        .try_fold(1usize, |product, factor| product.checked_mul(*factor))
        .ok_or_else(|| Hdf4Error::format(format!("{what} size overflows")))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coder {
    None,
    Rle,
    Deflate,
}

impl Coder {
    fn from_code(tag: u16, reference: u16, code: u16) -> Result<Self> {
        match code {
            0 => Ok(Coder::None),
            1 => Ok(Coder::Rle),
            4 => Ok(Coder::Deflate),
            2 => Err(Hdf4Error::unsupported(tag, reference, "N-bit compression")),
            3 => Err(Hdf4Error::unsupported(tag, reference, "skipping Huffman compression")),
            5 => Err(Hdf4Error::unsupported(tag, reference, "SZIP compression")),
            other => Err(Hdf4Error::unsupported(
                tag,
                reference,
                format!("compression code {other}"),
            )),
        }
    }

    pub fn decode(self, input: &[u8], expected: usize) -> Result<Vec<u8>> {
        let mut output = match self {
            Coder::None => input.to_vec(),
            Coder::Rle => decode_rle(input, expected)?,
            Coder::Deflate => {
                let mut output = Vec::new();
                ZlibDecoder::new(input)
                    .take(expected as u64)
                    .read_to_end(&mut output)
                    .map_err(|err| Hdf4Error::Decompression(err.to_string()))?;
                output
            }
        };
        if output.len() < expected {
            return Err(Hdf4Error::Decompression(format!(
                "expected {expected} bytes, got {}",
                output.len()
            )));
        }
        output.truncate(expected);
        Ok(output)
    }
}

/// Run-length scheme of the HDF `COMP_CODE_RLE` coder: a control byte with the
/// high bit set announces a run of `(c & 0x7f) + 3` copies of the next byte,
/// otherwise `c + 1` literal bytes follow.
fn decode_rle(input: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(expected.min(input.len().saturating_mul(RLE_MAX_EXPANSION)));
    let mut bytes = input.iter().copied();
    let short = || Hdf4Error::Decompression("RLE stream ends inside a packet".into());
    while output.len() < expected {
        let Some(control) = bytes.next() else { break };
        if control & 0x80 != 0 {
            let count = (control & 0x7f) as usize + RLE_MIN_RUN;
            let value = bytes.next().ok_or_else(short)?;
            output.extend(std::iter::repeat(value).take(count));
        } else {
            for _ in 0..control as usize + RLE_MIN_MIX {
                output.push(bytes.next().ok_or_else(short)?);
            }
        }
    }
    Ok(output)
}

/// Chunked element: a regular grid of separately stored chunks.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkedLayout {
    pub length: u64,
    pub dims: Vec<usize>,
    pub chunk_dims: Vec<usize>,
    pub element_size: usize,
    pub fill: Vec<u8>,
    /// Chunk grid coordinates to the element holding that chunk.
    pub chunks: HashMap<Vec<usize>, TagRef>,
}

impl ChunkedLayout {
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_dims.iter().product::<usize>() * self.element_size
    }

    /// A chunk filled with the fill value.
    pub fn fill_chunk(&self) -> Vec<u8> {
        let mut chunk = vec![0u8; self.chunk_bytes()];
        if !self.fill.is_empty() && self.fill.iter().any(|byte| *byte != 0) {
            for element in chunk.chunks_exact_mut(self.element_size) {
                let len = element.len().min(self.fill.len());
                element[..len].copy_from_slice(&self.fill[..len]);
            }
        }
        chunk
    }

    pub fn grid_shape(&self) -> Vec<usize> {
        self.dims
            .iter()
            .zip(&self.chunk_dims)
            .map(|(dim, chunk)| dim.div_ceil(*chunk))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ElementLayout {
    /// Element with no stored data (never written).
    Empty,
    Contiguous {
        offset: u64,
        length: u64,
    },
    Linked {
        length: u64,
        blocks: Vec<(u64, u64)>,
    },
    Compressed {
        length: u64,
        coder: Coder,
        data: Box<ElementLayout>,
    },
    Chunked(ChunkedLayout),
}

impl ElementLayout {
    /// Logical (uncompressed) size in bytes.
    pub fn length(&self) -> u64 {
        match self {
            ElementLayout::Empty => 0,
            ElementLayout::Contiguous { length, .. }
            | ElementLayout::Linked { length, .. }
            | ElementLayout::Compressed { length, .. } => *length,
            ElementLayout::Chunked(chunked) => chunked.length,
        }
    }

    pub fn is_random_access(&self) -> bool {
        matches!(
            self,
            ElementLayout::Empty | ElementLayout::Contiguous { .. } | ElementLayout::Linked { .. }
        )
    }
}

impl Container {
    /// Resolves how the element `(tag, ref)` is stored.
    pub fn layout(&self, tag: u16, reference: u16) -> Result<ElementLayout> {
        let descriptor = *self.directory().get(tag, reference).ok_or_else(|| {
            Hdf4Error::format(format!("no element with tag {tag} and ref {reference}"))
        })?;
        if !descriptor.special {
            if descriptor.length == 0 {
                return Ok(ElementLayout::Empty);
            }
            return Ok(ElementLayout::Contiguous {
                offset: descriptor.offset as u64,
                length: descriptor.length as u64,
            });
        }

        let header = self.read_raw(descriptor.offset as u64, descriptor.length as usize)?;
        let mut reader = header.as_slice();
        let code = reader
            .read_u16::<BigEndian>()
            .map_err(|err| Hdf4Error::from(err).truncated("special element header"))?;
        trace!("element ({tag}, {reference}) is special with code {code}");
        let layout = match code {
            SPECIAL_LINKED => self.linked_layout(reader),
            SPECIAL_COMP => self.compressed_layout(tag, reference, reader),
            SPECIAL_CHUNKED => self.chunked_layout(reader),
            SPECIAL_EXT => Err(Hdf4Error::unsupported(
                tag,
                reference,
                "data stored in an external file",
            )),
            other => Err(Hdf4Error::unsupported(
                tag,
                reference,
                format!("special element code {other}"),
            )),
        };
        layout.map_err(|err| err.truncated("special element header"))
    }

    fn linked_layout(&self, mut reader: &[u8]) -> Result<ElementLayout> {
        let length = reader.read_u32::<BigEndian>()? as u64;
        let first_length = reader.read_u32::<BigEndian>()? as u64;
        let block_length = reader.read_u32::<BigEndian>()? as u64;
        let block_count = reader.read_u32::<BigEndian>()? as usize;
        let mut link_ref = reader.read_u16::<BigEndian>()?;

        let mut blocks = Vec::new();
        let mut remaining = length;
        let mut seen = std::collections::HashSet::new();
        while link_ref != 0 && remaining > 0 {
            if !seen.insert(link_ref) {
                return Err(Hdf4Error::format("linked block table loops"));
            }
            let table = self.read_contiguous(tags::LINKED, link_ref)?;
            let mut table_reader = table.as_slice();
            let next_ref = table_reader.read_u16::<BigEndian>()?;
            for _ in 0..block_count {
                let block_ref = table_reader.read_u16::<BigEndian>()?;
                if block_ref == 0 || remaining == 0 {
                    break;
                }
                let block = self.directory().get(tags::LINKED, block_ref).ok_or_else(|| {
                    Hdf4Error::format(format!("missing linked block {block_ref}"))
                })?;
                let nominal = if blocks.is_empty() {
                    first_length
                } else {
                    block_length
                };
                let take = nominal.min(block.length as u64).min(remaining);
                if block.offset as u64 + take > self.source.len() {
                    return Err(Hdf4Error::format(format!(
                        "linked block {block_ref} extends beyond end of file"
                    )));
                }
                blocks.push((block.offset as u64, take));
                remaining -= take;
            }
            link_ref = next_ref;
        }
        if remaining > 0 {
            return Err(Hdf4Error::format(format!(
                "linked element is missing {remaining} of {length} bytes"
            )));
        }
        Ok(ElementLayout::Linked { length, blocks })
    }

    fn compressed_layout(&self, tag: u16, reference: u16, mut reader: &[u8]) -> Result<ElementLayout> {
        let _version = reader.read_u16::<BigEndian>()?;
        let length = reader.read_u32::<BigEndian>()? as u64;
        let data_ref = reader.read_u16::<BigEndian>()?;
        let _model = reader.read_u16::<BigEndian>()?;
        let coder = Coder::from_code(tag, reference, reader.read_u16::<BigEndian>()?)?;
        let data = if self.directory().contains(tags::COMPRESSED, data_ref) {
            self.layout(tags::COMPRESSED, data_ref)?
        } else {
            ElementLayout::Empty
        };
        Ok(ElementLayout::Compressed {
            length,
            coder,
            data: Box::new(data),
        })
    }

    fn chunked_layout(&self, mut reader: &[u8]) -> Result<ElementLayout> {
        let _header_length = reader.read_u32::<BigEndian>()?;
        let _version = reader.read_u8()?;
        let _flag = reader.read_u32::<BigEndian>()?;
        let length = reader.read_u32::<BigEndian>()? as u64;
        let _chunk_size = reader.read_u32::<BigEndian>()?;
        let element_size = reader.read_u32::<BigEndian>()? as usize;
        let _table_tag = reader.read_u16::<BigEndian>()?;
        let table_ref = reader.read_u16::<BigEndian>()?;
        let _sp_tag = reader.read_u16::<BigEndian>()?;
        let _sp_ref = reader.read_u16::<BigEndian>()?;
        let rank = reader.read_i32::<BigEndian>()?;
        if !(1..=32).contains(&rank) || element_size == 0 {
            return Err(Hdf4Error::format(format!(
                "chunked element with rank {rank} and element size {element_size}"
            )));
        }
        let mut dims = Vec::with_capacity(rank as usize);
        let mut chunk_dims = Vec::with_capacity(rank as usize);
        for _ in 0..rank {
            let _distribution = reader.read_u32::<BigEndian>()?;
            dims.push(reader.read_u32::<BigEndian>()? as usize);
            chunk_dims.push((reader.read_u32::<BigEndian>()? as usize).max(1));
        }
        let total_bytes = checked_size("chunked element", &dims)
            .and_then(|count| checked_size("chunked element", &[count, element_size]))?;
        checked_size("chunk", &chunk_dims)
            .and_then(|count| checked_size("chunk", &[count, element_size]))?;
        let oversized = dims.iter().zip(&chunk_dims).any(|(dim, chunk)| *dim > 0 && chunk > dim);
        if oversized || total_bytes as u64 > length {
            return Err(Hdf4Error::format(format!(
                "chunked element {dims:?} with chunks {chunk_dims:?} does not fit its {length} bytes"
            )));
        }
        let fill_length = reader.read_u32::<BigEndian>()? as usize;
        let fill = reader
            .get(..fill_length)
            .ok_or_else(|| Hdf4Error::format("chunked element fill value is truncated"))?
            .to_vec();

        let (table, storage) = self.vdata(table_ref)?;
        let origin_field = table
            .field("origin")
            .ok_or_else(|| Hdf4Error::format("chunk table has no 'origin' field"))?;
        let tag_field = table
            .field("chk_tag")
            .ok_or_else(|| Hdf4Error::format("chunk table has no 'chk_tag' field"))?;
        let ref_field = table
            .field("chk_ref")
            .ok_or_else(|| Hdf4Error::format("chunk table has no 'chk_ref' field"))?;
        let origins = table.field_bytes(&storage, origin_field)?;
        let chunk_tags = table.field_bytes(&storage, tag_field)?;
        let chunk_refs = table.field_bytes(&storage, ref_field)?;
        if origin_field.size < 4 * rank as usize || tag_field.size < 2 || ref_field.size < 2 {
            return Err(Hdf4Error::format("chunk table fields are too narrow"));
        }

        let mut chunks = HashMap::with_capacity(table.records);
        for record in 0..table.records {
            let mut origin_reader = &origins[record * origin_field.size..][..origin_field.size];
            let origin = (0..rank)
                .map(|_| origin_reader.read_i32::<BigEndian>().map(|idx| idx.max(0) as usize))
                .collect::<std::io::Result<Vec<_>>>()?;
            let chunk_tag = (&chunk_tags[record * tag_field.size..]).read_u16::<BigEndian>()?;
            let chunk_ref = (&chunk_refs[record * ref_field.size..]).read_u16::<BigEndian>()?;
            chunks.insert(origin, TagRef::new(chunk_tag, chunk_ref));
        }
        debug!(
            "chunked element {:?} with chunks {:?}: {} of {} chunks stored",
            dims,
            chunk_dims,
            chunks.len(),
            dims.iter()
                .zip(&chunk_dims)
                .map(|(dim, chunk)| dim.div_ceil(*chunk))
                .product::<usize>()
        );
        Ok(ElementLayout::Chunked(ChunkedLayout {
            length,
            dims,
            chunk_dims,
            element_size,
            fill,
            chunks,
        }))
    }

    /// Bytes of a non-special element.
    pub(crate) fn read_contiguous(&self, tag: u16, reference: u16) -> Result<Vec<u8>> {
        let descriptor = self.directory().get(tag, reference).ok_or_else(|| {
            Hdf4Error::format(format!("no element with tag {tag} and ref {reference}"))
        })?;
        self.read_raw(descriptor.offset as u64, descriptor.length as usize)
    }

    /// Reads `buf.len()` bytes at `offset` of a random access layout.
    pub fn read_span(&self, layout: &ElementLayout, offset: u64, buf: &mut [u8]) -> Result<()> {
        match layout {
            ElementLayout::Empty => {
                buf.fill(0);
                Ok(())
            }
            ElementLayout::Contiguous {
                offset: start,
                length,
            } => {
                if offset + buf.len() as u64 > *length {
                    return Err(Hdf4Error::format(format!(
                        "read of {} bytes at {offset} beyond element of {length} bytes",
                        buf.len()
                    )));
                }
                self.read_into(start + offset, buf)
            }
            ElementLayout::Linked { blocks, .. } => {
                let mut block_start = 0u64;
                let mut written = 0usize;
                for (block_offset, block_length) in blocks {
                    let block_end = block_start + block_length;
                    let wanted = offset + written as u64;
                    if written < buf.len() && wanted < block_end {
                        let within = wanted - block_start;
                        let take = ((block_length - within) as usize).min(buf.len() - written);
                        self.read_into(block_offset + within, &mut buf[written..written + take])?;
                        written += take;
                    }
                    block_start = block_end;
                }
                if written < buf.len() {
                    return Err(Hdf4Error::format("read beyond end of linked element"));
                }
                Ok(())
            }
            ElementLayout::Compressed { .. } | ElementLayout::Chunked(_) => {
                let decoded = self.read_layout(layout)?;
                let start = offset as usize;
                let source = decoded
                    .get(start..start + buf.len())
                    .ok_or_else(|| Hdf4Error::format("read beyond end of element"))?;
                buf.copy_from_slice(source);
                Ok(())
            }
        }
    }

    /// Complete logical content of an element.
    pub fn read_layout(&self, layout: &ElementLayout) -> Result<Vec<u8>> {
        match layout {
            ElementLayout::Compressed {
                length,
                coder,
                data,
            } => {
                let raw = self.read_layout(data)?;
                coder.decode(&raw, *length as usize)
            }
            ElementLayout::Chunked(chunked) => self.assemble_chunks(chunked),
            ElementLayout::Contiguous { offset, length } => self.read_raw(*offset, *length as usize),
            random_access => {
                let mut buf = vec![0u8; random_access.length() as usize];
                self.read_span(random_access, 0, &mut buf)?;
                Ok(buf)
            }
        }
    }

    pub fn read_element(&self, tag: u16, reference: u16) -> Result<Vec<u8>> {
        let layout = self.layout(tag, reference)?;
        self.read_layout(&layout)
    }

    /// Decoded chunk at grid coordinates `index`, padded with fill when short
    /// or never written.
    pub fn read_chunk(&self, chunked: &ChunkedLayout, index: &[usize]) -> Result<Vec<u8>> {
        let Some(location) = chunked.chunks.get(index) else {
            return Ok(chunked.fill_chunk());
        };
        let mut bytes = self.read_element(location.tag, location.reference)?;
        let expected = chunked.chunk_bytes();
        if bytes.len() < expected {
            let fill = chunked.fill_chunk();
            bytes.extend_from_slice(&fill[bytes.len()..]);
        }
        bytes.truncate(expected);
        Ok(bytes)
    }

    fn assemble_chunks(&self, chunked: &ChunkedLayout) -> Result<Vec<u8>> {
        let rank = chunked.dims.len();
        let es = chunked.element_size;
        let total: usize = chunked.dims.iter().product();
        let mut out = vec![0u8; total * es];
        let grid = chunked.grid_shape();
        let mut strides = vec![1usize; rank];
        for axis in (0..rank.saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * chunked.dims[axis + 1];
        }
        let mut chunk_strides = vec![1usize; rank];
        for axis in (0..rank.saturating_sub(1)).rev() {
            chunk_strides[axis] = chunk_strides[axis + 1] * chunked.chunk_dims[axis + 1];
        }

        for index in odometer(&grid) {
            let chunk = self.read_chunk(chunked, &index)?;
            let origin: Vec<usize> = index
                .iter()
                .zip(&chunked.chunk_dims)
                .map(|(idx, chunk)| idx * chunk)
                .collect();
            let extent: Vec<usize> = (0..rank)
                .map(|axis| chunked.chunk_dims[axis].min(chunked.dims[axis] - origin[axis]))
                .collect();
            let run = extent[rank - 1] * es;
            for within in odometer(&extent[..rank - 1]) {
                let src = within
                    .iter()
                    .zip(&chunk_strides)
                    .map(|(pos, stride)| pos * stride)
                    .sum::<usize>()
                    * es;
                let dst = within
                    .iter()
                    .enumerate()
                    .map(|(axis, pos)| (origin[axis] + pos) * strides[axis])
                    .sum::<usize>()
                    + origin[rank - 1];
                out[dst * es..dst * es + run].copy_from_slice(&chunk[src..src + run]);
            }
        }
        Ok(out)
    }

    /// Header and record storage of vdata `reference`.
    pub fn vdata(&self, reference: u16) -> Result<(VdataHeader, Vec<u8>)> {
        let header_bytes = self.read_element(tags::VH, reference)?;
        let header = VdataHeader::parse(reference, &header_bytes)?;
        let storage = if self.directory().contains(tags::VS, reference) {
            self.read_element(tags::VS, reference)?
        } else {
            Vec::new()
        };
        Ok((header, storage))
    }
}

/// All coordinates of a grid with the given shape, last axis fastest.
pub(crate) fn odometer(shape: &[usize]) -> impl Iterator<Item = Vec<usize>> + '_ {
    let total: usize = shape.iter().product();
    (0..total).map(move |mut linear| {
        let mut coords = vec![0usize; shape.len()];
        for axis in (0..shape.len()).rev() {
            coords[axis] = linear % shape[axis];
            linear /= shape[axis];
        }
        coords
    })
}
