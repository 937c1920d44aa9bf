//! Decoders for the fixed-layout records referenced from the directory.
//!
//! All records are big-endian. Each parser works on the fully read element
//! bytes and reports truncation as a format error.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::Read;

use super::number_type::{Endian, NumberType};
use crate::errors::{Hdf4Error, Result};

/// `(tag, ref)` pair as listed by group records and vgroups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TagRef {
    pub tag: u16,
    pub reference: u16,
}

impl TagRef {
    pub fn new(tag: u16, reference: u16) -> Self {
        Self { tag, reference }
    }
}

fn truncated(what: &'static str) -> impl Fn(std::io::Error) -> Hdf4Error {
    move |err| Hdf4Error::from(err).truncated(what)
}

fn read_string(reader: &mut &[u8], what: &'static str) -> Result<String> {
    let len = reader.read_u16::<BigEndian>().map_err(truncated(what))? as usize;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).map_err(truncated(what))?;
    Ok(decode_text(&bytes))
}

/// Text stored in a fixed-size field, without trailing NULs.
pub fn decode_text(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|byte| *byte != 0)
        .map_or(0, |pos| pos + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Group records (NDG, SDG, RIG) are flat `(tag, ref)` lists.
pub fn parse_group(bytes: &[u8]) -> Result<Vec<TagRef>> {
    if bytes.len() % 4 != 0 {
        return Err(Hdf4Error::format(format!(
            "group record length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    let mut reader = bytes;
    let mut members = Vec::with_capacity(bytes.len() / 4);
    while !reader.is_empty() {
        let tag = reader.read_u16::<BigEndian>()?;
        let reference = reader.read_u16::<BigEndian>()?;
        members.push(TagRef::new(tag, reference));
    }
    Ok(members)
}

/// `DFTAG_SDD`: rank, dimension sizes and the number type of the data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DimensionRecord {
    pub dims: Vec<usize>,
    pub number_type_ref: TagRef,
}

impl DimensionRecord {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let what = "SDD record";
        let rank = reader.read_u16::<BigEndian>().map_err(truncated(what))? as usize;
        let dims = (0..rank)
            .map(|_| {
                reader
                    .read_u32::<BigEndian>()
                    .map(|dim| dim as usize)
                    .map_err(truncated(what))
            })
            .collect::<Result<Vec<_>>>()?;
        let tag = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        let reference = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        Ok(Self {
            dims,
            number_type_ref: TagRef::new(tag, reference),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interlace {
    Pixel,
    Line,
    Component,
}

impl Interlace {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::Pixel),
            1 => Some(Self::Line),
            2 => Some(Self::Component),
            _ => None,
        }
    }
}

/// `DFTAG_ID`/`DFTAG_LD`: image or palette dimensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageDimensionRecord {
    pub width: usize,
    pub height: usize,
    pub number_type_ref: TagRef,
    pub components: usize,
    pub interlace: u16,
    pub compression: TagRef,
}

impl ImageDimensionRecord {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let what = "image dimension record";
        let width = reader.read_u32::<BigEndian>().map_err(truncated(what))? as usize;
        let height = reader.read_u32::<BigEndian>().map_err(truncated(what))? as usize;
        let nt_tag = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        let nt_ref = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        let components = reader.read_u16::<BigEndian>().map_err(truncated(what))? as usize;
        let interlace = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        let compression_tag = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        let compression_ref = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        Ok(Self {
            width,
            height,
            number_type_ref: TagRef::new(nt_tag, nt_ref),
            components,
            interlace,
            compression: TagRef::new(compression_tag, compression_ref),
        })
    }

    /// `DFTAG_ID8`: two 16-bit sizes of an 8-bit image.
    pub fn parse_id8(bytes: &[u8]) -> Result<(usize, usize)> {
        let mut reader = bytes;
        let what = "ID8 record";
        let width = reader.read_u16::<BigEndian>().map_err(truncated(what))? as usize;
        let height = reader.read_u16::<BigEndian>().map_err(truncated(what))? as usize;
        Ok((width, height))
    }
}

/// `DFTAG_VG`: a named, classed list of `(tag, ref)` members.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vgroup {
    pub reference: u16,
    pub name: String,
    pub class: String,
    pub members: Vec<TagRef>,
}

impl Vgroup {
    pub fn parse(reference: u16, bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let what = "vgroup";
        let count = reader.read_u16::<BigEndian>().map_err(truncated(what))? as usize;
        let tags = (0..count)
            .map(|_| reader.read_u16::<BigEndian>().map_err(truncated(what)))
            .collect::<Result<Vec<_>>>()?;
        let refs = (0..count)
            .map(|_| reader.read_u16::<BigEndian>().map_err(truncated(what)))
            .collect::<Result<Vec<_>>>()?;
        let name = read_string(&mut reader, what)?;
        let class = read_string(&mut reader, what)?;
        let members = tags
            .into_iter()
            .zip(refs)
            .map(|(tag, reference)| TagRef::new(tag, reference))
            .collect();
        Ok(Self {
            reference,
            name,
            class,
            members,
        })
    }

    pub fn members_with_tag(&self, tag: u16) -> impl Iterator<Item = u16> + '_ {
        self.members
            .iter()
            .filter(move |member| member.tag == tag)
            .map(|member| member.reference)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VdataField {
    pub name: String,
    pub type_code: u16,
    /// Bytes of one record's worth of this field.
    pub size: usize,
    pub offset: usize,
    pub order: usize,
}

impl VdataField {
    pub fn number_type(&self) -> Option<NumberType> {
        NumberType::from_code(self.type_code)
    }

    pub fn endian(&self) -> Endian {
        NumberType::endian_of_code(self.type_code)
    }
}

/// `DFTAG_VH`: vdata header. Records live in `DFTAG_VS` with the same ref.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VdataHeader {
    pub reference: u16,
    pub name: String,
    pub class: String,
    /// `true` for field-major (`NO_INTERLACE`) storage.
    pub field_major: bool,
    pub records: usize,
    pub record_size: usize,
    pub fields: Vec<VdataField>,
}

impl VdataHeader {
    pub fn parse(reference: u16, bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let what = "vdata header";
        let interlace = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        let records = reader.read_u32::<BigEndian>().map_err(truncated(what))? as usize;
        let record_size = reader.read_u16::<BigEndian>().map_err(truncated(what))? as usize;
        let nfields = reader.read_u16::<BigEndian>().map_err(truncated(what))? as usize;
        let mut columns = [vec![], vec![], vec![], vec![]];
        for column in columns.iter_mut() {
            *column = (0..nfields)
                .map(|_| reader.read_u16::<BigEndian>().map_err(truncated(what)))
                .collect::<Result<Vec<_>>>()?;
        }
        let [types, sizes, offsets, orders] = columns;
        let names = (0..nfields)
            .map(|_| read_string(&mut reader, what))
            .collect::<Result<Vec<_>>>()?;
        let name = read_string(&mut reader, what)?;
        let class = read_string(&mut reader, what)?;

        let fields = names
            .into_iter()
            .enumerate()
            .map(|(idx, field_name)| VdataField {
                name: field_name,
                type_code: types[idx],
                size: sizes[idx] as usize,
                offset: offsets[idx] as usize,
                order: orders[idx] as usize,
            })
            .collect();
        Ok(Self {
            reference,
            name,
            class,
            field_major: interlace == 1,
            records,
            record_size,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&VdataField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Bytes of `field` for every record, concatenated in record order.
    ///
    /// Sizes come from the header, so every offset is checked against
    /// `storage` before anything is allocated.
    pub fn field_bytes(&self, storage: &[u8], field: &VdataField) -> Result<Vec<u8>> {
        let truncated = || Hdf4Error::format(format!("vdata '{}' is truncated", self.name));
        let total = self
            .records
            .checked_mul(field.size)
            .filter(|total| *total <= storage.len())
            .ok_or_else(truncated)?;
        if total == 0 {
            return Ok(Vec::new());
        }
        if self.field_major {
            let preceding = self
                .fields
                .iter()
                .take_while(|other| other.name != field.name)
                .try_fold(0usize, |sum, other| {
                    other.size.checked_mul(self.records)?.checked_add(sum)
                })
                .ok_or_else(truncated)?;
            let slice = storage
                .get(preceding..)
                .and_then(|rest| rest.get(..total))
                .ok_or_else(truncated)?;
            return Ok(slice.to_vec());
        }
        let mut out = Vec::with_capacity(total);
        for record in 0..self.records {
            let slice = record
                .checked_mul(self.record_size)
                .and_then(|at| at.checked_add(field.offset))
                .and_then(|start| storage.get(start..)?.get(..field.size))
                .ok_or_else(truncated)?;
            out.extend_from_slice(slice);
        }
        Ok(out)
    }
}

/// Data-object annotation (`DFTAG_DIL`/`DFTAG_DIA`): target object and text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectAnnotation {
    pub target: TagRef,
    pub text: String,
}

impl ObjectAnnotation {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let what = "annotation";
        let tag = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        let reference = reader.read_u16::<BigEndian>().map_err(truncated(what))?;
        Ok(Self {
            target: TagRef::new(tag, reference),
            text: decode_text(reader),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn put_str(out: &mut Vec<u8>, text: &str) {
        out.extend_from_slice(&(text.len() as u16).to_be_bytes());
        out.extend_from_slice(text.as_bytes());
    }

    #[rstest]
    fn sdd_reads_dims_and_number_type_reference() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&20u32.to_be_bytes());
        bytes.extend_from_slice(&30u32.to_be_bytes());
        bytes.extend_from_slice(&106u16.to_be_bytes());
        bytes.extend_from_slice(&7u16.to_be_bytes());
        let record = DimensionRecord::parse(&bytes).unwrap();
        assert_eq!(record.dims, vec![20, 30]);
        assert_eq!(record.number_type_ref, TagRef::new(106, 7));
    }

    #[rstest]
    fn truncated_sdd_is_a_format_error() {
        let err = DimensionRecord::parse(&[0, 2, 0, 0]).unwrap_err();
        assert!(matches!(err, Hdf4Error::Format(_)), "{err:?}");
    }

    #[rstest]
    fn group_length_must_be_pairs() {
        assert!(parse_group(&[0, 1, 0]).is_err());
        let members = parse_group(&[2, 189, 0, 3, 2, 190, 0, 4]).unwrap();
        assert_eq!(members, vec![TagRef::new(701, 3), TagRef::new(702, 4)]);
    }

    #[rstest]
    fn vgroup_names_and_members() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&720u16.to_be_bytes());
        bytes.extend_from_slice(&9u16.to_be_bytes());
        put_str(&mut bytes, "sst");
        put_str(&mut bytes, "Var0.0");
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 3, 0, 0]);
        let vgroup = Vgroup::parse(4, &bytes).unwrap();
        assert_eq!(vgroup.name, "sst");
        assert_eq!(vgroup.class, "Var0.0");
        assert_eq!(vgroup.members_with_tag(720).collect::<Vec<_>>(), vec![9]);
    }

    #[rstest]
    fn field_major_vdata_slices_columns() {
        let header = VdataHeader {
            reference: 1,
            name: "table".into(),
            class: String::new(),
            field_major: true,
            records: 2,
            record_size: 3,
            fields: vec![
                VdataField {
                    name: "a".into(),
                    type_code: 21,
                    size: 1,
                    offset: 0,
                    order: 1,
                },
                VdataField {
                    name: "b".into(),
                    type_code: 22,
                    size: 2,
                    offset: 1,
                    order: 1,
                },
            ],
        };
        let storage = [1, 2, 0, 3, 0, 4];
        let b = header.field("b").unwrap();
        assert_eq!(header.field_bytes(&storage, b).unwrap(), vec![0, 3, 0, 4]);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn oversized_vdata_is_a_format_error(#[case] field_major: bool) {
        let field = VdataField {
            name: "VALUES".into(),
            type_code: 21,
            size: 0xffff,
            offset: 0,
            order: 0xffff,
        };
        let header = VdataHeader {
            reference: 1,
            name: "huge".into(),
            class: "Attr0.0".into(),
            field_major,
            records: u32::MAX as usize,
            record_size: 0xffff,
            fields: vec![field.clone()],
        };
        let err = header.field_bytes(&[0; 16], &field).unwrap_err();
        assert!(matches!(err, Hdf4Error::Format(_)), "{err:?}");

        let short = VdataHeader {
            records: 4,
            record_size: 2,
            ..header
        };
        let narrow = VdataField { size: 2, ..field };
        assert!(short.field_bytes(&[0; 7], &narrow).is_err());
        assert_eq!(short.field_bytes(&[7; 8], &narrow).unwrap(), vec![7; 8]);
    }

    #[rstest]
    fn text_drops_trailing_nuls() {
        assert_eq!(decode_text(b"GRID\0\0"), "GRID");
        assert_eq!(decode_text(b"\0"), "");
    }
}
