//! Binary container parser: directory, records and element storage of an HDF4 file.

pub mod array;
pub mod directory;
pub mod element;
pub mod number_type;
pub mod records;
pub mod source;

use log::{info, warn};
use std::{fmt::Debug, path::Path, sync::Arc};

pub use array::ArrayStore;
pub use directory::{tags, Descriptor, Directory};
pub use element::{ChunkedLayout, Coder, ElementLayout};
pub use number_type::{Endian, NumberType, NumberTypeRecord};
pub use records::{
    DimensionRecord, ImageDimensionRecord, Interlace, ObjectAnnotation, TagRef, VdataHeader,
    Vgroup,
};
pub use source::{FileSource, MemorySource, Source};

use crate::errors::{Hdf4Error, Result};

/// Typed attribute value decoded from a vdata field.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integers(Vec<i64>),
    Floats(Vec<f64>),
}

impl AttributeValue {
    pub fn decode(number_type: NumberType, endian: Endian, bytes: &[u8]) -> Self {
        use byteorder::{BigEndian, ByteOrder, LittleEndian};

        fn read<B: ByteOrder>(number_type: NumberType, bytes: &[u8]) -> AttributeValue {
            let chunks = bytes.chunks_exact(number_type.size());
            match number_type {
                NumberType::Char8 | NumberType::UChar8 => {
                    AttributeValue::Text(records::decode_text(bytes))
                }
                NumberType::Float32 => {
                    AttributeValue::Floats(chunks.map(|c| B::read_f32(c) as f64).collect())
                }
                NumberType::Float64 => AttributeValue::Floats(chunks.map(B::read_f64).collect()),
                NumberType::Int8 => AttributeValue::Integers(chunks.map(|c| c[0] as i8 as i64).collect()),
                NumberType::UInt8 => AttributeValue::Integers(chunks.map(|c| c[0] as i64).collect()),
                NumberType::Int16 => {
                    AttributeValue::Integers(chunks.map(|c| B::read_i16(c) as i64).collect())
                }
                NumberType::UInt16 => {
                    AttributeValue::Integers(chunks.map(|c| B::read_u16(c) as i64).collect())
                }
                NumberType::Int32 => {
                    AttributeValue::Integers(chunks.map(|c| B::read_i32(c) as i64).collect())
                }
                NumberType::UInt32 => {
                    AttributeValue::Integers(chunks.map(|c| B::read_u32(c) as i64).collect())
                }
                NumberType::Int64 => AttributeValue::Integers(chunks.map(B::read_i64).collect()),
                NumberType::UInt64 => {
                    AttributeValue::Integers(chunks.map(|c| B::read_u64(c) as i64).collect())
                }
            }
        }

        match endian {
            Endian::Big => read::<BigEndian>(number_type, bytes),
            Endian::Little => read::<LittleEndian>(number_type, bytes),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// First numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integers(values) => values.first().map(|value| *value as f64),
            AttributeValue::Floats(values) => values.first().copied(),
            AttributeValue::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;
        match self {
            AttributeValue::Text(text) => f.write_str(text),
            AttributeValue::Integers(values) => write!(f, "{}", values.iter().join(", ")),
            AttributeValue::Floats(values) => write!(f, "{}", values.iter().join(", ")),
        }
    }
}

/// Named attribute (`Attr0.0` vdata).
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

/// An opened HDF4 file with its directory resolved.
///
/// The directory is read once on open; element reads afterwards are
/// independent positional reads against the source.
pub struct Container {
    name: String,
    source: Box<dyn Source>,
    directory: Directory,
}

impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("len", &self.source.len())
            .field("descriptors", &self.directory.len())
            .finish()
    }
}

impl Container {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let path = path.as_ref();
        info!("opening HDF4 container {}", path.display());
        let source = FileSource::open(path)?;
        Self::from_source(path.display().to_string(), Box::new(source))
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Arc<Self>> {
        Self::from_source(name.into(), Box::new(MemorySource::new(bytes)))
    }

    pub fn from_source(name: String, source: Box<dyn Source>) -> Result<Arc<Self>> {
        let directory = Directory::read(source.as_ref())?;
        Ok(Arc::new(Self {
            name,
            source,
            directory,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn read_raw(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let end = offset.checked_add(len as u64);
        if end.map_or(true, |end| end > self.source.len()) {
            return Err(Hdf4Error::format(format!(
                "element of {len} bytes at offset {offset} extends beyond end of file ({})",
                self.source.len()
            )));
        }
        let mut buf = vec![0u8; len];
        self.read_into(offset, &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn read_into(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.source
            .read_at(offset, buf)
            .map_err(|err| Hdf4Error::from(err).truncated("element"))
    }

    pub fn number_type(&self, reference: u16) -> Result<NumberTypeRecord> {
        let bytes = self.read_contiguous(tags::NT, reference)?;
        NumberTypeRecord::parse(&bytes).ok_or_else(|| {
            Hdf4Error::unsupported(tags::NT, reference, format!("number type record {bytes:?}"))
        })
    }

    pub fn vgroup(&self, reference: u16) -> Result<Vgroup> {
        let bytes = self.read_element(tags::VG, reference)?;
        Vgroup::parse(reference, &bytes)
    }

    /// Vgroups whose class equals `class`, in directory order. Undecodable
    /// vgroups are skipped.
    pub fn vgroups_with_class(&self, class: &str) -> Vec<Vgroup> {
        self.directory
            .with_tag(tags::VG)
            .filter_map(|dd| match self.vgroup(dd.reference) {
                Ok(vgroup) => Some(vgroup),
                Err(err) => {
                    warn!("skipping vgroup {}: {err}", dd.reference);
                    None
                }
            })
            .filter(|vgroup| vgroup.class == class)
            .collect()
    }

    /// Decodes an attribute vdata: name from the vdata, value from its first field.
    pub fn attribute(&self, reference: u16) -> Result<Option<Attribute>> {
        let (header, storage) = self.vdata(reference)?;
        if !header.class.starts_with("Attr") {
            return Ok(None);
        }
        let Some(field) = header.fields.first() else {
            return Ok(None);
        };
        let number_type = field.number_type().ok_or_else(|| {
            Hdf4Error::unsupported(
                tags::VH,
                reference,
                format!("attribute type {}", field.type_code),
            )
        })?;
        let bytes = header.field_bytes(&storage, field)?;
        Ok(Some(Attribute {
            name: header.name.clone(),
            value: AttributeValue::decode(number_type, field.endian(), &bytes),
        }))
    }

    /// Attributes listed as vdata members of `vgroup`.
    pub fn attributes_of(&self, vgroup: &Vgroup) -> Vec<Attribute> {
        vgroup
            .members_with_tag(tags::VH)
            .filter_map(|reference| match self.attribute(reference) {
                Ok(attribute) => attribute,
                Err(err) => {
                    warn!("skipping attribute vdata {reference}: {err}");
                    None
                }
            })
            .collect()
    }

    /// File labels and descriptions (`DFTAG_FID`/`DFTAG_FD`).
    pub fn file_annotations(&self) -> Vec<(String, String)> {
        let mut annotations = Vec::new();
        for (tag, key) in [(tags::FID, "FILE_LABEL"), (tags::FD, "FILE_DESCRIPTION")] {
            for (idx, dd) in self.directory.with_tag(tag).enumerate() {
                match self.read_element(tag, dd.reference) {
                    Ok(bytes) => annotations.push((
                        format!("{key}_{}", idx + 1),
                        records::decode_text(&bytes),
                    )),
                    Err(err) => warn!("skipping file annotation {}: {err}", dd.reference),
                }
            }
        }
        annotations
    }

    /// Library version stamp (`DFTAG_VER`) as `major.minor.release text`.
    pub fn library_version(&self) -> Option<String> {
        use byteorder::{BigEndian, ReadBytesExt};

        let dd = self.directory.with_tag(tags::VERSION).next()?;
        let bytes = self.read_contiguous(tags::VERSION, dd.reference).ok()?;
        let mut reader = bytes.as_slice();
        let mut number = || reader.read_u32::<BigEndian>().ok();
        let (major, minor, release) = (number()?, number()?, number()?);
        let text = records::decode_text(reader);
        Some(format!("{major}.{minor}.{release} {}", text.trim()).trim_end().to_string())
    }

    /// Label and description annotations attached to any of `targets`.
    pub fn object_annotations(&self, targets: &[TagRef]) -> Vec<(String, String)> {
        let mut annotations = Vec::new();
        for (tag, key) in [(tags::DIL, "LABEL"), (tags::DIA, "DESCRIPTION")] {
            for dd in self.directory.with_tag(tag) {
                let annotation = self
                    .read_element(tag, dd.reference)
                    .and_then(|bytes| ObjectAnnotation::parse(&bytes));
                match annotation {
                    Ok(annotation) if targets.contains(&annotation.target) => {
                        annotations.push((key.to_string(), annotation.text))
                    }
                    Ok(_) => {}
                    Err(err) => warn!("skipping annotation {}: {err}", dd.reference),
                }
            }
        }
        annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Container holding `(tag, ref, payload)` elements behind one DD block.
    fn container_of(elements: &[(u16, u16, &[u8])]) -> Arc<Container> {
        let mut bytes = directory::SIGNATURE.to_vec();
        bytes.extend_from_slice(&(elements.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        let mut offset = bytes.len() + 12 * elements.len();
        for (tag, reference, payload) in elements {
            bytes.extend_from_slice(&tag.to_be_bytes());
            bytes.extend_from_slice(&reference.to_be_bytes());
            bytes.extend_from_slice(&(offset as u32).to_be_bytes());
            bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            offset += payload.len();
        }
        for (_, _, payload) in elements {
            bytes.extend_from_slice(payload);
        }
        Container::from_bytes("memory", bytes).unwrap()
    }

    #[rstest]
    fn version_stamp_is_decoded() {
        let mut stamp = Vec::new();
        for part in [4u32, 2, 15] {
            stamp.extend_from_slice(&part.to_be_bytes());
        }
        stamp.extend_from_slice(b"HDF Version 4.2 Release 15\0\0");
        let container = container_of(&[(tags::VERSION, 1, stamp.as_slice())]);
        assert_eq!(
            container.library_version().as_deref(),
            Some("4.2.15 HDF Version 4.2 Release 15")
        );
        assert_eq!(container_of(&[]).library_version(), None);
    }

    #[rstest]
    fn annotations_are_matched_to_their_targets() {
        let label = [&701u16.to_be_bytes()[..], &3u16.to_be_bytes(), b"depth"].concat();
        let container = container_of(&[(tags::FID, 1, &b"survey"[..]), (tags::DIL, 2, &label[..])]);
        assert_eq!(
            container.file_annotations(),
            vec![("FILE_LABEL_1".to_string(), "survey".to_string())]
        );
        assert_eq!(
            container.object_annotations(&[TagRef::new(701, 3)]),
            vec![("LABEL".to_string(), "depth".to_string())]
        );
        assert!(container.object_annotations(&[TagRef::new(701, 4)]).is_empty());
    }
}
