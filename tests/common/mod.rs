//! Builds small HDF4 files in memory for the integration tests.

#![allow(dead_code)]

use std::{io::Write, path::Path};

use flate2::{write::ZlibEncoder, Compression};
use tempfile::NamedTempFile;

pub mod tags {
    pub const LINKED: u16 = 20;
    pub const COMPRESSED: u16 = 40;
    pub const CHUNK: u16 = 61;
    pub const FID: u16 = 100;
    pub const DIL: u16 = 104;
    pub const NT: u16 = 106;
    pub const ID: u16 = 300;
    pub const LUT: u16 = 301;
    pub const RI: u16 = 302;
    pub const LD: u16 = 307;
    pub const SDD: u16 = 701;
    pub const SD: u16 = 702;
    pub const NDG: u16 = 720;
    pub const FV: u16 = 732;
    pub const VH: u16 = 1962;
    pub const VS: u16 = 1963;
    pub const VG: u16 = 1965;
}

pub const DFNT_CHAR8: u16 = 4;
pub const DFNT_FLOAT32: u16 = 5;
pub const DFNT_FLOAT64: u16 = 6;
pub const DFNT_INT8: u16 = 20;
pub const DFNT_UINT8: u16 = 21;
pub const DFNT_INT16: u16 = 22;
pub const DFNT_UINT16: u16 = 23;
pub const DFNT_INT32: u16 = 24;
pub const DFNT_UINT32: u16 = 25;

const SIGNATURE: [u8; 4] = [0x0e, 0x03, 0x13, 0x01];
const SPECIAL: u16 = 0x4000;

fn type_size(code: u16) -> usize {
    match code {
        DFNT_CHAR8 | DFNT_INT8 | DFNT_UINT8 => 1,
        DFNT_INT16 | DFNT_UINT16 => 2,
        DFNT_FLOAT32 | DFNT_INT32 | DFNT_UINT32 => 4,
        _ => 8,
    }
}

/// Big-endian bytes of `values` stored as number type `code`.
pub fn encode(code: u16, values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * type_size(code));
    for value in values {
        match code {
            DFNT_INT8 => out.push(*value as i8 as u8),
            DFNT_UINT8 | DFNT_CHAR8 => out.push(*value as u8),
            DFNT_INT16 => out.extend_from_slice(&(*value as i16).to_be_bytes()),
            DFNT_UINT16 => out.extend_from_slice(&(*value as u16).to_be_bytes()),
            DFNT_INT32 => out.extend_from_slice(&(*value as i32).to_be_bytes()),
            DFNT_UINT32 => out.extend_from_slice(&(*value as u32).to_be_bytes()),
            DFNT_FLOAT32 => out.extend_from_slice(&(*value as f32).to_be_bytes()),
            _ => out.extend_from_slice(&value.to_be_bytes()),
        }
    }
    out
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_str(out: &mut Vec<u8>, text: &str) {
    put_u16(out, text.len() as u16);
    out.extend_from_slice(text.as_bytes());
}

/// Scientific dataset to write.
pub struct SdsSpec<'a> {
    pub name: &'a str,
    pub dims: Vec<usize>,
    pub dim_names: Vec<&'a str>,
    pub number_type: u16,
    pub values: Vec<f64>,
    pub fill: Option<f64>,
    pub attributes: Vec<(&'a str, AttrSpec)>,
    pub storage: Storage,
}

impl<'a> SdsSpec<'a> {
    pub fn new(name: &'a str, dims: Vec<usize>, number_type: u16, values: Vec<f64>) -> Self {
        Self {
            name,
            dims,
            dim_names: Vec::new(),
            number_type,
            values,
            fill: None,
            attributes: Vec::new(),
            storage: Storage::Contiguous,
        }
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn dim_names(mut self, names: &[&'a str]) -> Self {
        self.dim_names = names.to_vec();
        self
    }

    pub fn attribute(mut self, name: &'a str, value: AttrSpec) -> Self {
        self.attributes.push((name, value));
        self
    }
}

#[derive(Clone, Debug)]
pub enum AttrSpec {
    Text(String),
    Numbers(u16, Vec<f64>),
}

/// How the data element of a dataset is laid out in the file.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Storage {
    #[default]
    Contiguous,
    Deflate,
    Rle,
    /// Linked blocks of at most `block` bytes.
    Linked { block: usize },
    /// Chunks of `chunk` elements per axis, each optionally deflated.
    Chunked { chunk: Vec<usize>, deflate: bool },
    /// The descriptor declares the full length but the file ends first.
    Truncated,
}

fn deflate(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("deflate test data");
    encoder.finish().expect("deflate test data")
}

/// Packets of the HDF run-length coder: runs of 3 to 130 copies, literals otherwise.
fn run_length(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut literals: Vec<u8> = Vec::new();
    let flush = |out: &mut Vec<u8>, literals: &mut Vec<u8>| {
        for packet in literals.chunks(128) {
            out.push((packet.len() - 1) as u8);
            out.extend_from_slice(packet);
        }
        literals.clear();
    };
    let mut idx = 0;
    while idx < bytes.len() {
        let run = bytes[idx..]
            .iter()
            .take(130)
            .take_while(|byte| **byte == bytes[idx])
            .count();
        if run >= 3 {
            flush(&mut out, &mut literals);
            out.push(0x80 | (run - 3) as u8);
            out.push(bytes[idx]);
            idx += run;
        } else {
            literals.push(bytes[idx]);
            idx += 1;
        }
    }
    flush(&mut out, &mut literals);
    out
}

/// Raster image to write into an `RI0.0` vgroup.
pub struct ImageSpec<'a> {
    pub name: &'a str,
    pub width: usize,
    pub height: usize,
    pub components: usize,
    pub number_type: u16,
    /// 0 pixel, 1 line, 2 component interlace.
    pub interlace: u16,
    pub values: Vec<f64>,
    /// 256 RGB triplets.
    pub palette: Option<Vec<u8>>,
}

/// Datasets written by [HdfWriter::sds]: catalogue index and NDG reference.
#[derive(Clone, Copy, Debug)]
pub struct Written {
    pub index: usize,
    pub ndg: u16,
}

#[derive(Default)]
pub struct HdfWriter {
    elements: Vec<(u16, u16, Vec<u8>)>,
    /// Elements placed at the end of the file with a longer declared length.
    truncated: Vec<(u16, u16, u32)>,
    next_ref: u16,
    variables: Vec<u16>,
    globals: Vec<u16>,
}

impl HdfWriter {
    pub fn new() -> Self {
        Self {
            next_ref: 1,
            ..Default::default()
        }
    }

    /// Adds an element under a fresh reference.
    pub fn element(&mut self, tag: u16, bytes: Vec<u8>) -> u16 {
        let reference = self.next_ref;
        self.next_ref += 1;
        self.elements.push((tag, reference, bytes));
        reference
    }

    /// Adds an element stored through a special header with tag `tag`.
    fn special(&mut self, tag: u16, header: Vec<u8>) -> u16 {
        self.element(tag | SPECIAL, header)
    }

    /// Data element of a dataset with `dims`, written the way `storage` asks.
    fn data_element(&mut self, storage: &Storage, dims: &[usize], size: usize, raw: Vec<u8>) -> u16 {
        match storage {
            Storage::Contiguous => self.element(tags::SD, raw),
            Storage::Deflate | Storage::Rle => self.compressed(tags::SD, storage, raw),
            Storage::Linked { block } => {
                let blocks: Vec<Vec<u8>> = raw.chunks(*block).map(<[u8]>::to_vec).collect();
                let block_refs: Vec<u16> = blocks
                    .into_iter()
                    .map(|bytes| self.element(tags::LINKED, bytes))
                    .collect();
                let mut table = Vec::new();
                put_u16(&mut table, 0);
                block_refs.iter().for_each(|reference| put_u16(&mut table, *reference));
                let table = self.element(tags::LINKED, table);
                let mut header = Vec::new();
                put_u16(&mut header, 1);
                put_u32(&mut header, raw.len() as u32);
                put_u32(&mut header, *block as u32);
                put_u32(&mut header, *block as u32);
                put_u32(&mut header, block_refs.len() as u32);
                put_u16(&mut header, table);
                self.special(tags::SD, header)
            }
            Storage::Chunked { chunk, deflate } => self.chunked(dims, chunk, *deflate, size, &raw),
            Storage::Truncated => {
                let reference = self.next_ref;
                self.next_ref += 1;
                self.truncated.push((tags::SD, reference, raw.len() as u32));
                reference
            }
        }
    }

    fn compressed(&mut self, tag: u16, storage: &Storage, raw: Vec<u8>) -> u16 {
        let (coder, stored) = match storage {
            Storage::Rle => (1, run_length(&raw)),
            _ => (4, deflate(&raw)),
        };
        let data = self.element(tags::COMPRESSED, stored);
        let mut header = Vec::new();
        put_u16(&mut header, 3);
        put_u16(&mut header, 0);
        put_u32(&mut header, raw.len() as u32);
        put_u16(&mut header, data);
        put_u16(&mut header, 0);
        put_u16(&mut header, coder);
        if coder == 4 {
            put_u16(&mut header, 6);
        }
        self.special(tag, header)
    }

    /// Chunked element with its `origin`/`chk_tag`/`chk_ref` table vdata.
    /// Edge chunks are stored at full size, padded with zeros.
    fn chunked(&mut self, dims: &[usize], chunk: &[usize], deflate: bool, size: usize, raw: &[u8]) -> u16 {
        let rank = dims.len();
        let grid: Vec<usize> = dims.iter().zip(chunk).map(|(dim, len)| dim.div_ceil(*len)).collect();
        let mut strides = vec![1usize; rank];
        for axis in (0..rank - 1).rev() {
            strides[axis] = strides[axis + 1] * dims[axis + 1];
        }
        let chunk_elements: usize = chunk.iter().product();

        let mut table = Vec::new();
        for linear in 0..grid.iter().product::<usize>() {
            let mut index = vec![0usize; rank];
            let mut rest = linear;
            for axis in (0..rank).rev() {
                index[axis] = rest % grid[axis];
                rest /= grid[axis];
            }
            let mut bytes = vec![0u8; chunk_elements * size];
            for within in 0..chunk_elements {
                let mut position = within;
                let mut source = 0;
                let mut inside = true;
                for axis in (0..rank).rev() {
                    let at = index[axis] * chunk[axis] + position % chunk[axis];
                    position /= chunk[axis];
                    inside &= at < dims[axis];
                    source += at * strides[axis];
                }
                if inside {
                    bytes[within * size..(within + 1) * size]
                        .copy_from_slice(&raw[source * size..(source + 1) * size]);
                }
            }
            let reference = if deflate {
                self.compressed(tags::CHUNK, &Storage::Deflate, bytes)
            } else {
                self.element(tags::CHUNK, bytes)
            };
            index.iter().for_each(|idx| table.extend_from_slice(&(*idx as i32).to_be_bytes()));
            put_u16(&mut table, tags::CHUNK);
            put_u16(&mut table, reference);
        }

        let records = grid.iter().product::<usize>();
        let record_size = 4 * rank + 4;
        let mut header = Vec::new();
        put_u16(&mut header, 0);
        put_u32(&mut header, records as u32);
        put_u16(&mut header, record_size as u16);
        put_u16(&mut header, 3);
        [DFNT_INT32, DFNT_UINT16, DFNT_UINT16].iter().for_each(|code| put_u16(&mut header, *code));
        [4 * rank, 2, 2].iter().for_each(|len| put_u16(&mut header, *len as u16));
        [0, 4 * rank, 4 * rank + 2].iter().for_each(|at| put_u16(&mut header, *at as u16));
        [rank, 1, 1].iter().for_each(|order| put_u16(&mut header, *order as u16));
        ["origin", "chk_tag", "chk_ref"].iter().for_each(|name| put_str(&mut header, name));
        put_str(&mut header, "_HDF_CHK_TBL_0");
        put_str(&mut header, "_HDF_CHK_TBL_CLASS");
        let table_ref = self.element(tags::VH, header);
        self.elements.push((tags::VS, table_ref, table));

        let mut special = Vec::new();
        put_u16(&mut special, 5);
        put_u32(&mut special, 0);
        special.push(0);
        put_u32(&mut special, 0);
        put_u32(&mut special, raw.len() as u32);
        put_u32(&mut special, (chunk_elements * size) as u32);
        put_u32(&mut special, size as u32);
        put_u16(&mut special, tags::VH);
        put_u16(&mut special, table_ref);
        put_u16(&mut special, 0);
        put_u16(&mut special, 0);
        put_u32(&mut special, rank as u32);
        for (dim, len) in dims.iter().zip(chunk) {
            put_u32(&mut special, 0);
            put_u32(&mut special, *dim as u32);
            put_u32(&mut special, *len as u32);
        }
        put_u32(&mut special, size as u32);
        special.extend(std::iter::repeat(0).take(size));
        self.special(tags::SD, special)
    }

    pub fn number_type(&mut self, code: u16) -> u16 {
        let width = (type_size(code) * 8) as u8;
        self.element(tags::NT, vec![1, code as u8, width, 1])
    }

    pub fn vgroup(&mut self, name: &str, class: &str, members: &[(u16, u16)]) -> u16 {
        let mut bytes = Vec::new();
        put_u16(&mut bytes, members.len() as u16);
        members.iter().for_each(|(tag, _)| put_u16(&mut bytes, *tag));
        members.iter().for_each(|(_, reference)| put_u16(&mut bytes, *reference));
        put_str(&mut bytes, name);
        put_str(&mut bytes, class);
        // extag, exref and version fields of a real vgroup.
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 3, 0, 0]);
        self.element(tags::VG, bytes)
    }

    /// `Attr0.0` vdata with one `VALUES` field; returns the VH reference.
    pub fn attribute(&mut self, name: &str, value: &AttrSpec) -> u16 {
        let (code, order, storage) = match value {
            AttrSpec::Text(text) => (DFNT_CHAR8, text.len(), text.as_bytes().to_vec()),
            AttrSpec::Numbers(code, values) => (*code, values.len(), encode(*code, values)),
        };
        let mut header = Vec::new();
        put_u16(&mut header, 0);
        put_u32(&mut header, 1);
        put_u16(&mut header, storage.len() as u16);
        put_u16(&mut header, 1);
        put_u16(&mut header, code);
        put_u16(&mut header, storage.len() as u16);
        put_u16(&mut header, 0);
        put_u16(&mut header, order as u16);
        put_str(&mut header, "VALUES");
        put_str(&mut header, name);
        put_str(&mut header, "Attr0.0");
        let reference = self.element(tags::VH, header);
        self.elements.push((tags::VS, reference, storage));
        reference
    }

    pub fn global_attribute(&mut self, name: &str, value: AttrSpec) {
        let reference = self.attribute(name, &value);
        self.globals.push(reference);
    }

    /// NT, SDD, SD and NDG of a dataset plus its `Var0.0` vgroup.
    pub fn sds(&mut self, dataset: SdsSpec) -> Written {
        let nt = self.number_type(dataset.number_type);
        let mut sdd = Vec::new();
        put_u16(&mut sdd, dataset.dims.len() as u16);
        dataset.dims.iter().for_each(|dim| put_u32(&mut sdd, *dim as u32));
        put_u16(&mut sdd, tags::NT);
        put_u16(&mut sdd, nt);
        let sdd = self.element(tags::SDD, sdd);
        let sd = self.data_element(
            &dataset.storage,
            &dataset.dims,
            type_size(dataset.number_type),
            encode(dataset.number_type, &dataset.values),
        );

        let mut members = vec![(tags::SDD, sdd), (tags::SD, sd), (tags::NT, nt)];
        if let Some(fill) = dataset.fill {
            let fv = self.element(tags::FV, encode(dataset.number_type, &[fill]));
            members.push((tags::FV, fv));
        }
        let mut group = Vec::new();
        for (tag, reference) in &members {
            put_u16(&mut group, *tag);
            put_u16(&mut group, *reference);
        }
        let ndg = self.element(tags::NDG, group);

        let mut variable = vec![(tags::NDG, ndg)];
        for name in &dataset.dim_names {
            let dim = self.vgroup(name, "Dim0.0", &[]);
            variable.push((tags::VG, dim));
        }
        for (name, value) in &dataset.attributes {
            variable.push((tags::VH, self.attribute(name, value)));
        }
        let var = self.vgroup(dataset.name, "Var0.0", &variable);
        self.variables.push(var);
        Written {
            index: self.variables.len() - 1,
            ndg,
        }
    }

    pub fn image(&mut self, picture: ImageSpec) -> u16 {
        let nt = self.number_type(picture.number_type);
        let mut id = Vec::new();
        put_u32(&mut id, picture.width as u32);
        put_u32(&mut id, picture.height as u32);
        put_u16(&mut id, tags::NT);
        put_u16(&mut id, nt);
        put_u16(&mut id, picture.components as u16);
        put_u16(&mut id, picture.interlace);
        put_u16(&mut id, 0);
        put_u16(&mut id, 0);
        let id = self.element(tags::ID, id);
        let ri = self.element(tags::RI, encode(picture.number_type, &picture.values));
        let mut members = vec![(tags::ID, id), (tags::RI, ri)];
        if let Some(palette) = picture.palette {
            let lut_nt = self.number_type(DFNT_UINT8);
            let mut ld = Vec::new();
            put_u32(&mut ld, 256);
            put_u32(&mut ld, 1);
            put_u16(&mut ld, tags::NT);
            put_u16(&mut ld, lut_nt);
            put_u16(&mut ld, 3);
            put_u16(&mut ld, 0);
            put_u16(&mut ld, 0);
            put_u16(&mut ld, 0);
            let ld = self.element(tags::LD, ld);
            let lut = self.element(tags::LUT, palette);
            members.push((tags::LD, ld));
            members.push((tags::LUT, lut));
        }
        self.vgroup(picture.name, "RI0.0", &members)
    }

    /// `GRID` or `SWATH` vgroup listing data and geolocation field NDGs.
    pub fn eos_structure(&mut self, class: &str, name: &str, data: &[Written], geo: &[Written]) {
        let ndgs = |fields: &[Written]| {
            fields
                .iter()
                .map(|field| (tags::NDG, field.ndg))
                .collect::<Vec<_>>()
        };
        let data = self.vgroup("Data Fields", &format!("{class} Vgroup"), &ndgs(data));
        let mut children = vec![(tags::VG, data)];
        if !geo.is_empty() {
            let geo = self.vgroup("Geolocation Fields", &format!("{class} Vgroup"), &ndgs(geo));
            children.push((tags::VG, geo));
        }
        self.vgroup(name, class, &children);
    }

    pub fn file_label(&mut self, text: &str) {
        self.element(tags::FID, text.as_bytes().to_vec());
    }

    pub fn object_label(&mut self, target: (u16, u16), text: &str) {
        let mut bytes = Vec::new();
        put_u16(&mut bytes, target.0);
        put_u16(&mut bytes, target.1);
        bytes.extend_from_slice(text.as_bytes());
        self.element(tags::DIL, bytes);
    }

    /// File bytes: signature, one DD block, then the elements.
    pub fn finish(mut self) -> Vec<u8> {
        if !self.variables.is_empty() || !self.globals.is_empty() {
            let members: Vec<(u16, u16)> = self
                .globals
                .iter()
                .map(|reference| (tags::VH, *reference))
                .chain(self.variables.iter().map(|reference| (tags::VG, *reference)))
                .collect();
            self.vgroup("test.hdf", "CDF0.0", &members);
        }

        let count = self.elements.len() + self.truncated.len();
        let header = SIGNATURE.len() + 6 + 12 * count;
        let mut out = SIGNATURE.to_vec();
        put_u16(&mut out, count as u16);
        put_u32(&mut out, 0);
        let mut offset = header;
        for (tag, reference, bytes) in &self.elements {
            put_u16(&mut out, *tag);
            put_u16(&mut out, *reference);
            put_u32(&mut out, offset as u32);
            put_u32(&mut out, bytes.len() as u32);
            offset += bytes.len();
        }
        for (tag, reference, declared) in &self.truncated {
            put_u16(&mut out, *tag);
            put_u16(&mut out, *reference);
            put_u32(&mut out, offset as u32);
            put_u32(&mut out, *declared);
        }
        for (_, _, bytes) in &self.elements {
            out.extend_from_slice(bytes);
        }
        out
    }

    pub fn write(self) -> NamedTempFile {
        write_bytes(&self.finish())
    }
}

pub fn write_bytes(bytes: &[u8]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".hdf")
        .tempfile()
        .expect("temporary file");
    file.write_all(bytes).expect("write test file");
    file.flush().expect("flush test file");
    file
}

pub fn path_of(file: &NamedTempFile) -> String {
    path_str(file.path())
}

pub fn path_str(path: &Path) -> String {
    path.to_str().expect("utf-8 temp path").to_string()
}

/// `values` laid out as `y * width + x` modulo `modulus`.
pub fn ramp(width: usize, height: usize, modulus: usize) -> Vec<f64> {
    (0..width * height).map(|idx| (idx % modulus) as f64).collect()
}

pub const GRID_METADATA: &str = r#"GROUP=SwathStructure
END_GROUP=SwathStructure
GROUP=GridStructure
	GROUP=GRID_1
		GridName="MODIS_Grid"
		XDim=8
		YDim=4
		UpperLeftPointMtrs=(-180000000.000000,90000000.000000)
		LowerRightMtrs=(180000000.000000,-90000000.000000)
		Projection=GCTP_GEO
		GROUP=Dimension
		END_GROUP=Dimension
		GROUP=DataField
			OBJECT=DataField_1
				DataFieldName="Sea_Temp"
				DataType=DFNT_INT16
				DimList=("YDim","XDim")
				TilingDimensions=(2,4)
			END_OBJECT=DataField_1
		END_GROUP=DataField
	END_GROUP=GRID_1
END_GROUP=GridStructure
END
"#;

pub const SWATH_METADATA: &str = r#"GROUP=SwathStructure
	GROUP=SWATH_1
		SwathName="Swath1"
		GROUP=Dimension
			OBJECT=Dimension_1
				DimensionName="GeoTrack"
				Size=2
			END_OBJECT=Dimension_1
			OBJECT=Dimension_2
				DimensionName="GeoXtrack"
				Size=2
			END_OBJECT=Dimension_2
			OBJECT=Dimension_3
				DimensionName="DataTrack"
				Size=6
			END_OBJECT=Dimension_3
			OBJECT=Dimension_4
				DimensionName="DataXtrack"
				Size=6
			END_OBJECT=Dimension_4
		END_GROUP=Dimension
		GROUP=DimensionMap
			OBJECT=DimensionMap_1
				GeoDimension="GeoTrack"
				DataDimension="DataTrack"
				Offset=2
				Increment=3
			END_OBJECT=DimensionMap_1
			OBJECT=DimensionMap_2
				GeoDimension="GeoXtrack"
				DataDimension="DataXtrack"
				Offset=2
				Increment=3
			END_OBJECT=DimensionMap_2
		END_GROUP=DimensionMap
		GROUP=GeoField
			OBJECT=GeoField_1
				GeoFieldName="Longitude"
				DataType=DFNT_FLOAT32
				DimList=("GeoTrack","GeoXtrack")
			END_OBJECT=GeoField_1
			OBJECT=GeoField_2
				GeoFieldName="Latitude"
				DataType=DFNT_FLOAT32
				DimList=("GeoTrack","GeoXtrack")
			END_OBJECT=GeoField_2
		END_GROUP=GeoField
		GROUP=DataField
			OBJECT=DataField_1
				DataFieldName="Radiance"
				DataType=DFNT_UINT16
				DimList=("DataTrack","DataXtrack")
			END_OBJECT=DataField_1
		END_GROUP=DataField
	END_GROUP=SWATH_1
END_GROUP=SwathStructure
GROUP=GridStructure
END_GROUP=GridStructure
END
"#;
