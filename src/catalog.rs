//! Catalogue of the raster objects of one container.
//!
//! Scientific datasets are numbered by their position among the `Var0.0`
//! children of the `CDF0.0` vgroup (or by NDG/SDG directory order in files
//! written without vgroups). Images are numbered in `RI0.0` order, falling
//! back to RIG groups and then to bare 8-bit rasters. Objects that fail to
//! decode keep their SDS index but are never raster candidates.

use itertools::Itertools;
use log::{debug, warn};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{
    components::{ColorTable, PixelType},
    container::{
        element::{checked_size, odometer}, records::parse_group, tags, ArrayStore, Attribute, AttributeValue,
        Coder, Container, DimensionRecord, ElementLayout, Endian, ImageDimensionRecord, Interlace,
        NumberType, NumberTypeRecord, TagRef, Vgroup,
    },
    eos::{self, FieldDef, StructMetadata},
    errors::{Hdf4Error, Result},
    identifier::{Kind, Prefix, Selector, Subdataset},
};

/// Scientific dataset: an N-dimensional array with attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct SdsEntry {
    pub index: usize,
    pub name: String,
    /// Sizes, slowest varying first.
    pub dims: Vec<usize>,
    pub dim_names: Vec<String>,
    pub number_type: Option<NumberTypeRecord>,
    /// NDG or SDG describing the dataset.
    pub group: Option<TagRef>,
    pub data: Option<TagRef>,
    /// Raw `DFTAG_FV` bytes of one element.
    pub fill: Option<Vec<u8>>,
    pub attributes: Vec<Attribute>,
}

impl SdsEntry {
    fn placeholder(index: usize, name: String) -> Self {
        Self {
            index,
            name,
            dims: Vec::new(),
            dim_names: Vec::new(),
            number_type: None,
            group: None,
            data: None,
            fill: None,
            attributes: Vec::new(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn pixel_type(&self) -> Option<PixelType> {
        self.number_type?.number_type.pixel_type()
    }

    pub fn is_raster(&self) -> bool {
        self.rank() >= 2 && self.pixel_type().is_some() && self.dims.iter().all(|dim| *dim > 0)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| &attribute.value)
    }

    /// `_FillValue` attribute, else the `DFTAG_FV` element.
    pub fn fill_value(&self) -> Option<f64> {
        if let Some(value) = self.attribute("_FillValue").and_then(AttributeValue::as_f64) {
            return Some(value);
        }
        let record = self.number_type?;
        let bytes = self.fill.as_deref()?;
        AttributeValue::decode(record.number_type, record.endian, bytes).as_f64()
    }

    /// Array storage of the dataset; datasets never written read as fill.
    pub fn store(&self, container: &Arc<Container>) -> Result<ArrayStore> {
        let group = self.group.unwrap_or(TagRef::new(tags::NDG, 0));
        let record = self.number_type.ok_or_else(|| {
            Hdf4Error::unsupported(group.tag, group.reference, "dataset without a number type")
        })?;
        let element_size = record.number_type.size();
        let layout = match self.data {
            Some(data) => container.layout(data.tag, data.reference)?,
            None => ElementLayout::Empty,
        };
        let fill = self
            .fill
            .clone()
            .filter(|fill| fill.len() == element_size)
            .unwrap_or_else(|| vec![0u8; element_size]);
        ArrayStore::new(
            Arc::clone(container),
            layout,
            self.dims.clone(),
            element_size,
            fill,
        )
    }
}

/// General raster image with one or more components.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageEntry {
    pub index: usize,
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub components: usize,
    pub number_type: NumberTypeRecord,
    pub interlace: Interlace,
    /// `RI0.0` vgroup or RIG the image was found through.
    pub group: TagRef,
    pub data: TagRef,
    /// Compression scheme tag from the image dimension record.
    pub compression: Option<u16>,
    pub palette: Option<Arc<ColorTable>>,
    pub attributes: Vec<Attribute>,
}

impl ImageEntry {
    /// Storage dims in interlace order.
    pub fn dims(&self) -> Vec<usize> {
        match self.interlace {
            Interlace::Pixel => vec![self.height, self.width, self.components],
            Interlace::Line => vec![self.height, self.components, self.width],
            Interlace::Component => vec![self.components, self.height, self.width],
        }
    }

    pub fn store(&self, container: &Arc<Container>) -> Result<ArrayStore> {
        let element_size = self.number_type.number_type.size();
        let mut layout = container.layout(self.data.tag, self.data.reference)?;
        match self.compression {
            None => {}
            Some(tags::RLE) => {
                let length = checked_size(
                    "image",
                    &[self.width, self.height, self.components, element_size],
                )?;
                layout = ElementLayout::Compressed {
                    length: length as u64,
                    coder: Coder::Rle,
                    data: Box::new(layout),
                }
            }
            Some(other) => {
                return Err(Hdf4Error::unsupported(
                    self.data.tag,
                    self.data.reference,
                    format!("image compression tag {other}"),
                ))
            }
        }
        ArrayStore::new(
            Arc::clone(container),
            layout,
            self.dims(),
            element_size,
            vec![0u8; element_size],
        )
    }
}

/// An openable subdataset with its human readable description.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub subdataset: Subdataset,
    pub description: String,
}

/// Axes holding the raster rows and columns of a field: the `YDim`/`XDim`
/// axes when named, else the last two.
pub fn raster_axes(dim_names: &[String], rank: usize) -> (usize, usize) {
    let position = |name: &str| dim_names.iter().position(|dim| dim == name);
    match (
        position(eos::GridStructure::Y_DIM),
        position(eos::GridStructure::X_DIM),
    ) {
        (Some(y), Some(x)) if dim_names.len() == rank => (y, x),
        _ => (rank.saturating_sub(2), rank.saturating_sub(1)),
    }
}

fn number_type_label(number_type: NumberType) -> &'static str {
    match number_type {
        NumberType::Char8 => "8-bit character",
        NumberType::UChar8 => "8-bit unsigned character",
        NumberType::Int8 => "8-bit integer",
        NumberType::UInt8 => "8-bit unsigned integer",
        NumberType::Int16 => "16-bit integer",
        NumberType::UInt16 => "16-bit unsigned integer",
        NumberType::Int32 => "32-bit integer",
        NumberType::UInt32 => "32-bit unsigned integer",
        NumberType::Int64 => "64-bit integer",
        NumberType::UInt64 => "64-bit unsigned integer",
        NumberType::Float32 => "32-bit floating-point",
        NumberType::Float64 => "64-bit floating-point",
    }
}

/// Everything a container offers as rasters, read once per open.
#[derive(Debug)]
pub struct Catalog {
    pub path: String,
    pub sds: Vec<SdsEntry>,
    pub images: Vec<ImageEntry>,
    pub global_attributes: Vec<Attribute>,
    pub file_annotations: Vec<(String, String)>,
    pub kind: Kind,
    pub eos: Option<StructMetadata>,
    /// SDS index of each `(structure, field)`.
    eos_fields: HashMap<(String, String), usize>,
}

impl Catalog {
    pub fn read(container: &Container) -> Self {
        let (sds, global_attributes) = read_datasets(container);
        let images = read_images(container);
        let eos = eos::struct_metadata(&global_attributes);
        let eos_fields = eos
            .as_ref()
            .map(|eos| map_eos_fields(container, &sds, eos))
            .unwrap_or_default();
        let kind = product_kind(&global_attributes);
        if let Some(version) = container.library_version() {
            debug!("{} written by HDF {version}", container.name());
        }
        debug!(
            "{}: {} datasets, {} images, product kind {}",
            container.name(),
            sds.len(),
            images.len(),
            kind.as_str()
        );
        Self {
            path: container.name().to_string(),
            sds,
            images,
            file_annotations: container.file_annotations(),
            global_attributes,
            kind,
            eos,
            eos_fields,
        }
    }

    /// Dataset holding field `field` of grid or swath `structure`.
    pub fn eos_field(&self, structure: &str, field: &str) -> Option<&SdsEntry> {
        self.eos_fields
            .get(&(structure.to_string(), field.to_string()))
            .and_then(|index| self.sds.get(*index))
    }

    /// Dataset named `field` (or `field:structure`), for fields the
    /// structural metadata does not describe.
    pub fn sds_named(&self, structure: &str, field: &str) -> Option<&SdsEntry> {
        let qualified = format!("{field}:{structure}");
        self.sds
            .iter()
            .find(|entry| entry.name == qualified)
            .or_else(|| self.sds.iter().find(|entry| entry.name == field))
    }

    /// Rank 2 `longitude` and `latitude` datasets shaped like `dims`.
    pub fn coordinate_datasets(&self, dims: &[usize]) -> Option<(usize, usize)> {
        let find = |name: &str| {
            self.sds
                .iter()
                .find(|entry| {
                    entry.name.eq_ignore_ascii_case(name)
                        && entry.rank() == 2
                        && entry.dims == dims[dims.len().saturating_sub(2)..]
                })
                .map(|entry| entry.index)
        };
        Some((find("longitude")?, find("latitude")?))
    }

    /// Openable subdatasets: EOS fields, then datasets not claimed by a
    /// field, then images.
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        if let Some(eos) = &self.eos {
            let fields = eos
                .grids
                .iter()
                .flat_map(|grid| {
                    grid.fields
                        .iter()
                        .map(move |field| (Kind::EosGrid, grid.name.as_str(), field))
                })
                .chain(eos.swaths.iter().flat_map(|swath| {
                    swath
                        .data_fields
                        .iter()
                        .map(move |field| (Kind::EosSwath, swath.name.as_str(), field))
                        .chain(
                            swath
                                .geo_fields
                                .iter()
                                .map(move |field| (Kind::EosSwathGeol, swath.name.as_str(), field)),
                        )
                }));
            for (kind, structure, field) in fields {
                if let Some(entry) = self.eos_field(structure, &field.name) {
                    self.push_field(&mut candidates, kind, structure, field, entry);
                }
            }
        }

        let claimed: HashSet<usize> = self.eos_fields.values().copied().collect();
        for entry in self.sds.iter().filter(|entry| entry.is_raster()) {
            if claimed.contains(&entry.index) {
                continue;
            }
            let plane_shape = &entry.dims[..entry.rank() - 2];
            for planes in odometer(plane_shape) {
                let mut indices = vec![entry.index];
                indices.extend_from_slice(&planes);
                candidates.push(Candidate {
                    subdataset: self.subdataset(Prefix::Sds, self.kind, Selector::Indices(indices)),
                    description: describe(&entry.dims, &entry.name, &planes, entry.number_type),
                });
            }
        }

        for image in &self.images {
            candidates.push(Candidate {
                subdataset: self.subdataset(
                    Prefix::Gr,
                    Kind::Unknown,
                    Selector::Indices(vec![image.index]),
                ),
                description: format!(
                    "[{}x{}x{}] {} ({})",
                    image.width,
                    image.height,
                    image.components,
                    image.name,
                    number_type_label(image.number_type.number_type)
                ),
            });
        }
        candidates
    }

    fn push_field(
        &self,
        candidates: &mut Vec<Candidate>,
        kind: Kind,
        structure: &str,
        field: &FieldDef,
        entry: &SdsEntry,
    ) {
        if !entry.is_raster() {
            return;
        }
        let (y_axis, x_axis) = raster_axes(&field.dims, entry.rank());
        let plane_shape: Vec<usize> = (0..entry.rank())
            .filter(|axis| *axis != y_axis && *axis != x_axis)
            .map(|axis| entry.dims[axis])
            .collect();
        for planes in odometer(&plane_shape) {
            let description = describe(
                &entry.dims,
                &format!("{} {structure}", field.name),
                &planes,
                entry.number_type,
            );
            candidates.push(Candidate {
                subdataset: self.subdataset(
                    Prefix::Eos,
                    kind,
                    Selector::Field {
                        structure: structure.to_string(),
                        field: field.name.clone(),
                        planes,
                    },
                ),
                description,
            });
        }
    }

    fn subdataset(&self, prefix: Prefix, kind: Kind, selector: Selector) -> Subdataset {
        Subdataset {
            prefix,
            kind,
            path: self.path.clone(),
            selector: Some(selector),
        }
    }
}

fn describe(
    dims: &[usize],
    name: &str,
    planes: &[usize],
    number_type: Option<NumberTypeRecord>,
) -> String {
    let label = number_type.map_or("unknown", |record| number_type_label(record.number_type));
    if planes.is_empty() {
        format!("[{}] {name} ({label})", dims.iter().join("x"))
    } else {
        format!(
            "[{}] {name} [{}] ({label})",
            dims.iter().join("x"),
            planes.iter().join(",")
        )
    }
}

fn product_kind(attributes: &[Attribute]) -> Kind {
    let text = |name: &str| {
        attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .and_then(|attribute| attribute.value.as_text())
    };
    if let Some(title) = text("Title") {
        for (marker, kind) in [
            ("SeaWiFS Level-1A", Kind::SeawifsL1a),
            ("SeaWiFS Level-2", Kind::SeawifsL2),
            ("SeaWiFS Level-3", Kind::SeawifsL3),
        ] {
            if title.contains(marker) {
                return kind;
            }
        }
    }
    if text("L1 File Generated By").is_some_and(|value| value.starts_with("HYP version")) {
        return Kind::HyperionL1;
    }
    if text("Signature").is_some_and(|value| value.contains("GDAL")) {
        return Kind::GdalHdf4;
    }
    if let Some(product) = text("Product Name") {
        if product.starts_with("MOD") || product.starts_with("MYD") {
            let level = text("Level").unwrap_or_default();
            return if product.contains("1B") || level.contains("1B") {
                Kind::ModisL1b
            } else if level.contains('2') {
                Kind::ModisL2
            } else if level.contains('3') {
                Kind::ModisL3
            } else {
                Kind::ModisUnk
            };
        }
    }
    Kind::Unknown
}

fn find_member(members: &[TagRef], wanted: &[u16]) -> Option<TagRef> {
    members
        .iter()
        .find(|member| wanted.contains(&member.tag))
        .copied()
}

/// Datasets in catalogue order and the file attributes.
fn read_datasets(container: &Container) -> (Vec<SdsEntry>, Vec<Attribute>) {
    let cdf = container.vgroups_with_class("CDF0.0");
    let Some(cdf) = cdf.first() else {
        return (read_bare_datasets(container), Vec::new());
    };
    let global_attributes = container.attributes_of(cdf);
    let variables = cdf
        .members_with_tag(tags::VG)
        .filter_map(|reference| match container.vgroup(reference) {
            Ok(vgroup) => Some(vgroup),
            Err(err) => {
                warn!("skipping vgroup {reference}: {err}");
                None
            }
        })
        .filter(|vgroup| vgroup.class == "Var0.0");
    let entries = variables
        .enumerate()
        .map(|(index, variable)| dataset_from_variable(container, index, &variable))
        .collect();
    (entries, global_attributes)
}

fn dataset_from_variable(container: &Container, index: usize, variable: &Vgroup) -> SdsEntry {
    let group = find_member(&variable.members, &[tags::NDG, tags::SDG]);
    let Some(group) = group else {
        debug!("dataset {index} ({}) holds no array", variable.name);
        return SdsEntry::placeholder(index, variable.name.clone());
    };
    let dim_names = variable
        .members_with_tag(tags::VG)
        .filter_map(|reference| container.vgroup(reference).ok())
        .filter(|dim| dim.class == "Dim0.0" || dim.class == "UDim0.0")
        .map(|dim| dim.name)
        .collect();
    match dataset_from_group(container, index, variable.name.clone(), group) {
        Ok(mut entry) => {
            entry.dim_names = dim_names;
            entry.attributes = container.attributes_of(variable);
            entry
        }
        Err(err) => {
            warn!("dataset {index} ({}) is unreadable: {err}", variable.name);
            SdsEntry::placeholder(index, variable.name.clone())
        }
    }
}

/// Datasets of files without a `CDF0.0` vgroup: NDGs, then SDGs not
/// shadowed by an NDG of the same ref.
fn read_bare_datasets(container: &Container) -> Vec<SdsEntry> {
    let directory = container.directory();
    let ndgs: Vec<u16> = directory.with_tag(tags::NDG).map(|dd| dd.reference).collect();
    let groups = ndgs
        .iter()
        .map(|reference| TagRef::new(tags::NDG, *reference))
        .chain(
            directory
                .with_tag(tags::SDG)
                .filter(|dd| !ndgs.contains(&dd.reference))
                .map(|dd| TagRef::new(tags::SDG, dd.reference)),
        )
        .collect::<Vec<_>>();
    groups
        .into_iter()
        .enumerate()
        .map(|(index, group)| {
            let name = format!("DataSet_{index}");
            dataset_from_group(container, index, name.clone(), group).unwrap_or_else(|err| {
                warn!("dataset {index} is unreadable: {err}");
                SdsEntry::placeholder(index, name)
            })
        })
        .collect()
}

fn dataset_from_group(
    container: &Container,
    index: usize,
    name: String,
    group: TagRef,
) -> Result<SdsEntry> {
    let members = parse_group(&container.read_element(group.tag, group.reference)?)?;
    let sdd = find_member(&members, &[tags::SDD]).ok_or_else(|| {
        Hdf4Error::format(format!("dataset group {} has no dimension record", group.reference))
    })?;
    let record = DimensionRecord::parse(&container.read_element(sdd.tag, sdd.reference)?)?;
    let number_type = container.number_type(record.number_type_ref.reference)?;
    let fill = find_member(&members, &[tags::FV]).and_then(|fv| {
        container
            .read_element(fv.tag, fv.reference)
            .map_err(|err| warn!("ignoring fill value of dataset {index}: {err}"))
            .ok()
    });
    Ok(SdsEntry {
        index,
        name,
        dims: record.dims,
        dim_names: Vec::new(),
        number_type: Some(number_type),
        group: Some(group),
        data: find_member(&members, &[tags::SD]),
        fill,
        attributes: Vec::new(),
    })
}

fn read_images(container: &Container) -> Vec<ImageEntry> {
    let images: Vec<(String, TagRef, Vec<TagRef>, Vec<Attribute>)> = {
        let ri = container.vgroups_with_class("RI0.0");
        if !ri.is_empty() {
            ri.into_iter()
                .map(|vgroup| {
                    let attributes = container.attributes_of(&vgroup);
                    (
                        vgroup.name.clone(),
                        TagRef::new(tags::VG, vgroup.reference),
                        vgroup.members,
                        attributes,
                    )
                })
                .collect()
        } else {
            let rigs: Vec<_> = container
                .directory()
                .with_tag(tags::RIG)
                .filter_map(|dd| {
                    let members = container
                        .read_element(tags::RIG, dd.reference)
                        .and_then(|bytes| parse_group(&bytes));
                    match members {
                        Ok(members) => Some((
                            format!("Raster Image #{}", dd.reference),
                            TagRef::new(tags::RIG, dd.reference),
                            members,
                            Vec::new(),
                        )),
                        Err(err) => {
                            warn!("skipping raster image group {}: {err}", dd.reference);
                            None
                        }
                    }
                })
                .collect();
            if rigs.is_empty() {
                raster8_sets(container)
            } else {
                rigs
            }
        }
    };

    images
        .into_iter()
        .filter_map(|(name, group, members, attributes)| {
            match image_from_members(container, &name, group, &members) {
                Ok(image) => Some(ImageEntry { attributes, ..image }),
                Err(err) => {
                    warn!("skipping image {name}: {err}");
                    None
                }
            }
        })
        .enumerate()
        .map(|(index, image)| ImageEntry { index, ..image })
        .collect()
}

/// 8-bit rasters written without a RIG: RI8/CI8 with ID8 and IP8 of the same ref.
fn raster8_sets(container: &Container) -> Vec<(String, TagRef, Vec<TagRef>, Vec<Attribute>)> {
    let directory = container.directory();
    directory
        .iter()
        .filter(|dd| dd.tag == tags::RI8 || dd.tag == tags::CI8)
        .map(|dd| {
            let mut members = vec![TagRef::new(dd.tag, dd.reference)];
            for tag in [tags::ID8, tags::IP8] {
                if directory.contains(tag, dd.reference) {
                    members.push(TagRef::new(tag, dd.reference));
                }
            }
            (
                format!("Raster Image #{}", dd.reference),
                TagRef::new(dd.tag, dd.reference),
                members,
                Vec::new(),
            )
        })
        .collect()
}

fn image_from_members(
    container: &Container,
    name: &str,
    group: TagRef,
    members: &[TagRef],
) -> Result<ImageEntry> {
    let data = find_member(members, &[tags::RI, tags::CI, tags::RI8, tags::CI8]).ok_or_else(|| {
        Hdf4Error::unsupported(group.tag, group.reference, "image without pixel data")
    })?;
    let (width, height, components, number_type, interlace, compression) =
        if let Some(id) = find_member(members, &[tags::ID]) {
            let record = ImageDimensionRecord::parse(&container.read_element(id.tag, id.reference)?)?;
            let number_type = container.number_type(record.number_type_ref.reference)?;
            let interlace = Interlace::from_code(record.interlace).ok_or_else(|| {
                Hdf4Error::unsupported(id.tag, id.reference, format!("interlace {}", record.interlace))
            })?;
            let compression = Some(record.compression.tag).filter(|tag| *tag != 0);
            (
                record.width,
                record.height,
                record.components.max(1),
                number_type,
                interlace,
                compression,
            )
        } else if let Some(id8) = find_member(members, &[tags::ID8]) {
            let (width, height) =
                ImageDimensionRecord::parse_id8(&container.read_element(id8.tag, id8.reference)?)?;
            let number_type = NumberTypeRecord {
                number_type: NumberType::UInt8,
                endian: Endian::Big,
            };
            let compression = (data.tag == tags::CI8).then_some(tags::RLE);
            (width, height, 1, number_type, Interlace::Pixel, compression)
        } else {
            return Err(Hdf4Error::unsupported(
                group.tag,
                group.reference,
                "image without dimension record",
            ));
        };
    if number_type.number_type.pixel_type().is_none() {
        return Err(Hdf4Error::unsupported(
            data.tag,
            data.reference,
            format!("image samples of type {:?}", number_type.number_type),
        ));
    }
    Ok(ImageEntry {
        index: 0,
        name: name.to_string(),
        width,
        height,
        components,
        number_type,
        interlace,
        group,
        data,
        compression,
        palette: palette(container, members),
        attributes: Vec::new(),
    })
}

fn palette(container: &Container, members: &[TagRef]) -> Option<Arc<ColorTable>> {
    let lut = find_member(members, &[tags::LUT, tags::IP8])?;
    if let Some(ld) = find_member(members, &[tags::LD]) {
        let components = container
            .read_element(ld.tag, ld.reference)
            .and_then(|bytes| ImageDimensionRecord::parse(&bytes))
            .map(|record| record.components);
        match components {
            Ok(3) => {}
            Ok(other) => {
                warn!("ignoring palette {} with {other} components", lut.reference);
                return None;
            }
            Err(err) => warn!("palette {} dimensions unreadable: {err}", lut.reference),
        }
    }
    match container.read_element(lut.tag, lut.reference) {
        Ok(bytes) => {
            let table = ColorTable::from_rgb(&bytes);
            (!table.is_empty()).then(|| Arc::new(table))
        }
        Err(err) => {
            warn!("ignoring palette {}: {err}", lut.reference);
            None
        }
    }
}

/// Datasets behind EOS fields: NDG members of the structure's field
/// vgroups, else any dataset named after the field.
fn map_eos_fields(
    container: &Container,
    sds: &[SdsEntry],
    eos: &StructMetadata,
) -> HashMap<(String, String), usize> {
    let structures = eos
        .grids
        .iter()
        .map(|grid| ("GRID", &grid.name, grid.fields.iter().collect::<Vec<_>>()))
        .chain(eos.swaths.iter().map(|swath| {
            let fields = swath.geo_fields.iter().chain(&swath.data_fields).collect();
            ("SWATH", &swath.name, fields)
        }));

    let mut mapping = HashMap::new();
    for (class, structure, fields) in structures {
        let members = field_groups(container, class, structure);
        for field in fields {
            let qualified = format!("{}:{structure}", field.name);
            let named = |entry: &&SdsEntry| entry.name == field.name || entry.name == qualified;
            let found = sds
                .iter()
                .filter(named)
                .find(|entry| entry.group.is_some_and(|group| members.contains(&group)))
                .or_else(|| sds.iter().find(named));
            match found {
                Some(entry) => {
                    mapping.insert((structure.clone(), field.name.clone()), entry.index);
                }
                None => warn!("no dataset holds field {} of {structure}", field.name),
            }
        }
    }
    mapping
}

fn field_groups(container: &Container, class: &str, structure: &str) -> HashSet<TagRef> {
    container
        .vgroups_with_class(class)
        .into_iter()
        .filter(|vgroup| vgroup.name == structure)
        .flat_map(|vgroup| vgroup.members_with_tag(tags::VG).collect::<Vec<_>>())
        .filter_map(|reference| container.vgroup(reference).ok())
        .filter(|child| child.name == "Data Fields" || child.name == "Geolocation Fields")
        .flat_map(|child| child.members)
        .filter(|member| member.tag == tags::NDG || member.tag == tags::SDG)
        .collect()
}
