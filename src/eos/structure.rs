use log::warn;

use super::odl::OdlGroup;
use crate::errors::{Hdf4Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct Dimension {
    pub name: String,
    pub size: i64,
}

/// Data or geolocation field of a grid or swath.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub data_type: Option<String>,
    /// Dimension names, slowest varying first.
    pub dims: Vec<String>,
    /// Tile extent per dimension of `dims`.
    pub tiling: Option<Vec<usize>>,
}

impl FieldDef {
    fn parse(group: &OdlGroup, name_key: &str) -> Result<Self> {
        let name = group
            .str(name_key)
            .ok_or_else(|| Hdf4Error::Metadata(format!("{} has no {name_key}", group.name)))?
            .to_string();
        let tiling = group.f64_array("TilingDimensions").map(|tiles| {
            tiles
                .into_iter()
                .map(|tile| tile.max(1.) as usize)
                .collect()
        });
        Ok(Self {
            name,
            data_type: group.str("DataType").map(str::to_string),
            dims: group.str_array("DimList").unwrap_or_default(),
            tiling,
        })
    }

    /// Field known only by name, with no dimensions or tiling.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: None,
            dims: Vec::new(),
            tiling: None,
        }
    }

    pub fn axis_of(&self, dimension: &str) -> Option<usize> {
        self.dims.iter().position(|dim| dim == dimension)
    }
}

fn fields(structure: &OdlGroup, group_name: &str, name_key: &str) -> Result<Vec<FieldDef>> {
    structure
        .group(group_name)
        .map(|group| {
            group
                .groups()
                .map(|object| FieldDef::parse(object, name_key))
                .collect()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

fn dimensions(structure: &OdlGroup) -> Vec<Dimension> {
    structure
        .group("Dimension")
        .map(|group| {
            group
                .groups()
                .filter_map(|object| {
                    Some(Dimension {
                        name: object.str("DimensionName")?.to_string(),
                        size: object.i64("Size")?,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn corner(group: &OdlGroup, key: &str) -> Option<(f64, f64)> {
    match group.f64_array(key)?.as_slice() {
        [x, y] => Some((*x, *y)),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridStructure {
    pub name: String,
    pub x_dim: usize,
    pub y_dim: usize,
    /// Upper left corner; packed DMS degrees for geographic grids, metres otherwise.
    pub upper_left: Option<(f64, f64)>,
    pub lower_right: Option<(f64, f64)>,
    pub projection: Option<String>,
    pub proj_params: Vec<f64>,
    pub sphere_code: Option<i64>,
    pub zone_code: Option<i64>,
    pub origin: Option<String>,
    pub dimensions: Vec<Dimension>,
    pub fields: Vec<FieldDef>,
}

impl GridStructure {
    pub const X_DIM: &'static str = "XDim";
    pub const Y_DIM: &'static str = "YDim";

    fn parse(group: &OdlGroup) -> Result<Self> {
        let name = group
            .str("GridName")
            .ok_or_else(|| Hdf4Error::Metadata(format!("{} has no GridName", group.name)))?
            .to_string();
        let size = |key: &str| {
            group
                .i64(key)
                .filter(|size| *size > 0)
                .map(|size| size as usize)
                .ok_or_else(|| Hdf4Error::Metadata(format!("grid {name} has no valid {key}")))
        };
        Ok(Self {
            x_dim: size(Self::X_DIM)?,
            y_dim: size(Self::Y_DIM)?,
            upper_left: corner(group, "UpperLeftPointMtrs"),
            lower_right: corner(group, "LowerRightMtrs"),
            projection: group.str("Projection").map(str::to_string),
            proj_params: group.f64_array("ProjParams").unwrap_or_default(),
            sphere_code: group.i64("SphereCode"),
            zone_code: group.i64("ZoneCode"),
            origin: group.str("GridOrigin").map(str::to_string),
            dimensions: dimensions(group),
            fields: fields(group, "DataField", "DataFieldName")?,
            name,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn dimension_size(&self, name: &str) -> Option<usize> {
        match name {
            Self::X_DIM => Some(self.x_dim),
            Self::Y_DIM => Some(self.y_dim),
            _ => self
                .dimensions
                .iter()
                .find(|dim| dim.name == name)
                .and_then(|dim| usize::try_from(dim.size).ok()),
        }
    }
}

/// Geolocation dimension `geo` sampled every `increment` elements of data
/// dimension `data`, starting at `offset`.
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionMap {
    pub geo: String,
    pub data: String,
    pub offset: i64,
    pub increment: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SwathStructure {
    pub name: String,
    pub dimensions: Vec<Dimension>,
    pub dimension_maps: Vec<DimensionMap>,
    pub geo_fields: Vec<FieldDef>,
    pub data_fields: Vec<FieldDef>,
}

impl SwathStructure {
    pub const LONGITUDE: &'static str = "Longitude";
    pub const LATITUDE: &'static str = "Latitude";

    fn parse(group: &OdlGroup) -> Result<Self> {
        let name = group
            .str("SwathName")
            .ok_or_else(|| Hdf4Error::Metadata(format!("{} has no SwathName", group.name)))?
            .to_string();
        let dimension_maps = group
            .group("DimensionMap")
            .map(|maps| {
                maps.groups()
                    .filter_map(|object| {
                        Some(DimensionMap {
                            geo: object.str("GeoDimension")?.to_string(),
                            data: object.str("DataDimension")?.to_string(),
                            offset: object.i64("Offset").unwrap_or(0),
                            increment: object.i64("Increment").unwrap_or(1),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            dimensions: dimensions(group),
            dimension_maps,
            geo_fields: fields(group, "GeoField", "GeoFieldName")?,
            data_fields: fields(group, "DataField", "DataFieldName")?,
            name,
        })
    }

    pub fn data_field(&self, name: &str) -> Option<&FieldDef> {
        self.data_fields.iter().find(|field| field.name == name)
    }

    pub fn geo_field(&self, name: &str) -> Option<&FieldDef> {
        self.geo_fields.iter().find(|field| field.name == name)
    }

    /// Map from geolocation dimension `geo` to data dimension `data`; equal
    /// names map one to one.
    pub fn dimension_map(&self, geo: &str, data: &str) -> Option<(i64, i64)> {
        if geo == data {
            return Some((0, 1));
        }
        self.dimension_maps
            .iter()
            .find(|map| map.geo == geo && map.data == data)
            .map(|map| (map.offset, map.increment))
    }
}

/// Every structure of `group` that parses; the others are skipped.
fn parse_each<T>(root: &OdlGroup, group: &str, parse: fn(&OdlGroup) -> Result<T>) -> Vec<T> {
    let Some(structures) = root.group(group) else {
        return Vec::new();
    };
    structures
        .groups()
        .filter_map(|structure| match parse(structure) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                warn!("skipping {} of {group}: {err}", structure.name);
                None
            }
        })
        .collect()
}

/// Grids and swaths described by `StructMetadata`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructMetadata {
    pub grids: Vec<GridStructure>,
    pub swaths: Vec<SwathStructure>,
}

impl StructMetadata {
    pub fn parse(text: &str) -> Result<Self> {
        let root = OdlGroup::parse(text)?;
        let grids = parse_each(&root, "GridStructure", GridStructure::parse);
        let swaths = parse_each(&root, "SwathStructure", SwathStructure::parse);
        if root.group("GridStructure").is_none() && root.group("SwathStructure").is_none() {
            warn!("structural metadata declares neither grids nor swaths");
        }
        Ok(Self { grids, swaths })
    }

    pub fn grid(&self, name: &str) -> Option<&GridStructure> {
        self.grids.iter().find(|grid| grid.name == name)
    }

    pub fn swath(&self, name: &str) -> Option<&SwathStructure> {
        self.swaths.iter().find(|swath| swath.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty() && self.swaths.is_empty()
    }
}
