//! Grid and swath fields of HDF-EOS files.

use log::warn;
use std::sync::Arc;

use super::{sds, OpenContext, PlaneSelection};
use crate::{
    buffer::RasterBuffer,
    catalog::{raster_axes, SdsEntry},
    components::{Dataset, MetadataDomains},
    eos::{
        gctp::WGS84_WKT, grid_georeferencing, swath_gcps, FieldDef, GeolocationMapping,
        StructMetadata, SwathStructure,
    },
    errors::{Hdf4Error, Result},
    identifier::{Kind, Prefix, Selector, Subdataset},
};

struct FieldRequest<'a> {
    structure: &'a str,
    field: &'a str,
    planes: &'a [usize],
}

pub fn open(context: &OpenContext, subdataset: &Subdataset) -> Result<Dataset> {
    let Some(Selector::Field {
        structure,
        field,
        planes,
    }) = &subdataset.selector
    else {
        return Err(context.error("expected structure and field names"));
    };
    let request = FieldRequest {
        structure,
        field,
        planes,
    };
    match subdataset.kind {
        Kind::EosGrid => open_grid(context, subdataset, &request),
        Kind::EosSwath | Kind::EosSwathGeol => open_swath(context, subdataset, &request),
        other => Err(context.error(format!("{} is not an HDF-EOS kind", other.as_str()))),
    }
}

/// Dataset over one plane of the field's array.
fn field_dataset(
    context: &OpenContext,
    subdataset: &Subdataset,
    request: &FieldRequest,
    def: &FieldDef,
) -> Result<(Dataset, PlaneSelection)> {
    let entry: &SdsEntry = context
        .catalog
        .eos_field(request.structure, request.field)
        .or_else(|| context.catalog.sds_named(request.structure, request.field))
        .ok_or_else(|| {
            context.error(format!(
                "no dataset holds field {} of {}",
                request.field, request.structure
            ))
        })?;
    if entry.rank() < 2 {
        return Err(context.error(format!("field {} is not a raster", request.field)));
    }
    let (y_axis, x_axis) = raster_axes(&def.dims, entry.rank());
    let selection = PlaneSelection::new(&entry.dims, y_axis, x_axis, request.planes)
        .map_err(|reason| context.error(reason))?;
    let tile = def
        .tiling
        .as_ref()
        .filter(|tiling| tiling.len() == entry.rank())
        .map(|tiling| (tiling[x_axis], tiling[y_axis]));
    let size = selection.size(&entry.dims);
    let band = sds::dataset_band(context, entry, selection.clone(), tile)?;
    let mut dataset = Dataset::new(
        subdataset.to_string(),
        size,
        vec![band],
        Arc::clone(context.container),
    );
    sds::describe_dataset(context, entry, &mut dataset);
    Ok((dataset, selection))
}

fn structure_metadata<'a>(context: &'a OpenContext) -> Option<&'a StructMetadata> {
    context.catalog.eos.as_ref()
}

/// Opens a field the structural metadata does not describe as a plain
/// dataset of that name, without georeferencing.
fn undescribed_field(
    context: &OpenContext,
    subdataset: &Subdataset,
    request: &FieldRequest,
) -> Result<Dataset> {
    warn!(
        "no structural metadata for field {} of {}, opening it without georeferencing",
        request.field, request.structure
    );
    let def = FieldDef::named(request.field);
    field_dataset(context, subdataset, request, &def).map(|(dataset, _)| dataset)
}

fn open_grid(context: &OpenContext, subdataset: &Subdataset, request: &FieldRequest) -> Result<Dataset> {
    let Some((grid, def)) = structure_metadata(context)
        .and_then(|eos| eos.grid(request.structure))
        .and_then(|grid| Some((grid, grid.field(request.field)?)))
    else {
        return undescribed_field(context, subdataset, request);
    };
    let (mut dataset, _) = field_dataset(context, subdataset, request, def)?;
    if let Some((transform, projection)) = grid_georeferencing(grid) {
        dataset.set_georeferencing(transform, projection);
    }
    Ok(dataset)
}

fn open_swath(context: &OpenContext, subdataset: &Subdataset, request: &FieldRequest) -> Result<Dataset> {
    let described = structure_metadata(context)
        .and_then(|eos| eos.swath(request.structure))
        .and_then(|swath| {
            let def = if subdataset.kind == Kind::EosSwathGeol {
                swath.geo_field(request.field)
            } else {
                swath.data_field(request.field)
            };
            Some((swath, def?))
        });
    let Some((swath, def)) = described else {
        return undescribed_field(context, subdataset, request);
    };
    let (mut dataset, selection) = field_dataset(context, subdataset, request, def)?;
    if subdataset.kind == Kind::EosSwath {
        geolocate(context, subdataset, swath, def, &selection, &mut dataset);
    }
    Ok(dataset)
}

/// GEOLOCATION domain and ground control points of a swath data field.
/// Swaths without usable geolocation open without either.
fn geolocate(
    context: &OpenContext,
    subdataset: &Subdataset,
    swath: &SwathStructure,
    def: &FieldDef,
    selection: &PlaneSelection,
    dataset: &mut Dataset,
) {
    let (Some(line_dimension), Some(pixel_dimension)) =
        (def.dims.get(selection.y_axis), def.dims.get(selection.x_axis))
    else {
        return;
    };
    let Some(longitude) = swath.geo_field(SwathStructure::LONGITUDE) else {
        warn!("swath {} has no {} field", swath.name, SwathStructure::LONGITUDE);
        return;
    };
    let Some(mapping) =
        GeolocationMapping::resolve(swath, longitude, line_dimension, pixel_dimension)
    else {
        warn!(
            "swath {} maps no geolocation onto {line_dimension}/{pixel_dimension}",
            swath.name
        );
        return;
    };

    let companion = |field: &str| Subdataset {
        prefix: Prefix::Eos,
        kind: Kind::EosSwathGeol,
        path: subdataset.path.clone(),
        selector: Some(Selector::Field {
            structure: swath.name.clone(),
            field: field.to_string(),
            planes: vec![],
        }),
    };
    let geolocation = [
        ("X_DATASET", companion(SwathStructure::LONGITUDE).to_string()),
        ("Y_DATASET", companion(SwathStructure::LATITUDE).to_string()),
        ("X_BAND", "1".to_string()),
        ("Y_BAND", "1".to_string()),
        ("PIXEL_OFFSET", mapping.pixel_offset.to_string()),
        ("LINE_OFFSET", mapping.line_offset.to_string()),
        ("PIXEL_STEP", mapping.pixel_step.to_string()),
        ("LINE_STEP", mapping.line_step.to_string()),
    ];
    dataset.metadata_mut().extend(
        MetadataDomains::GEOLOCATION,
        geolocation.map(|(key, value)| (key.to_string(), value)),
    );

    let coordinates = read_coordinates(context, &swath.name, SwathStructure::LONGITUDE)
        .and_then(|longitudes| {
            let latitudes = read_coordinates(context, &swath.name, SwathStructure::LATITUDE)?;
            Ok((longitudes, latitudes))
        });
    match coordinates {
        Ok(((longitudes, shape), (latitudes, _))) => {
            let gcps = swath_gcps(&longitudes, &latitudes, shape, &mapping, context.options.max_gcps);
            if !gcps.is_empty() {
                dataset.set_gcps(gcps, WGS84_WKT.to_string());
            }
        }
        Err(err) => warn!("swath {} geolocation is unreadable: {err}", swath.name),
    }
}

/// Values of a rank 2 geolocation field, with its (rows, columns).
fn read_coordinates(
    context: &OpenContext,
    swath: &str,
    field: &str,
) -> Result<(Vec<f64>, (usize, usize))> {
    let entry = context
        .catalog
        .eos_field(swath, field)
        .ok_or_else(|| Hdf4Error::Metadata(format!("no dataset holds {field} of {swath}")))?;
    let (&[rows, columns], Some(record)) = (entry.dims.as_slice(), entry.number_type) else {
        return Err(Hdf4Error::Metadata(format!(
            "{field} of {swath} is not a two dimensional array"
        )));
    };
    let pixel_type = record.number_type.pixel_type().ok_or_else(|| {
        Hdf4Error::Metadata(format!("{field} holds {:?} values", record.number_type))
    })?;
    let bytes = entry
        .store(context.container)?
        .read_box(&[0, 0], &[rows, columns])?;
    let values = RasterBuffer::decode(pixel_type, record.endian, &bytes, [rows, columns])?;
    Ok((values.to_f64_vec(), (rows, columns)))
}
