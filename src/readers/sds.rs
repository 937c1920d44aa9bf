//! Scientific datasets as single band rasters.
//!
//! The last dimension is the raster width and the one before it the height.
//! Leading dimensions are addressed by the extra selector indices, one
//! subdataset per index combination.

use log::debug;
use std::sync::Arc;

use super::{ArrayBand, OpenContext, PlaneSelection};
use crate::{
    catalog::SdsEntry,
    components::{chunking::resolve_block_size, Band, BandInfo, Dataset, MetadataDomains},
    container::{tags, TagRef},
    errors::{Hdf4Error, Result},
    identifier::{Prefix, Selector, Subdataset},
};

/// Band over one plane of `entry`. `tile` is a declared (width, height)
/// block that takes precedence over the storage chunking.
pub(crate) fn dataset_band(
    context: &OpenContext,
    entry: &SdsEntry,
    selection: PlaneSelection,
    tile: Option<(usize, usize)>,
) -> Result<Band> {
    let unsupported = |reason: String| {
        let group = entry.group.unwrap_or(TagRef::new(tags::NDG, 0));
        Hdf4Error::unsupported(group.tag, group.reference, reason)
    };
    let record = entry
        .number_type
        .ok_or_else(|| unsupported(format!("dataset {} has no number type", entry.name)))?;
    let pixel_type = record.number_type.pixel_type().ok_or_else(|| {
        unsupported(format!(
            "dataset {} holds {:?} samples",
            entry.name, record.number_type
        ))
    })?;
    let store = Arc::new(entry.store(context.container)?);
    let size = selection.size(&entry.dims);
    let chunk = store
        .chunk_dims()
        .map(|chunk| (chunk[selection.x_axis], chunk[selection.y_axis]));
    let block_size = resolve_block_size(size, tile.or(chunk), context.options.block_pixels);
    debug!(
        "dataset {} ({}): {size:?} samples in {block_size:?} blocks",
        entry.index, entry.name
    );

    let mut info = BandInfo::new(pixel_type, size, block_size);
    info.description = entry.name.clone();
    info.no_data = entry.fill_value();
    info.scale = entry.attribute("scale_factor").and_then(|value| value.as_f64());
    info.offset = entry.attribute("add_offset").and_then(|value| value.as_f64());
    info.metadata = entry
        .attributes
        .iter()
        .map(|attribute| (attribute.name.clone(), attribute.value.to_string()))
        .collect();
    let reader = ArrayBand {
        store,
        pixel_type,
        endian: record.endian,
        selection,
    };
    Ok(Band::new(info, Arc::new(reader)))
}

pub fn open(context: &OpenContext, subdataset: &Subdataset) -> Result<Dataset> {
    let Some(Selector::Indices(indices)) = &subdataset.selector else {
        return Err(context.error("expected a dataset index"));
    };
    let [index, planes @ ..] = indices.as_slice() else {
        return Err(context.error("expected a dataset index"));
    };
    let entry = context
        .catalog
        .sds
        .get(*index)
        .ok_or_else(|| context.error(format!("no dataset with index {index}")))?;
    if entry.rank() < 2 {
        return Err(context.error(format!(
            "dataset {index} ({}) of rank {} is not a raster",
            entry.name,
            entry.rank()
        )));
    }
    let rank = entry.rank();
    let selection = PlaneSelection::new(&entry.dims, rank - 2, rank - 1, planes)
        .map_err(|reason| context.error(reason))?;
    let size = selection.size(&entry.dims);
    let band = dataset_band(context, entry, selection, None)?;

    let mut dataset = Dataset::new(
        subdataset.to_string(),
        size,
        vec![band],
        Arc::clone(context.container),
    );
    describe_dataset(context, entry, &mut dataset);
    if let Some((longitude, latitude)) = context.catalog.coordinate_datasets(&entry.dims) {
        if longitude != entry.index && latitude != entry.index {
            let companion = |index: usize| Subdataset {
                prefix: Prefix::Sds,
                kind: subdataset.kind,
                path: subdataset.path.clone(),
                selector: Some(Selector::Indices(vec![index])),
            };
            let geolocation = [
                ("X_DATASET", companion(longitude).to_string()),
                ("Y_DATASET", companion(latitude).to_string()),
                ("X_BAND", "1".to_string()),
                ("Y_BAND", "1".to_string()),
                ("PIXEL_OFFSET", "0".to_string()),
                ("LINE_OFFSET", "0".to_string()),
                ("PIXEL_STEP", "1".to_string()),
                ("LINE_STEP", "1".to_string()),
            ];
            dataset.metadata_mut().extend(
                MetadataDomains::GEOLOCATION,
                geolocation.map(|(key, value)| (key.to_string(), value)),
            );
        }
    }
    Ok(dataset)
}

/// Dataset attributes and object annotations in the default domain.
pub(crate) fn describe_dataset(context: &OpenContext, entry: &SdsEntry, dataset: &mut Dataset) {
    let annotations = entry
        .group
        .map(|group| context.container.object_annotations(&[group]))
        .unwrap_or_default();
    dataset.metadata_mut().extend(
        MetadataDomains::DEFAULT,
        entry
            .attributes
            .iter()
            .map(|attribute| (attribute.name.clone(), attribute.value.to_string()))
            .chain(annotations),
    );
}
