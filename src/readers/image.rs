use std::sync::Arc;

use super::{ArrayBand, OpenContext, PlaneSelection};
use crate::{
    catalog::ImageEntry,
    components::{chunking::resolve_block_size, Band, BandInfo, Dataset, MetadataDomains},
    container::{ArrayStore, Interlace},
    errors::{Hdf4Error, Result},
    identifier::{Selector, Subdataset},
};

/// (y, x, component) axes of the stored image.
fn axes(interlace: Interlace) -> (usize, usize, usize) {
    match interlace {
        Interlace::Pixel => (0, 1, 2),
        Interlace::Line => (0, 2, 1),
        Interlace::Component => (1, 2, 0),
    }
}

fn component_band(
    context: &OpenContext,
    image: &ImageEntry,
    store: &Arc<ArrayStore>,
    component: usize,
) -> Result<Band> {
    let pixel_type = image.number_type.number_type.pixel_type().ok_or_else(|| {
        Hdf4Error::unsupported(image.data.tag, image.data.reference, "image sample type")
    })?;
    let (y_axis, x_axis, _) = axes(image.interlace);
    let selection = PlaneSelection::new(store.dims(), y_axis, x_axis, &[component])
        .map_err(|reason| context.error(reason))?;
    let size = (image.width, image.height);
    let mut info = BandInfo::new(
        pixel_type,
        size,
        resolve_block_size(size, None, context.options.block_pixels),
    );
    if component == 0 {
        info.color_table = image.palette.clone();
    }
    Ok(Band::new(
        info,
        Arc::new(ArrayBand {
            store: Arc::clone(store),
            pixel_type,
            endian: image.number_type.endian,
            selection,
        }),
    ))
}

/// One band per image component; the palette goes with the first band.
pub fn open(context: &OpenContext, subdataset: &Subdataset) -> Result<Dataset> {
    let Some(Selector::Indices(indices)) = &subdataset.selector else {
        return Err(context.error("expected an image index"));
    };
    let [index] = indices.as_slice() else {
        return Err(context.error("expected a single image index"));
    };
    let image = context
        .catalog
        .images
        .get(*index)
        .ok_or_else(|| context.error(format!("no image with index {index}")))?;
    let store = Arc::new(image.store(context.container)?);
    let bands = (0..image.components)
        .map(|component| component_band(context, image, &store, component))
        .collect::<Result<Vec<_>>>()?;

    let mut dataset = Dataset::new(
        subdataset.to_string(),
        (image.width, image.height),
        bands,
        Arc::clone(context.container),
    );
    let annotations = context.container.object_annotations(&[image.group, image.data]);
    dataset.metadata_mut().extend(
        MetadataDomains::DEFAULT,
        image
            .attributes
            .iter()
            .map(|attribute| (attribute.name.clone(), attribute.value.to_string()))
            .chain(annotations),
    );
    Ok(dataset)
}
