mod common;

use common::*;
use hdf4_raster::{open_with, ColorEntry, MetadataDomains, OpenOptions, PixelType};
use rstest::rstest;

fn grey_ramp() -> Vec<u8> {
    (0..=255u8).flat_map(|value| [value, value / 2, 255 - value]).collect()
}

fn image(name: &str, interlace: u16, palette: Option<Vec<u8>>) -> ImageSpec<'_> {
    // Component c of pixel (x, y) holds 100 * c + 10 * y + x.
    let sample = |x: usize, y: usize, c: usize| (100 * c + 10 * y + x) as f64;
    let (width, height, components) = (4, 3, 2);
    let values = match interlace {
        0 => (0..height)
            .flat_map(|y| (0..width).flat_map(move |x| (0..components).map(move |c| (x, y, c))))
            .map(|(x, y, c)| sample(x, y, c))
            .collect(),
        1 => (0..height)
            .flat_map(|y| (0..components).flat_map(move |c| (0..width).map(move |x| (x, y, c))))
            .map(|(x, y, c)| sample(x, y, c))
            .collect(),
        _ => (0..components)
            .flat_map(|c| (0..height).flat_map(move |y| (0..width).map(move |x| (x, y, c))))
            .map(|(x, y, c)| sample(x, y, c))
            .collect(),
    };
    ImageSpec {
        name,
        width,
        height,
        components,
        number_type: DFNT_UINT8,
        interlace,
        values,
        palette,
    }
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
fn every_interlace_yields_component_bands(#[case] interlace: u16) {
    let mut writer = HdfWriter::new();
    writer.image(image("picture", interlace, None));
    let file = writer.write();

    let dataset = open_with(&path_of(&file), &OpenOptions::default()).unwrap();
    assert_eq!(dataset.size(), (4, 3));
    assert_eq!(dataset.band_count(), 2);
    for (component, band) in dataset.bands().enumerate() {
        assert_eq!(band.pixel_type(), PixelType::UInt8);
        let samples = band.read_raster().unwrap().into_typed::<u8>().unwrap();
        assert_eq!(samples.get(0, 0), Some(100 * component as u8));
        assert_eq!(samples.get(3, 2), Some(100 * component as u8 + 23));
    }
}

#[rstest]
fn palette_goes_with_the_first_band() {
    let mut writer = HdfWriter::new();
    writer.image(image("with palette", 0, Some(grey_ramp())));
    writer.image(image("without palette", 0, None));
    let file = writer.write();
    let path = path_of(&file);

    let first = open_with(&format!("HDF4_GR:UNKNOWN:\"{path}\":0"), &OpenOptions::default())
        .unwrap();
    let table = first.band(0).unwrap().color_table().expect("palette");
    assert_eq!(table.len(), 256);
    assert_eq!(
        table.get(10),
        Some(&ColorEntry {
            r: 10,
            g: 5,
            b: 245,
            a: 255
        })
    );
    assert!(first.band(1).unwrap().color_table().is_none());

    let second = open_with(&format!("HDF4_GR:UNKNOWN:\"{path}\":1"), &OpenOptions::default())
        .unwrap();
    assert!(second.band(0).unwrap().color_table().is_none());
}

#[rstest]
fn images_follow_datasets_in_the_subdataset_list() {
    let mut writer = HdfWriter::new();
    writer.sds(SdsSpec::new("data", vec![3, 4], DFNT_INT16, ramp(4, 3, 12)));
    writer.image(image("picture", 2, None));
    let file = writer.write();
    let path = path_of(&file);

    let dataset = open_with(&path, &OpenOptions::default()).unwrap();
    let subdatasets = dataset.metadata(MetadataDomains::SUBDATASETS).unwrap();
    assert_eq!(subdatasets.len(), 4);
    assert_eq!(
        subdatasets["SUBDATASET_2_NAME"],
        format!("HDF4_GR:UNKNOWN:\"{path}\":0")
    );
    assert_eq!(
        subdatasets["SUBDATASET_2_DESC"],
        "[4x3x2] picture (8-bit unsigned integer)"
    );
}
