//! Resolution of identifiers onto readers.
//!
//! Each reader advertises the identifier prefix and product kinds it opens in
//! the immutable [READERS] table; opening is a lookup in that table against
//! the catalogue of the freshly opened container.

mod array;
pub mod eos;
pub mod image;
pub mod sds;

use log::{debug, info};
use std::sync::Arc;

use crate::{
    catalog::Catalog,
    components::{Dataset, MetadataDomains},
    config::{DefaultSelection, OpenOptions},
    container::Container,
    errors::{Hdf4Error, Result},
    identifier::{Identifier, Kind, Prefix, Subdataset},
};

pub(crate) use array::{ArrayBand, PlaneSelection};

/// State shared by a reader while it builds one dataset.
#[derive(Debug)]
pub struct OpenContext<'a> {
    pub container: &'a Arc<Container>,
    pub catalog: &'a Catalog,
    pub options: &'a OpenOptions,
    /// Identifier text, kept for error reports.
    pub identifier: &'a str,
}

impl OpenContext<'_> {
    pub(crate) fn error(&self, reason: impl Into<String>) -> Hdf4Error {
        Hdf4Error::identifier(self.identifier, reason)
    }
}

pub struct ReaderEntry {
    pub name: &'static str,
    pub prefix: Prefix,
    pub kinds: &'static [Kind],
    pub open: fn(&OpenContext, &Subdataset) -> Result<Dataset>,
}

impl std::fmt::Debug for ReaderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderEntry")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .finish()
    }
}

const PRODUCT_KINDS: &[Kind] = &[
    Kind::Unknown,
    Kind::GdalHdf4,
    Kind::SeawifsL1a,
    Kind::SeawifsL2,
    Kind::SeawifsL3,
    Kind::ModisL1b,
    Kind::ModisL2,
    Kind::ModisL3,
    Kind::ModisUnk,
    Kind::HyperionL1,
    Kind::AsterL1a,
    Kind::AsterL1b,
    Kind::AsterL2,
    Kind::Ast14Dem,
];

pub static READERS: [ReaderEntry; 3] = [
    ReaderEntry {
        name: "scientific dataset",
        prefix: Prefix::Sds,
        kinds: PRODUCT_KINDS,
        open: sds::open,
    },
    ReaderEntry {
        name: "raster image",
        prefix: Prefix::Gr,
        kinds: PRODUCT_KINDS,
        open: image::open,
    },
    ReaderEntry {
        name: "HDF-EOS field",
        prefix: Prefix::Eos,
        kinds: &[Kind::EosGrid, Kind::EosSwath, Kind::EosSwathGeol],
        open: eos::open,
    },
];

pub fn reader_for(subdataset: &Subdataset) -> Option<&'static ReaderEntry> {
    READERS
        .iter()
        .find(|entry| entry.prefix == subdataset.prefix && entry.kinds.contains(&subdataset.kind))
}

/// Subdataset opened for a bare container path.
fn default_subdataset(catalog: &Catalog, options: &OpenOptions, path: &str) -> Result<Subdataset> {
    let mut candidates = catalog.candidates();
    if candidates.is_empty() {
        return Err(Hdf4Error::identifier(path, "container holds no raster"));
    }
    if options.default_selection == DefaultSelection::RequireSole && candidates.len() > 1 {
        return Err(Hdf4Error::identifier(
            path,
            format!(
                "container holds {} subdatasets, name one of them",
                candidates.len()
            ),
        ));
    }
    let chosen = candidates.swap_remove(0);
    debug!("{path} opens {} by default", chosen.subdataset);
    Ok(chosen.subdataset)
}

/// Opens the dataset an identifier names.
pub fn open_identifier(text: &str, options: &OpenOptions) -> Result<Dataset> {
    let identifier = Identifier::parse(text)?;
    let container = Container::open(identifier.path())?;
    let catalog = Catalog::read(&container);
    let subdataset = match identifier {
        Identifier::Path(path) => default_subdataset(&catalog, options, &path)?,
        Identifier::Subdataset(subdataset) => subdataset,
    };
    let reader = reader_for(&subdataset)
        .ok_or_else(|| Hdf4Error::identifier(text, "no reader accepts this prefix and kind"))?;
    info!("opening {subdataset} with the {} reader", reader.name);
    let context = OpenContext {
        container: &container,
        catalog: &catalog,
        options,
        identifier: text,
    };
    let mut dataset = (reader.open)(&context, &subdataset)?;
    describe_container(&mut dataset, &catalog);
    Ok(dataset.finish())
}

/// File attributes, file annotations and the subdataset list.
fn describe_container(dataset: &mut Dataset, catalog: &Catalog) {
    let metadata = dataset.metadata_mut();
    metadata.extend(
        MetadataDomains::DEFAULT,
        catalog
            .global_attributes
            .iter()
            .filter(|attribute| !attribute.name.starts_with("StructMetadata."))
            .map(|attribute| (attribute.name.clone(), attribute.value.to_string()))
            .chain(catalog.file_annotations.iter().cloned()),
    );
    for (n, candidate) in catalog.candidates().into_iter().enumerate() {
        metadata.insert(
            MetadataDomains::SUBDATASETS,
            format!("SUBDATASET_{}_NAME", n + 1),
            candidate.subdataset.to_string(),
        );
        metadata.insert(
            MetadataDomains::SUBDATASETS,
            format!("SUBDATASET_{}_DESC", n + 1),
            candidate.description,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn subdataset(prefix: Prefix, kind: Kind) -> Subdataset {
        Subdataset {
            prefix,
            kind,
            path: "a.hdf".into(),
            selector: None,
        }
    }

    #[rstest]
    #[case(Prefix::Sds, Kind::Unknown, Some("scientific dataset"))]
    #[case(Prefix::Sds, Kind::ModisL1b, Some("scientific dataset"))]
    #[case(Prefix::Gr, Kind::Unknown, Some("raster image"))]
    #[case(Prefix::Eos, Kind::EosSwathGeol, Some("HDF-EOS field"))]
    #[case(Prefix::Sds, Kind::EosGrid, None)]
    fn readers_are_picked_by_prefix_and_kind(
        #[case] prefix: Prefix,
        #[case] kind: Kind,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(
            reader_for(&subdataset(prefix, kind)).map(|entry| entry.name),
            expected
        );
    }

    #[rstest]
    fn every_kind_has_a_reader() {
        for kind in Kind::ALL {
            let prefix = if kind.is_eos() { Prefix::Eos } else { Prefix::Sds };
            assert!(reader_for(&subdataset(prefix, kind)).is_some(), "{kind:?}");
        }
    }
}
