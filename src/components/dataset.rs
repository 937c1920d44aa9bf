use log::{debug, info};
use std::{fmt::Debug, sync::Arc};

use crate::{
    components::{Band, Gcp, GeoTransform, Metadata, MetadataDomains},
    container::Container,
};

/// Raster surface opened from one container object.
///
/// Band count and pixel types are fixed once built. Bands keep the container
/// alive through their readers, so no handle outlives its backing file.
pub struct Dataset {
    description: String,
    size: (usize, usize),
    bands: Vec<Band>,
    geo_transform: Option<GeoTransform>,
    projection: Option<String>,
    gcps: Vec<Gcp>,
    gcp_projection: Option<String>,
    metadata: MetadataDomains,
    container: Arc<Container>,
}

impl Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bands: Vec<_> = self
            .bands
            .iter()
            .map(|band| (band.pixel_type(), band.block_size()))
            .collect();
        f.debug_struct("Dataset")
            .field("description", &self.description)
            .field("size", &self.size)
            .field("bands", &bands)
            .field("geo_transform", &self.geo_transform)
            .field("gcps", &self.gcps.len())
            .finish()
    }
}

impl Dataset {
    pub(crate) fn new(
        description: String,
        size: (usize, usize),
        bands: Vec<Band>,
        container: Arc<Container>,
    ) -> Self {
        Self {
            description,
            size,
            bands,
            geo_transform: None,
            projection: None,
            gcps: Vec::new(),
            gcp_projection: None,
            metadata: MetadataDomains::default(),
            container,
        }
    }

    pub(crate) fn set_georeferencing(&mut self, transform: GeoTransform, projection: Option<String>) {
        self.geo_transform = Some(transform);
        self.projection = projection;
    }

    pub(crate) fn set_gcps(&mut self, gcps: Vec<Gcp>, projection: String) {
        self.gcps = gcps;
        self.gcp_projection = Some(projection);
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut MetadataDomains {
        &mut self.metadata
    }

    pub(crate) fn finish(self) -> Self {
        info!("opened {self:?}");
        self
    }

    /// Identifier the dataset was opened from.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// (width, height)
    pub fn size(&self) -> (usize, usize) {
        self.size
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band at zero based `index`.
    pub fn band(&self, index: usize) -> Option<&Band> {
        self.bands.get(index)
    }

    pub fn bands(&self) -> impl Iterator<Item = &Band> {
        self.bands.iter()
    }

    pub fn geo_transform(&self) -> Option<&GeoTransform> {
        self.geo_transform.as_ref()
    }

    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref()
    }

    pub fn gcps(&self) -> &[Gcp] {
        &self.gcps
    }

    pub fn gcp_projection(&self) -> Option<&str> {
        self.gcp_projection.as_deref()
    }

    pub fn metadata(&self, domain: &str) -> Option<&Metadata> {
        self.metadata.domain(domain)
    }

    pub fn metadata_item(&self, key: &str, domain: &str) -> Option<&str> {
        self.metadata.item(key, domain)
    }

    pub fn metadata_domains(&self) -> &MetadataDomains {
        &self.metadata
    }

    /// Releases the dataset and, with the last handle, its container.
    pub fn close(self) {
        debug!(
            "closing {} ({} other handles on {})",
            self.description,
            Arc::strong_count(&self.container) - 1,
            self.container.name()
        );
    }
}
