use log::warn;
use serde::{Deserialize, Serialize};

/// How a bare container path picks the subdataset it opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum DefaultSelection {
    /// Open the first raster candidate in catalogue order.
    #[default]
    First,
    /// Only open a container holding exactly one raster candidate.
    RequireSole,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenOptions {
    /// Pixel budget of a derived block.
    pub block_pixels: usize,
    pub default_selection: DefaultSelection,
    /// Upper bound on the number of ground control points built for a swath.
    pub max_gcps: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            block_pixels: 1_000_000,
            default_selection: DefaultSelection::First,
            max_gcps: 5000,
        }
    }
}

impl OpenOptions {
    pub const BLOCK_PIXELS_VAR: &'static str = "HDF4_BLOCK_PIXELS";

    /// Defaults, with `HDF4_BLOCK_PIXELS` applied when set to a positive integer.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(value) = std::env::var(Self::BLOCK_PIXELS_VAR) {
            match value.trim().parse::<usize>() {
                Ok(pixels) if pixels > 0 => options.block_pixels = pixels,
                _ => warn!("ignoring {}={value:?}", Self::BLOCK_PIXELS_VAR),
            }
        }
        options
    }

    pub fn with_block_pixels(mut self, block_pixels: usize) -> Self {
        self.block_pixels = block_pixels.max(1);
        self
    }

    pub fn with_default_selection(mut self, selection: DefaultSelection) -> Self {
        self.default_selection = selection;
        self
    }

    pub fn with_max_gcps(mut self, max_gcps: usize) -> Self {
        self.max_gcps = max_gcps;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_match_legacy_block_budget() {
        let options = OpenOptions::default();
        assert_eq!(options.block_pixels, 1_000_000);
        assert_eq!(options.default_selection, DefaultSelection::First);
    }

    #[rstest]
    fn builder_never_allows_empty_blocks() {
        assert_eq!(OpenOptions::default().with_block_pixels(0).block_pixels, 1);
    }
}
