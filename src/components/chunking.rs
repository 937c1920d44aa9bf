//! Preferred block size of a band.
//!
//! A declared tile (chunk or tiling hint) wins over the derived default. A
//! block height of one row is replaced by a taller block that still divides
//! the raster height, so whole-raster reads do not degrade to one read per row.

use log::debug;

/// Default block: whole rows, as many as fit in `block_pixels`.
pub fn default_block_size(size: (usize, usize), block_pixels: usize) -> (usize, usize) {
    let (width, height) = size;
    let rows = (block_pixels / width.max(1)).clamp(1, height.max(1));
    (width.max(1), rows)
}

/// Resolves the block size of a `size` raster from an optional declared tile.
pub fn resolve_block_size(
    size: (usize, usize),
    declared: Option<(usize, usize)>,
    block_pixels: usize,
) -> (usize, usize) {
    let (width, height) = size;
    let (block_width, block_height) = declared
        .map(|(w, h)| (w.clamp(1, width.max(1)), h.clamp(1, height.max(1))))
        .unwrap_or_else(|| default_block_size(size, block_pixels));
    if block_height == 1 && height > 1 {
        let taller = taller_block_height(block_width, height, block_pixels);
        debug!("block height 1 of a {width}x{height} raster raised to {taller}");
        return (block_width, taller);
    }
    (block_width, block_height)
}

/// Largest divisor of `height` in `2..=block_pixels / block_width`, else the
/// smallest divisor above one.
fn taller_block_height(block_width: usize, height: usize, block_pixels: usize) -> usize {
    let max_rows = block_pixels / block_width.max(1);
    (2..=max_rows.min(height))
        .rev()
        .find(|rows| height % rows == 0)
        .or_else(|| (2..=height).find(|rows| height % rows == 0))
        .unwrap_or(height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case((1200, 1200), (1200, 833))]
    #[case((20, 20), (20, 20))]
    #[case((2_000_000, 7), (2_000_000, 7))]
    fn default_blocks_cap_the_pixel_count(
        #[case] size: (usize, usize),
        #[case] expected: (usize, usize),
    ) {
        assert_eq!(resolve_block_size(size, None, 1_000_000), expected);
    }

    #[rstest]
    #[case((4800, 4800), Some((4800, 1)), (4800, 200))]
    #[case((2400, 2400), Some((2400, 32)), (2400, 32))]
    #[case((4800, 4800), Some((4800, 4800)), (4800, 4800))]
    #[case((10, 1), Some((10, 1)), (10, 1))]
    fn declared_tiles_are_kept_unless_one_row(
        #[case] size: (usize, usize),
        #[case] declared: Option<(usize, usize)>,
        #[case] expected: (usize, usize),
    ) {
        assert_eq!(resolve_block_size(size, declared, 1_000_000), expected);
    }

    #[rstest]
    #[case(13)]
    #[case(12)]
    #[case(4096)]
    fn raised_height_divides_the_raster(#[case] height: usize) {
        let (_, block_height) = resolve_block_size((1_000_000, height), Some((1_000_000, 1)), 1_000_000);
        assert!(block_height > 1);
        assert!(height % block_height == 0 || block_height == height);
    }
}
