/// One palette entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorEntry {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Indexed color table of a band.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorTable {
    entries: Vec<ColorEntry>,
}

impl ColorTable {
    /// Table from packed RGB triplets, all opaque.
    pub fn from_rgb(bytes: &[u8]) -> Self {
        let entries = bytes
            .chunks_exact(3)
            .map(|rgb| ColorEntry {
                r: rgb[0],
                g: rgb[1],
                b: rgb[2],
                a: 255,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[ColorEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ColorEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn rgb_triplets_become_opaque_entries() {
        let table = ColorTable::from_rgb(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(1),
            Some(&ColorEntry {
                r: 4,
                g: 5,
                b: 6,
                a: 255
            })
        );
    }
}
