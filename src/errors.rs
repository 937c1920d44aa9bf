pub type Result<T> = std::result::Result<T, Hdf4Error>;

#[derive(thiserror::Error, Debug)]
pub enum Hdf4Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Unparseable or corrupt binary structure.
    #[error("Malformed HDF4 structure: {0}")]
    Format(String),
    /// Recognized object that this reader does not handle.
    #[error("Unsupported object (tag {tag}, ref {reference}): {reason}")]
    UnsupportedObject {
        tag: u16,
        reference: u16,
        reason: String,
    },
    #[error("Can not resolve identifier '{identifier}': {reason}")]
    Identifier { identifier: String, reason: String },
    /// Embedded grid/swath metadata could not be interpreted.
    #[error("Malformed structural metadata: {0}")]
    Metadata(String),
    #[error("Decompression failed: {0}")]
    Decompression(String),
    #[error("Block ({0}, {1}) is outside of the band")]
    BlockOutOfRange(usize, usize),
    #[error("Window {0:?} is outside of the band")]
    WindowOutOfRange((usize, usize, usize, usize)),
    #[error("Requested pixel type {requested:?} but band holds {stored:?}")]
    TypeMismatch {
        requested: crate::components::PixelType,
        stored: crate::components::PixelType,
    },
}

impl Hdf4Error {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Hdf4Error::Format(reason.into())
    }

    pub(crate) fn unsupported(tag: u16, reference: u16, reason: impl Into<String>) -> Self {
        Hdf4Error::UnsupportedObject {
            tag,
            reference,
            reason: reason.into(),
        }
    }

    pub(crate) fn identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Hdf4Error::Identifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Maps truncated reads onto [Hdf4Error::Format], keeps everything else.
    pub(crate) fn truncated(self, what: &str) -> Self {
        match self {
            Hdf4Error::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                Hdf4Error::Format(format!("{what} is truncated"))
            }
            other => other,
        }
    }
}
