use std::{fmt::Debug, fs::File, io, path::Path};

/// Random access byte store backing a [Container](super::Container).
///
/// Reads are positional so blocks of the same container can be fetched from
/// several threads in any order.
pub trait Source: Send + Sync + Debug {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()>;
    fn len(&self) -> u64;
}

#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl Source for FileSource {
    #[cfg(unix)]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        let mut offset = offset;
        while !buf.is_empty() {
            match self.file.seek_read(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ))
                }
                Ok(read) => {
                    buf = &mut buf[read..];
                    offset += read as u64;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// In-memory container image.
#[derive(Debug)]
pub struct MemorySource(Vec<u8>);

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Source for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::UnexpectedEof, "offset overflow"))?;
        let end = start
            .checked_add(buf.len())
            .filter(|end| *end <= self.0.len())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("read of {} bytes at {offset} past end", buf.len()),
                )
            })?;
        buf.copy_from_slice(&self.0[start..end]);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.0.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn memory_reads_are_bounded() {
        let source = MemorySource::new(vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        source.read_at(2, &mut buf).unwrap();
        assert_eq!(buf, [3, 4]);
        let err = source.read_at(3, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[rstest]
    fn file_reads_are_positional() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, &[10, 11, 12, 13, 14]).unwrap();
        let source = FileSource::open(file.path()).unwrap();
        assert_eq!(source.len(), 5);

        // Concurrent readers do not share a cursor.
        let reads: Vec<[u8; 2]> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..3u64)
                .map(|offset| {
                    let source = &source;
                    scope.spawn(move || {
                        let mut buf = [0u8; 2];
                        source.read_at(offset, &mut buf).map(|_| buf)
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap().unwrap()).collect()
        });
        assert_eq!(reads, vec![[10, 11], [11, 12], [12, 13]]);

        let mut buf = [0u8; 2];
        let err = source.read_at(4, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
