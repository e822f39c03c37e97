use crate::Result;
use std::io::{Read, Seek, SeekFrom, Write};

/// A disk seen as a random access store of bytes.
///
/// Every offset is an absolute byte offset from the start of the disk. This is implemented for
/// anything that is `Read + Write + Seek`: files, block devices, `std::io::Cursor`...
pub trait Device {
    /// Read exactly `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Reading less than `len` bytes is an error.
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Write all of `data` at `offset` and return the number of bytes written.
    ///
    /// # Errors
    ///
    /// Writing less than `data.len()` bytes is an error.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize>;

    /// Size of the disk in bytes.
    fn size(&mut self) -> Result<u64>;
}

impl<T: ?Sized> Device for T
where
    T: Read + Write + Seek,
{
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.seek(SeekFrom::Start(offset))?;
        let mut data = vec![0; len];
        self.read_exact(&mut data)?;

        Ok(data)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(data)?;
        self.flush()?;

        Ok(data.len())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.seek(SeekFrom::End(0))?)
    }
}
