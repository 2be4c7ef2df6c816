//! Raw block I/O on a single paged file.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::PageNum;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Page-granular I/O over one open file.
///
/// The disk manager performs the only real disk I/O in the storage layer.
/// It knows nothing about buffering or file naming; the
/// [`PagedFileManager`](crate::storage::PagedFileManager) owns those
/// concerns and holds one `DiskManager` per open file.
pub struct DiskManager {
    file: File,
    page_size: usize,
}

impl DiskManager {
    /// Create a new, empty file. Fails if a file of that name already exists.
    pub fn create(path: &Path, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    StorageError::CreateFile(path.display().to_string())
                }
                _ => StorageError::Io(e),
            })?;
        Ok(Self { file, page_size })
    }

    /// Open an existing file.
    pub fn open(path: &Path, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    StorageError::OpenFile(path.display().to_string())
                }
                _ => StorageError::Io(e),
            })?;
        Ok(Self { file, page_size })
    }

    /// Number of whole pages the file currently holds, derived from its size.
    pub fn num_pages(&self) -> StorageResult<u32> {
        let len = self.file.metadata()?.len();
        Ok((len / self.page_size as u64) as u32)
    }

    /// Read one page from disk into `buf`. A short read is an error.
    pub fn read_page(&mut self, page: PageNum, buf: &mut [u8]) -> StorageResult<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        self.file.seek(SeekFrom::Start(self.offset(page)))?;
        self.file
            .read_exact(buf)
            .map_err(|_| StorageError::ReadDisk(page))?;
        Ok(())
    }

    /// Write one page to disk, extending the file if needed. A short write
    /// is an error and must propagate before the caller reuses the buffer
    /// frame holding this page.
    pub fn write_page(&mut self, page: PageNum, data: &[u8]) -> StorageResult<()> {
        debug_assert_eq!(data.len(), self.page_size);
        self.file.seek(SeekFrom::Start(self.offset(page)))?;
        self.file
            .write_all(data)
            .map_err(|_| StorageError::WriteDisk(page))?;
        Ok(())
    }

    /// Flush OS buffers for this file.
    pub fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn offset(&self, page: PageNum) -> u64 {
        page.0 as u64 * self.page_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    const PAGE: usize = 256;

    #[test]
    fn test_create_then_open() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.db");

        {
            let dm = DiskManager::create(&path, PAGE)?;
            assert_eq!(dm.num_pages()?, 0);
        }
        {
            let dm = DiskManager::open(&path, PAGE)?;
            assert_eq!(dm.num_pages()?, 0);
        }
        Ok(())
    }

    #[test]
    fn test_create_existing_fails() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.db");
        let _dm = DiskManager::create(&path, PAGE)?;

        assert!(matches!(
            DiskManager::create(&path, PAGE),
            Err(StorageError::CreateFile(_))
        ));
        Ok(())
    }

    #[test]
    fn test_open_missing_fails() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("missing.db");
        assert!(matches!(
            DiskManager::open(&path, PAGE),
            Err(StorageError::OpenFile(_))
        ));
        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.db");
        let mut dm = DiskManager::create(&path, PAGE)?;

        let mut data = vec![0u8; PAGE];
        data[0] = 42;
        data[PAGE - 1] = 24;
        dm.write_page(PageNum(0), &data)?;

        let mut buf = vec![0u8; PAGE];
        dm.read_page(PageNum(0), &mut buf)?;
        assert_eq!(buf, data);
        Ok(())
    }

    #[test]
    fn test_read_past_end_is_short_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.db");
        let mut dm = DiskManager::create(&path, PAGE)?;

        let mut buf = vec![0u8; PAGE];
        assert!(matches!(
            dm.read_page(PageNum(3), &mut buf),
            Err(StorageError::ReadDisk(PageNum(3)))
        ));
        Ok(())
    }

    #[test]
    fn test_page_boundaries_do_not_overlap() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.db");
        let mut dm = DiskManager::create(&path, PAGE)?;

        dm.write_page(PageNum(0), &vec![1u8; PAGE])?;
        dm.write_page(PageNum(1), &vec![2u8; PAGE])?;

        let mut buf = vec![0u8; PAGE];
        dm.read_page(PageNum(0), &mut buf)?;
        assert!(buf.iter().all(|&b| b == 1));
        dm.read_page(PageNum(1), &mut buf)?;
        assert!(buf.iter().all(|&b| b == 2));
        Ok(())
    }
}
