//! Buffer pool and open-file table.
//!
//! [`PagedFileManager`] owns every resource the storage layer has: the
//! fixed set of buffer frames, the `(file, page) ⇄ frame` mapping, the LRU
//! chain, and the table of open files. All page traffic from higher layers
//! goes through it; the [`DiskManager`] underneath performs the actual I/O.

pub mod lru;

use crate::storage::disk::DiskManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::{FileId, PageNum, BUFFER_CAPACITY, PAGE_SIZE};
use lru::LruTracker;
use std::collections::HashMap;
use std::path::PathBuf;

/// Store-wide constants fixed at construction time.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub page_size: usize,
    pub buffer_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            buffer_capacity: BUFFER_CAPACITY,
        }
    }
}

struct Frame {
    data: Box<[u8]>,
    /// Page this frame holds, or `None` when unmapped.
    page: Option<(FileId, PageNum)>,
    dirty: bool,
}

impl Frame {
    fn new(page_size: usize) -> Self {
        Self {
            data: vec![0u8; page_size].into_boxed_slice(),
            page: None,
            dirty: false,
        }
    }
}

struct OpenFile {
    name: String,
    disk: DiskManager,
    /// Logical page count; always equals the true allocated extent, which
    /// may run ahead of the on-disk size while freshly allocated pages are
    /// still buffered.
    page_count: u32,
}

/// The paged store: named files, a buffer pool, and page-granular I/O.
///
/// Strictly single-threaded; callers block for the duration of any disk
/// read or write. Pages only grow by append, and a frame is reused only
/// after any dirty content has been durably written.
pub struct PagedFileManager {
    config: StoreConfig,
    root: PathBuf,
    frames: Vec<Frame>,
    page_table: HashMap<(FileId, PageNum), usize>,
    lru: LruTracker,
    files: HashMap<FileId, OpenFile>,
    names: HashMap<String, FileId>,
    next_file_id: u32,
}

impl PagedFileManager {
    /// Create a store rooted at `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>, config: StoreConfig) -> Self {
        let frames = (0..config.buffer_capacity)
            .map(|_| Frame::new(config.page_size))
            .collect();
        Self {
            config,
            root: root.into(),
            frames,
            page_table: HashMap::new(),
            lru: LruTracker::new(config.buffer_capacity),
            files: HashMap::new(),
            names: HashMap::new(),
            next_file_id: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.config.page_size
    }

    /// Create an empty file. No pages are allocated.
    pub fn create_file(&mut self, name: &str) -> StorageResult<()> {
        if self.names.contains_key(name) {
            return Err(StorageError::CreateFile(name.to_string()));
        }
        DiskManager::create(&self.root.join(name), self.config.page_size)?;
        Ok(())
    }

    /// Delete a file from disk. The file must exist and must not be open.
    pub fn remove_file(&mut self, name: &str) -> StorageResult<()> {
        if self.names.contains_key(name) {
            return Err(StorageError::RemoveFile(name.to_string()));
        }
        let path = self.root.join(name);
        if !path.exists() {
            return Err(StorageError::RemoveFile(name.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Open a file by name. Fails if it is already open or does not exist.
    pub fn open_file(&mut self, name: &str) -> StorageResult<FileId> {
        if self.names.contains_key(name) {
            return Err(StorageError::OpenFile(name.to_string()));
        }
        let disk = DiskManager::open(&self.root.join(name), self.config.page_size)?;
        let page_count = disk.num_pages()?;
        let id = FileId(self.next_file_id);
        self.next_file_id += 1;
        self.files.insert(
            id,
            OpenFile {
                name: name.to_string(),
                disk,
                page_count,
            },
        );
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Flush every buffered page of the file, free their frames, and forget
    /// the file's metadata.
    pub fn close_file(&mut self, file: FileId) -> StorageResult<()> {
        if !self.files.contains_key(&file) {
            return Err(StorageError::CloseFile);
        }
        self.flush_file(file)?;
        let open = self.files.remove(&file).ok_or(StorageError::CloseFile)?;
        self.names.remove(&open.name);
        Ok(())
    }

    /// Look up the id of an open file.
    pub fn file_id(&self, name: &str) -> Option<FileId> {
        self.names.get(name).copied()
    }

    /// Current logical page count of an open file.
    pub fn page_count(&self, file: FileId) -> StorageResult<u32> {
        Ok(self.open_file_ref(file)?.page_count)
    }

    /// Grow the file by `n` zero-filled pages and return the first new page
    /// number. The pages are buffered dirty; disk is not touched until
    /// eviction or flush.
    pub fn allocate_pages(&mut self, file: FileId, n: u32) -> StorageResult<PageNum> {
        let first = PageNum(self.open_file_ref(file)?.page_count);
        for i in 0..n {
            let page = PageNum(first.0 + i);
            let frame = self.acquire_frame()?;
            self.frames[frame].data.fill(0);
            self.frames[frame].page = Some((file, page));
            self.frames[frame].dirty = true;
            self.page_table.insert((file, page), frame);
            self.lru.access(frame);
        }
        self.open_file_mut(file)?.page_count += n;
        Ok(first)
    }

    /// Append one page, optionally seeded with caller content.
    pub fn append_page(&mut self, file: FileId, data: Option<&[u8]>) -> StorageResult<PageNum> {
        if let Some(data) = data {
            if data.len() < self.config.page_size {
                return Err(StorageError::AppendPage {
                    expected: self.config.page_size,
                    actual: data.len(),
                });
            }
        }
        let page = self.allocate_pages(file, 1)?;
        if let Some(data) = data {
            let frame = self.page_table[&(file, page)];
            self.frames[frame]
                .data
                .copy_from_slice(&data[..self.config.page_size]);
        }
        Ok(page)
    }

    /// Read a page, returning the buffered copy (marked recently used), or
    /// loading it from disk into a fresh frame.
    ///
    /// An out-of-range page number fails before any frame is allocated or
    /// dirtied.
    pub fn read_page(&mut self, file: FileId, page: PageNum) -> StorageResult<&[u8]> {
        let page_count = self.open_file_ref(file)?.page_count;
        if page.0 >= page_count {
            return Err(StorageError::ReadPage { page, page_count });
        }
        if let Some(&frame) = self.page_table.get(&(file, page)) {
            self.lru.access(frame);
            return Ok(&self.frames[frame].data);
        }
        let frame = self.acquire_frame()?;
        {
            let open = self.files.get_mut(&file).ok_or(StorageError::FileNotOpen)?;
            open.disk.read_page(page, &mut self.frames[frame].data)?;
        }
        self.frames[frame].page = Some((file, page));
        self.frames[frame].dirty = false;
        self.page_table.insert((file, page), frame);
        self.lru.access(frame);
        Ok(&self.frames[frame].data)
    }

    /// Overwrite a page in the buffer, marking its frame dirty. Disk is
    /// never touched synchronously.
    pub fn write_page(&mut self, file: FileId, page: PageNum, data: &[u8]) -> StorageResult<()> {
        let page_count = self.open_file_ref(file)?.page_count;
        if data.len() < self.config.page_size {
            return Err(StorageError::ShortPageData {
                expected: self.config.page_size,
                actual: data.len(),
            });
        }
        if page.0 >= page_count {
            return Err(StorageError::WritePage { page, page_count });
        }
        let frame = match self.page_table.get(&(file, page)) {
            Some(&frame) => frame,
            None => {
                // Full-page overwrite: no need to read the old content.
                let frame = self.acquire_frame()?;
                self.frames[frame].page = Some((file, page));
                self.page_table.insert((file, page), frame);
                frame
            }
        };
        self.frames[frame]
            .data
            .copy_from_slice(&data[..self.config.page_size]);
        self.frames[frame].dirty = true;
        self.lru.access(frame);
        Ok(())
    }

    /// Write the file's dirty buffered pages to disk, keeping them buffered
    /// and clean.
    pub fn sync_file(&mut self, file: FileId) -> StorageResult<()> {
        if !self.files.contains_key(&file) {
            return Err(StorageError::FileNotOpen);
        }
        for frame in 0..self.frames.len() {
            if let Some((fid, page)) = self.frames[frame].page {
                if fid == file && self.frames[frame].dirty {
                    let open = self.files.get_mut(&file).ok_or(StorageError::FileNotOpen)?;
                    open.disk.write_page(page, &self.frames[frame].data)?;
                    self.frames[frame].dirty = false;
                }
            }
        }
        self.open_file_mut(file)?.disk.sync()?;
        Ok(())
    }

    /// Write the file's dirty pages to disk and evict every buffered page
    /// of the file.
    pub fn flush_file(&mut self, file: FileId) -> StorageResult<()> {
        self.sync_file(file)?;
        for frame in 0..self.frames.len() {
            if let Some((fid, page)) = self.frames[frame].page {
                if fid == file {
                    self.page_table.remove(&(fid, page));
                    self.frames[frame].page = None;
                    self.lru.free(frame);
                }
            }
        }
        Ok(())
    }

    fn open_file_ref(&self, file: FileId) -> StorageResult<&OpenFile> {
        self.files.get(&file).ok_or(StorageError::FileNotOpen)
    }

    fn open_file_mut(&mut self, file: FileId) -> StorageResult<&mut OpenFile> {
        self.files.get_mut(&file).ok_or(StorageError::FileNotOpen)
    }

    /// Take over the LRU victim frame.
    ///
    /// If the victim still holds a dirty page it is written out first;
    /// a failed write propagates and leaves the frame mapped and dirty, so
    /// no data is silently lost. Unmapped victims are reused without I/O.
    fn acquire_frame(&mut self) -> StorageResult<usize> {
        let victim = self.lru.find().ok_or(StorageError::BufferPoolFull)?;
        if let Some((fid, page)) = self.frames[victim].page {
            if self.frames[victim].dirty {
                let open = self
                    .files
                    .get_mut(&fid)
                    .expect("buffered page belongs to a closed file");
                open.disk.write_page(page, &self.frames[victim].data)?;
                self.frames[victim].dirty = false;
            }
            self.page_table.remove(&(fid, page));
            self.frames[victim].page = None;
        }
        Ok(victim)
    }
}
