use crate::errors::Error;
use crate::pages::{Page, PageId, PAGE_SIZE};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// Stable, unique identifier for a file, used only for hashing/equality and
/// for naming a file in error messages. Not the file handle itself - see
/// [`File`].
pub type FileId = String;

#[derive(Debug)]
struct FileInner {
    name: String,
    dir: PathBuf,
    next_page_id: AtomicI64,
    existing: Mutex<HashSet<PageId>>,
}

/// A handle to a single named on-disk file, backed by a directory holding one
/// file per page (named by page number). Cheaply cloneable: every clone
/// shares the same underlying directory and page-id counter through an
/// `Arc`. Two handles are equal iff their filenames match - the buffer pool
/// never compares anything else.
#[derive(Debug, Clone)]
pub struct File {
    inner: Arc<FileInner>,
}

impl PartialEq for File {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for File {}

impl File {
    /// Opens (creating if necessary) the file named `name` under `root`,
    /// scanning its directory to recover already-allocated page numbers.
    pub fn open(root: &str, name: &str) -> Result<Self> {
        let dir = Path::new(root).join(name);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating storage directory for file {name}"))?;

        let mut existing = HashSet::new();
        let mut max_page_id: i64 = -1;
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("listing storage directory for file {name}"))?
        {
            let entry = entry?;
            if let Some(page_id) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<PageId>().ok())
            {
                existing.insert(page_id);
                max_page_id = max_page_id.max(page_id);
            }
        }

        Ok(File {
            inner: Arc::new(FileInner {
                name: name.to_string(),
                dir,
                next_page_id: AtomicI64::new(max_page_id + 1),
                existing: Mutex::new(existing),
            }),
        })
    }

    pub fn filename(&self) -> &str {
        &self.inner.name
    }

    fn page_path(&self, page_no: PageId) -> PathBuf {
        self.inner.dir.join(page_no.to_string())
    }

    /// Reserves a fresh page number and persists an empty page at it,
    /// returning the page with its assigned number set.
    pub fn allocate_page(&self) -> Result<Page> {
        let page_id = self.inner.next_page_id.fetch_add(1, Ordering::SeqCst);
        let mut page = Page::new();
        page.set_page_number(page_id);
        self.write_page(&page)?;
        self.inner.existing.lock().unwrap().insert(page_id);
        Ok(page)
    }

    /// Reads the page numbered `page_no`. Fails with `Error::InvalidPage` if
    /// this file has no such page (never allocated, or deleted).
    pub fn read_page(&self, page_no: PageId) -> Result<Page> {
        if !self.inner.existing.lock().unwrap().contains(&page_no) {
            bail!(Error::InvalidPage(self.filename().to_string(), page_no));
        }

        let mut file = OpenOptions::new()
            .read(true)
            .open(self.page_path(page_no))
            .with_context(|| format!("opening page {page_no} of file {}", self.filename()))?;

        let mut buffer = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut buffer)
            .with_context(|| format!("reading page {page_no} of file {}", self.filename()))?;

        let mut page = Page::from_wire_bytes(&buffer);
        page.set_page_number(page_no);
        Ok(page)
    }

    /// Persists `page` at its own page number, overwriting any prior content.
    pub fn write_page(&self, page: &Page) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.page_path(page.page_number()))
            .with_context(|| {
                format!(
                    "opening page {} of file {} for writing",
                    page.page_number(),
                    self.filename()
                )
            })?;

        file.write_all(&page.to_wire_bytes())
            .with_context(|| format!("writing page {} of file {}", page.page_number(), self.filename()))?;

        Ok(())
    }

    /// Frees a page number. A no-op if the page number was never allocated
    /// or has already been deleted.
    pub fn delete_page(&self, page_no: PageId) -> Result<()> {
        self.inner.existing.lock().unwrap().remove(&page_no);
        let path = self.page_path(page_no);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("deleting page {page_no} of file {}", self.filename()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub fn test_root() -> String {
    use uuid::Uuid;

    format!("data/test/test_{}/", Uuid::new_v4())
}
