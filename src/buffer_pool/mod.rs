mod clock;
mod frame;
mod hash_table;

use crate::errors::Error;
use crate::file::File;
use crate::pages::{Page, PageId};
#[cfg(debug_assertions)]
use crate::get_caller_name;
use crate::printdbg;
use anyhow::{bail, Result};
use frame::FrameDescriptor;
use hash_table::PageTable;
use parking_lot::FairMutex;
use std::sync::Arc;

pub use frame::FrameId;

/// Convenience wrapper for callers that need to share one manager across
/// threads. The manager itself takes no internal locks; everything inside
/// this crate's core runs on whichever thread holds the mutex.
pub type ArcBufferPool = Arc<FairMutex<BufferPoolManager>>;

/// Holds a bounded, in-memory working set of pages and serves `readPage`/
/// `allocPage`/`unPinPage`/`disposePage`/`flushFile` without disk I/O on the
/// hot path, evicting via a second-chance clock sweep ([`clock`]) when full.
///
/// `pool[i]` and `frames[i]` describe the same slot; `page_table` is the
/// derived index from `(file, pageNo)` to that slot and must only ever be
/// mutated alongside the descriptor it points at.
pub struct BufferPoolManager {
    pool: Vec<Page>,
    frames: Vec<FrameDescriptor>,
    page_table: PageTable,
    clock_hand: usize,
    num_bufs: usize,
}

impl BufferPoolManager {
    /// Allocates `num_bufs` empty frames and a page lookup index sized by
    /// `HTSIZE(num_bufs)`. The clock hand starts at `num_bufs - 1` so the
    /// first sweep probes frame 0.
    pub fn new(num_bufs: usize) -> Self {
        BufferPoolManager {
            pool: (0..num_bufs).map(|_| Page::new()).collect(),
            frames: (0..num_bufs).map(FrameDescriptor::new).collect(),
            page_table: PageTable::new(num_bufs),
            clock_hand: num_bufs.saturating_sub(1),
            num_bufs,
        }
    }

    pub fn num_bufs(&self) -> usize {
        self.num_bufs
    }

    /// Residency probe plus a borrowed read. On a hit, marks the frame
    /// recently used and pins it. On a miss, evicts a victim (writing it
    /// back if dirty) and reads `page_no` from `file` into the freed slot.
    pub fn read_page(&mut self, file: &File, page_no: PageId) -> Result<&mut Page> {
        match self.page_table.lookup(file, page_no) {
            Ok(frame_no) => {
                self.frames[frame_no].set_refbit(true);
                self.frames[frame_no].pin();
                printdbg!(
                    "{} hit: page {page_no} of {} (frame {frame_no}), pin count {}",
                    get_caller_name!(),
                    file.filename(),
                    self.frames[frame_no].pin_count()
                );
                Ok(&mut self.pool[frame_no])
            }
            Err(e) if is_hash_miss(&e) => {
                let frame_no = self.alloc_buf()?;
                let page = file.read_page(page_no)?;

                self.pool[frame_no] = page;
                self.page_table.insert(file.clone(), page_no, frame_no)?;
                self.frames[frame_no].set(file.clone(), page_no);

                printdbg!(
                    "{} miss: read page {page_no} of {} into frame {frame_no}",
                    get_caller_name!(),
                    file.filename()
                );
                Ok(&mut self.pool[frame_no])
            }
            Err(e) => Err(e),
        }
    }

    /// Reserves a fresh page in `file` and installs it resident, pinned
    /// once. The victim is chosen *before* the new page is allocated, so a
    /// dirty victim on the same file can never race with this allocation.
    pub fn alloc_page(&mut self, file: &File) -> Result<(PageId, &mut Page)> {
        let frame_no = self.alloc_buf()?;

        let page = file.allocate_page()?;
        let page_no = page.page_number();
        self.pool[frame_no] = page;

        self.frames[frame_no].set(file.clone(), page_no);
        self.page_table.insert(file.clone(), page_no, frame_no)?;

        printdbg!("allocated page {page_no} of {} in frame {frame_no}", file.filename());
        Ok((page_no, &mut self.pool[frame_no]))
    }

    /// Releases one pin on `(file, page_no)`. A residency miss is a silent
    /// no-op, matching the contract that callers may unpin pages they never
    /// observed as resident. `dirty_hint` only ever sets `dirty`; it is
    /// never cleared here.
    pub fn unpin_page(&mut self, file: &File, page_no: PageId, dirty_hint: bool) -> Result<()> {
        let frame_no = match self.page_table.lookup(file, page_no) {
            Ok(frame_no) => frame_no,
            Err(e) if is_hash_miss(&e) => return Ok(()),
            Err(e) => return Err(e),
        };

        if self.frames[frame_no].pin_count() == 0 {
            bail!(Error::PageNotPinned(
                file.filename().to_string(),
                page_no,
                frame_no
            ));
        }

        if dirty_hint {
            self.frames[frame_no].set_dirty(true);
        }
        self.frames[frame_no].unpin();

        printdbg!(
            "unpinned page {page_no} of {} (frame {frame_no}), pin count now {}",
            file.filename(),
            self.frames[frame_no].pin_count()
        );
        Ok(())
    }

    /// Writes back and evicts every resident page belonging to `file`.
    /// Aborts at the first pinned or invariant-violating frame; frames
    /// already processed earlier in the scan stay evicted.
    pub fn flush_file(&mut self, file: &File) -> Result<()> {
        for frame_no in 0..self.num_bufs {
            if self.frames[frame_no].file() != Some(file) {
                continue;
            }

            if !self.frames[frame_no].is_valid() {
                bail!(Error::BadBuffer(
                    frame_no,
                    self.frames[frame_no].is_dirty(),
                    self.frames[frame_no].is_valid(),
                    self.frames[frame_no].refbit()
                ));
            }

            if self.frames[frame_no].pin_count() > 0 {
                bail!(Error::PagePinned(
                    file.filename().to_string(),
                    self.frames[frame_no].page_no(),
                    frame_no
                ));
            }

            if self.frames[frame_no].is_dirty() {
                file.write_page(&self.pool[frame_no])?;
                self.frames[frame_no].set_dirty(false);
            }

            let page_no = self.frames[frame_no].page_no();
            self.page_table.remove(file, page_no)?;
            self.frames[frame_no].clear();
        }

        printdbg!("flushed file {}", file.filename());
        Ok(())
    }

    /// Evicts `(file, page_no)` from the pool if resident, then deletes it
    /// from the file regardless of prior residency.
    pub fn dispose_page(&mut self, file: &File, page_no: PageId) -> Result<()> {
        if let Ok(frame_no) = self.page_table.lookup(file, page_no) {
            self.page_table.remove(file, page_no)?;
            self.frames[frame_no].clear();
        }
        file.delete_page(page_no)
    }

    /// Diagnostic dump of every frame descriptor. Not part of the
    /// correctness contract.
    pub fn print_self(&self) {
        for frame in &self.frames {
            frame.print();
        }
    }
}

fn is_hash_miss(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::HashNotFound(_, _)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::file::test_root;

    pub(crate) fn test_bpm(num_bufs: usize) -> BufferPoolManager {
        BufferPoolManager::new(num_bufs)
    }

    #[test]
    fn allocate_then_read() -> Result<()> {
        // numBufs deliberately smaller than the page count, so this
        // exercises eviction along the way, per the scenario in spec 8.1.
        let root = test_root();
        let mut bpm = test_bpm(4);
        let file = File::open(&root, "test.1")?;

        let mut page_nos = Vec::new();
        for _ in 0..20 {
            let (page_no, page) = bpm.alloc_page(&file)?;
            let record = format!("test.1 Page {page_no}");
            page.insert_record(record.as_bytes())?;
            bpm.unpin_page(&file, page_no, true)?;
            page_nos.push(page_no);
        }

        for page_no in page_nos {
            let page = bpm.read_page(&file, page_no)?;
            let record = page.iter().next().expect("record was written");
            assert_eq!(record, format!("test.1 Page {page_no}").as_bytes());
            bpm.unpin_page(&file, page_no, false)?;
        }

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn writes_survive_eviction() -> Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(2);
        let file = File::open(&root, "test.1")?;

        let (p0, page) = bpm.alloc_page(&file)?;
        page.insert_record(b"payload")?;
        bpm.unpin_page(&file, p0, true)?;

        // force eviction of p0 by filling the remaining frame and one more
        let (p1, _) = bpm.alloc_page(&file)?;
        bpm.unpin_page(&file, p1, false)?;
        let (p2, _) = bpm.alloc_page(&file)?;
        bpm.unpin_page(&file, p2, false)?;

        let page = bpm.read_page(&file, p0)?;
        assert_eq!(page.iter().next(), Some(&b"payload"[..]));
        bpm.unpin_page(&file, p0, false)?;

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn cross_file_interleave() -> Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(4);
        let a = File::open(&root, "test.1")?;
        let b = File::open(&root, "test.2")?;
        let c = File::open(&root, "test.3")?;

        for i in 0..33 {
            let file = [&a, &b, &c][i % 3];
            let (page_no, page) = bpm.alloc_page(file)?;
            let record = format!("{} Page {page_no}", file.filename());
            page.insert_record(record.as_bytes())?;
            bpm.unpin_page(file, page_no, true)?;

            let page = bpm.read_page(file, page_no)?;
            assert_eq!(page.iter().next(), Some(record.as_bytes()));
            bpm.unpin_page(file, page_no, false)?;
        }

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn invalid_page_propagates() -> Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(4);
        let file = File::open(&root, "test.1")?;

        let err = bpm.read_page(&file, 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::InvalidPage(_, 1))
        ));

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn double_unpin_fails() -> Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(4);
        let file = File::open(&root, "test.1")?;

        let (page_no, _) = bpm.alloc_page(&file)?;
        bpm.unpin_page(&file, page_no, true)?;
        let err = bpm.unpin_page(&file, page_no, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PageNotPinned(_, p, _)) if *p == page_no
        ));

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn unpin_of_unknown_page_is_a_no_op() -> Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(4);
        let file = File::open(&root, "test.1")?;

        assert!(bpm.unpin_page(&file, 999, true).is_ok());

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn pool_exhaustion_fails_with_buffer_exceeded() -> Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(4);
        let file = File::open(&root, "test.1")?;

        for _ in 0..4 {
            bpm.alloc_page(&file)?;
        }

        let err = bpm.alloc_page(&file).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BufferExceeded)));

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn flush_with_pins_fails_then_succeeds() -> Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(4);
        let file = File::open(&root, "test.1")?;

        let mut page_nos = Vec::new();
        for _ in 0..4 {
            let (page_no, _) = bpm.alloc_page(&file)?;
            page_nos.push(page_no);
        }

        let err = bpm.flush_file(&file).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::PagePinned(_, _, _))));

        for page_no in &page_nos {
            bpm.unpin_page(&file, *page_no, false)?;
        }

        bpm.flush_file(&file)?;

        // frames are now empty; reading any page misses the pool and goes
        // to disk again, which still succeeds since the page was persisted
        for page_no in page_nos {
            assert!(bpm.read_page(&file, page_no).is_ok());
            bpm.unpin_page(&file, page_no, false)?;
        }

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }
}
