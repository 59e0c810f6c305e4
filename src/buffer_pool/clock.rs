use super::frame::FrameId;
use super::BufferPoolManager;
use crate::errors::Error;
use crate::printdbg;
use anyhow::{bail, Result};

/// Second-chance (clock) victim selection. Not pluggable - the spec calls
/// for exactly one replacement policy, so this lives as a plain method on
/// [`BufferPoolManager`] rather than behind a strategy trait.
impl BufferPoolManager {
    /// Advances the clock hand until it finds a frame to evict (or an
    /// already-empty frame), evicting a dirty victim's page to disk first.
    /// Fails with [`Error::BufferExceeded`] if a full sweep sees every frame
    /// pinned.
    pub(super) fn alloc_buf(&mut self) -> Result<FrameId> {
        if self.num_bufs == 0 {
            bail!(Error::BufferExceeded);
        }

        let mut pinned_seen = 0usize;

        loop {
            self.clock_hand = (self.clock_hand + 1) % self.num_bufs;
            let frame_no = self.clock_hand;

            if !self.frames[frame_no].is_valid() {
                return Ok(frame_no);
            }

            if self.frames[frame_no].refbit() {
                self.frames[frame_no].set_refbit(false);
                continue;
            }

            if self.frames[frame_no].pin_count() > 0 {
                pinned_seen += 1;
                if pinned_seen == self.num_bufs {
                    bail!(Error::BufferExceeded);
                }
                continue;
            }

            // valid, refbit clear, unpinned: this is the victim.
            if self.frames[frame_no].is_dirty() {
                let file = self.frames[frame_no]
                    .file()
                    .expect("valid descriptor names a file")
                    .clone();
                printdbg!(
                    "writing back dirty page {} of {} (frame {frame_no}) before eviction",
                    self.frames[frame_no].page_no(),
                    file.filename()
                );
                file.write_page(&self.pool[frame_no])?;
                self.frames[frame_no].set_dirty(false);
            }

            let file = self.frames[frame_no]
                .file()
                .expect("valid descriptor names a file")
                .clone();
            let page_no = self.frames[frame_no].page_no();
            self.page_table.remove(&file, page_no)?;
            self.frames[frame_no].clear();

            printdbg!("frame {frame_no} chosen as victim");
            return Ok(frame_no);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_bpm;
    use crate::file::{test_root, File};

    #[test]
    fn refbit_grants_a_second_chance() -> anyhow::Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(2);
        let file = File::open(&root, "test.1")?;

        let (p0, _) = bpm.alloc_page(&file)?;
        bpm.unpin_page(&file, p0, false)?;
        let (p1, _) = bpm.alloc_page(&file)?;
        bpm.unpin_page(&file, p1, false)?;

        // touch p0 so its refbit is set, giving it a second chance over p1
        bpm.read_page(&file, p0)?;
        bpm.unpin_page(&file, p0, false)?;

        // allocating a third page must evict p1, not p0, since p0's refbit
        // survives one sweep
        let (p2, _) = bpm.alloc_page(&file)?;
        bpm.unpin_page(&file, p2, false)?;

        assert!(bpm.read_page(&file, p0).is_ok());
        bpm.unpin_page(&file, p0, false)?;

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[test]
    fn zero_buffers_always_fails() -> anyhow::Result<()> {
        let root = test_root();
        let mut bpm = test_bpm(0);
        let file = File::open(&root, "test.1")?;

        assert!(bpm.alloc_page(&file).is_err());

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }
}
