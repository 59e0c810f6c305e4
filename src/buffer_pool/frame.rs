use crate::file::File;
use crate::pages::PageId;

pub type FrameId = usize;

/// Per-frame metadata: which page (if any) occupies the frame, how many
/// outstanding pins it has, and the clock algorithm's bookkeeping bits.
///
/// Invariant: `valid == false` implies `pin_count == 0 && !dirty && !refbit`.
/// While `valid == true`, the page lookup table holds exactly one mapping
/// `(file, page_no) -> frame_no` naming this descriptor, and no other valid
/// descriptor names the same `(file, page_no)`.
#[derive(Debug, Clone)]
pub struct FrameDescriptor {
    frame_no: FrameId,
    file: Option<File>,
    page_no: PageId,
    pin_count: u32,
    dirty: bool,
    valid: bool,
    refbit: bool,
}

impl FrameDescriptor {
    pub(super) fn new(frame_no: FrameId) -> Self {
        FrameDescriptor {
            frame_no,
            file: None,
            page_no: 0,
            pin_count: 0,
            dirty: false,
            valid: false,
            refbit: false,
        }
    }

    pub fn frame_no(&self) -> FrameId {
        self.frame_no
    }

    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    pub fn page_no(&self) -> PageId {
        self.page_no
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn refbit(&self) -> bool {
        self.refbit
    }

    pub fn set_refbit(&mut self, refbit: bool) {
        self.refbit = refbit;
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn pin(&mut self) {
        self.pin_count += 1;
    }

    pub fn unpin(&mut self) {
        self.pin_count -= 1;
    }

    /// Installs a freshly-read or freshly-allocated page: pins it once,
    /// clears dirty/refbit, and marks the descriptor valid.
    pub fn set(&mut self, file: File, page_no: PageId) {
        self.file = Some(file);
        self.page_no = page_no;
        self.pin_count = 1;
        self.dirty = false;
        self.valid = true;
        self.refbit = false;
    }

    /// Resets the descriptor to the empty state.
    pub fn clear(&mut self) {
        self.file = None;
        self.page_no = 0;
        self.pin_count = 0;
        self.dirty = false;
        self.valid = false;
        self.refbit = false;
    }

    /// Diagnostic dump, for `BufferPoolManager::print_self` only.
    pub fn print(&self) {
        if self.valid {
            println!(
                "frame {}: file={} page={} pin={} dirty={} ref={}",
                self.frame_no,
                self.file.as_ref().map(File::filename).unwrap_or("?"),
                self.page_no,
                self.pin_count,
                self.dirty,
                self.refbit
            );
        } else {
            println!("frame {}: empty", self.frame_no);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::test_root;

    #[test]
    fn set_then_clear_round_trips_invariant() -> anyhow::Result<()> {
        let mut desc = FrameDescriptor::new(3);
        assert!(!desc.is_valid());
        assert_eq!(desc.pin_count(), 0);

        let root = test_root();
        let file = File::open(&root, "test.1")?;
        desc.set(file, 5);

        assert!(desc.is_valid());
        assert_eq!(desc.pin_count(), 1);
        assert!(!desc.is_dirty());
        assert!(!desc.refbit());
        assert_eq!(desc.page_no(), 5);

        desc.clear();
        assert!(!desc.is_valid());
        assert_eq!(desc.pin_count(), 0);
        assert!(!desc.is_dirty());
        assert!(!desc.refbit());

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }
}
