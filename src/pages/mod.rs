use anyhow::{anyhow, Result};

pub const PAGE_SIZE: usize = 4096; // 4 KBs
pub const INVALID_PAGE: PageId = -1;

pub type PageId = i64;

const HEADER_SIZE: usize = 4; // num_slots: u16, free_space_offset: u16
const SLOT_SIZE: usize = 4; // offset: u16, len: u16
const BODY_SIZE: usize = PAGE_SIZE - HEADER_SIZE;

/// Address of a record within a single page. Stable for the lifetime of the
/// page (records are never compacted or renumbered once inserted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(pub u16);

/// A fixed-size, slotted page: a small header, a slot directory that grows
/// from the front, and record bytes that grow from the back. The buffer pool
/// treats this as an opaque, copyable value - it never inspects the slot
/// directory itself, only `page_number`, `insert_record`, `get_record`, and
/// iteration.
///
/// Dirtiness and pinning are *not* tracked here; that's the frame
/// descriptor's job (`buffer_pool::frame::FrameDescriptor`).
#[derive(Debug, Clone)]
pub struct Page {
    page_id: PageId,
    num_slots: u16,
    free_space_offset: u16,
    body: Vec<u8>,
}

impl Default for Page {
    fn default() -> Self {
        Page::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Page {
            page_id: INVALID_PAGE,
            num_slots: 0,
            free_space_offset: BODY_SIZE as u16,
            body: vec![0u8; BODY_SIZE],
        }
    }

    pub fn page_number(&self) -> PageId {
        self.page_id
    }

    pub fn set_page_number(&mut self, page_id: PageId) {
        self.page_id = page_id;
    }

    fn slot(&self, idx: u16) -> (u16, u16) {
        let at = idx as usize * SLOT_SIZE;
        let offset = u16::from_le_bytes([self.body[at], self.body[at + 1]]);
        let len = u16::from_le_bytes([self.body[at + 2], self.body[at + 3]]);
        (offset, len)
    }

    fn set_slot(&mut self, idx: u16, offset: u16, len: u16) {
        let at = idx as usize * SLOT_SIZE;
        self.body[at..at + 2].copy_from_slice(&offset.to_le_bytes());
        self.body[at + 2..at + 4].copy_from_slice(&len.to_le_bytes());
    }

    fn free_space(&self) -> usize {
        let directory_end = self.num_slots as usize * SLOT_SIZE;
        self.free_space_offset as usize - directory_end
    }

    /// Appends `data` as a new record, returning its id. Fails if the page
    /// has no room for the record plus a new slot.
    pub fn insert_record(&mut self, data: &[u8]) -> Result<RecordId> {
        let needed = data.len() + SLOT_SIZE;
        if needed > self.free_space() {
            return Err(anyhow!("page {} is full", self.page_id));
        }

        let new_offset = self.free_space_offset as usize - data.len();
        self.body[new_offset..new_offset + data.len()].copy_from_slice(data);
        self.free_space_offset = new_offset as u16;

        let slot_id = self.num_slots;
        self.num_slots += 1;
        self.set_slot(slot_id, new_offset as u16, data.len() as u16);

        Ok(RecordId(slot_id))
    }

    /// Reads back a previously inserted record, or `None` if `id` is out of
    /// range for this page.
    pub fn get_record(&self, id: RecordId) -> Option<&[u8]> {
        if id.0 >= self.num_slots {
            return None;
        }
        let (offset, len) = self.slot(id.0);
        Some(&self.body[offset as usize..offset as usize + len as usize])
    }

    pub fn num_records(&self) -> u16 {
        self.num_slots
    }

    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter { page: self, next: 0 }
    }

    /// Serializes the page to its fixed on-disk representation. Named
    /// distinctly from the `Serialize` trait method because it needs to
    /// produce an owned buffer (header + slot directory + record bytes
    /// aren't contiguous in memory the way `body` alone is).
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAGE_SIZE);
        out.extend_from_slice(&self.num_slots.to_le_bytes());
        out.extend_from_slice(&self.free_space_offset.to_le_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    pub fn from_wire_bytes(bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), PAGE_SIZE);
        let num_slots = u16::from_le_bytes([bytes[0], bytes[1]]);
        let free_space_offset = u16::from_le_bytes([bytes[2], bytes[3]]);
        let mut body = vec![0u8; BODY_SIZE];
        body.copy_from_slice(&bytes[HEADER_SIZE..]);
        Page {
            page_id: INVALID_PAGE,
            num_slots,
            free_space_offset,
            body,
        }
    }
}

pub struct RecordIter<'a> {
    page: &'a Page,
    next: u16,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.page.num_slots {
            return None;
        }
        let record = self.page.get_record(RecordId(self.next));
        self.next += 1;
        record
    }
}
