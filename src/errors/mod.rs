use crate::file::FileId;
use crate::pages::PageId;

type FrameId = usize;

/// Structured errors raised by the buffer pool core and its file collaborator.
///
/// Consumed through `anyhow`: call sites `bail!(Error::Variant(..))`, and
/// `unPinPage`/`disposePage` match on a returned `anyhow::Error` via
/// `.downcast_ref::<Error>()` to tell `HashNotFound` (a valid outcome there)
/// apart from everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Clock sweep found every frame pinned in one full pass.
    BufferExceeded,
    /// Duplicate insert into the page lookup index.
    HashAlreadyPresent(FileId, PageId, FrameId),
    /// Residency probe miss.
    HashNotFound(FileId, PageId),
    /// Unpin of a frame with `pinCnt == 0`.
    PageNotPinned(FileId, PageId, FrameId),
    /// `flushFile` found a frame with outstanding pins.
    PagePinned(FileId, PageId, FrameId),
    /// `flushFile` found a descriptor whose file matches but `valid=false`.
    BadBuffer(FrameId, bool, bool, bool),
    /// Page number does not exist in the named file.
    InvalidPage(FileId, PageId),
    /// No such on-disk file.
    FileNotFound(FileId),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BufferExceeded => write!(f, "buffer pool exceeded: every frame is pinned"),
            Error::HashAlreadyPresent(file, page_no, frame_no) => {
                write!(f, "({file}, {page_no}) already mapped to frame {frame_no}")
            }
            Error::HashNotFound(file, page_no) => {
                write!(f, "({file}, {page_no}) not found in page table")
            }
            Error::PageNotPinned(file, page_no, frame_no) => write!(
                f,
                "unpin of ({file}, {page_no}) in frame {frame_no}, but pin count is already 0"
            ),
            Error::PagePinned(file, page_no, frame_no) => write!(
                f,
                "flush of ({file}, {page_no}) in frame {frame_no}, but it is still pinned"
            ),
            Error::BadBuffer(frame_no, dirty, valid, refbit) => write!(
                f,
                "frame {frame_no} matched a flush target but is invalid (dirty={dirty}, valid={valid}, refbit={refbit})"
            ),
            Error::InvalidPage(file, page_no) => {
                write!(f, "page {page_no} does not exist in file {file}")
            }
            Error::FileNotFound(file) => write!(f, "file {file} not found"),
        }
    }
}
