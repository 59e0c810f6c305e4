mod buffer_pool;
mod errors;
mod file;
mod pages;

use anyhow::Result;
use buffer_pool::BufferPoolManager;
use errors::Error;
use file::File;

const NUM_BUFS: usize = 8;
const STORAGE_ROOT: &str = "data/demo";

fn main() -> Result<()> {
    let mut bpm = BufferPoolManager::new(NUM_BUFS);

    let orders = File::open(STORAGE_ROOT, "orders")?;
    let customers = File::open(STORAGE_ROOT, "customers")?;

    println!("allocating {NUM_BUFS} pages in {}", orders.filename());
    let mut page_nos = Vec::new();
    for i in 0..NUM_BUFS {
        let (page_no, page) = bpm.alloc_page(&orders)?;
        page.insert_record(format!("order #{i}").as_bytes())?;
        bpm.unpin_page(&orders, page_no, true)?;
        page_nos.push(page_no);
    }

    println!("reading them back");
    for (i, page_no) in page_nos.iter().enumerate() {
        let page = bpm.read_page(&orders, *page_no)?;
        let record = page.iter().next().expect("record was written");
        assert_eq!(record, format!("order #{i}").as_bytes());
        bpm.unpin_page(&orders, *page_no, false)?;
    }

    println!("pool exhaustion: pinning every frame, then one more alloc");
    let mut pinned = Vec::new();
    for _ in 0..NUM_BUFS {
        let (page_no, _) = bpm.alloc_page(&customers)?;
        pinned.push(page_no);
    }
    match bpm.alloc_page(&customers) {
        Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::BufferExceeded)) => {
            println!("  -> BufferExceeded, as expected")
        }
        other => panic!("expected BufferExceeded, got {other:?}"),
    }
    for page_no in pinned {
        bpm.unpin_page(&customers, page_no, false)?;
    }

    println!("flushing {}", orders.filename());
    bpm.flush_file(&orders)?;

    bpm.print_self();

    std::fs::remove_dir_all(STORAGE_ROOT).ok();
    Ok(())
}
