use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::io::file::FileExt;
use crate::io::Io;

const PENDING: u8 = 0;
const DONE: u8 = 1;

/// Short, fixed sleep used by every poll loop in this module. Coarse polling
/// is an explicitly sanctioned substitute for condvar/event-based waiting;
/// an event-driven orchestrator is an equally valid implementation.
const POLL_INTERVAL: Duration = Duration::from_micros(200);

/// Async read/flush of fixed-size log pages into a bounded ring of page
/// frames, with callback-style completion realized as a spawned task that
/// flips a status word on finish. Flushing a page automatically issues a
/// read-ahead for the page the flush just freed up (`page + capacity`),
/// which is what bounds resident memory to exactly `capacity` frames.
pub struct PageIo<IO: Io> {
    device: Arc<IO::File>,
    snapshot: Option<(Arc<IO::File>, u64)>,
    page_size: u32,
    capacity: usize,
    end_page: u64,
    frames: Vec<Mutex<Vec<u8>>>,
    read_status: Vec<AtomicU8>,
    flush_status: Vec<AtomicU8>,
    poisoned: Vec<AtomicBool>,
}

impl<IO: Io> PageIo<IO> {
    /// `snapshot`, if given, is `(device, first_logical_page)`: logical page
    /// `p` is read from that device at byte offset `(p - first_logical_page)
    /// * page_size`. Flushes always target the primary `device`, which is
    /// what makes snapshot-mode replay rewrite the fuzzy region onto the
    /// main log.
    pub fn new(
        device: Arc<IO::File>,
        snapshot: Option<(Arc<IO::File>, u64)>,
        page_size: u32,
        capacity: usize,
        end_page: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            device,
            snapshot,
            page_size,
            capacity,
            end_page,
            frames: (0..capacity).map(|_| Mutex::new(vec![0u8; page_size as usize])).collect(),
            read_status: (0..capacity).map(|_| AtomicU8::new(PENDING)).collect(),
            flush_status: (0..capacity).map(|_| AtomicU8::new(DONE)).collect(),
            poisoned: (0..capacity).map(|_| AtomicBool::new(false)).collect(),
        })
    }

    fn frame_index(&self, page: u64) -> usize {
        (page % self.capacity as u64) as usize
    }

    /// Primes the ring with reads for `[start_page, start_page + min(capacity, end_page - start_page))`.
    pub fn prime(self: &Arc<Self>, start_page: u64) {
        let window = self.capacity as u64;
        for page in start_page..(start_page + window).min(self.end_page) {
            self.issue_read(page);
        }
    }

    /// Reads `[start_page, end_page)` into the ring and waits for every one
    /// of them to land; used for the warm-window restoration pass once
    /// replay has finished walking the log.
    pub async fn read_window(self: &Arc<Self>, start_page: u64, end_page: u64) -> Result<()> {
        for page in start_page..end_page {
            self.issue_read(page);
        }
        for page in start_page..end_page {
            self.wait_read(page).await?;
        }
        Ok(())
    }

    pub(crate) fn issue_read(self: &Arc<Self>, page: u64) {
        let idx = self.frame_index(page);
        self.read_status[idx].store(PENDING, Ordering::Relaxed);
        let this = self.clone();
        tokio::spawn(async move {
            let buf = vec![0u8; this.page_size as usize];
            let (device, offset) = match &this.snapshot {
                Some((snapshot_device, first_page)) if page < this.end_page && page >= *first_page => {
                    (snapshot_device.clone(), (page - first_page) * this.page_size as u64)
                }
                _ => (this.device.clone(), page * this.page_size as u64),
            };
            let (buf, res) = device.read_at_async(buf, offset).await;
            match res {
                Ok(_) => {
                    *this.frames[idx].lock() = buf;
                    this.read_status[idx].store(DONE, Ordering::Release);
                }
                Err(e) => {
                    tracing::error!(page, error = %e, "page read failed");
                    this.poisoned[idx].store(true, Ordering::Release);
                }
            }
        });
    }

    /// Waits until `page`'s read completed; the returned closure is applied
    /// to the resident page bytes under the frame's lock.
    pub async fn wait_read(&self, page: u64) -> Result<()> {
        let idx = self.frame_index(page);
        loop {
            if self.poisoned[idx].load(Ordering::Acquire) {
                return Err(Error::IoFailed {
                    page,
                    source: std::io::Error::new(std::io::ErrorKind::Other, "page read failed"),
                });
            }
            if self.read_status[idx].load(Ordering::Acquire) == DONE {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn wait_flush(&self, page: u64) -> Result<()> {
        let idx = self.frame_index(page);
        loop {
            if self.poisoned[idx].load(Ordering::Acquire) {
                return Err(Error::IoFailed {
                    page,
                    source: std::io::Error::new(std::io::ErrorKind::Other, "page flush failed"),
                });
            }
            if self.flush_status[idx].load(Ordering::Acquire) == DONE {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub fn with_frame<R>(&self, page: u64, f: impl FnOnce(&[u8]) -> R) -> R {
        let idx = self.frame_index(page);
        f(&self.frames[idx].lock())
    }

    pub fn with_frame_mut<R>(&self, page: u64, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let idx = self.frame_index(page);
        f(&mut self.frames[idx].lock())
    }

    /// Flushes one ring frame back to the primary device. On completion,
    /// automatically issues a read for `page + capacity` if that page is
    /// still within the replay window, recycling the frame.
    pub fn flush_page(self: &Arc<Self>, page: u64) {
        let idx = self.frame_index(page);
        self.flush_status[idx].store(PENDING, Ordering::Relaxed);
        // Claim the frame for its next occupant synchronously, before the
        // write even starts: otherwise a waiter polling read_status for
        // `page + capacity` could observe a stale DONE left over from this
        // frame's previous occupant before the read-ahead gets a chance to
        // reset it.
        let next_page = page + self.capacity as u64;
        if next_page < self.end_page {
            self.read_status[idx].store(PENDING, Ordering::Relaxed);
        }
        let bytes = self.frames[idx].lock().clone();
        let this = self.clone();
        tokio::spawn(async move {
            let offset = page * this.page_size as u64;
            let (_, res) = this.device.write_all_at_async(bytes, offset).await;
            match res {
                Ok(()) => {
                    this.flush_status[idx].store(DONE, Ordering::Release);
                    let next_page = page + this.capacity as u64;
                    if next_page < this.end_page {
                        this.issue_read(next_page);
                    }
                }
                Err(e) => {
                    tracing::error!(page, error = %e, "page flush failed");
                    this.poisoned[idx].store(true, Ordering::Release);
                }
            }
        });
    }
}
