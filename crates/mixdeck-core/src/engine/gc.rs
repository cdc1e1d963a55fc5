//! Deferred reclamation for decoded track buffers
//!
//! Loading a new track replaces the buffer the audio thread is reading. The
//! replaced buffer is a `basedrop::Shared<DecodedBuffer>`: when the voice
//! drops its reference inside the callback, the pointer is only enqueued, and
//! the memory is released later on the `audio-gc` thread. A minute of stereo
//! audio is ~23MB; freeing that inside the callback would cause an xrun.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the collector thread reclaims dropped buffers
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives on this thread only
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Audio GC thread started");

            loop {
                let mut reclaimed = 0usize;
                while collector.collect_one() {
                    reclaimed += 1;
                }
                if reclaimed > 0 {
                    log::debug!(
                        "Reclaimed {} buffer(s), {} still live",
                        reclaimed,
                        collector.alloc_count()
                    );
                }
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Audio GC thread exited before sending its handle")
}

/// Handle for allocating `Shared<T>` values reclaimed off the audio thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
