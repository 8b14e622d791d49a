//! GenerationHandler - generation counter and reader pins
//!
//! Each generation is represented by a `GenerationHold`. The newest hold is
//! published through an `ArcSwap`; readers pin it with a single atomic
//! increment. When the writer advances the generation it marks the previous
//! hold invalid and moves it to a retired queue that only the writer walks.
//!
//! The hold's counter packs a validity bit with the pin count:
//! - bit 0 set: the hold is still the current one
//! - remaining bits: twice the number of live guards
//!
//! A reader that increments an already invalidated hold backs off and retries
//! on the new current hold, so a retired hold's pin count only ever falls.

use std::collections::VecDeque;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

/// A generation number. Monotonic for the lifetime of a handler.
pub type Generation = u64;

const VALID_BIT: u64 = 1;
const PIN: u64 = 2;

#[derive(Debug)]
struct GenerationHold {
    generation: Generation,
    ref_count: AtomicU64,
}

impl GenerationHold {
    fn new(generation: Generation) -> Self {
        Self {
            generation,
            ref_count: AtomicU64::new(VALID_BIT),
        }
    }

    /// Pin this hold if it is still current.
    fn try_acquire(&self) -> bool {
        let previous = self.ref_count.fetch_add(PIN, Ordering::AcqRel);
        if previous & VALID_BIT != 0 {
            return true;
        }
        self.ref_count.fetch_sub(PIN, Ordering::AcqRel);
        false
    }

    /// Pin unconditionally. Only valid while another pin is held.
    fn acquire_pinned(&self) {
        self.ref_count.fetch_add(PIN, Ordering::AcqRel);
    }

    fn release(&self) {
        self.ref_count.fetch_sub(PIN, Ordering::AcqRel);
    }

    fn invalidate(&self) {
        self.ref_count.fetch_sub(VALID_BIT, Ordering::AcqRel);
    }

    fn pins(&self) -> u64 {
        self.ref_count.load(Ordering::Acquire) >> 1
    }
}

/// A reader's pin on one generation.
///
/// While the guard lives, nothing retired at or after its generation is
/// reclaimed. Cloning pins the same generation again.
#[derive(Debug)]
pub struct GenerationGuard {
    hold: Arc<GenerationHold>,
}

impl GenerationGuard {
    /// The pinned generation.
    pub fn generation(&self) -> Generation {
        self.hold.generation
    }
}

impl Clone for GenerationGuard {
    fn clone(&self) -> Self {
        self.hold.acquire_pinned();
        Self {
            hold: Arc::clone(&self.hold),
        }
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.hold.release();
    }
}

/// Tracks the current generation and which generations readers still use.
///
/// `take_guard` is safe from any thread. Every other mutating method belongs
/// to the single writer; calling them from several threads at once breaks
/// the protocol, though not memory safety.
#[derive(Debug)]
pub struct GenerationHandler {
    current: AtomicU64,
    first_used: AtomicU64,
    last: ArcSwap<GenerationHold>,
    /// Invalidated holds, oldest first. Writer only.
    retired: Mutex<VecDeque<Arc<GenerationHold>>>,
}

impl GenerationHandler {
    /// Create a handler at generation 0 with no readers.
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
            first_used: AtomicU64::new(0),
            last: ArcSwap::from_pointee(GenerationHold::new(0)),
            retired: Mutex::new(VecDeque::new()),
        }
    }

    /// Pin the current generation.
    pub fn take_guard(&self) -> GenerationGuard {
        loop {
            let hold = self.last.load_full();
            if hold.try_acquire() {
                return GenerationGuard { hold };
            }
        }
    }

    /// Advance to the next generation.
    ///
    /// Call only after everything the new generation protects is published.
    pub fn inc_generation(&self) {
        let next = self.current.load(Ordering::Relaxed) + 1;
        let hold = Arc::new(GenerationHold::new(next));
        fence(Ordering::Release);
        self.current.store(next, Ordering::Release);
        let previous = self.last.swap(hold);
        previous.invalidate();
        self.retired.lock().push_back(previous);
    }

    /// Recompute the oldest generation any reader can still be using.
    pub fn update_first_used_generation(&self) {
        let mut retired = self.retired.lock();
        while retired.front().map_or(false, |hold| hold.pins() == 0) {
            retired.pop_front();
        }
        let first_used = retired
            .front()
            .map(|hold| hold.generation)
            .unwrap_or_else(|| self.current.load(Ordering::Acquire));
        self.first_used.store(first_used, Ordering::Release);
    }

    pub fn current_generation(&self) -> Generation {
        self.current.load(Ordering::Acquire)
    }

    /// Oldest generation in use as of the last `update_first_used_generation`.
    pub fn first_used_generation(&self) -> Generation {
        self.first_used.load(Ordering::Acquire)
    }

    /// Number of live guards pinning `generation`.
    pub fn generation_ref_count(&self, generation: Generation) -> u64 {
        if generation > self.current_generation() {
            return 0;
        }
        let last = self.last.load();
        if last.generation == generation {
            return last.pins();
        }
        self.retired
            .lock()
            .iter()
            .find(|hold| hold.generation == generation)
            .map_or(0, |hold| hold.pins())
    }

    /// Whether any reader may still hold a guard.
    ///
    /// False positives are possible until the writer calls
    /// `update_first_used_generation` after the last reader left.
    pub fn has_readers(&self) -> bool {
        !self.retired.lock().is_empty() || self.last.load().pins() > 0
    }
}

impl Default for GenerationHandler {
    fn default() -> Self {
        Self::new()
    }
}
