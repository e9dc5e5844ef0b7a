use std::sync::{Condvar, Mutex};

/// Bounded frame admission: a counting semaphore over the in-flight frame
/// slots. The CPU acquires a slot before encoding a frame and the GPU
/// completion callback releases it, capping the number of frames that may
/// reference a uniform/RNG ring slot concurrently.
pub struct FrameSlots {
    capacity: usize,
    available: Mutex<usize>,
    signal: Condvar,
}

impl FrameSlots {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            capacity,
            available: Mutex::new(capacity),
            signal: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks until a slot is free, then takes it. This is the only point
    /// where the submission thread waits on the GPU.
    pub fn acquire(&self) {
        let mut available = self.available.lock().unwrap();
        while *available == 0 {
            available = self.signal.wait(available).unwrap();
        }
        *available -= 1;
    }

    /// Non-blocking acquire for callers that must pump another completion
    /// source (the GPU device) while a slot is unavailable.
    pub fn try_acquire(&self) -> bool {
        let mut available = self.available.lock().unwrap();
        if *available == 0 {
            return false;
        }
        *available -= 1;
        true
    }

    /// True when no admitted frame is outstanding.
    pub fn all_free(&self) -> bool {
        *self.available.lock().unwrap() == self.capacity
    }

    /// Returns a slot; called from the GPU completion callback.
    pub fn release(&self) {
        let mut available = self.available.lock().unwrap();
        assert!(*available < self.capacity, "release without acquire");
        *available += 1;
        self.signal.notify_all();
    }

    /// Blocks until every admitted frame has completed. Rebuild and resize
    /// must drain before touching buffers an in-flight frame may reference.
    pub fn drain(&self) {
        let mut available = self.available.lock().unwrap();
        while *available < self.capacity {
            available = self.signal.wait(available).unwrap();
        }
    }

    #[cfg(test)]
    fn free_count(&self) -> usize {
        *self.available.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_acquire_up_to_capacity_does_not_block() {
        let slots = FrameSlots::new(3);
        slots.acquire();
        slots.acquire();
        slots.acquire();
        assert_eq!(slots.free_count(), 0);
    }

    #[test]
    fn test_fourth_admission_blocks_until_a_release() {
        let slots = Arc::new(FrameSlots::new(3));
        for _ in 0..3 {
            slots.acquire();
        }

        let acquired = Arc::new(AtomicBool::new(false));
        let handle = {
            let slots = slots.clone();
            let acquired = acquired.clone();
            std::thread::spawn(move || {
                slots.acquire();
                acquired.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(
            !acquired.load(Ordering::SeqCst),
            "4th acquire must block while all 3 slots are taken"
        );

        slots.release();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drain_waits_for_all_inflight_frames() {
        let slots = Arc::new(FrameSlots::new(3));
        slots.acquire();
        slots.acquire();

        let drained = Arc::new(AtomicBool::new(false));
        let handle = {
            let slots = slots.clone();
            let drained = drained.clone();
            std::thread::spawn(move || {
                slots.drain();
                drained.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!drained.load(Ordering::SeqCst));

        slots.release();
        std::thread::sleep(Duration::from_millis(50));
        assert!(!drained.load(Ordering::SeqCst), "one frame still in flight");

        slots.release();
        handle.join().unwrap();
        assert!(drained.load(Ordering::SeqCst));
    }

    #[test]
    fn test_try_acquire_fails_only_when_exhausted() {
        let slots = FrameSlots::new(2);
        assert!(slots.try_acquire());
        assert!(slots.try_acquire());
        assert!(!slots.try_acquire());
        assert!(!slots.all_free());

        slots.release();
        slots.release();
        assert!(slots.all_free());
    }

    #[test]
    #[should_panic(expected = "release without acquire")]
    fn test_unbalanced_release_panics() {
        FrameSlots::new(1).release();
    }
}
