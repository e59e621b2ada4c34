// src/streaming/latch.rs
// Fan-in for one build: N sub-tasks arrive, exactly one of them (the one that
// brings the count to zero) receives the continuation.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, PoisonError,
};

pub enum Arrival<T> {
    /// Siblings are still running.
    Pending,
    /// This arrival completed the latch and owns the continuation.
    Last(T),
    /// Completed, but nothing was registered to run.
    Orphaned,
}

pub struct CompletionLatch<T> {
    remaining: AtomicUsize,
    continuation: Mutex<Option<T>>,
}

impl<T> CompletionLatch<T> {
    pub fn new(count: usize, continuation: T) -> Self {
        Self::with_slot(count, Some(continuation))
    }

    pub fn with_slot(count: usize, continuation: Option<T>) -> Self {
        debug_assert!(count > 0, "latch needs at least one arrival");
        Self {
            remaining: AtomicUsize::new(count),
            continuation: Mutex::new(continuation),
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Records one finished sub-task. AcqRel makes every sibling's writes
    /// visible to whichever arrival observes the final decrement.
    pub fn arrive(&self) -> Arrival<T> {
        let prev = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "latch arrived more times than its count");
        if prev != 1 {
            return Arrival::Pending;
        }

        let taken = self
            .continuation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match taken {
            Some(c) => Arrival::Last(c),
            None => Arrival::Orphaned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
    use std::sync::{Arc, Barrier};

    #[test]
    fn single_arrival_completes_immediately() {
        let latch = CompletionLatch::new(1, "done");
        assert!(matches!(latch.arrive(), Arrival::Last("done")));
        assert_eq!(latch.remaining(), 0);
    }

    #[test]
    fn missing_continuation_is_reported_once() {
        let latch: CompletionLatch<()> = CompletionLatch::with_slot(2, None);
        assert!(matches!(latch.arrive(), Arrival::Pending));
        assert!(matches!(latch.arrive(), Arrival::Orphaned));
    }

    #[test]
    fn continuation_fires_once_for_any_arrival_order() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for n in 1..=24usize {
            for _ in 0..8 {
                let latch = CompletionLatch::new(n, n);
                let mut order: Vec<usize> = (0..n).collect();
                order.shuffle(&mut rng);

                let mut fired = 0;
                let mut last_index = None;
                for (step, _task) in order.iter().enumerate() {
                    if let Arrival::Last(v) = latch.arrive() {
                        assert_eq!(v, n);
                        fired += 1;
                        last_index = Some(step);
                    }
                }
                assert_eq!(fired, 1);
                assert_eq!(last_index, Some(n - 1));
            }
        }
    }

    #[test]
    fn continuation_fires_once_across_threads() {
        let mut rng = StdRng::seed_from_u64(42);
        for round in 0..16 {
            let n = 2 + round % 7;
            let latch = Arc::new(CompletionLatch::new(n, round));
            let fired = Arc::new(AtomicUsize::new(0));
            let barrier = Arc::new(Barrier::new(n));

            // Random per-thread spin before arriving to vary interleavings.
            let mut spins: Vec<u32> = (0..n as u32).map(|i| i * 500).collect();
            spins.shuffle(&mut rng);

            let handles: Vec<_> = spins
                .into_iter()
                .map(|spin| {
                    let latch = latch.clone();
                    let fired = fired.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        for _ in 0..spin {
                            std::hint::spin_loop();
                        }
                        if let Arrival::Last(v) = latch.arrive() {
                            assert_eq!(v, round);
                            fired.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert_eq!(latch.remaining(), 0);
        }
    }
}
