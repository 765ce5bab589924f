//! Collective communication between the partitions of a decomposed mesh.
//!
//! Every partition runs the same injection algorithm on its own part of the mesh.
//! The only communication needed is a handful of all-reduce operations,
//! which every partition must call the same number of times in the same order;
//! a partition skipping a call would leave the others waiting forever.

use std::sync::{Arc, Barrier, Mutex, PoisonError};

/// Collective reductions across all partitions of a run.
///
/// Every method is a collective call:
/// it returns only once all partitions have made the same call,
/// and all partitions receive the same result.
pub trait Communicator {
    /// Index of this partition, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of partitions.
    fn size(&self) -> usize;

    /// The maximum of `value` over all partitions.
    fn reduce_max(&self, value: i64) -> i64;

    /// The sum of `value` over all partitions.
    fn reduce_sum(&self, value: f64) -> f64;

    /// The sum of a count over all partitions.
    fn reduce_sum_count(&self, value: usize) -> usize;
}

/// Communicator for a run that isn't decomposed.
/// All reductions return their input.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    #[inline]
    fn rank(&self) -> usize {
        0
    }

    #[inline]
    fn size(&self) -> usize {
        1
    }

    #[inline]
    fn reduce_max(&self, value: i64) -> i64 {
        value
    }

    #[inline]
    fn reduce_sum(&self, value: f64) -> f64 {
        value
    }

    #[inline]
    fn reduce_sum_count(&self, value: usize) -> usize {
        value
    }
}

/// A set of partitions running in the same process,
/// each on its own thread.
///
/// ```
/// # use parcelflow_core::parallel::{Communicator, LocalGroup};
/// let comms = LocalGroup::new(3);
/// std::thread::scope(|s| {
///     for comm in &comms {
///         s.spawn(move || {
///             assert_eq!(comm.reduce_sum_count(comm.rank()), 0 + 1 + 2);
///         });
///     }
/// });
/// ```
#[derive(Debug)]
pub struct LocalGroup {
    barrier: Barrier,
    ints: Mutex<Vec<i64>>,
    floats: Mutex<Vec<f64>>,
}

impl LocalGroup {
    /// Create the communicators for `size` partitions.
    /// Each one should be moved to (or borrowed by) a separate thread.
    ///
    /// # Panics
    ///
    /// If `size` is zero.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(size: usize) -> Vec<LocalCommunicator> {
        assert!(size > 0, "a group needs at least one partition");
        let group = Arc::new(Self {
            barrier: Barrier::new(size),
            ints: Mutex::new(vec![0; size]),
            floats: Mutex::new(vec![0.; size]),
        });
        (0..size)
            .map(|rank| LocalCommunicator {
                rank,
                size,
                group: Arc::clone(&group),
            })
            .collect()
    }
}

/// One partition's handle to a [`LocalGroup`].
#[derive(Clone, Debug)]
pub struct LocalCommunicator {
    rank: usize,
    size: usize,
    group: Arc<LocalGroup>,
}

impl LocalCommunicator {
    /// Deposit this partition's value, wait for everyone else's,
    /// and fold them together in rank order.
    ///
    /// The fold order is the same on every partition,
    /// so floating-point results are bitwise identical everywhere.
    fn all_reduce<T: Copy>(
        &self,
        slots: &Mutex<Vec<T>>,
        value: T,
        init: T,
        op: impl Fn(T, T) -> T,
    ) -> T {
        slots.lock().unwrap_or_else(PoisonError::into_inner)[self.rank] = value;
        self.group.barrier.wait();
        let result = slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .fold(init, |acc, v| op(acc, *v));
        // nobody may start the next reduction
        // before everyone has read the result of this one
        self.group.barrier.wait();
        result
    }
}

impl Communicator for LocalCommunicator {
    #[inline]
    fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    fn size(&self) -> usize {
        self.size
    }

    fn reduce_max(&self, value: i64) -> i64 {
        self.all_reduce(&self.group.ints, value, i64::MIN, i64::max)
    }

    fn reduce_sum(&self, value: f64) -> f64 {
        self.all_reduce(&self.group.floats, value, 0., |a, b| a + b)
    }

    fn reduce_sum_count(&self, value: usize) -> usize {
        let total = self.all_reduce(&self.group.ints, value as i64, 0, |a, b| a + b);
        total as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_reductions_are_identity() {
        let comm = SerialCommunicator;
        assert_eq!(comm.reduce_max(-1), -1);
        assert_eq!(comm.reduce_sum(2.5), 2.5);
        assert_eq!(comm.reduce_sum_count(7), 7);
    }

    #[test]
    fn local_group_reductions_agree() {
        let comms = LocalGroup::new(4);
        let results: Vec<(i64, f64, usize)> = std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .iter()
                .map(|comm| {
                    s.spawn(move || {
                        let r = comm.rank();
                        // several reductions back to back
                        // to check slots aren't overwritten too early
                        let max = comm.reduce_max(if r == 2 { 10 } else { -(r as i64) });
                        let sum = comm.reduce_sum(0.1 * r as f64);
                        let count = comm.reduce_sum_count(r + 1);
                        (max, sum, count)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for (max, sum, count) in &results {
            assert_eq!(*max, 10);
            assert_eq!(*count, 1 + 2 + 3 + 4);
            // identical on every partition, not just approximately
            assert_eq!(sum.to_bits(), results[0].1.to_bits());
        }
        assert!((results[0].1 - 0.6).abs() < 1e-12);
    }
}
