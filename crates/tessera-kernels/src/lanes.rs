//! Static lane partitions and call-scoped worker groups.
//!
//! A lane owns a contiguous, statically computed range of the output. The
//! ranges of one execution partition the output exactly, so workers write
//! without locks; only the lane queue is synchronized.
//!
//! A [`WorkerGroup`] is a value owned by the caller for the duration of one
//! kernel call. It is never a process-wide pool and never reads ambient
//! thread-count configuration.

use std::collections::VecDeque;
use std::ops::Range;

use parking_lot::Mutex;

/// One independently computed slice of a kernel's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lane {
    pub index: usize,
    /// Output element range owned by this lane.
    pub range: Range<usize>,
}

impl Lane {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Bands of `rows_per_lane` rows over a row-major output of `rows × row_len`.
///
/// The last band may be shorter. Empty when either dimension is zero.
pub fn row_bands(rows: usize, row_len: usize, rows_per_lane: usize) -> Vec<Lane> {
    if rows == 0 || row_len == 0 {
        return Vec::new();
    }
    let rows_per_lane = rows_per_lane.max(1);
    (0..rows)
        .step_by(rows_per_lane)
        .enumerate()
        .map(|(index, r0)| {
            let r1 = (r0 + rows_per_lane).min(rows);
            Lane {
                index,
                range: r0 * row_len..r1 * row_len,
            }
        })
        .collect()
}

/// `count` contiguous shares of `0..total`; the first `total % count`
/// shares are one larger. Shares may be empty when `total < count`.
pub fn even_shares(total: usize, count: usize) -> Vec<Lane> {
    let count = count.max(1);
    let base = total / count;
    let extra = total % count;
    let mut start = 0;
    (0..count)
        .map(|index| {
            let len = base + usize::from(index < extra);
            let lane = Lane {
                index,
                range: start..start + len,
            };
            start += len;
            lane
        })
        .collect()
}

/// One single-element lane per partial result.
pub fn unit_lanes(count: usize) -> Vec<Lane> {
    (0..count).map(|index| Lane { index, range: index..index + 1 }).collect()
}

/// Whether `lanes`, in order, cover `0..total` exactly once.
pub fn is_exact_partition(lanes: &[Lane], total: usize) -> bool {
    let mut next = 0;
    for lane in lanes {
        if lane.range.start != next || lane.range.end < lane.range.start {
            return false;
        }
        next = lane.range.end;
    }
    next == total
}

/// Workers that drain a queue of lanes for one kernel call.
///
/// With more than one worker the lanes run on a rayon pool built for this
/// group and torn down when the group is dropped. A cooperative group runs
/// every lane on the calling thread, which is all a single-threaded guest
/// can do.
pub struct WorkerGroup {
    workers: usize,
    pool: Option<rayon::ThreadPool>,
}

impl WorkerGroup {
    /// Run lanes on the calling thread.
    pub fn cooperative() -> Self {
        Self { workers: 1, pool: None }
    }

    /// Spawn `workers` threads for this group.
    ///
    /// Falls back to cooperative execution if threads cannot be created
    /// (e.g. wasm32 without shared memory).
    pub fn new(workers: usize) -> Self {
        if workers <= 1 {
            return Self::cooperative();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tessera-lane-{}", i))
            .build()
        {
            Ok(pool) => Self {
                workers,
                pool: Some(pool),
            },
            Err(e) => {
                tracing::warn!(
                    "worker group of {} threads unavailable ({}), running lanes cooperatively",
                    workers,
                    e
                );
                Self::cooperative()
            }
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_cooperative(&self) -> bool {
        self.pool.is_none()
    }

    /// Run `kernel` once per lane over that lane's slice of `output`.
    ///
    /// Blocks until every lane has finished. Panics if `lanes` do not
    /// partition `output` exactly.
    pub fn run<T, F>(&self, output: &mut [T], lanes: &[Lane], kernel: F)
    where
        T: Send,
        F: Fn(&Lane, &mut [T]) + Sync,
    {
        assert!(
            is_exact_partition(lanes, output.len()),
            "lane ranges must partition the {}-element output exactly",
            output.len()
        );

        let mut jobs = VecDeque::with_capacity(lanes.len());
        let mut rest = output;
        for lane in lanes {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(lane.len());
            jobs.push_back((lane, head));
            rest = tail;
        }
        let queue = Mutex::new(jobs);

        let drain = || loop {
            let job = queue.lock().pop_front();
            match job {
                Some((lane, out)) => kernel(lane, out),
                None => break,
            }
        };

        match &self.pool {
            Some(pool) => pool.scope(|s| {
                for _ in 0..self.workers.min(lanes.len()) {
                    s.spawn(|_| drain());
                }
            }),
            None => drain(),
        }
    }
}

impl std::fmt::Debug for WorkerGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerGroup")
            .field("workers", &self.workers)
            .field("cooperative", &self.is_cooperative())
            .finish()
    }
}
