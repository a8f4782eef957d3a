//! Bounded latest-frame queue between a camera's sampler and worker.
//!
//! The queue prefers freshness over completeness: enqueue never blocks, and
//! when the queue is full the oldest samples are evicted (and counted) to
//! make room. Dequeue blocks until a sample is available. Eviction and
//! enqueue happen under a single lock acquisition so the consumer always
//! observes FIFO order minus evictions.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::frame::Sample;
use crate::metrics::{DROPPED_SAMPLES, QUEUE_DEPTH};

pub struct SampleQueue {
    camera: String,
    capacity: usize,
    inner: Mutex<VecDeque<Sample>>,
    ready: Condvar,
}

impl SampleQueue {
    pub fn new(camera: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            camera: camera.into(),
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
        }
    }

    /// Enqueue a sample, evicting the oldest entries when full.
    ///
    /// Returns the number of evicted samples; the same count is added to the
    /// per-camera dropped-samples counter.
    pub fn push(&self, sample: Sample) -> Result<usize> {
        let mut queue = self
            .inner
            .lock()
            .map_err(|_| anyhow!("sample queue lock poisoned"))?;
        let mut evicted = 0usize;
        while queue.len() >= self.capacity {
            queue.pop_front();
            evicted += 1;
        }
        queue.push_back(sample);
        if evicted > 0 {
            DROPPED_SAMPLES
                .with_label_values(&[&self.camera])
                .inc_by(evicted as u64);
        }
        QUEUE_DEPTH
            .with_label_values(&[&self.camera])
            .set(queue.len() as f64);
        drop(queue);
        self.ready.notify_one();
        Ok(evicted)
    }

    /// Dequeue the oldest sample, blocking while the queue is empty.
    pub fn pop(&self) -> Result<Sample> {
        let mut queue = self
            .inner
            .lock()
            .map_err(|_| anyhow!("sample queue lock poisoned"))?;
        loop {
            if let Some(sample) = queue.pop_front() {
                QUEUE_DEPTH
                    .with_label_values(&[&self.camera])
                    .set(queue.len() as f64);
                return Ok(sample);
            }
            queue = self
                .ready
                .wait(queue)
                .map_err(|_| anyhow!("sample queue lock poisoned"))?;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
