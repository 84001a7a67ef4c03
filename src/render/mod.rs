//! Asynchronous page rendering.
//!
//! [`RenderQueue`] decouples page rasterization from the caller: submission
//! is fire-and-forget, rasterization happens on a blocking worker thread,
//! and finished images arrive through a completion callback. Rasterization
//! itself sits behind the [`PageRasterizer`] seam; the queue owns only the
//! scheduling.
//!
//! Cancellation is a generation fence: [`RenderQueue::cancel_all`] stops
//! dispatch of everything queued before the call, but never interrupts the
//! job already in flight, whose result is still delivered.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures local to the render pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The rasterizer could not produce an image for the page.
    #[error("failed to rasterize page {page}: {reason}")]
    Rasterize {
        /// 1-based page number.
        page: u32,
        /// Rasterizer-provided detail.
        reason: String,
    },

    /// The queue's worker task is gone; no further jobs will run.
    #[error("render queue is shut down")]
    QueueClosed,
}

/// Produces an image for one page at a zoom power.
///
/// Implementations are called from a blocking worker thread and may take
/// their time; the queue serializes calls, so interior locking is only
/// needed for state shared with the outside.
pub trait PageRasterizer: Send + Sync + 'static {
    /// Rasterize the page at `power`.
    fn rasterize(&self, page_number: u32, power: f64) -> Result<DynamicImage, RenderError>;
}

struct Job {
    page_number: u32,
    power: f64,
    generation: u64,
}

/// Fire-and-forget render scheduler.
///
/// Dropping the queue closes the channel; the worker finishes the job in
/// flight and exits.
pub struct RenderQueue {
    sender: mpsc::UnboundedSender<Job>,
    generation: Arc<AtomicU64>,
    outstanding: Arc<AtomicUsize>,
}

impl RenderQueue {
    /// Start a queue draining into `on_complete`.
    ///
    /// Must be called from within a tokio runtime. The callback runs on the
    /// worker task, once per successfully rendered page; failures are
    /// logged and swallowed.
    pub fn new<F>(rasterizer: Arc<dyn PageRasterizer>, on_complete: F) -> Self
    where
        F: Fn(u32, DynamicImage) + Send + Sync + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let generation = Arc::new(AtomicU64::new(0));
        let outstanding = Arc::new(AtomicUsize::new(0));

        let worker_generation = Arc::clone(&generation);
        let worker_outstanding = Arc::clone(&outstanding);
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                if job.generation == worker_generation.load(Ordering::SeqCst) {
                    let rasterizer = Arc::clone(&rasterizer);
                    let outcome = tokio::task::spawn_blocking(move || {
                        rasterizer.rasterize(job.page_number, job.power)
                    })
                    .await;

                    match outcome {
                        Ok(Ok(image)) => on_complete(job.page_number, image),
                        Ok(Err(error)) => {
                            log::warn!("render of page {} failed: {error}", job.page_number);
                        }
                        Err(join_error) => {
                            log::warn!(
                                "render worker for page {} aborted: {join_error}",
                                job.page_number
                            );
                        }
                    }
                }
                worker_outstanding.fetch_sub(1, Ordering::SeqCst);
            }
        });

        Self {
            sender,
            generation,
            outstanding,
        }
    }

    /// Queue one page for rendering. Never blocks.
    pub fn submit(&self, page_number: u32, power: f64) {
        let job = Job {
            page_number,
            power,
            generation: self.generation.load(Ordering::SeqCst),
        };
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(job).is_err() {
            // Worker is gone; nothing will drain this job.
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            log::warn!("render queue is shut down; dropping page {page_number}");
        }
    }

    /// Discard everything queued so far.
    ///
    /// The job currently in flight is not interrupted and its completion is
    /// still delivered.
    pub fn cancel_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// True while any submitted job has not yet been drained, including
    /// cancelled jobs that the worker has not skipped past yet.
    pub fn is_busy(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) > 0
    }
}
