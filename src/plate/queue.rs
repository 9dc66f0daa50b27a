//! Bounded worker pool that drains tile write jobs.
//!
//! Producers push [`WriteJob`]s into a bounded channel; a fixed number of
//! worker tasks pull from it and run each job through the store's write
//! path. [`WriteQueue::join`] is the only barrier: it closes the channel and
//! waits until every submitted job has finished.

use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::store::PlateCore;
use crate::error::PlateError;
use crate::tile::TileCoordinate;

/// One block waiting to be written at `coord`.
#[derive(Debug, Clone)]
pub struct WriteJob {
    pub coord: TileCoordinate,
    pub image: RgbaImage,
}

impl WriteJob {
    pub fn new(coord: TileCoordinate, image: RgbaImage) -> Self {
        Self { coord, image }
    }
}

/// Outcome of a drained queue.
#[derive(Debug, Default)]
pub struct QueueReport {
    /// Jobs written successfully
    pub completed: usize,

    /// Jobs that failed, with their error
    pub failures: Vec<(TileCoordinate, PlateError)>,
}

impl QueueReport {
    fn merge(&mut self, other: QueueReport) {
        self.completed += other.completed;
        self.failures.extend(other.failures);
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

type SharedReceiver = Arc<Mutex<mpsc::Receiver<WriteJob>>>;

/// Handle to a running pool of write workers.
///
/// Dropping the queue without calling [`join`](Self::join) stops new
/// submissions but lets queued jobs finish in the background.
pub struct WriteQueue {
    sender: mpsc::Sender<WriteJob>,
    workers: Vec<JoinHandle<QueueReport>>,
}

impl WriteQueue {
    pub(crate) fn start(core: Arc<PlateCore>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver: SharedReceiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers.max(1))
            .map(|worker| {
                let core = Arc::clone(&core);
                let receiver = Arc::clone(&receiver);
                tokio::spawn(run_worker(worker, core, receiver))
            })
            .collect();

        Self { sender, workers }
    }

    /// Queue a job, waiting while the queue is full.
    pub async fn submit(&self, job: WriteJob) -> Result<(), PlateError> {
        let coord = job.coord;
        self.sender
            .send(job)
            .await
            .map_err(|_| PlateError::TaskFailed {
                coord,
                message: "write queue is closed".to_string(),
            })
    }

    /// Close the queue and wait for all submitted jobs to finish.
    pub async fn join(self) -> QueueReport {
        let WriteQueue { sender, workers } = self;
        drop(sender);

        let mut report = QueueReport::default();
        for handle in workers {
            match handle.await {
                Ok(worker_report) => report.merge(worker_report),
                Err(e) => error!(error = %e, "Write worker terminated abnormally"),
            }
        }
        report
    }
}

async fn run_worker(worker: usize, core: Arc<PlateCore>, receiver: SharedReceiver) -> QueueReport {
    let mut report = QueueReport::default();

    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(WriteJob { coord, image }) = job else {
            break;
        };

        // Each job runs in its own task so a panic is attributed to its
        // coordinate and the worker keeps draining.
        let task_core = Arc::clone(&core);
        let result = tokio::spawn(async move { task_core.write(coord, &image).await })
            .await
            .unwrap_or_else(|e| {
                Err(PlateError::TaskFailed {
                    coord,
                    message: e.to_string(),
                })
            });

        match result {
            Ok(()) => report.completed += 1,
            Err(e) => {
                warn!(worker, coord = %coord, error = %e, "Tile write failed");
                report.failures.push((coord, e));
            }
        }
    }

    debug!(
        worker,
        completed = report.completed,
        failed = report.failures.len(),
        "Write worker finished"
    );
    report
}

// =============================================================================
// Tests
// =============================================================================
