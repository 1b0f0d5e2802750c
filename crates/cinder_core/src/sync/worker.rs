//! # Background Worker
//!
//! One named thread fed through a job channel and answering through a result
//! channel. Systems own workers and poll them from `process`, so results are
//! always applied on the scene's thread, inside a turn.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{EcsError, EcsResult};

/// Background thread running `FnMut(J) -> R` over submitted jobs in order.
///
/// # Example
///
/// ```rust,ignore
/// let mut mesher = Worker::spawn("terrain-mesher", |chunk: ChunkCoord| build_mesh(chunk))?;
/// mesher.submit(ChunkCoord::new(0, 0))?;
///
/// // later, in process():
/// for mesh in mesher.drain() {
///     ctx.commands().spawn(move |world, e| world.add_component(e, mesh).map(drop));
/// }
/// ```
pub struct Worker<J, R> {
    name: String,
    jobs: Option<Sender<J>>,
    results: Receiver<R>,
    handle: Option<JoinHandle<()>>,
    in_flight: usize,
}

impl<J: Send + 'static, R: Send + 'static> Worker<J, R> {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// `WorkerSpawn` if the OS refuses the thread.
    pub fn spawn<F>(name: &str, mut work: F) -> EcsResult<Self>
    where
        F: FnMut(J) -> R + Send + 'static,
    {
        let (job_tx, job_rx) = unbounded::<J>();
        let (result_tx, result_rx) = unbounded::<R>();

        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                for job in &job_rx {
                    if result_tx.send(work(job)).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| EcsError::WorkerSpawn(e.to_string()))?;

        tracing::debug!("Started worker {}", name);
        Ok(Self {
            name: name.to_owned(),
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
            in_flight: 0,
        })
    }

    /// Queues a job.
    ///
    /// # Errors
    ///
    /// `WorkerDisconnected` if the thread has exited.
    pub fn submit(&mut self, job: J) -> EcsResult<()> {
        let jobs = self.jobs.as_ref().ok_or(EcsError::WorkerDisconnected)?;
        jobs.send(job).map_err(|_| EcsError::WorkerDisconnected)?;
        self.in_flight += 1;
        Ok(())
    }

    /// Returns a finished result without blocking.
    ///
    /// # Errors
    ///
    /// `WorkerDisconnected` if the thread exited with jobs unanswered.
    pub fn try_recv(&mut self) -> EcsResult<Option<R>> {
        match self.results.try_recv() {
            Ok(result) => {
                self.in_flight -= 1;
                Ok(Some(result))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EcsError::WorkerDisconnected),
        }
    }

    /// Waits up to `timeout` for the next result.
    ///
    /// # Errors
    ///
    /// `WorkerDisconnected` if the thread exited with jobs unanswered.
    pub fn recv_timeout(&mut self, timeout: Duration) -> EcsResult<Option<R>> {
        match self.results.recv_timeout(timeout) {
            Ok(result) => {
                self.in_flight -= 1;
                Ok(Some(result))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(EcsError::WorkerDisconnected),
        }
    }

    /// Takes every result that is ready now.
    pub fn drain(&mut self) -> Vec<R> {
        let mut ready = Vec::new();
        while let Ok(Some(result)) = self.try_recv() {
            ready.push(result);
        }
        ready
    }

    /// Jobs submitted whose results have not been received.
    #[inline]
    #[must_use]
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Thread name given at spawn.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<J, R> Drop for Worker<J, R> {
    fn drop(&mut self) {
        // Closing the job channel ends the thread's loop.
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Worker {} panicked", self.name);
            }
        }
    }
}
