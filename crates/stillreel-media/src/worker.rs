// crates/stillreel-media/src/worker.rs
//
// ConvertWorker: background conversion jobs. One thread per job, results
// and progress on a shared channel, per-job cancel flags keyed by job id.
//
// The worker does not serialize jobs: hardware encoders are a scarce
// resource on most platforms, and the host owns that policy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}};
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use uuid::Uuid;

use stillreel_core::job::JobUpdate;
use stillreel_core::request::{ConvertOptions, ConvertRequest};

use crate::convert::convert_with;

/// Send a progress update every this many written frames.
const PROGRESS_INTERVAL: u64 = 15;

pub struct ConvertWorker {
    /// Progress / done / failed messages from all jobs.
    pub rx:   Receiver<JobUpdate>,
    tx:       Sender<JobUpdate>,
    shutdown: Arc<AtomicBool>,
    /// Per-job cancel flags, keyed by job id so cancellation is targeted.
    /// Entries are inserted by start_convert and removed when the job's
    /// thread finishes.
    cancels:  Arc<Mutex<HashMap<Uuid, Arc<AtomicBool>>>>,
}

impl ConvertWorker {
    pub fn new() -> Self {
        let (tx, rx) = bounded(512);
        Self {
            rx,
            tx,
            shutdown: Arc::new(AtomicBool::new(false)),
            cancels:  Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn a background thread converting `request`. Returns the job id
    /// used in every JobUpdate and accepted by `cancel`.
    pub fn start_convert(&self, request: ConvertRequest) -> Uuid {
        let job    = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        let tx     = self.tx.clone();
        let sd     = Arc::clone(&self.shutdown);

        // Register the cancel flag before spawning — avoids a window
        // where cancel() is called before the thread inserted the flag.
        self.cancels.lock().unwrap().insert(job, Arc::clone(&cancel));

        let cancels_ref = Arc::clone(&self.cancels);
        thread::spawn(move || {
            if sd.load(Ordering::Relaxed) {
                let _ = tx.send(JobUpdate::Failed { job, msg: "worker shutting down".into() });
                return;
            }

            let frame_count = request.frame_count();
            let progress_tx = tx.clone();
            let result = convert_with(
                &request,
                &ConvertOptions::default(),
                &cancel,
                |frames_done| {
                    if frames_done % PROGRESS_INTERVAL == 0 || frames_done == frame_count {
                        let _ = progress_tx.send(JobUpdate::Progress { job, frames_done, frame_count });
                    }
                },
            );

            match result {
                Ok(stats) => {
                    let _ = tx.send(JobUpdate::Done {
                        job,
                        output:         stats.output,
                        frames_written: stats.frames_written,
                    });
                }
                Err(e) => {
                    let _ = tx.send(JobUpdate::Failed { job, msg: e.to_string() });
                }
            }

            // Drop the cancel flag once the job is done so the map does
            // not grow over a long session of short conversions.
            cancels_ref.lock().unwrap().remove(&job);
        });

        job
    }

    /// Signal `job` to stop. The pump observes the flag after its current
    /// bounded poll and exits with a cancellation error, which arrives on
    /// the channel as JobUpdate::Failed.
    pub fn cancel(&self, job: Uuid) {
        if let Some(flag) = self.cancels.lock().unwrap().get(&job) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Refuse new work and cancel everything in flight.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let cancels = self.cancels.lock().unwrap();
        for flag in cancels.values() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

impl Default for ConvertWorker {
    fn default() -> Self {
        Self::new()
    }
}
