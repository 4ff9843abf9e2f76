// crates/stillreel-core/src/job.rs
//
// Messages sent from ConvertWorker background threads to the host
// application. No ffmpeg, no handles — errors cross the channel as
// strings so receivers never depend on collaborator types.

use std::path::PathBuf;

use uuid::Uuid;

/// Progress and terminal results for one background conversion job.
#[derive(Clone, Debug)]
pub enum JobUpdate {
    Progress { job: Uuid, frames_done: u64, frame_count: u64 },
    Done     { job: Uuid, output: PathBuf, frames_written: u64 },
    Failed   { job: Uuid, msg: String },
}
