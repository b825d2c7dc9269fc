//! Submit-and-poll protocol for long-running backend work.
//!
//! [`JobPoller`] only looks at a job's id and [`JobStatus`]; the payload is
//! carried through untouched, so the same loop drives analysis runs, exports
//! or anything else exposing the queued/running/succeeded/failed contract.

mod model;
mod poller;

pub use model::{Job, JobId, JobState, JobStatus};
pub use poller::{DEFAULT_POLL_INTERVAL, JobPoller, PollConfig, run_to_completion};
