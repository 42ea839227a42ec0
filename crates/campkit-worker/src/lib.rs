//! Submission processing worker.
//!
//! Consumes jobs from the queue, transcodes and uploads each file, records
//! deliverables, and drives the submission completion state machine.

pub mod completion;
pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;

pub use completion::{all_deliverables_sent, next_status, DeliverableTally};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use pipeline::{
    process_submission, FfmpegTranscoder, ProcessingContext, R2Uploader, Transcoder, Uploader,
};
