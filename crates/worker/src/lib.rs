//! Pipeline tasks for the waveform ingestion service.
//!
//! - Receive loop (source → queue, with the liveness watchdog)
//! - Persistence workers (queue → decoder → store)
//! - Retention sweeper (expired record deletion)
//! - Scheduler (spawns and wires the above)

pub mod config;
pub mod persist;
pub mod queue;
pub mod receiver;
pub mod retention;
pub mod scheduler;

pub use config::{PipelineConfig, QueueFullPolicy};
pub use persist::{spawn_workers, PersistWorker, ProcessOutcome};
pub use queue::{bounded, EnqueueError, QueueReceiver, QueueSender};
pub use receiver::{FatalCondition, LoopExit, ReceiveConfig, ReceiveLoop};
pub use retention::RetentionSweeper;
pub use scheduler::{Pipeline, PipelineHandles};
