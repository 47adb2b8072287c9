pub mod analysis;
pub mod assembler;
pub mod config;
pub mod delivery;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod merge;
pub mod retry;
pub mod router;
pub mod state;
pub mod traits;
pub mod types;

pub use analysis::InsightForwarder;
pub use assembler::{JobOutcome, TranscriptAssembler};
pub use config::{AssemblerConfig, LifecycleConfig, ManagerConfig};
pub use delivery::Delivery;
pub use error::{AnalysisError, BatchError, EngineError, FleetError, JobError, JobServerError, QueueError, StoreError};
pub use lifecycle::{FleetLifecycleReporter, LifecycleState};
pub use manager::{ManagerExit, QueueWorkerManager};
pub use merge::{consolidate, speaker_turns, SpeakerTurn};
pub use retry::{retry, RetryError};
pub use router::JobRouter;
pub use state::WorkerState;
pub use traits::{FleetControl, InsightAnalyzer, JobQueue, JobServer, MessageHandler, ObjectStore, TranscriptionEngine};
pub use types::*;
