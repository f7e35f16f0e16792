pub mod catalog;
pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod logging;
pub mod progress;
pub mod session;

pub use catalog::WorkCatalog;
pub use config::{Settings, TestType};
pub use controller::{
    BatchPlan, ControllerError, RunMode, RunReport, SessionLauncher, SessionTemplate, TaskSpawner,
    ThreadSpawner,
};
pub use engine::{AsrEngine, AsrSession, EngineError, SimulatedEngine, SimulatedEngineConfig};
pub use events::{EventSink, MemorySink, RecognitionOutcome, RunEvent, StdoutSink};
pub use progress::{ProgressCounter, ProgressSnapshot};
pub use session::{SessionDescriptor, SessionTask};
