//! Download pipeline: extractor output in, progress frames out

pub mod emitter;
pub mod event;
pub mod lines;
pub mod parser;
pub mod phase;
pub mod session;
pub mod supervisor;
pub mod workdir;
pub mod ytdlp_errors;

pub use emitter::EventEmitter;
pub use event::{CompletePayload, ErrorPayload, ProgressEvent, StreamEvent};
pub use phase::{Phase, ProgressTracker};
pub use supervisor::{Extractor, Supervisor};
