//! Spreadsheet intake with resilient sheet/column resolution and change-gated history

pub mod config;
pub mod error;
pub mod frame;
pub mod history;
pub mod matching;
pub mod pipeline;
pub mod session;
pub mod source;
pub mod store;

pub use config::Config;
pub use error::IntakeError;
pub use history::{Clock, GateOutcome, HistoryRecord, SystemClock};
pub use session::{RunReport, Session, run};
