pub mod client;
pub mod error;
pub mod handler;
pub mod types;

pub use client::{EngineStepStateSender, HttpStepStateClient, REPORT_PATH, StepStateSender};
pub use error::ScanError;
pub use handler::{EICAR_TEST_SIGNATURE, ScanDispatcher, ScanHandler};
pub use types::{StatusReport, StatusReportResponse, StepInvocationEvent, StepStatus};
