//! Configuration request processing
//!
//! This module handles:
//! - Parsing addressed requests and resolving their target device
//! - Translating configuration payloads into operation lists
//! - Running operation lists strictly in order against a device
//! - Reporting outcomes and read-back results

mod dispatcher;
mod executor;
pub mod handlers;
mod operation;
mod payload;

pub use dispatcher::RequestDispatcher;
pub use executor::PipelineExecutor;
pub use operation::{DeviceTarget, ResultAccumulator};
