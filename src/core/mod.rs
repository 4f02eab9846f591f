//! Core domain types, validation, counters and calendar helpers.
//!
//! This module provides the records the engine reads and writes (customers,
//! vehicles, jobs, invoices), the invoice builder that keeps balance
//! arithmetic consistent, and the service-time-zone calendar.

mod builder;
mod error;
mod numbering;
mod period;
mod types;
mod validation;

pub use builder::*;
pub use error::*;
pub use numbering::*;
pub use period::*;
pub use types::*;
pub use validation::*;
