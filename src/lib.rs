//! # washcycle
//!
//! Recurring scheduling and billing engine for subscription car-wash
//! services: daily wash jobs, monthly invoices in two pricing modes, and
//! month-end closing with balance carry-forward.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Every day and month decision is made in the service time zone
//! ([`core::SERVICE_TZ`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use washcycle::core::*;
//! use washcycle::invoicing::{InvoiceGenerator, InvoiceRunOutcome};
//! use washcycle::memstore::MemoryStore;
//! use rust_decimal_macros::dec;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! store
//!     .add_customer(serde_json::from_str(
//!         r#"{"id":"c1","building":"b1","vehicles":[{"id":"v1","schedule_type":"daily","monthly_amount":"100"}]}"#,
//!     )?)
//!     .await;
//!
//! let now = Utc.with_ymd_and_hms(2026, 4, 1, 0, 5, 0).unwrap();
//! let outcome = InvoiceGenerator::new(store.clone())
//!     .run_at(now, None, "full_subscription")
//!     .await?;
//!
//! let InvoiceRunOutcome::Completed(summary) = outcome else { panic!("blocked") };
//! assert_eq!(summary.billing_month.to_string(), "2026-03");
//! assert_eq!(store.invoices().await[0].balance, dec!(100));
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Types, schedule evaluation, store traits, job and invoice generation, month-end |
//! | `memory-store` (default) | In-memory store with JSON snapshots |
//! | `cli` | TOML config, trigger loop and the `washcycle` binary |
//! | `all` | Everything |

#[macro_use]
extern crate log;

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod schedule;

#[cfg(feature = "core")]
pub mod store;

#[cfg(feature = "core")]
pub mod jobs;

#[cfg(feature = "core")]
pub mod invoicing;

#[cfg(feature = "core")]
pub mod month_end;

#[cfg(feature = "core")]
pub mod report;

#[cfg(feature = "memory-store")]
pub mod memstore;

#[cfg(feature = "cli")]
pub mod config;

#[cfg(feature = "cli")]
pub mod scheduler;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
