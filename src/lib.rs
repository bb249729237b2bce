//! # Parameter Auto-Fill
//!
//! Fills element parameters of a building model from the model's own
//! spatial and grouping structure.
//!
//! ## Features
//!
//! - Level band: elements whose vertical extent overlaps a base/top level
//!   band receive the base level name
//! - Rooms: room number, name and "number: name" reference from the
//!   enclosing room, with door and window from/to fallbacks
//! - Groups: the group name written onto members of one instance per group
//!   type, with the host's group conflicts suppressed
//! - Preview without mutation, one mutation boundary per mode on execute
//! - Text report, CSV of skipped elements and JSON summary
//!
//! ## Example
//!
//! ```no_run
//! use param_autofill::config::FillConfiguration;
//! use param_autofill::fill::FillOrchestrator;
//! use param_autofill::host::load_snapshot;
//!
//! let mut model = load_snapshot("tower.json").expect("Failed to load model");
//! let config = FillConfiguration::load("fill.toml").expect("Failed to load config");
//!
//! let summary = FillOrchestrator::new(&mut model)
//!     .execute_fill(&config, |done, message| eprintln!("{done}: {message}"))
//!     .expect("Fill failed");
//! println!("Updated: {}", summary.elements_updated);
//! ```

pub mod accounting;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod fill;
pub mod host;
pub mod model;
