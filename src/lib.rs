//! Running history and heart-rate tables from an Apple Health export.
//!
//! [`Processor`] reads `export.xml`, keeps heart-rate samples and running
//! workouts, joins the two and plots the result.

pub mod cli;
pub mod error;
pub mod export;
pub mod fields;
pub mod gpx;
pub mod plot;
pub mod processor;
pub mod types;
pub mod utils;

pub use error::{ConfigurationError, Error, ParseError, Result};
pub use fields::RunField;
pub use processor::{HrAggregate, Processor};
