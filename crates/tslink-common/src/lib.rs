#![doc = "Common types shared across the tslink workspace."]

pub mod config;
pub mod error;
pub mod metrics;
pub mod time;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use time::*;
