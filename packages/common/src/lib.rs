//! Shared building blocks for the manualdesk crates: time, local snapshot
//! storage and the latest-content cell.

pub mod clock;
pub mod content;
pub mod error;
pub mod snapshot;

pub use clock::*;
pub use content::*;
pub use error::*;
pub use snapshot::*;
