//! Data types shared by the beagle crates.
//!
//! Everything here is plain data: identifiers, lifecycle states, the metadata of an image
//! submission and the event emitted when a build completes.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;
