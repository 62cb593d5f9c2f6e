//! Airline governance

pub mod registry;

pub use registry::{Admission, AirlineGovernance};
