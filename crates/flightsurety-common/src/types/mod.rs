//! Core data types for the FlightSurety marketplace

pub mod address;
pub mod airline;
pub mod credit;
pub mod flight;
pub mod oracle;
pub mod policy;
