//! Operator commands. Each one loads the configured service, runs a single
//! operation and prints a short report.

pub mod albums;
pub mod doctor;
pub mod locations;
pub mod trash;
