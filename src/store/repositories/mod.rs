//! Entity operations on the store, one file per collection family.

pub mod preferences;
pub mod sessions;
pub mod subjects;
pub mod tasks;
