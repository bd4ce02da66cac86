pub mod compare;
pub mod diag;
pub mod error;
pub mod judge;
pub mod paths;
pub mod report;
pub mod runner;
pub mod spec;
pub mod style;
pub mod vcs;

pub use crate::error::{Error, Result};
pub use crate::spec::ExerciseSpec;
