pub mod merge;
pub mod pass;
pub mod run;
pub mod run_generation;
pub mod sorter;
