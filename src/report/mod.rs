//! Result presentation: terminal table, notices and report files.

pub mod generator;

pub use generator::*;
