//! Common test utilities for factiva-news integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod queue;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use queue::*;
