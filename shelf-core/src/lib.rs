pub mod catalog;
pub mod config;
pub mod countdown;
pub mod delivery;
pub mod filename;
pub mod gate;
pub mod hosted;
pub mod product;
pub mod storage;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
