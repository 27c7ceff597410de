#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod logging;

pub use assertions::{assert_contains, assert_path_exists};
pub use fixtures::{galactic_lab, ping_reply, running_lab};
pub use logging::init_test_logging;
