//! Testing utilities and harness for tandem

pub mod builders;
pub mod message;
pub mod testing;

pub use builders::*;
pub use message::{Channel, Message};
pub use testing::*;

/// Routes `log` output through the test harness. Safe to call from every test.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub mod prelude {
    pub use crate::builders::*;
    pub use crate::init_test_logging;
    pub use crate::message::{Channel, Message};
    pub use crate::testing::*;
}
