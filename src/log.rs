//! Logging facade used throughout the crate.
//!
//! With the default `log` feature the macros come from the `log` crate.
//! Without it they expand to nothing, so call sites stay the same.

#[cfg(feature = "log")]
pub(crate) use log::{debug, error, info, warn};

#[cfg(not(feature = "log"))]
macro_rules! log_mock {
    (target: $target:expr, $($arg:tt)+) => {};
    ($($arg:tt)+) => {};
}

#[cfg(not(feature = "log"))]
pub(crate) use {log_mock as debug, log_mock as error, log_mock as info, log_mock as warn};
