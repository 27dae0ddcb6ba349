//! A very useful LED driver.
//!
//! One GPIO line is published as the `ledcontrol` attribute under
//! `/sys/kernel/helloled`. Reading it gives the level, writing 0 or 1 sets
//! it. The blink variant also toggles the line once per period.

pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod host;
pub mod logger;

pub use driver::{LedModule, Params, Variant};
pub use error::{Error, Result};
