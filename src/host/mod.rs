//! Services the LED module consumes from its host: GPIO lines, sysfs and
//! deferred work.

#[cfg(target_os = "linux")]
pub mod cdev;
pub mod gpio;
pub mod sysfs;
pub mod workqueue;

#[cfg(target_os = "linux")]
pub use cdev::CdevChip;
pub use gpio::{GpioChip, GpioLine, MockChip};
pub use sysfs::{Accessor, Attribute, AttributeGroup, AttributeOps, KObject, Sysfs};
pub use workqueue::{DelayedWork, Workqueue};

use std::sync::Arc;

/// Everything a module gets handed at load time.
#[derive(Clone)]
pub struct Host {
    pub gpio: Arc<dyn GpioChip>,
    pub sysfs: Sysfs,
    pub workqueue: Workqueue,
}

impl Host {
    pub fn new(gpio: Arc<dyn GpioChip>, sysfs: Sysfs, workqueue: Workqueue) -> Self {
        Self {
            gpio,
            sysfs,
            workqueue,
        }
    }
}
