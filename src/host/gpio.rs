//! GPIO line ownership.
//!
//! A line is requested from a [`GpioChip`] and owned through the returned
//! [`GpioLine`] handle. Dropping the handle releases the line, so a line can
//! only ever be freed by whoever requested it.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

pub trait GpioLine: Send + Sync {
    /// Offset of the line on its chip.
    fn offset(&self) -> u32;

    /// Current logic level, always 0 or 1.
    fn get_value(&self) -> Result<u8>;

    /// Drives the line. Any non-zero value is high.
    fn set_value(&self, value: u8) -> Result<()>;
}

pub trait GpioChip: Send + Sync {
    /// Requests exclusive ownership of the line at `offset`, configured as an
    /// output driving `value` from the moment it is owned.
    fn request_output(&self, offset: u32, label: &str, value: u8) -> Result<Box<dyn GpioLine>>;
}

#[derive(Debug, Default, Clone)]
struct LineState {
    owner: Option<String>,
    value: u8,
    writes: u64,
}

/// In-memory chip used for tests and on hosts without a GPIO character device.
#[derive(Clone)]
pub struct MockChip {
    // Wide enough for a chip that covers offset u32::MAX.
    ngpio: u64,
    lines: Arc<Mutex<HashMap<u32, LineState>>>,
}

impl MockChip {
    pub fn new(ngpio: u32) -> Self {
        Self::with_lines(u64::from(ngpio))
    }

    /// A chip just large enough to hold `offset`.
    pub fn covering(offset: u32) -> Self {
        Self::with_lines(u64::from(offset) + 1)
    }

    fn with_lines(ngpio: u64) -> Self {
        Self {
            ngpio,
            lines: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lines(&self) -> MutexGuard<'_, HashMap<u32, LineState>> {
        // A panicking test thread must not wedge the others.
        self.lines.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Level currently driven on `offset`.
    pub fn level(&self, offset: u32) -> u8 {
        self.lines().get(&offset).map_or(0, |l| l.value)
    }

    pub fn is_requested(&self, offset: u32) -> bool {
        self.lines().get(&offset).is_some_and(|l| l.owner.is_some())
    }

    /// Label of the current owner, if any.
    pub fn owner(&self, offset: u32) -> Option<String> {
        self.lines().get(&offset).and_then(|l| l.owner.clone())
    }

    /// Number of times the line was driven since the chip was created.
    pub fn writes(&self, offset: u32) -> u64 {
        self.lines().get(&offset).map_or(0, |l| l.writes)
    }

    /// Marks `offset` as owned by someone else.
    pub fn claim(&self, offset: u32, label: &str) {
        self.lines().entry(offset).or_default().owner = Some(label.to_string());
    }
}

impl GpioChip for MockChip {
    fn request_output(&self, offset: u32, label: &str, value: u8) -> Result<Box<dyn GpioLine>> {
        if u64::from(offset) >= self.ngpio {
            return Err(Error::InvalidArgument);
        }
        let mut lines = self.lines();
        let state = lines.entry(offset).or_default();
        if state.owner.is_some() {
            return Err(Error::Busy(offset));
        }
        state.owner = Some(label.to_string());
        state.value = u8::from(value != 0);
        state.writes += 1;
        Ok(Box::new(MockLine {
            offset,
            chip: self.clone(),
        }))
    }
}

struct MockLine {
    offset: u32,
    chip: MockChip,
}

impl GpioLine for MockLine {
    fn offset(&self) -> u32 {
        self.offset
    }

    fn get_value(&self) -> Result<u8> {
        Ok(self.chip.level(self.offset))
    }

    fn set_value(&self, value: u8) -> Result<()> {
        let mut lines = self.chip.lines();
        let state = lines.entry(self.offset).or_default();
        state.value = u8::from(value != 0);
        state.writes += 1;
        Ok(())
    }
}

impl Drop for MockLine {
    fn drop(&mut self) {
        if let Some(state) = self.chip.lines().get_mut(&self.offset) {
            state.owner = None;
        }
    }
}
