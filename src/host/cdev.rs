use super::gpio::{GpioChip, GpioLine};
use crate::error::{Error, Result};
use gpio_cdev::{Chip, LineHandle, LineRequestFlags};
use nix::errno::Errno;
use std::error::Error as _;
use std::path::Path;
use std::sync::Mutex;

/// GPIO chip reached through the Linux character device (ex: "/dev/gpiochip0").
pub struct CdevChip {
    chip: Mutex<Chip>,
}

impl CdevChip {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let chip = Chip::new(path)?;
        log::debug!("opened {} ({} lines)", chip.path().display(), chip.num_lines());
        Ok(Self {
            chip: Mutex::new(chip),
        })
    }
}

/// Whether the kernel refused a line request because someone else holds it.
fn is_busy(err: &gpio_cdev::Error) -> bool {
    err.source()
        .and_then(|cause| cause.downcast_ref::<Errno>())
        .is_some_and(|errno| *errno == Errno::EBUSY)
}

impl GpioChip for CdevChip {
    fn request_output(&self, offset: u32, label: &str, value: u8) -> Result<Box<dyn GpioLine>> {
        let mut chip = self.chip.lock().unwrap_or_else(|e| e.into_inner());
        if offset >= chip.num_lines() {
            return Err(Error::InvalidArgument);
        }
        let line = chip.get_line(offset)?;
        // One request: the kernel arbitrates ownership and the line never
        // exists unowned or as an input in between.
        let handle = line
            .request(LineRequestFlags::OUTPUT, u8::from(value != 0), label)
            .map_err(|e| if is_busy(&e) { Error::Busy(offset) } else { e.into() })?;
        Ok(Box::new(CdevLine { offset, handle }))
    }
}

struct CdevLine {
    offset: u32,
    handle: LineHandle,
}

impl GpioLine for CdevLine {
    fn offset(&self) -> u32 {
        self.offset
    }

    fn get_value(&self) -> Result<u8> {
        Ok(u8::from(self.handle.get_value()? != 0))
    }

    fn set_value(&self, value: u8) -> Result<()> {
        self.handle.set_value(u8::from(value != 0))?;
        Ok(())
    }
}
