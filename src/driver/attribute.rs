//! The `ledcontrol` attribute.

use crate::error::{Error, Result};
use crate::host::{AttributeOps, GpioLine};
use std::sync::Arc;

/// File name of the attribute inside the module's sysfs directory.
pub const ATTR_NAME: &str = "ledcontrol";

/// Owner write, world read.
pub const ATTR_MODE: u16 = 0o644;

/// Parses an unsigned decimal the way the kernel's `kstrtouint(s, 10, ..)`
/// does: an optional '+', at least one digit, and at most one trailing
/// newline. The buffer ends at the first NUL, like the C string sysfs hands
/// to `store`.
pub fn parse_uint(buf: &[u8]) -> Result<u32> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let mut s = &buf[..end];
    if let Some(rest) = s.strip_prefix(b"+") {
        s = rest;
    }

    let digits = s.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return Err(Error::InvalidArgument);
    }
    let mut value: u64 = 0;
    let mut overflow = false;
    for &b in &s[..digits] {
        match value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
        {
            Some(v) => value = v,
            None => overflow = true,
        }
    }
    if overflow {
        return Err(Error::OutOfRange);
    }

    let rest = &s[digits..];
    if !(rest.is_empty() || rest == b"\n") {
        return Err(Error::InvalidArgument);
    }
    u32::try_from(value).map_err(|_| Error::OutOfRange)
}

/// Maps reads and writes of `ledcontrol` onto the GPIO level.
pub struct LedControl {
    line: Arc<dyn GpioLine>,
}

impl LedControl {
    pub fn new(line: Arc<dyn GpioLine>) -> Self {
        Self { line }
    }
}

impl AttributeOps for LedControl {
    fn show(&self, buf: &mut String) -> Result<()> {
        let value = self.line.get_value()?;
        buf.push_str(&format!("{value}\n"));
        Ok(())
    }

    fn store(&self, buf: &[u8]) -> Result<usize> {
        // Anything that is not 0 or 1 is an invalid argument, including
        // numbers too large for a u32.
        let value = parse_uint(buf).map_err(|_| Error::InvalidArgument)?;
        match value {
            0 | 1 => self.line.set_value(value as u8)?,
            _ => return Err(Error::InvalidArgument),
        }
        log::debug!("ledcontrol <- {value}");
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{GpioChip, MockChip};

    #[test]
    fn parse_accepts_what_kstrtouint_accepts() {
        assert_eq!(parse_uint(b"0").unwrap(), 0);
        assert_eq!(parse_uint(b"1\n").unwrap(), 1);
        assert_eq!(parse_uint(b"+1").unwrap(), 1);
        assert_eq!(parse_uint(b"007").unwrap(), 7);
        assert_eq!(parse_uint(b"1\0garbage").unwrap(), 1);
        assert_eq!(parse_uint(b"4294967295").unwrap(), u32::MAX);
    }

    #[test]
    fn parse_rejects_garbage() {
        let inputs: [&[u8]; 9] = [
            b"",
            b"\n",
            b" 1",
            b"1 ",
            b"1\n\n",
            b"-1",
            b"+",
            b"0x1",
            b"one",
        ];
        for input in inputs {
            assert!(
                matches!(parse_uint(input), Err(Error::InvalidArgument)),
                "{input:?}"
            );
        }
    }

    #[test]
    fn parse_reports_overflow_as_range() {
        assert!(matches!(parse_uint(b"4294967296"), Err(Error::OutOfRange)));
        assert!(matches!(
            parse_uint(b"99999999999999999999999"),
            Err(Error::OutOfRange)
        ));
    }

    fn control() -> (MockChip, LedControl) {
        let chip = MockChip::new(64);
        let line = chip.request_output(40, "test", 1).unwrap();
        (chip, LedControl::new(Arc::from(line)))
    }

    #[test]
    fn show_reports_the_level() {
        let (_chip, led) = control();
        let mut buf = String::new();
        led.show(&mut buf).unwrap();
        assert_eq!(buf, "1\n");
    }

    #[test]
    fn store_drives_the_line_and_consumes_everything() {
        let (chip, led) = control();
        assert_eq!(led.store(b"0\n").unwrap(), 2);
        assert_eq!(chip.level(40), 0);
        assert_eq!(led.store(b"1").unwrap(), 1);
        assert_eq!(chip.level(40), 1);
    }

    #[test]
    fn rejected_store_leaves_the_level_alone() {
        let (chip, led) = control();
        led.store(b"0").unwrap();
        let writes = chip.writes(40);

        assert!(matches!(led.store(b"2"), Err(Error::InvalidArgument)));
        assert!(matches!(led.store(b"on"), Err(Error::InvalidArgument)));
        let err = led.store(b"4294967296").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument));
        assert_eq!(err.errno(), 22);

        assert_eq!(chip.level(40), 0);
        assert_eq!(chip.writes(40), writes);
    }
}
