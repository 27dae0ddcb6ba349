use crate::driver::module::{DRV_NAME, PIO_LED, SYSFS_DIR};
use crate::driver::{Params, Variant};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file contents. Every field is optional and defaults to the
/// compiled-in constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// GPIO character device (ex: "/dev/gpiochip0").
    pub chip: PathBuf,
    pub led_line: u32,
    pub label: String,
    pub sysfs_dir: String,
    pub variant: Variant,
    pub blink_period_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chip: PathBuf::from("/dev/gpiochip0"),
            led_line: PIO_LED,
            label: DRV_NAME.to_string(),
            sysfs_dir: SYSFS_DIR.to_string(),
            variant: Variant::default(),
            blink_period_ms: 1000,
        }
    }
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn params(&self) -> Params {
        Params {
            led_line: self.led_line,
            label: self.label.clone(),
            sysfs_dir: self.sysfs_dir.clone(),
            variant: self.variant,
            // A zero period would spin the workqueue.
            blink_period: Duration::from_millis(self.blink_period_ms.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn empty_object_gives_the_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        let params = config.params();
        assert_eq!(params.led_line, 40);
        assert_eq!(params.sysfs_dir, "helloled");
        assert_eq!(params.blink_period, Duration::from_secs(1));
    }

    #[test]
    fn fields_override_defaults() {
        let config = Config::from_json(
            r#"{ "chip": "/dev/gpiochip4", "led_line": 2, "variant": "static", "blink_period_ms": 250 }"#,
        )
        .unwrap();
        assert_eq!(config.chip, PathBuf::from("/dev/gpiochip4"));
        assert_eq!(config.variant, Variant::Static);
        assert_eq!(config.params().blink_period, Duration::from_millis(250));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(matches!(
            Config::from_json(r#"{ "pio_irq": 41 }"#),
            Err(Error::Config(_))
        ));
    }
}
