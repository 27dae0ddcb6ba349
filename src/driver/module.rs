//! Load and unload of the LED module.

use super::attribute::{ATTR_MODE, ATTR_NAME, LedControl};
use super::blink::Blinker;
use crate::error::{Error, Result};
use crate::host::sysfs::KERNEL_KOBJ;
use crate::host::{Attribute, AttributeGroup, GpioLine, Host, KObject};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// GPIO the LED hangs off.
pub const PIO_LED: u32 = 40;

/// Directory created under `/sys/kernel`.
pub const SYSFS_DIR: &str = "helloled";

pub const DRV_NAME: &str = "helloled";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// The attribute only.
    Static,
    /// The attribute plus a periodic toggle.
    #[default]
    Blink,
}

#[derive(Debug, Clone)]
pub struct Params {
    pub led_line: u32,
    pub label: String,
    pub sysfs_dir: String,
    pub variant: Variant,
    pub blink_period: Duration,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            led_line: PIO_LED,
            label: DRV_NAME.to_string(),
            sysfs_dir: SYSFS_DIR.to_string(),
            variant: Variant::default(),
            blink_period: Duration::from_secs(1),
        }
    }
}

pub struct LedModule {
    line: Option<Arc<dyn GpioLine>>,
    kobj: Option<KObject>,
    blinker: Option<Blinker>,
    attr_path: String,
}

impl LedModule {
    pub fn init(host: &Host, params: &Params) -> Result<Self> {
        // Acquired and configured as an output, initially high, in one step.
        let line: Arc<dyn GpioLine> =
            Arc::from(host.gpio.request_output(params.led_line, &params.label, 1)?);

        let kobj = host
            .sysfs
            .kobject_create_and_add(&params.sysfs_dir, KERNEL_KOBJ)
            .map_err(|e| {
                log::error!("kobject_create_and_add failed: {}", e);
                Error::NoMemory
            })?;

        let group = AttributeGroup {
            name: None,
            attrs: vec![Attribute::new(
                ATTR_NAME,
                ATTR_MODE,
                Arc::new(LedControl::new(line.clone())),
            )],
        };
        // On error the kobject and the line are dropped here, in that order,
        // which removes the directory and frees the GPIO.
        if let Err(e) = kobj.create_group(&group) {
            log::error!("sysfs_create_group failed with result {}", -e.errno());
            return Err(e);
        }

        let blinker = match params.variant {
            Variant::Static => None,
            Variant::Blink => {
                let blinker = Blinker::new(&host.workqueue, line.clone(), params.blink_period);
                blinker.start();
                Some(blinker)
            }
        };

        let attr_path = format!("/sys/{}/{}", kobj.path(), ATTR_NAME);
        log::info!("Very useful LED driver up and running ({attr_path})");
        Ok(Self {
            line: Some(line),
            kobj: Some(kobj),
            blinker,
            attr_path,
        })
    }

    /// Absolute path of the `ledcontrol` file.
    pub fn attr_path(&self) -> &str {
        &self.attr_path
    }

    pub fn is_blinking(&self) -> bool {
        self.blinker.is_some()
    }

    /// Unloads the module. No blink tick runs once this returns.
    pub async fn exit(mut self) {
        if let Some(blinker) = self.blinker.take() {
            blinker.stop().await;
        }
        self.release();
    }

    fn release(&mut self) {
        // The attribute keeps its own reference to the line, so the GPIO is
        // actually freed once the kobject below takes the file away.
        self.line.take();
        self.kobj.take();
        log::info!("Very useful LED driver down");
    }
}

impl Drop for LedModule {
    fn drop(&mut self) {
        if self.kobj.is_none() {
            return;
        }
        if let Some(blinker) = self.blinker.take() {
            log::warn!("dropped without exit(): a running blink tick is not waited for");
            blinker.abort();
        }
        self.release();
    }
}
