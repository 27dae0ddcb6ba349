use crate::error::Result;
use crate::host::{DelayedWork, GpioLine, Workqueue};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Drives the complement of the current level and returns the new level.
pub fn toggle(line: &dyn GpioLine) -> Result<u8> {
    let next = line.get_value()? ^ 1;
    line.set_value(next)?;
    Ok(next)
}

/// Toggles the LED once per period until stopped.
///
/// There is no lock shared with the `ledcontrol` store: a user write racing
/// a tick may be overwritten by it.
pub struct Blinker {
    work: DelayedWork,
    running: Arc<AtomicBool>,
    period: Duration,
}

impl Blinker {
    pub fn new(queue: &Workqueue, line: Arc<dyn GpioLine>, period: Duration) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let keep_running = running.clone();
        let work = DelayedWork::new(queue, move |work| {
            match toggle(line.as_ref()) {
                Ok(level) => log::trace!("blink -> {level}"),
                Err(e) => log::warn!("blink: toggling GPIO {} failed: {}", line.offset(), e),
            }
            if keep_running.load(Ordering::SeqCst) {
                work.schedule(period);
            }
        });
        Self {
            work,
            running,
            period,
        }
    }

    /// Arms the first tick.
    pub fn start(&self) -> bool {
        self.work.schedule(self.period)
    }

    /// Stops re-arming, lets an in-flight tick finish, then cancels and waits.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.work.flush().await;
        if self.work.cancel_sync().await {
            log::debug!("blink: cancelled a pending tick");
        }
    }

    /// Non-waiting variant of [`Blinker::stop`].
    pub fn abort(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.work.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{GpioChip, MockChip};
    use tokio::time::sleep;

    fn output_line(chip: &MockChip, level: u8) -> Arc<dyn GpioLine> {
        Arc::from(chip.request_output(40, "blink", level).unwrap())
    }

    #[test]
    fn toggle_flips_the_level() {
        let chip = MockChip::new(64);
        let line = output_line(&chip, 1);
        assert_eq!(toggle(line.as_ref()).unwrap(), 0);
        assert_eq!(chip.level(40), 0);
        assert_eq!(toggle(line.as_ref()).unwrap(), 1);
        assert_eq!(chip.level(40), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blinks_once_per_period_until_stopped() {
        let chip = MockChip::new(64);
        let line = output_line(&chip, 1);
        let queue = Workqueue::system().unwrap();
        let blinker = Blinker::new(&queue, line, Duration::from_secs(1));

        assert!(blinker.start());
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(chip.level(40), 0);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(chip.level(40), 1);

        blinker.stop().await;
        let writes = chip.writes(40);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(chip.writes(40), writes);
    }
}
