use clap::Parser;
use helloled::config::Config;
use helloled::console::{self, Command, HELP};
use helloled::host::{GpioChip, Host, MockChip, Sysfs, Workqueue};
use helloled::{LedModule, Variant, logger};
use log::LevelFilter;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::signal;

#[derive(Debug, Parser)]
#[command(version, about = "Very useful LED driver")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "HELLOLED_CONFIG")]
    config: Option<PathBuf>,

    /// GPIO character device
    #[arg(long)]
    chip: Option<PathBuf>,

    /// Offset of the LED line on the chip
    #[arg(long)]
    line: Option<u32>,

    #[arg(long, value_enum)]
    variant: Option<Variant>,

    /// Blink period in milliseconds
    #[arg(long)]
    period_ms: Option<u64>,

    /// Use an in-memory GPIO chip instead of real hardware
    #[arg(long)]
    mock: bool,

    /// off, error, warn, info, debug or trace
    #[arg(long, env = "HELLOLED_LOG", default_value = "info")]
    log_level: LevelFilter,
}

// GPIO backend grouped by platform
#[cfg(target_os = "linux")]
mod platform {
    use super::*;

    pub fn open_chip(config: &Config) -> Result<Arc<dyn GpioChip>, Box<dyn std::error::Error>> {
        Ok(Arc::new(helloled::host::CdevChip::open(&config.chip)?))
    }
}

#[cfg(not(target_os = "linux"))]
mod platform {
    use super::*;

    pub fn open_chip(_config: &Config) -> Result<Arc<dyn GpioChip>, Box<dyn std::error::Error>> {
        log::warn!("no GPIO character device on this platform, using an in-memory chip");
        Ok(Arc::new(MockChip::new(64)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    logger::init(args.log_level);

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(chip) = args.chip {
        config.chip = chip;
    }
    if let Some(line) = args.line {
        config.led_line = line;
    }
    if let Some(variant) = args.variant {
        config.variant = variant;
    }
    if let Some(period) = args.period_ms {
        config.blink_period_ms = period;
    }

    let gpio: Arc<dyn GpioChip> = if args.mock {
        Arc::new(MockChip::covering(config.led_line))
    } else {
        platform::open_chip(&config)?
    };
    let host = Host::new(gpio, Sysfs::new(), Workqueue::system()?);
    let module = LedModule::init(&host, &config.params())?;

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("{} ready, type 'help'\n", module.attr_path()).as_bytes())
        .await?;
    let mut lines = console::spawn_reader(BufReader::new(std::io::stdin()));
    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = signal::ctrl_c() => {
                log::info!("Ctrl+C received, unloading");
                break;
            }
        };
        let Some(line) = line else { break };
        let out = match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(cmd) => match cmd.execute(&host.sysfs) {
                Ok(out) => out,
                Err(e) => format!("{}: {} (errno {})\n", line.trim(), e, e.errno()),
            },
            Err(_) => format!("unknown command '{}'\n{}\n", line.trim(), HELP),
        };
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    module.exit().await;
    Ok(())
}
