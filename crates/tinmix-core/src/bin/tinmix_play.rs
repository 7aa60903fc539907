//! tinmix-play - play an audio file through the mixer
//!
//! Streams the file in a loop (or, with `--clip`, decodes it up front and
//! plays it once) on the default output device.
//!
//! ## Usage
//!
//! ```text
//! tinmix-play <file> [--clip] [--seconds N] [--config path]
//! tinmix-play --list-devices
//! ```
//!
//! Set RUST_LOG=debug for verbose output.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use tinmix_core::audio::{output_devices, CpalDriver};
use tinmix_core::config::{default_config_path, load_config, read_config};
use tinmix_core::file::SymphoniaFile;
use tinmix_core::{Manager, MixerConfig, UNITY_VOLUME};

const USAGE: &str = "usage: tinmix-play <file> [--clip] [--seconds N] [--config path]\n       tinmix-play --list-devices";

struct Args {
    file: Option<PathBuf>,
    clip: bool,
    seconds: u64,
    config: Option<PathBuf>,
    list_devices: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        file: None,
        clip: false,
        seconds: 10,
        config: None,
        list_devices: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--clip" => args.clip = true,
            "--list-devices" => args.list_devices = true,
            "--seconds" => {
                let value = iter.next().context("--seconds needs a value")?;
                args.seconds = value
                    .parse()
                    .with_context(|| format!("invalid --seconds value: {}", value))?;
            }
            "--config" => {
                args.config = Some(iter.next().context("--config needs a path")?.into());
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown option {}\n{}", other, USAGE),
            other => {
                if args.file.is_some() {
                    bail!("more than one file given\n{}", USAGE);
                }
                args.file = Some(other.into());
            }
        }
    }

    Ok(args)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    if args.list_devices {
        for device in output_devices() {
            let marker = if device.is_default { " (default)" } else { "" };
            println!("{}{}", device, marker);
        }
        return Ok(());
    }

    let Some(path) = args.file else {
        bail!("{}", USAGE);
    };

    let config: MixerConfig = match &args.config {
        Some(path) => read_config(path)?,
        None => load_config(&default_config_path()),
    };

    let driver = CpalDriver::open(&config).context("Failed to open audio output")?;
    log::info!("tinmix-play: output on {}", driver.device_name());

    let mut manager = Manager::new(driver, config)?;
    manager.start()?;

    let file = SymphoniaFile::open(&path).with_context(|| format!("Failed to open {:?}", path))?;
    let id = if args.clip {
        let mut file = file;
        let buffer = manager.decoder().decode(&mut file, UNITY_VOLUME)?;
        log::info!(
            "tinmix-play: decoded {} samples ({:.1}s)",
            buffer.samples().len(),
            buffer.samples().len() as f32 / manager.output_rate() as f32
        );
        manager.play_buffer(&buffer)?
    } else {
        manager.play_loop(Box::new(file))?
    };
    log::info!("tinmix-play: playing {:?} as {}", path, id);

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(100));
        if args.clip && manager.active_count() == 0 {
            log::info!("tinmix-play: clip finished");
            break;
        }
    }

    manager.stop_source(id);
    manager.stop(true);
    Ok(())
}
