//! Audio output drivers
//!
//! The engine renders mono 16-bit samples through the [`AudioDriver`]
//! contract; these are the implementations that ship with the crate:
//!
//! - [`CpalDriver`] (feature `cpal-backend`): real device output via cpal
//! - [`ManualDriver`]: no device, pumped by the caller (tests, offline render)
//!
//! ```ignore
//! use tinmix_core::audio::CpalDriver;
//! use tinmix_core::{Manager, MixerConfig};
//!
//! let config = MixerConfig::default();
//! let mut manager = Manager::new(CpalDriver::open(&config)?, config)?;
//! manager.start()?;
//! ```

mod driver;
mod manual;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;
#[cfg(feature = "cpal-backend")]
mod device;

pub use driver::{AudioDriver, ChannelId, RenderCallback};
pub use manual::{ManualDriver, ManualPump};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalDriver;
#[cfg(feature = "cpal-backend")]
pub use device::{find_output_device, output_devices, OutputDevice};
