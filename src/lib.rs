//! Image collection engine: ordered enumeration, cursor navigation and a
//! sliding window of decoded images kept warm by background loaders.

pub mod buffer;
pub mod cli;
pub mod codecs;
pub mod collection;
pub mod config;
pub mod error;
pub mod events;
pub mod files;
pub mod item;
mod loader;
pub mod marks;
pub mod orientation;
pub mod preload;
pub mod slot;

#[cfg(test)]
mod testutil;

pub use collection::{Collection, Position};
pub use config::Config;
pub use error::{Error, Result};
pub use events::Listener;
pub use item::Item;
pub use orientation::Orientation;
pub use slot::SlotStatus;
