// Speech engines and playback devices for the Starlog audio dispatcher

// Shared helpers
pub(crate) mod utils;

pub mod wav;

#[cfg(feature = "piper")]
pub mod piper;

#[cfg(feature = "piper")]
pub use piper::{PiperConfig, PiperSynthesizer};

#[cfg(feature = "player")]
pub mod player;

#[cfg(feature = "player")]
pub use player::{CommandPlayer, PlayerConfig};
