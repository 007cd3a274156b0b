// flac-bridge library
// Pull-based FLAC decoding and stream encoding over a callback-driven codec

pub mod cli;
pub mod config;
pub mod logging;
pub mod sound;

pub use cli::Cli;
pub use config::Options;
pub use logging::LogLevel;
