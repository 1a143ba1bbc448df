// ddmi - Doki Doki Literature Club mod installer
//
// Library crate with the install/uninstall engine. The binary (main.rs) is a
// command-line front end over it.

pub mod archive;
pub mod classify;
pub mod config;
pub mod error;
pub mod game;
pub mod install;
pub mod launch;
pub mod lock;
pub mod logging;
pub mod merge;
pub mod progress;
pub mod size;
pub mod steam;
pub mod uninstall;

pub use config::AppConfig;
pub use error::{ArchiveError, InstallError, UninstallError, UserInputError};
pub use install::{process_files, InstallOptions, InstallReport, InstallRequest};
pub use progress::{ChannelSink, Confirm, EngineEvent, ProgressSink};
pub use uninstall::{uninstall, UninstallOutcome};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
