pub mod config;
pub mod history;
pub mod simulate;

pub use config::{handle_config_command, ConfigCommands};
pub use history::handle_history;
pub use simulate::{handle_simulate, SimulateArgs};
