//! Vigilant terminal UI.
//!
//! [`view::ViewController`] turns a live collection into list frames,
//! [`registry::ControllerRegistry`] builds one controller per resource name
//! on demand, and [`app::App`] ties them to the terminal.

#![forbid(unsafe_code)]

pub mod app;
pub mod command_bar;
pub mod draw;
pub mod pane;
pub mod registry;
pub mod tui;
pub mod view;

pub use app::{App, AppConfig, AppMessage, Screen, Target};
pub use command_bar::{CommandBar, CommandOutcome};
pub use pane::{PaneKind, TextPane};
pub use registry::ControllerRegistry;
pub use view::{ListFrame, ViewController};

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    #[error("terminal: {0}")]
    Terminal(#[from] std::io::Error),
    #[error("unknown resource: {0}")]
    UnknownResource(String),
}
