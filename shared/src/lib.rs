//! Headless core of the StudyTrack client.
//!
//! The shell forwards user input as [`Event`]s, performs the HTTP and secure
//! storage effects the core requests, and renders the [`ViewModel`].

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod draft;
pub mod error;
pub mod event;
pub mod model;
pub mod optimistic;
pub mod screens;
pub mod session;
pub mod view;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::App as CruxApp;
pub use error::{AppError, ErrorKind, ErrorSeverity, ValidationError};
pub use event::Event;
pub use model::Model;
pub use session::Route;
pub use view::{ScreenView, ViewModel};
