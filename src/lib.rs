#![deny(missing_docs)]

//! This crate bridges a serial attached fan controller to HTTP clients.
//!
//! At startup the controller is located among the host's serial devices and
//! opened exclusively. If the port is busy (e.g. some other program still
//! holds it) opening is retried a few times before giving up.
//!
//! Once open, the port is split in two:
//!
//! - Commands go through a single gateway, so that commands from concurrent
//!   clients never interleave on the wire.
//! - Feedback lines are collected into a small ring buffer, which any number of
//!   clients may observe. Slow clients only ever see the newest line.
//!
//! The web server exposes commands as plain `GET` routes, feedback as a
//! server-sent event stream, and both over a websocket.

/// The messages clients get back from the server.
pub mod actions;

/// Owns the serial session while the program runs.
pub mod bridge;

/// The command line interface.
pub mod cli;

/// Validating commands and sending them to the controller.
pub mod command;

/// Configuration.
pub mod config;

/// Terminal control of the fans.
pub mod console;

/// Possible errors in this library.
pub mod error;

/// Collecting and observing controller feedback.
pub mod feedback;

/// Finding the controller among serial devices.
pub mod locator;

/// Logging setup.
pub mod logging;

/// A simulated controller.
pub mod mock;

/// Serial port related code.
pub mod serial;

/// Code relating to setting up a server.
pub mod server;

mod websocket;
