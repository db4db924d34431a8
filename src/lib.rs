//! A library for communicating with C8033 micro-focus X-ray controllers.
//!
//! The controller speaks a plain-text protocol over a 9600 baud serial line:
//! each command is a short code terminated by a carriage return and each
//! reply is free text that ends when the line goes quiet. A [`Port`](port::Port)
//! handles the exchange and the [`command`] module adds typed accessors for
//! the controller's commands.
//!
//! ```rust
//! # use c8033::port::Port;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut port = Port::open_default()?;
//! println!("{}", port.xray_status()?);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]

pub mod backend;
pub mod command;
pub mod discovery;
pub mod error;
pub mod port;
pub mod reply;
pub mod text;
