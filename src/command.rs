//! The controller's command set and typed accessors for it.
//!
//! Every command is a short upper-case code, optionally followed by a
//! numeric argument, e.g. `STX` or `HIV 500`. Each [`Command`] records how
//! its reply is validated; a reply that breaks the rule is reported as a
//! [`ProtocolInvariantError`].
//!
//! ```rust
//! # use c8033::{port::Port, backend::Backend};
//! # fn wrapper<B: Backend>(mut port: Port<B>) -> Result<(), Box<dyn std::error::Error>> {
//! println!("x-ray: {}", port.xray_status()?);
//! port.set_high_voltage(500)?;
//! if port.xray_on()? == "XON" {
//!     // ...
//!     port.xray_off()?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::{
	backend::Backend,
	error::{ArgumentOutOfRangeError, Error, ProtocolInvariantError},
	port::Port,
	reply::Reply,
};
use std::ops::RangeInclusive;

/// How the reply to a [`Command`] is validated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Validator {
	/// Any reply is accepted.
	None,
	/// The trimmed reply must equal this text.
	Literal(&'static str),
	/// The trimmed reply must be one of these values.
	OneOf(&'static [&'static str]),
}

impl Validator {
	/// Check a trimmed reply to the command `code`.
	pub fn check(self, code: &'static str, reply: &str) -> Result<(), ProtocolInvariantError> {
		match self {
			Validator::None => Ok(()),
			Validator::Literal(expected) if reply == expected => Ok(()),
			Validator::Literal(expected) => Err(ProtocolInvariantError::new(code, &[expected], reply)),
			Validator::OneOf(allowed) if allowed.contains(&reply) => Ok(()),
			Validator::OneOf(allowed) => Err(ProtocolInvariantError::new(code, allowed, reply)),
		}
	}
}

/// A command the controller understands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Command {
	code: &'static str,
	label: &'static str,
	validator: Validator,
}

impl Command {
	const fn new(code: &'static str, label: &'static str, validator: Validator) -> Self {
		Command {
			code,
			label,
			validator,
		}
	}

	/// Get the command code, e.g. `"STX"`.
	pub const fn code(&self) -> &'static str {
		self.code
	}

	/// Get a short human readable description.
	pub const fn label(&self) -> &'static str {
		self.label
	}

	/// Get how the reply is validated.
	pub const fn validator(&self) -> Validator {
		self.validator
	}
}

/// Reset the controller.
pub const RST: Command = Command::new("RST", "reset", Validator::None);
/// List the available commands.
pub const HLP: Command = Command::new("HLP", "help", Validator::None);
/// Turn x-rays on. Replies `XON` on success, anything else is a refusal.
pub const XON: Command = Command::new("XON", "x-ray on", Validator::None);
/// Turn x-rays off.
pub const XOF: Command = Command::new("XOF", "x-ray off", Validator::Literal("XOF"));
/// Set the tube voltage.
pub const HIV: Command = Command::new("HIV", "set high voltage", Validator::None);
/// Set the tube current.
pub const CUR: Command = Command::new("CUR", "set current", Validator::None);
/// Set the preheat tube voltage.
pub const PHV: Command = Command::new("PHV", "set preheat voltage", Validator::None);
/// Set the preheat tube current.
pub const PCU: Command = Command::new("PCU", "set preheat current", Validator::None);

/// X-ray emission status.
pub const STX: Command = Command::new("STX", "x-ray", Validator::None);
/// Tube voltage.
pub const SHV: Command = Command::new("SHV", "high voltage", Validator::None);
/// Tube current.
pub const SCU: Command = Command::new("SCU", "current", Validator::None);
/// Preheat tube voltage.
pub const SPV: Command = Command::new("SPV", "preheat voltage", Validator::None);
/// Preheat tube current.
pub const SPC: Command = Command::new("SPC", "preheat current", Validator::None);
/// Overload status.
pub const SOV: Command = Command::new("SOV", "overload", Validator::None);
/// Interlock status.
pub const SIN: Command = Command::new("SIN", "interlock", Validator::None);
/// Aging status.
pub const SAG: Command = Command::new("SAG", "aging", Validator::None);
/// Tube status.
pub const STS: Command = Command::new("STS", "status", Validator::None);
/// Ready status.
pub const SRB: Command = Command::new("SRB", "ready", Validator::None);
/// Whether the controller is in local or remote control.
pub const SRL: Command = Command::new(
	"SRL",
	"control",
	Validator::OneOf(&[ControlSource::LOCAL, ControlSource::REMOTE]),
);
/// Aging progress.
pub const DAG: Command = Command::new("DAG", "aging detail", Validator::None);
/// Error status.
pub const SER: Command = Command::new("SER", "error", Validator::None);

/// Every status query, in the order the controller lists them.
pub const STATUS: [Command; 13] = [STX, SHV, SCU, SPV, SPC, SOV, SIN, SAG, STS, SRB, SRL, DAG, SER];

/// The accepted range of [`HIV`] and [`PHV`] arguments.
pub const VOLTAGE_RANGE: RangeInclusive<u32> = 0..=1300;
/// The accepted range of [`CUR`] and [`PCU`] arguments.
pub const CURRENT_RANGE: RangeInclusive<u32> = 0..=300;

/// Who is in control of the controller, as reported by [`SRL`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ControlSource {
	/// The front panel.
	Local,
	/// The serial line.
	Remote,
}

impl ControlSource {
	const LOCAL: &'static str = "LOCAL";
	const REMOTE: &'static str = "REMOTE";

	/// Get the reply text for this value.
	pub fn as_str(self) -> &'static str {
		match self {
			ControlSource::Local => ControlSource::LOCAL,
			ControlSource::Remote => ControlSource::REMOTE,
		}
	}
}

impl std::fmt::Display for ControlSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl PartialEq<&str> for ControlSource {
	fn eq(&self, other: &&str) -> bool {
		self.as_str() == *other
	}
}

/// Generate one accessor per status query.
macro_rules! status_accessors {
	($($(#[$attr:meta])* $name:ident => $cmd:ident),+ $(,)?) => {
		$(
			$(#[$attr])*
			pub fn $name(&mut self) -> Result<String, Error> {
				self.run(&$cmd)
			}
		)+
	};
}

impl<B: Backend> Port<B> {
	/// Run a command from the table.
	///
	/// The trimmed reply is validated and returned.
	pub fn run(&mut self, command: &Command) -> Result<String, Error> {
		let reply = self.query(command.code())?;
		let trimmed = reply.trimmed();
		command.validator().check(command.code(), trimmed)?;
		Ok(trimmed.to_string())
	}

	/// Run a command that takes a numeric argument, e.g. `HIV 500`.
	fn run_with_argument(
		&mut self,
		command: &Command,
		value: u32,
		range: RangeInclusive<u32>,
	) -> Result<String, Error> {
		if !range.contains(&value) {
			return Err(ArgumentOutOfRangeError::new(command.code(), value, range).into());
		}
		let reply = self.query(&format!("{} {value}", command.code()))?;
		let trimmed = reply.trimmed();
		command.validator().check(command.code(), trimmed)?;
		Ok(trimmed.to_string())
	}

	/// Reset the controller (`RST`), returning the reply as-is.
	pub fn reset(&mut self) -> Result<Reply, Error> {
		self.query(RST.code())
	}

	/// List the available commands (`HLP`), returning the reply as-is.
	pub fn help(&mut self) -> Result<Reply, Error> {
		self.query(HLP.code())
	}

	/// Turn x-rays on (`XON`).
	///
	/// The controller replies `XON` when it complies and an error token
	/// otherwise; the trimmed reply is returned for the caller to interpret.
	pub fn xray_on(&mut self) -> Result<String, Error> {
		self.run(&XON)
	}

	/// Turn x-rays off (`XOF`).
	///
	/// Any reply other than `XOF` is a [`ProtocolInvariantError`].
	pub fn xray_off(&mut self) -> Result<(), Error> {
		self.run(&XOF).map(drop)
	}

	/// Set the tube voltage (`HIV`), in the controller's units (0 to 1300).
	pub fn set_high_voltage(&mut self, value: u32) -> Result<String, Error> {
		self.run_with_argument(&HIV, value, VOLTAGE_RANGE)
	}

	/// Set the tube current (`CUR`), in µA (0 to 300).
	pub fn set_current(&mut self, value: u32) -> Result<String, Error> {
		self.run_with_argument(&CUR, value, CURRENT_RANGE)
	}

	/// Set the preheat tube voltage (`PHV`), in the controller's units (0 to 1300).
	pub fn set_preheat_voltage(&mut self, value: u32) -> Result<String, Error> {
		self.run_with_argument(&PHV, value, VOLTAGE_RANGE)
	}

	/// Set the preheat tube current (`PCU`), in µA (0 to 300).
	pub fn set_preheat_current(&mut self, value: u32) -> Result<String, Error> {
		self.run_with_argument(&PCU, value, CURRENT_RANGE)
	}

	status_accessors! {
		/// Get the x-ray emission status (`STX`), e.g. `X-RAY OFF`.
		xray_status => STX,
		/// Get the tube voltage (`SHV`), e.g. `HIV 0.0kV`.
		high_voltage => SHV,
		/// Get the tube current (`SCU`), e.g. `CUR 0uA`.
		tube_current => SCU,
		/// Get the preheat tube voltage (`SPV`), e.g. `PHV 90.0kV`.
		preheat_voltage => SPV,
		/// Get the preheat tube current (`SPC`), e.g. `PCU 2uA`.
		preheat_current => SPC,
		/// Get the overload status (`SOV`), e.g. `NORMAL`.
		overload_status => SOV,
		/// Get the interlock status (`SIN`), e.g. `INTER LOCK ON`.
		interlock_status => SIN,
		/// Get the aging status (`SAG`), e.g. `AGING OFF`.
		aging_status => SAG,
		/// Get the tube status (`STS`), e.g. `NOT READY`.
		tube_status => STS,
		/// Get the ready status (`SRB`), e.g. `READY`.
		ready_status => SRB,
		/// Get the aging progress (`DAG`), e.g. `AGING 3 1 YET`.
		aging_detail => DAG,
		/// Get the error status (`SER`), e.g. `ERR 0`.
		error_status => SER,
	}

	/// Get whether the controller is in local or remote control (`SRL`).
	///
	/// Any reply other than `LOCAL` or `REMOTE` is a [`ProtocolInvariantError`].
	pub fn control_source(&mut self) -> Result<ControlSource, Error> {
		let reply = self.run(&SRL)?;
		if reply == ControlSource::LOCAL {
			Ok(ControlSource::Local)
		} else {
			Ok(ControlSource::Remote)
		}
	}

	/// Run every query in [`STATUS`], in order.
	///
	/// A failed query does not stop the report; its error is recorded in
	/// place of the value and the next query is sent.
	pub fn status_report(&mut self) -> Vec<(Command, Result<String, Error>)> {
		STATUS
			.into_iter()
			.map(|command| {
				let result = self.run(&command);
				if let Err(e) = &result {
					log::warn!("{}: {e}", command.code());
				}
				(command, result)
			})
			.collect()
	}
}
