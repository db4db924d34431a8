//! Type commands at a C8033 controller and print its replies.
//!
//! ```text
//! cargo run --example interactive -- /dev/ttyUSB0
//! ```

use c8033::{port::OpenSerialOptions, reply::normalize_line_endings};
use clap::Parser;
use simple_logger::SimpleLogger;
use std::{
	io::{self, BufRead as _, Write as _},
	time::Duration,
};

/// Interactive command line for a C8033 controller.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
	/// Path to the serial port. Defaults to the first USB serial adapter.
	port: Option<String>,

	/// How long the line must be quiet to end a reply, in milliseconds.
	#[arg(long, default_value_t = 100)]
	idle_ms: u64,

	/// Trace all traffic.
	#[arg(short, long)]
	verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let cli = Cli::parse();
	SimpleLogger::new()
		.with_level(if cli.verbose {
			log::LevelFilter::Info
		} else {
			log::LevelFilter::Warn
		})
		.init()?;

	let mut options = OpenSerialOptions::new();
	options
		.idle_window(Duration::from_millis(cli.idle_ms))
		.verbose(cli.verbose);
	let mut port = match &cli.port {
		Some(path) => options.open(path)?,
		None => options.open_default()?,
	};

	// Discard anything the controller sent before we connected.
	port.wait_rx()?;
	println!("Type HLP for help");
	println!("Waiting for input...");

	let stdin = io::stdin();
	let mut stdout = io::stdout();
	loop {
		print!("> ");
		stdout.flush()?;
		let mut line = String::new();
		if stdin.lock().read_line(&mut line)? == 0 {
			break;
		}
		let result = port
			.send_command(line.trim())
			.and_then(|()| port.wait_rx());
		match result {
			Ok(rx) => println!("{}", normalize_line_endings(&rx)),
			Err(e) => eprintln!("error: {e}"),
		}
	}
	Ok(())
}
