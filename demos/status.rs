//! Print every status value a C8033 controller reports.
//!
//! ```text
//! cargo run --example status
//! ```

use c8033::port::OpenSerialOptions;
use clap::Parser;
use simple_logger::SimpleLogger;

/// Print the status of a C8033 controller.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
	/// Path to the serial port. Defaults to the first USB serial adapter.
	port: Option<String>,

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
	options.verbose(cli.verbose);
	let mut port = match &cli.port {
		Some(path) => options.open(path)?,
		None => options.open_default()?,
	};

	for (command, result) in port.status_report() {
		let label = format!("{}:", command.label());
		match result {
			Ok(value) => println!("{label:<16}{value}"),
			Err(e) => println!("{label:<16}error: {e}"),
		}
	}
	Ok(())
}
