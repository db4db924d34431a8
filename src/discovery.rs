//! Finding the serial port a controller is most likely connected to.
//!
//! The controller is normally attached through a USB serial adapter. On
//! Linux those show up as `/dev/ttyUSB<n>` and the lowest-numbered one is
//! used. On other platforms there is no reliable naming scheme, so no default
//! is offered and a path must be given explicitly.

/// The prefix of USB serial adapters on Linux.
#[cfg(any(test, target_os = "linux"))]
const USB_SERIAL_PREFIX: &str = "/dev/ttyUSB";

/// Get the path of the default port, if there is one.
///
/// ```rust
/// # use c8033::discovery::default_port;
/// match default_port() {
///     Some(path) => println!("using {path}"),
///     None => println!("no controller found"),
/// }
/// ```
#[cfg(target_os = "linux")]
pub fn default_port() -> Option<String> {
	let ports = match serialport::available_ports() {
		Ok(ports) => ports,
		Err(e) => {
			log::debug!("cannot list serial ports: {}", e.description);
			return None;
		}
	};
	let path = pick(ports.into_iter().map(|info| info.port_name));
	log::debug!("default port: {path:?}");
	path
}

/// Get the path of the default port, if there is one.
///
/// There is never a default on this platform.
#[cfg(not(target_os = "linux"))]
pub fn default_port() -> Option<String> {
	None
}

/// Pick the lowest-numbered USB serial adapter.
#[cfg(any(test, target_os = "linux"))]
fn pick<I: IntoIterator<Item = String>>(names: I) -> Option<String> {
	names
		.into_iter()
		.filter_map(|name| adapter_number(&name).map(|n| (n, name)))
		.min_by_key(|(n, _)| *n)
		.map(|(_, name)| name)
}

/// Get `n` from a `/dev/ttyUSB<n>` path.
#[cfg(any(test, target_os = "linux"))]
fn adapter_number(name: &str) -> Option<u32> {
	name.strip_prefix(USB_SERIAL_PREFIX)?.parse().ok()
}
