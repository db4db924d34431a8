//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! Most APIs can fail in more than one way and so return the higher level
//! [`Error`] enum. Every error type is convertible to [`Error`], allowing them
//! to be used with `?`, and can be recovered from it with [`TryFrom`]:
//!
//! ```
//! use c8033::error::{Error, ProtocolInvariantError};
//!
//! fn foo() -> Result<(), ProtocolInvariantError> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```

use std::{io, ops::RangeInclusive};

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
    (
        $name:path,
        $self:ident =>
        $display:literal
        $(,
            $($arg:expr),+
        )?
    ) => {
        impl std::error::Error for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    $display
                    $(,
                        $($arg),+
                    )?
                )
            }
        }
    };
}

/// Define an error enum that contains concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and its underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
macro_rules! error_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_attr:meta])*
                $variant:ident($inner:path)
            ),+
            $(,)?
        }
    ) => {
        $(
            #[$attr]
        )*
        pub enum $name {
            $(
                $(#[$variant_attr])*
                $variant($inner)
            ),+
        }

        impl std::error::Error for $name {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                match self {
                    $(
                        $name::$variant(e) => std::error::Error::source(e)
                    ),+
                }
            }
        }

        // Defer the display to the inner error type
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$variant(e) => e.fmt(f)
                    ),+
                }
            }
        }

        // Allow the enum to be convertible from an infallible error
        impl From<std::convert::Infallible> for $name {
            fn from(_: std::convert::Infallible) -> Self {
                unreachable!();
            }
        }

        $(
            impl From<$inner> for $name {
                fn from(other: $inner) -> Self {
                    $name::$variant(other)
                }
            }

            impl TryFrom<$name> for $inner {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $name::$variant(value) => Ok(value),
                        #[allow(unreachable_patterns)]
                        value => Err(value)
                    }
                }
            }
        )+
    };
}

/// No serial port could be opened.
///
/// Either no device path was given and none could be discovered, or the
/// operating system refused to open the port.
#[derive(Debug)]
pub struct PortOpenError(Box<(Option<Box<str>>, Box<str>)>);

impl PortOpenError {
    /// Create an error for a failed attempt to open `path`.
    pub(crate) fn new<S: Into<Box<str>>>(path: Option<&str>, reason: S) -> Self {
        PortOpenError(Box::new((path.map(Box::from), reason.into())))
    }

    /// The error returned when no device path could be resolved.
    pub(crate) fn no_device() -> Self {
        PortOpenError::new(None, "no serial device found, a path must be specified")
    }

    /// Get the path of the port, if one was resolved.
    pub fn path(&self) -> Option<&str> {
        self.0 .0.as_deref()
    }

    /// Get the reason the port could not be opened.
    pub fn reason(&self) -> &str {
        &self.0 .1
    }
}

impl_error_display! {
    PortOpenError,
    self => "failed to open serial port {}: {}", self.path().unwrap_or("<none>"), self.reason()
}

/// The port has already been closed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortClosedError(());

impl PortClosedError {
    pub(crate) fn new() -> Self {
        PortClosedError(())
    }
}

impl_error_display! {
    PortClosedError,
    self => "the port has been closed"
}

/// Writing a command to the port failed.
///
/// The device may have been disconnected. The write is not retried.
#[derive(Debug)]
pub struct WriteError(io::Error);

impl WriteError {
    pub(crate) fn new(err: io::Error) -> Self {
        WriteError(err)
    }

    /// Get the underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        &self.0
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl std::fmt::Display for WriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to write to the port: {}", self.0)
    }
}

impl From<WriteError> for io::Error {
    fn from(other: WriteError) -> Self {
        other.0
    }
}

/// The device reported a traceback in response to a command.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DeviceCommandError(Box<(Box<str>, Box<str>)>);

impl DeviceCommandError {
    pub(crate) fn new(command: &str, summary: String) -> Self {
        DeviceCommandError(Box::new((command.into(), summary.into_boxed_str())))
    }

    /// Get the command that failed.
    pub fn command(&self) -> &str {
        &self.0 .0
    }

    /// Get the reply on a single line, with line breaks replaced by `; `.
    pub fn summary(&self) -> &str {
        &self.0 .1
    }
}

impl_error_display! {
    DeviceCommandError,
    self => "failed command: {}, got: {}", self.command(), self.summary()
}

/// A reply ended without the prompt marker.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MissingPromptError(Box<(Box<str>, Box<str>)>);

impl MissingPromptError {
    pub(crate) fn new(command: &str, reply: String) -> Self {
        MissingPromptError(Box::new((command.into(), reply.into_boxed_str())))
    }

    /// Get the command that was sent.
    pub fn command(&self) -> &str {
        &self.0 .0
    }

    /// Get the text that was received.
    pub fn reply(&self) -> &str {
        &self.0 .1
    }
}

impl_error_display! {
    MissingPromptError,
    self => "no prompt received after {}: {:?}", self.command(), self.reply()
}

/// No line in a reply matched the expected pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoMatchError(Box<str>);

impl NoMatchError {
    pub(crate) fn new(pattern: &str) -> Self {
        NoMatchError(pattern.into())
    }

    /// Get the pattern that failed to match.
    pub fn pattern(&self) -> &str {
        &self.0
    }
}

impl_error_display! {
    NoMatchError,
    self => "failed to match re: {}", self.0
}

/// A line pattern was not a valid regular expression.
#[derive(Debug)]
pub struct InvalidPatternError(Box<regex::Error>);

impl InvalidPatternError {
    pub(crate) fn new(err: regex::Error) -> Self {
        InvalidPatternError(Box::new(err))
    }
}

impl std::error::Error for InvalidPatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}

impl std::fmt::Display for InvalidPatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid line pattern: {}", self.0)
    }
}

/// A reply broke a documented guarantee of the command that elicited it.
///
/// This indicates either firmware drift or a framing problem on the line.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ProtocolInvariantError(Box<(&'static str, Box<[&'static str]>, Box<str>)>);

impl ProtocolInvariantError {
    pub(crate) fn new(code: &'static str, allowed: &[&'static str], got: &str) -> Self {
        ProtocolInvariantError(Box::new((code, allowed.into(), got.into())))
    }

    /// Get the command code.
    pub fn code(&self) -> &'static str {
        self.0 .0
    }

    /// Get the replies the command is allowed to produce.
    pub fn allowed(&self) -> &[&'static str] {
        &self.0 .1
    }

    /// Get the reply that was received.
    pub fn got(&self) -> &str {
        &self.0 .2
    }
}

impl_error_display! {
    ProtocolInvariantError,
    self => "{} replied {:?}, expected one of {:?}", self.code(), self.got(), self.allowed()
}

/// The reply deadline passed before the line went idle.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ReplyTimeoutError(Box<[u8]>);

impl ReplyTimeoutError {
    pub(crate) fn new(partial: Vec<u8>) -> Self {
        ReplyTimeoutError(partial.into_boxed_slice())
    }

    /// Get the bytes received before the deadline.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl_error_display! {
    ReplyTimeoutError,
    self => "reply deadline passed after {} bytes", self.0.len()
}

/// Reading a reply was cancelled via a [`CancelToken`](crate::port::CancelToken).
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CancelledError(Box<[u8]>);

impl CancelledError {
    pub(crate) fn new(partial: Vec<u8>) -> Self {
        CancelledError(partial.into_boxed_slice())
    }

    /// Get the bytes received before cancellation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl_error_display! {
    CancelledError,
    self => "reading the reply was cancelled after {} bytes", self.0.len()
}

/// A command contained a character that cannot be sent as a single byte.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct UnencodableCharacterError(Box<(Box<str>, char)>);

impl UnencodableCharacterError {
    pub(crate) fn new(text: &str, character: char) -> Self {
        UnencodableCharacterError(Box::new((text.into(), character)))
    }

    /// Get the text that could not be encoded.
    pub fn text(&self) -> &str {
        &self.0 .0
    }

    /// Get the first offending character.
    pub fn character(&self) -> char {
        self.0 .1
    }
}

impl_error_display! {
    UnencodableCharacterError,
    self => "{:?} in {:?} is not a single-byte character", self.character(), self.text()
}

/// A command argument was outside the range the device accepts.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ArgumentOutOfRangeError(Box<(&'static str, u32, RangeInclusive<u32>)>);

impl ArgumentOutOfRangeError {
    pub(crate) fn new(code: &'static str, value: u32, range: RangeInclusive<u32>) -> Self {
        ArgumentOutOfRangeError(Box::new((code, value, range)))
    }

    /// Get the command code.
    pub fn code(&self) -> &'static str {
        self.0 .0
    }

    /// Get the rejected value.
    pub fn value(&self) -> u32 {
        self.0 .1
    }

    /// Get the accepted range.
    pub fn range(&self) -> &RangeInclusive<u32> {
        &self.0 .2
    }
}

impl_error_display! {
    ArgumentOutOfRangeError,
    self => "{} argument {} is outside {}..={}", self.code(), self.value(), self.range().start(), self.range().end()
}

error_enum! {
    /// Any error returned by this library.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum Error {
        /// See [`PortOpenError`].
        PortOpen(PortOpenError),
        /// See [`PortClosedError`].
        PortClosed(PortClosedError),
        /// See [`WriteError`].
        Write(WriteError),
        /// Reading from the port failed.
        Io(io::Error),
        /// See [`DeviceCommandError`].
        DeviceCommand(DeviceCommandError),
        /// See [`MissingPromptError`].
        MissingPrompt(MissingPromptError),
        /// See [`NoMatchError`].
        NoMatch(NoMatchError),
        /// See [`InvalidPatternError`].
        InvalidPattern(InvalidPatternError),
        /// See [`ProtocolInvariantError`].
        ProtocolInvariant(ProtocolInvariantError),
        /// See [`ReplyTimeoutError`].
        ReplyTimeout(ReplyTimeoutError),
        /// See [`CancelledError`].
        Cancelled(CancelledError),
        /// See [`UnencodableCharacterError`].
        UnencodableCharacter(UnencodableCharacterError),
        /// See [`ArgumentOutOfRangeError`].
        ArgumentOutOfRange(ArgumentOutOfRangeError),
    }
}

impl Error {
    /// A convenience function for determining if the error is due to a reply
    /// deadline passing.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::ReplyTimeout(_) => true,
            Error::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use static_assertions::{assert_impl_all, const_assert};

    // Keep Result<T, Error> small.
    const _WORD_SIZE: usize = std::mem::size_of::<&usize>();
    const_assert!(std::mem::size_of::<Error>() <= 3 * _WORD_SIZE);

    assert_impl_all!(Error: From<DeviceCommandError>, From<ProtocolInvariantError>, Send, Sync);
    assert_impl_all!(ProtocolInvariantError: TryFrom<Error>);
    assert_impl_all!(NoMatchError: TryFrom<Error>);

    #[test]
    fn display() {
        let err = DeviceCommandError::new("FOO", "Traceback (most recent call last):; oops".into());
        assert_eq!(
            err.to_string(),
            "failed command: FOO, got: Traceback (most recent call last):; oops"
        );

        let err = ProtocolInvariantError::new("XOF", &["XOF"], "ERROR");
        assert_eq!(err.to_string(), r#"XOF replied "ERROR", expected one of ["XOF"]"#);

        let err = PortOpenError::no_device();
        assert!(err.path().is_none());
        assert!(err.to_string().starts_with("failed to open serial port <none>"));
    }

    #[test]
    fn try_from_round_trip() {
        let err: Error = NoMatchError::new("^HIV").into();
        assert!(!err.is_timeout());
        let err = PortClosedError::try_from(err).unwrap_err();
        let err = NoMatchError::try_from(err).unwrap();
        assert_eq!(err.pattern(), "^HIV");

        let err: Error = ReplyTimeoutError::new(b"X-RAY".to_vec()).into();
        assert!(err.is_timeout());
    }
}
