pub mod dx7;

use std::fmt;
use std::io;

/// Error type for parameter access, packing, message framing and transport.
#[derive(Debug)]
pub enum Error {
    Range { name: &'static str, value: i32, first: i32, last: i32 },
    NotFound(String),  // unknown field name or index
    Length { actual: usize, expected: usize },
    ReadOnly(&'static str),
    Format(String),
    Transport(String),
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Range { name, value, first, last } =>
                write!(f, "{} must be in range [{}...{}], got {}.", name, first, last, value),
            Error::NotFound(what) => write!(f, "No such parameter: {}.", what),
            Error::Length { actual, expected } =>
                write!(f, "Got {} bytes of data, expected {} bytes.", actual, expected),
            Error::ReadOnly(name) => write!(f, "Parameter {} is derived and cannot be set.", name),
            Error::Format(message) => write!(f, "Invalid System Exclusive data: {}.", message),
            Error::Transport(message) => write!(f, "Transport failed: {}.", message),
            Error::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// A checksum that did not match its payload.
///
/// Not fatal: dumps with a bad checksum are still parsed, and this value
/// is handed back to the caller next to the result.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub struct ChecksumMismatch {
    pub actual: u8,  // found in the message
    pub expected: u8,  // computed from the payload
}

impl fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Checksum in message was {:02X}H, computed {:02X}H.", self.actual, self.expected)
    }
}

// Define associated consts in a trait, but don't give them a value.
// Let the implementor of the trait do that.
pub trait Ranged: Sized {
    const NAME: &'static str;
    const FIRST: i32;
    const LAST: i32;
    const DEFAULT: i32;

    fn new(value: i32) -> Result<Self, Error>;
    fn value(&self) -> i32;
    fn contains(value: i32) -> bool;
    fn random() -> Self;
}

// The `ranged_impl` macro generates an implementation of the `Ranged` trait,
// along with implementations of the `Default` and `Display` traits based on
// the values supplied as parameters (type name, display name, first, last, default).
#[macro_export]
macro_rules! ranged_impl {
    ($typ:ident, $name:expr, $first:expr, $last:expr, $default:expr) => {
        impl $crate::Ranged for $typ {
            const NAME: &'static str = $name;
            const FIRST: i32 = $first;
            const LAST: i32 = $last;
            const DEFAULT: i32 = $default;

            fn new(value: i32) -> Result<Self, $crate::Error> {
                if Self::contains(value) {
                    Ok(Self(value))
                }
                else {
                    Err($crate::Error::Range {
                        name: Self::NAME,
                        value,
                        first: Self::FIRST,
                        last: Self::LAST,
                    })
                }
            }

            fn value(&self) -> i32 { self.0 }

            fn contains(value: i32) -> bool {
                value >= Self::FIRST && value <= Self::LAST
            }

            fn random() -> Self {
                use rand::Rng;
                let mut rng = rand::rng();
                Self(rng.random_range(Self::FIRST..=Self::LAST))
            }
        }

        impl Default for $typ {
            fn default() -> Self {
                Self($default)
            }
        }

        impl std::fmt::Display for $typ {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    }
}
