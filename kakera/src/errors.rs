//! Definition of errors.

use std::error::Error;
use std::fmt;

pub type Result<T, E = KakeraError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum KakeraError {
    Load(LoadError),
    Range(RangeError),
    Configuration(ConfigurationError),
    Concurrency(ConcurrencyError),
    DecodeError(bincode::error::DecodeError),
    EncodeError(bincode::error::EncodeError),
    IOError(std::io::Error),
}

impl KakeraError {
    pub(crate) fn load<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Load(LoadError { msg: msg.into() })
    }

    pub(crate) const fn out_of_range(id: u32, size: usize) -> Self {
        Self::Range(RangeError { id, size })
    }

    pub(crate) fn configuration<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Configuration(ConfigurationError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn concurrency<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Concurrency(ConcurrencyError { msg: msg.into() })
    }
}

impl fmt::Display for KakeraError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Load(e) => e.fmt(f),
            Self::Range(e) => e.fmt(f),
            Self::Configuration(e) => e.fmt(f),
            Self::Concurrency(e) => e.fmt(f),
            Self::DecodeError(e) => e.fmt(f),
            Self::EncodeError(e) => e.fmt(f),
            Self::IOError(e) => e.fmt(f),
        }
    }
}

impl Error for KakeraError {}

/// Error used when a model cannot be loaded.
#[derive(Debug)]
pub struct LoadError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LoadError: {}", self.msg)
    }
}

impl Error for LoadError {}

/// Error used when a piece id is outside the vocabulary.
#[derive(Debug)]
pub struct RangeError {
    /// The rejected id.
    pub(crate) id: u32,

    /// Size of the vocabulary.
    pub(crate) size: usize,
}

impl RangeError {
    /// Gets the rejected id.
    pub const fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RangeError: piece id {} is out of range [0, {})",
            self.id, self.size
        )
    }
}

impl Error for RangeError {}

/// Error used when an option or an argument is invalid for the loaded model.
#[derive(Debug)]
pub struct ConfigurationError {
    /// Name of the argument.
    pub(crate) arg: &'static str,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConfigurationError: {}: {}", self.arg, self.msg)
    }
}

impl Error for ConfigurationError {}

/// Error used when a non-reentrant process-wide resource is already held.
#[derive(Debug)]
pub struct ConcurrencyError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for ConcurrencyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConcurrencyError: {}", self.msg)
    }
}

impl Error for ConcurrencyError {}

impl From<bincode::error::DecodeError> for KakeraError {
    fn from(error: bincode::error::DecodeError) -> Self {
        Self::DecodeError(error)
    }
}

impl From<bincode::error::EncodeError> for KakeraError {
    fn from(error: bincode::error::EncodeError) -> Self {
        Self::EncodeError(error)
    }
}

impl From<std::io::Error> for KakeraError {
    fn from(error: std::io::Error) -> Self {
        Self::IOError(error)
    }
}
