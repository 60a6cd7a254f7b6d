//! Errors for the configuration and request stages.
//!
//! Lookup failures never show up here: the list evaluator absorbs them as
//! "accept".

use thiserror::Error;

/// Result alias for the configuration and request stages.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a run before any list is queried.
#[derive(Error, Debug)]
pub enum Error {
    /// Config file or request stream could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config document is not valid YAML or has the wrong shape.
    #[error("invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// No config path was given on the command line.
    #[error("no config file supplied")]
    NoConfig,

    /// Config parsed but failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Request line is missing or not valid JSON.
    #[error("invalid request: {0}")]
    Request(String),

    /// Request carried something that is not an IP address.
    #[error("corrupt ip address {0}")]
    CorruptIp(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Request(e.to_string())
    }
}
