use thiserror::Error;

/// Failure classification for enrollment operations.
///
/// The kinds mirror what a caller can do about the problem: `Config` and
/// `Credentials` are fixable on the client side, `Directory` means the
/// domain refused or returned bad data, `Fail` is a generic local failure
/// such as keytab I/O, and `Unexpected` indicates a bug in this crate or
/// its environment.
#[derive(Error, Debug)]
pub enum Error {
    /// Programmer or environment bug; retrying will not help.
    #[error("unexpected failure: {0}")]
    Unexpected(String),

    /// Generic local failure, such as being unable to write the keytab.
    #[error("{0}")]
    Fail(String),

    /// The directory or KDC said no, or the data it holds is malformed.
    #[error("directory error: {0}")]
    Directory(String),

    /// Caller-provided or discovered configuration is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The login credentials are invalid or lack permission.
    #[error("credentials error: {0}")]
    Credentials(String),
}

pub type Result<T> = std::result::Result<T, Error>;
