use std::fmt::Display;

#[derive(Debug)]
pub enum Error {
    /// An identifier failed the field guard and would have reached SQL text.
    InjectionRejected(String),
    /// The database driver returned an error. The message is carried verbatim.
    QueryFailed(String),
    /// The sum row could not populate the sum destination.
    InvalidSumDestination(String),
    InvalidArgument(String),
    Deserialize(String),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InjectionRejected(ident) => write!(f, "Illegal identifier: {}", ident),
            Error::QueryFailed(err) => write!(f, "Query failed: {}", err),
            Error::InvalidSumDestination(err) => write!(f, "Invalid sum destination: {}", err),
            Error::InvalidArgument(err) => write!(f, "Invalid argument: {}", err),
            Error::Deserialize(err) => write!(f, "Deserialization error: {}", err),
        }
    }
}

impl std::error::Error for Error {}
