//! Structured errors for the offcache host shell.
//!
//! Every error becomes an `error` reply line carrying a stable code.

use crate::handler::HostReply;

/// Structured errors for the host shell.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// A stdin line was not a valid host command.
    #[error("INVALID_INPUT: {0}")]
    InvalidCommand(String),

    /// The worker rejected or failed the event.
    #[error(transparent)]
    Worker(#[from] offcache_core::Error),

    /// Reading commands or writing replies failed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl ShellError {
    pub fn code(&self) -> &'static str {
        match self {
            ShellError::InvalidCommand(_) => "INVALID_INPUT",
            ShellError::Worker(e) => e.code(),
            ShellError::Io(_) => "IO_ERROR",
        }
    }
}

impl From<ShellError> for HostReply {
    fn from(err: ShellError) -> Self {
        HostReply::Error { code: err.code(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_error_keeps_code() {
        let err = ShellError::from(offcache_core::Error::Network("down".into()));
        assert_eq!(err.code(), "NETWORK_ERROR");

        let reply: HostReply = err.into();
        assert!(matches!(reply, HostReply::Error { code: "NETWORK_ERROR", .. }));
    }

    #[test]
    fn test_invalid_command_reply() {
        let reply: HostReply = ShellError::InvalidCommand("missing field `event`".into()).into();
        match reply {
            HostReply::Error { code, message } => {
                assert_eq!(code, "INVALID_INPUT");
                assert!(message.contains("event"));
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }
}
