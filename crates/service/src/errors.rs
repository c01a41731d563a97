use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("wrong type for key {0}")]
    WrongType(String),
}

impl ServiceError {
    pub fn protocol(msg: impl Into<String>) -> Self { Self::Protocol(msg.into()) }

    /// Transport-level failures that a fresh connection may cure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        let io = ServiceError::from(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        assert!(io.is_retryable());
        assert!(ServiceError::Timeout("connect".into()).is_retryable());
        assert!(ServiceError::ConnectionClosed.is_retryable());
        assert!(!ServiceError::Server("ERR unknown command".into()).is_retryable());
        assert!(!ServiceError::WrongType("domain".into()).is_retryable());
        assert!(!ServiceError::protocol("bad frame").is_retryable());
    }
}
