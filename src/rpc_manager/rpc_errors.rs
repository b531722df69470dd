use solana_client::client_error::ClientError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the ledger RPC collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Errors returned by the RPC node itself
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    #[error("Blockhash not found (endpoint: {endpoint})")]
    BlockhashNotFound { endpoint: String },

    #[error("Transaction expired (endpoint: {endpoint})")]
    TransactionExpired { endpoint: String },

    #[error("Account not found: {account} (endpoint: {endpoint})")]
    AccountNotFound { account: String, endpoint: String },

    #[error("Insufficient funds (endpoint: {endpoint})")]
    InsufficientFunds { endpoint: String },

    /// Response arrived but could not be interpreted
    #[error("Decode error for {account}: {message}")]
    Decode { account: String, message: String },

    /// Transaction was refused during simulation or by the node
    #[error("Transaction rejected: {0}")]
    Rejected(String),
}

impl RpcError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            RpcError::Transport { .. } => true,
            RpcError::Timeout { .. } => true,
            RpcError::RateLimitExceeded { .. } => true,
            RpcError::BlockhashNotFound { .. } => true,

            RpcError::TransactionExpired { .. } => false,
            RpcError::AccountNotFound { .. } => false,
            RpcError::InsufficientFunds { .. } => false,
            RpcError::Decode { .. } => false,
            RpcError::Rejected(_) => false,

            // Retry on server errors (5xx)
            RpcError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
        }
    }

    /// Short category label for metrics and logs
    pub fn category(&self) -> &'static str {
        match self {
            RpcError::Transport { .. } => "transport",
            RpcError::Timeout { .. } => "timeout",
            RpcError::RpcResponse { .. } => "rpc_response",
            RpcError::RateLimitExceeded { .. } => "rate_limit",
            RpcError::BlockhashNotFound { .. } => "blockhash_not_found",
            RpcError::TransactionExpired { .. } => "expired",
            RpcError::AccountNotFound { .. } => "account_not_found",
            RpcError::InsufficientFunds { .. } => "insufficient_funds",
            RpcError::Decode { .. } => "decode",
            RpcError::Rejected(_) => "rejected",
        }
    }

    /// Classify a client error by its message
    pub fn from_client_error(err: ClientError, endpoint: &str) -> Self {
        let err_str = err.to_string().to_lowercase();
        let endpoint = endpoint.to_string();

        if err_str.contains("blockhash not found") {
            RpcError::BlockhashNotFound { endpoint }
        } else if err_str.contains("transaction expired")
            || err_str.contains("block height exceeded")
        {
            RpcError::TransactionExpired { endpoint }
        } else if err_str.contains("account not found") {
            RpcError::AccountNotFound {
                account: "unknown".to_string(),
                endpoint,
            }
        } else if err_str.contains("insufficient funds")
            || err_str.contains("insufficient lamports")
        {
            RpcError::InsufficientFunds { endpoint }
        } else if err_str.contains("rate limit")
            || err_str.contains("too many requests")
            || err_str.contains("429")
        {
            RpcError::RateLimitExceeded { endpoint }
        } else if err_str.contains("timeout") || err_str.contains("timed out") {
            RpcError::Timeout {
                endpoint,
                timeout_ms: 0,
            }
        } else if err_str.contains("transaction simulation failed")
            || err_str.contains("custom program error")
        {
            RpcError::Rejected(err.to_string())
        } else {
            let code = err_str
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_matches(|c: char| !c.is_ascii_digit() && c != '-').parse::<i64>().ok());

            RpcError::RpcResponse {
                endpoint,
                message: err.to_string(),
                code,
            }
        }
    }
}

/// Retry policy for idempotent read calls. Transaction sends are never
/// retried here; the node's own `max_retries` covers rebroadcast.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), or `None` once exhausted
    pub fn calculate_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        Some(Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64))
    }

    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(RpcError::Transport {
            endpoint: "test".to_string(),
            message: "connection failed".to_string(),
        }
        .is_retryable());

        assert!(RpcError::RpcResponse {
            endpoint: "test".to_string(),
            message: "bad gateway".to_string(),
            code: Some(502),
        }
        .is_retryable());

        assert!(!RpcError::Rejected("custom program error: 0x177a".to_string()).is_retryable());
        assert!(!RpcError::TransactionExpired {
            endpoint: "test".to_string(),
        }
        .is_retryable());
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(
            RpcError::BlockhashNotFound {
                endpoint: "x".to_string()
            }
            .category(),
            "blockhash_not_found"
        );
        assert_eq!(RpcError::Rejected(String::new()).category(), "rejected");
    }

    #[test]
    fn test_retry_policy_delay() {
        let policy = RetryPolicy::default();
        let first = policy.calculate_delay(0).unwrap();
        let second = policy.calculate_delay(1).unwrap();
        assert!(second >= first);
        assert!(policy.calculate_delay(2).is_none());
        assert!(RetryPolicy::none().calculate_delay(0).is_none());
    }
}
