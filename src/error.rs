//! 自定义错误类型
//!
//! 使用 thiserror 定义会话层的精确错误，调用者可以据此区分
//! 拨号失败、响应头缺失和普通 I/O 错误
use std::io;
use thiserror::Error;

/// HTTP Relay 的主要错误类型
#[derive(Error, Debug)]
pub enum RelayError {
    /// 连接上游失败
    #[error("Failed to connect to {addr}: {source}")]
    ConnectionFailed {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// 上游在发送完整响应头之前关闭了连接
    #[error("Upstream closed before end of response headers ({received} bytes received)")]
    HeaderTerminatorMissing { received: usize },

    /// I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 其他错误（保留与 anyhow 的兼容性）
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// 创建连接失败错误
    pub fn connection_failed(addr: impl Into<String>, source: io::Error) -> Self {
        Self::ConnectionFailed {
            addr: addr.into(),
            source,
        }
    }

    /// 创建响应头缺失错误
    pub fn header_terminator_missing(received: usize) -> Self {
        Self::HeaderTerminatorMissing { received }
    }

    /// 检查是否为拨号失败
    pub fn is_connection_failed(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// 检查是否为响应头缺失
    pub fn is_header_terminator_missing(&self) -> bool {
        matches!(self, Self::HeaderTerminatorMissing { .. })
    }
}
