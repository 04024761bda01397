//! 上游连接抽象
//!
//! 会话只依赖 `UpstreamConnector`，生产环境使用 `TcpConnector`，
//! 测试中可以替换为内存中的脚本化流。
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// 可用作会话两端的字节流
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

// 为所有满足条件的类型自动实现 Transport
impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// 上游拨号接口
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// 拨号得到的连接类型
    type Stream: Transport;

    /// 建立一条到上游的新连接
    async fn connect(&self) -> Result<Self::Stream>;

    /// 上游地址（用于日志）
    fn addr(&self) -> &str;
}

/// 固定地址的 TCP 上游
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    nodelay: bool,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            nodelay: true,
        }
    }

    /// 是否在上游连接上设置 TCP_NODELAY
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

#[async_trait]
impl UpstreamConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| RelayError::connection_failed(&self.addr, e))?;

        if self.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY on upstream connection: {}", e);
            }
        }

        debug!(upstream = %self.addr, "Connected to upstream");
        Ok(stream)
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}
