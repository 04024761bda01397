//! 监听器
//!
//! 接受客户端连接，为每条连接启动一个独立的会话任务。不限制并发会话数，
//! accept 出错只记录日志并继续。
use crate::config::RelayConfig;
use crate::relay::HeaderInjection;
use crate::session::Session;
use crate::stats::RelayStats;
use crate::upstream::{TcpConnector, UpstreamConnector};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// 已绑定的转发服务
pub struct RelayServer<U> {
    listener: TcpListener,
    connector: Arc<U>,
    injection: HeaderInjection,
    stats: RelayStats,
    nodelay: bool,
}

impl RelayServer<TcpConnector> {
    /// 按配置绑定监听地址，上游使用 TCP 拨号
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind relay to {}", config.listen_addr))?;

        let connector = TcpConnector::new(config.upstream_addr.clone()).with_nodelay(config.nodelay);

        Ok(Self::with_connector(
            listener,
            Arc::new(connector),
            HeaderInjection::new(config.inject_header.clone()),
        )
        .with_nodelay(config.nodelay))
    }
}

impl<U> RelayServer<U>
where
    U: UpstreamConnector + 'static,
{
    /// 使用已绑定的监听器和自定义上游
    pub fn with_connector(listener: TcpListener, connector: Arc<U>, injection: HeaderInjection) -> Self {
        Self {
            listener,
            connector,
            injection,
            stats: RelayStats::new(),
            nodelay: true,
        }
    }

    /// 是否在客户端连接上设置 TCP_NODELAY
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// 实际监听地址
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to get relay listen address")
    }

    /// 共享的统计信息
    pub fn stats(&self) -> RelayStats {
        self.stats.clone()
    }

    /// 运行 accept 循环
    pub async fn run(self) -> Result<()> {
        info!(
            "Relay listening on {}, forwarding to {}",
            self.local_addr()?,
            self.connector.addr()
        );

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            if self.nodelay {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("Failed to set TCP_NODELAY: {}", e);
                }
            }

            let session = Session::new(stream, self.injection.clone(), self.stats.clone());
            info!("Accepted connection from {} (session {})", peer_addr, session.id());

            let connector = Arc::clone(&self.connector);
            let stats = self.stats.clone();
            tokio::spawn(async move {
                // 错误已在会话内部记录
                let _ = session.run(connector.as_ref()).await;
                debug!("Relay stats: {:?}", stats.snapshot());
            });
        }
    }
}

/// 按配置启动转发服务
pub async fn run_server(config: RelayConfig) -> Result<()> {
    RelayServer::bind(&config).await?.run().await
}
