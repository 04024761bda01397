//! 客户端会话
//!
//! 一个会话独占一条客户端连接和一条上游长连接。每一轮（cycle）：
//! 1. 从客户端读取最多 4096 字节，视为一个请求
//! 2. 扫描请求元数据（HTTP 版本、Connection 头）
//! 3. 把读到的字节原样写给上游
//! 4. 并发运行两个方向的转发，等待两者都结束
//! 5. 根据长连接判定决定继续下一轮还是关闭
//!
//! 单次读取并不对应真实的 HTTP 分帧，流水线请求或跨多次读取的请求体
//! 不会被正确切分；请求体中出现的 `HTTP/` 或 `Connection:` 也会参与判定。
use crate::error::{RelayError, Result};
use crate::io_util::{copy_stream, PASSTHROUGH_BUFFER_SIZE};
use crate::relay::{relay_response, HeaderInjection};
use crate::request::RequestMeta;
use crate::stats::RelayStats;
use crate::upstream::{Transport, UpstreamConnector};
use std::fmt;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 会话正常结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionEnd {
    /// 客户端在两轮之间关闭了连接（读到 0 字节）
    #[default]
    ClientClosed,
    /// 最后一轮的请求不要求保持连接
    NotKeepAlive,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::ClientClosed => write!(f, "client closed"),
            SessionEnd::NotKeepAlive => write!(f, "not keep-alive"),
        }
    }
}

/// 会话结束时的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// 完成的轮数
    pub cycles: u64,
    /// 已完成轮次中写给上游的字节数（包括每轮首次读取和透传部分）
    pub bytes_to_upstream: u64,
    /// 已完成轮次中写给客户端的字节数（包括注入的头部）
    pub bytes_to_client: u64,
    /// 结束原因
    pub end: SessionEnd,
}

/// 一条客户端连接对应的会话
pub struct Session<C> {
    id: Uuid,
    client: C,
    injection: HeaderInjection,
    stats: RelayStats,
}

impl<C: Transport> Session<C> {
    pub fn new(client: C, injection: HeaderInjection, stats: RelayStats) -> Self {
        Self {
            id: Uuid::new_v4(),
            client,
            injection,
            stats,
        }
    }

    /// 会话 ID（用于日志）
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 运行会话直到结束
    ///
    /// 先拨号上游，失败时直接返回，不读取任何客户端字节。无论以何种方式
    /// 结束，两条连接都会被关闭。
    pub async fn run<U>(self, connector: &U) -> Result<SessionSummary>
    where
        U: UpstreamConnector + ?Sized,
    {
        let Session {
            id,
            client,
            injection,
            stats,
        } = self;
        let _guard = stats.session_started();

        let upstream = match connector.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                error_event(id, &e);
                stats.session_failed();
                return Err(e);
            }
        };
        info!("Session {}: connected to upstream {}", id, connector.addr());

        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);

        let mut summary = SessionSummary::default();
        let mut cycles = CycleRunner {
            id,
            injection: &injection,
            stats: &stats,
            summary: &mut summary,
        };
        let result = cycles
            .run(
                &mut client_read,
                &mut client_write,
                &mut upstream_read,
                &mut upstream_write,
            )
            .await;

        // 关闭两条连接，错误只记录不返回
        if let Err(e) = client_write.shutdown().await {
            debug!("Session {}: client shutdown error: {}", id, e);
        }
        if let Err(e) = upstream_write.shutdown().await {
            debug!("Session {}: upstream shutdown error: {}", id, e);
        }

        match result {
            Ok(end) => {
                summary.end = end;
                info!(
                    "Session {}: closed ({}) after {} cycle(s), {} bytes up, {} bytes down",
                    id, end, summary.cycles, summary.bytes_to_upstream, summary.bytes_to_client
                );
                Ok(summary)
            }
            Err(e) => {
                error_event(id, &e);
                stats.session_failed();
                Err(e)
            }
        }
    }
}

fn error_event(id: Uuid, err: &RelayError) {
    match err {
        RelayError::ConnectionFailed { .. } => warn!("Session {}: {}", id, err),
        RelayError::HeaderTerminatorMissing { .. } => {
            warn!("Session {}: malformed upstream response: {}", id, err)
        }
        _ => warn!("Session {}: terminated: {}", id, err),
    }
}

/// 会话主循环所需的借用状态
struct CycleRunner<'a> {
    id: Uuid,
    injection: &'a HeaderInjection,
    stats: &'a RelayStats,
    summary: &'a mut SessionSummary,
}

impl CycleRunner<'_> {
    async fn run<CR, CW, UR, UW>(
        &mut self,
        client_read: &mut CR,
        client_write: &mut CW,
        upstream_read: &mut UR,
        upstream_write: &mut UW,
    ) -> Result<SessionEnd>
    where
        CR: AsyncRead + Unpin,
        CW: AsyncWrite + Unpin,
        UR: AsyncRead + Unpin,
        UW: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; PASSTHROUGH_BUFFER_SIZE];

        loop {
            let n = match client_read.read(&mut buf).await {
                Ok(0) => return Ok(SessionEnd::ClientClosed),
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            let chunk = &buf[..n];
            let meta = RequestMeta::scan(chunk);
            debug!(
                "Session {}: request chunk {} bytes, version {}, connection {:?}",
                self.id, n, meta.version, meta.connection
            );

            upstream_write.write_all(chunk).await?;
            upstream_write.flush().await?;

            // 两个方向并发运行，本轮在两者都结束后才算完成
            let (response, passthrough) = tokio::join!(
                relay_response(&mut *upstream_read, &mut *client_write, self.injection),
                copy_stream(&mut *client_read, &mut *upstream_write, PASSTHROUGH_BUFFER_SIZE),
            );

            // 字节数只在整轮成功后计入
            let (to_client, to_upstream) = match (response, passthrough) {
                (Ok(down), Ok(up)) => (down, n as u64 + up),
                (Err(e), passthrough) => {
                    if let Err(other) = passthrough {
                        debug!("Session {}: client -> upstream copy error: {}", self.id, other);
                    }
                    return Err(e);
                }
                (Ok(_), Err(e)) => return Err(e.into()),
            };
            self.complete_cycle(to_upstream, to_client);

            if !meta.keep_alive() {
                info!("Session {}: connection closing (not keep-alive)", self.id);
                return Ok(SessionEnd::NotKeepAlive);
            }
            info!("Session {}: connection kept alive for next request", self.id);
        }
    }

    fn complete_cycle(&mut self, to_upstream: u64, to_client: u64) {
        self.summary.cycles += 1;
        self.summary.bytes_to_upstream += to_upstream;
        self.summary.bytes_to_client += to_client;
        self.stats.cycle_completed();
        self.stats.add_bytes_to_upstream(to_upstream);
        self.stats.add_bytes_to_client(to_client);
    }
}
