//! HTTP Relay 库入口
//!
//! 将核心模块导出为库，方便测试和复用
pub mod cli;
pub mod config;
pub mod error;
pub mod io_util;
pub mod keepalive;
pub mod relay;
pub mod request;
pub mod server;
pub mod session;
pub mod stats;
pub mod upstream;

// 重新导出常用类型
pub use config::RelayConfig;
pub use error::{RelayError, Result};
pub use keepalive::{should_keep_alive, HttpVersion};
pub use relay::HeaderInjection;
pub use request::RequestMeta;
pub use server::{run_server, RelayServer};
pub use session::{Session, SessionEnd, SessionSummary};
pub use stats::{RelayStats, RelayStatsSnapshot};
pub use upstream::{TcpConnector, Transport, UpstreamConnector};
