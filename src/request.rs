//! 请求元数据扫描
//!
//! 只对本轮从客户端读到的原始字节做子串扫描，不校验请求格式，
//! 也不跟踪 Content-Length / chunked 分帧。
//!
//! Connection 头名按 HTTP 规范忽略大小写匹配，行尾的 `\r` 可有可无，
//! 因此 `connection: close` 和只用 `\n` 分行的请求同样会结束会话。
use crate::io_util::find_subsequence;
use crate::keepalive::{should_keep_alive, HttpVersion};

const VERSION_MARKER: &[u8] = b"HTTP/";
const CONNECTION_HEADER: &[u8] = b"Connection:";

/// 从一次客户端读取中提取的协议元数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// 第一个 `HTTP/` 之后的版本号
    pub version: HttpVersion,
    /// 第一个 Connection 头的值（已去除首尾空白）
    pub connection: Option<String>,
}

impl RequestMeta {
    /// 扫描一段原始请求字节
    pub fn scan(chunk: &[u8]) -> Self {
        Self {
            version: scan_version(chunk),
            connection: scan_connection(chunk),
        }
    }

    /// 本轮结束后是否保持连接
    pub fn keep_alive(&self) -> bool {
        should_keep_alive(self.version, self.connection.as_deref())
    }
}

/// 取第一个 `HTTP/` 之后的三个字节作为版本号，之后至少还要有一个字节
fn scan_version(chunk: &[u8]) -> HttpVersion {
    match find_subsequence(chunk, VERSION_MARKER) {
        Some(idx) if chunk.len() > idx + 8 => {
            let token = &chunk[idx + 5..idx + 8];
            std::str::from_utf8(token)
                .map(HttpVersion::from_token)
                .unwrap_or(HttpVersion::Unknown)
        }
        _ => HttpVersion::Unknown,
    }
}

fn scan_connection(chunk: &[u8]) -> Option<String> {
    chunk.split(|&b| b == b'\n').find_map(|line| {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() < CONNECTION_HEADER.len()
            || !line[..CONNECTION_HEADER.len()].eq_ignore_ascii_case(CONNECTION_HEADER)
        {
            return None;
        }
        let value = String::from_utf8_lossy(&line[CONNECTION_HEADER.len()..]);
        Some(value.trim().to_string())
    })
}
