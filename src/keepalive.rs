//! 长连接判定
//!
//! 根据请求的 HTTP 版本和 Connection 头决定本轮结束后会话是否继续。
use std::fmt;

/// 请求中识别出的 HTTP 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpVersion {
    /// HTTP/1.0
    Http10,
    /// HTTP/1.1
    Http11,
    /// 未找到或无法识别
    #[default]
    Unknown,
}

impl HttpVersion {
    /// 从 `HTTP/` 之后的版本号文本解析，例如 `"1.1"`
    pub fn from_token(token: &str) -> Self {
        match token.trim() {
            "1.0" => Self::Http10,
            "1.1" => Self::Http11,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpVersion::Http10 => write!(f, "HTTP/1.0"),
            HttpVersion::Http11 => write!(f, "HTTP/1.1"),
            HttpVersion::Unknown => write!(f, "unknown"),
        }
    }
}

/// 判断连接是否应当保持
///
/// | 版本 | Connection 头 | 结果 |
/// |---|---|---|
/// | 1.0 | `keep-alive` | 保持 |
/// | 1.0 | 其他或缺失 | 关闭 |
/// | 1.1 | `close` | 关闭 |
/// | 1.1 | 其他或缺失 | 保持 |
/// | 未知 | 任意 | 关闭 |
///
/// Connection 头比较前会去除首尾空白并忽略大小写。
pub fn should_keep_alive(version: HttpVersion, connection: Option<&str>) -> bool {
    let connection = connection.map(str::trim).unwrap_or("");

    match version {
        HttpVersion::Http10 => connection.eq_ignore_ascii_case("keep-alive"),
        HttpVersion::Http11 => !connection.eq_ignore_ascii_case("close"),
        HttpVersion::Unknown => false,
    }
}
