//! 响应转发
//!
//! 上游 -> 客户端方向：找到响应头结束位置，追加一行固定头部，
//! 然后把剩余的响应体原样转发给客户端。
use crate::error::Result;
use crate::io_util::{
    copy_stream, write_vectored_all, HeaderReader, BODY_BUFFER_SIZE, HEADER_TERMINATOR,
    PASSTHROUGH_BUFFER_SIZE,
};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

/// 默认注入的头部行
pub const DEFAULT_INJECT_HEADER: &str = "Foo: Bar";

const CRLF: &[u8] = b"\r\n";

/// 响应头注入
///
/// 无状态变换：在头部块末尾、结束空行之前追加一行。其他头部不做任何
/// 检查、去重或删除。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInjection {
    line: Bytes,
}

impl HeaderInjection {
    /// 使用指定的头部行，例如 `"Foo: Bar"`
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: Bytes::from(line.into()),
        }
    }

    /// 注入的头部行
    pub fn line(&self) -> &[u8] {
        &self.line
    }

    /// 对不含结束符的头部块应用注入，返回带 `\r\n\r\n` 的完整头部块
    ///
    /// 按 CRLF 切分后追加一行再用 CRLF 拼回，结果等价于
    /// `head + CRLF + line + CRLF CRLF`。
    pub fn apply(&self, head: &[u8]) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(head.len() + CRLF.len() + self.line.len() + HEADER_TERMINATOR.len());
        out.extend_from_slice(head);
        out.extend_from_slice(CRLF);
        out.extend_from_slice(&self.line);
        out.extend_from_slice(HEADER_TERMINATOR);
        out
    }
}

impl Default for HeaderInjection {
    fn default() -> Self {
        Self::new(DEFAULT_INJECT_HEADER)
    }
}

/// 转发一个响应：注入头部后流式转发响应体，直到上游 EOF
///
/// 返回写给客户端的总字节数。上游在头部结束前关闭时返回
/// `HeaderTerminatorMissing`，此时不会向客户端写入任何字节。
pub async fn relay_response<R, W>(
    upstream: &mut R,
    client: &mut W,
    injection: &HeaderInjection,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let block = {
        let mut reader = HeaderReader::with_chunk_size(&mut *upstream, PASSTHROUGH_BUFFER_SIZE);
        reader.read_until_terminator().await?
    };

    let header = injection.apply(&block.head);
    trace!(
        header_len = header.len(),
        leftover = block.leftover.len(),
        injected = %String::from_utf8_lossy(injection.line()),
        "Response headers rewritten"
    );

    write_vectored_all(client, &[header.as_slice(), &block.leftover[..]]).await?;

    let body = copy_stream(upstream, client, BODY_BUFFER_SIZE).await?;

    Ok((header.len() + block.leftover.len()) as u64 + body)
}
