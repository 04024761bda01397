//! 字节流 I/O 辅助模块
//!
//! 提供会话所需的三个底层原语：
//! - `copy_stream`：带短写重试的原始拷贝循环，源端 EOF 视为成功
//! - `HeaderReader`：读取到响应头结束符为止，并返回越界读取的剩余字节
//! - `write_vectored_all`：使用 write_vectored 合并多个缓冲区的写入
use crate::error::{RelayError, Result};
use bytes::{Bytes, BytesMut};
use std::io::{self, IoSlice};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// 客户端 -> 上游方向的拷贝缓冲区大小
pub const PASSTHROUGH_BUFFER_SIZE: usize = 4096;

/// 响应体尾部转发的拷贝缓冲区大小
pub const BODY_BUFFER_SIZE: usize = 32 * 1024;

/// HTTP 头部结束符
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 原始拷贝循环
///
/// 从 `reader` 读入固定大小的缓冲区，再把读到的字节完整写入 `writer`。
/// 写入不足时继续写剩余部分，直到整块数据写完。源端干净 EOF 时返回
/// 已拷贝的总字节数，其他读写错误直接返回。
pub async fn copy_stream<R, W>(reader: &mut R, writer: &mut W, buf_size: usize) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buf_size];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let mut offset = 0;
        while offset < n {
            match writer.write(&buf[offset..n]).await {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "failed to write whole buffer",
                    ))
                }
                Ok(written) => offset += written,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        writer.flush().await?;

        total += n as u64;
    }

    Ok(total)
}

/// 读取到头部结束符后的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    /// 结束符之前的头部字节（不含 `\r\n\r\n`）
    pub head: Bytes,
    /// 结束符之后已经读到的字节，可能为空，也可能包含部分或全部响应体
    pub leftover: Bytes,
}

/// 带缓冲的头部读取器
///
/// 底层一次读取可能返回结束符之后的更多字节，这些字节作为 `leftover`
/// 原样交还给调用者，不会丢失。
pub struct HeaderReader<R> {
    inner: R,
    buf: BytesMut,
    chunk_size: usize,
}

impl<R> HeaderReader<R> {
    /// 创建新的头部读取器
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, PASSTHROUGH_BUFFER_SIZE)
    }

    /// 指定单次读取的最大字节数
    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size: chunk_size.max(1),
        }
    }

    /// 消费读取器，返回内部读取器
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> HeaderReader<R> {
    /// 读取直到出现第一个 `\r\n\r\n`
    ///
    /// 上游在结束符出现之前关闭时返回 `HeaderTerminatorMissing`。
    pub async fn read_until_terminator(&mut self) -> Result<HeaderBlock> {
        let mut scanned = 0;

        loop {
            if let Some(pos) = find_subsequence(&self.buf[scanned..], HEADER_TERMINATOR) {
                let end = scanned + pos;
                let mut head = self.buf.split_to(end + HEADER_TERMINATOR.len());
                head.truncate(end);
                let leftover = self.buf.split();
                return Ok(HeaderBlock {
                    head: head.freeze(),
                    leftover: leftover.freeze(),
                });
            }
            // 结束符可能跨越两次读取，保留末尾 3 个字节重新扫描
            scanned = self
                .buf
                .len()
                .saturating_sub(HEADER_TERMINATOR.len() - 1);

            self.buf.reserve(self.chunk_size);
            let start = self.buf.len();
            self.buf.resize(start + self.chunk_size, 0);

            let n = match self.inner.read(&mut self.buf[start..]).await {
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                    self.buf.truncate(start);
                    continue;
                }
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(RelayError::Io(e));
                }
            };
            self.buf.truncate(start + n);

            if n == 0 {
                return Err(RelayError::header_terminator_missing(self.buf.len()));
            }
        }
    }
}

/// 查找子序列第一次出现的位置
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// 批量写入辅助函数 - 使用 write_vectored 减少系统调用
///
/// 写出的字节与依次调用 `write_all` 完全相同。
pub async fn write_vectored_all<W>(writer: &mut W, bufs: &[&[u8]]) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut pending: Vec<&[u8]> = bufs.iter().copied().filter(|b| !b.is_empty()).collect();
    if pending.is_empty() {
        return Ok(());
    }

    if pending.len() == 1 {
        writer.write_all(pending[0]).await?;
        return writer.flush().await;
    }

    let mut idx = 0;
    while idx < pending.len() {
        let result = {
            let slices: Vec<IoSlice<'_>> = pending[idx..].iter().map(|b| IoSlice::new(b)).collect();
            writer.write_vectored(&slices).await
        };

        match result {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write vectored data",
                ))
            }
            Ok(mut n) => {
                // 跳过已写入的字节，可能停在某个缓冲区中间
                while n > 0 && idx < pending.len() {
                    let current = pending[idx];
                    if n >= current.len() {
                        n -= current.len();
                        idx += 1;
                    } else {
                        pending[idx] = &current[n..];
                        n = 0;
                    }
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    writer.flush().await
}
