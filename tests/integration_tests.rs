mod common;

use common::{get_available_port, send_request, start_relay, start_upstream_server, wait_until};
use std::sync::atomic::Ordering;

/// 把请求行中的路径作为响应体返回
fn echo_path(request: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(request);
    let path = text
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("?")
        .to_string();
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
        path.len(),
        path
    )
    .into_bytes()
}

#[tokio::test]
async fn test_http10_response_gets_injected_header() {
    let (upstream_addr, accepted, _upstream) = start_upstream_server(echo_path).await;
    let (relay_addr, stats, _relay) = start_relay(&upstream_addr.to_string()).await;

    let response = send_request(relay_addr, b"GET /hello HTTP/1.0\r\nHost: test\r\n\r\n")
        .await
        .unwrap();

    assert_eq!(
        response,
        b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nFoo: Bar\r\n\r\n/hello".to_vec()
    );
    assert_eq!(accepted.load(Ordering::SeqCst), 1);

    assert!(wait_until(|| stats.snapshot().active_sessions == 0, 100).await);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.total_sessions, 1);
    assert_eq!(snapshot.cycles, 1);
    assert_eq!(snapshot.failed_sessions, 0);
    assert_eq!(snapshot.bytes_to_client, response.len() as u64);
}

#[tokio::test]
async fn test_http11_client_close_ends_session() {
    let (upstream_addr, _, _upstream) = start_upstream_server(echo_path).await;
    let (relay_addr, stats, _relay) = start_relay(&upstream_addr.to_string()).await;

    let response = send_request(relay_addr, b"GET /keep HTTP/1.1\r\nHost: test\r\n\r\n")
        .await
        .unwrap();

    assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with(b"Foo: Bar\r\n\r\n/keep"));

    assert!(wait_until(|| stats.snapshot().active_sessions == 0, 100).await);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.cycles, 1);
    assert_eq!(snapshot.failed_sessions, 0);
}

#[tokio::test]
async fn test_concurrent_sessions_do_not_interleave() {
    let (upstream_addr, accepted, _upstream) = start_upstream_server(echo_path).await;
    let (relay_addr, stats, _relay) = start_relay(&upstream_addr.to_string()).await;

    let (first, second) = tokio::join!(
        send_request(relay_addr, b"GET /first HTTP/1.0\r\n\r\n"),
        send_request(relay_addr, b"GET /second HTTP/1.0\r\n\r\n"),
    );

    assert_eq!(
        first.unwrap(),
        b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\nFoo: Bar\r\n\r\n/first".to_vec()
    );
    assert_eq!(
        second.unwrap(),
        b"HTTP/1.1 200 OK\r\nContent-Length: 7\r\nFoo: Bar\r\n\r\n/second".to_vec()
    );

    // 每个会话各自拨号一次上游
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
    assert!(wait_until(|| stats.snapshot().active_sessions == 0, 100).await);
    assert_eq!(stats.snapshot().total_sessions, 2);
}

#[tokio::test]
async fn test_response_body_arrives_intact() {
    let body: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let expected_body = body.clone();
    let (upstream_addr, _, _upstream) = start_upstream_server(move |_| {
        let mut response =
            format!("HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n", body.len()).into_bytes();
        response.extend_from_slice(&body);
        response
    })
    .await;
    let (relay_addr, _, _relay) = start_relay(&upstream_addr.to_string()).await;

    let response = send_request(relay_addr, b"GET /big HTTP/1.0\r\n\r\n")
        .await
        .unwrap();

    let head = b"HTTP/1.0 200 OK\r\nContent-Length: 200000\r\nFoo: Bar\r\n\r\n";
    assert_eq!(&response[..head.len()], &head[..]);
    assert_eq!(&response[head.len()..], &expected_body[..]);
}

#[tokio::test]
async fn test_upstream_without_header_terminator() {
    let (upstream_addr, _, _upstream) =
        start_upstream_server(|_| b"HTTP/1.1 200 OK\r\nA: 1\r\n".to_vec()).await;
    let (relay_addr, stats, _relay) = start_relay(&upstream_addr.to_string()).await;

    let response = send_request(relay_addr, b"GET / HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    assert!(response.is_empty());
    assert!(wait_until(|| stats.snapshot().failed_sessions == 1, 100).await);
    assert_eq!(stats.snapshot().cycles, 0);
}

#[tokio::test]
async fn test_upstream_unavailable() {
    let unused = format!("127.0.0.1:{}", get_available_port());
    let (relay_addr, stats, _relay) = start_relay(&unused).await;

    // 会话在读取请求之前就结束，连接可能被复位
    match send_request(relay_addr, b"GET / HTTP/1.1\r\n\r\n").await {
        Ok(response) => assert!(response.is_empty()),
        Err(e) => assert!(!e.contains("Timeout"), "unexpected error: {}", e),
    }

    assert!(wait_until(|| stats.snapshot().failed_sessions == 1, 100).await);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.bytes_to_upstream, 0);
    assert_eq!(snapshot.active_sessions, 0);
}

#[tokio::test]
async fn test_relay_keeps_accepting_after_failed_session() {
    let (upstream_addr, _, _upstream) = start_upstream_server(|request| {
        if request.starts_with(b"GET /broken") {
            b"garbage without end".to_vec()
        } else {
            echo_path(request)
        }
    })
    .await;
    let (relay_addr, stats, _relay) = start_relay(&upstream_addr.to_string()).await;

    let broken = send_request(relay_addr, b"GET /broken HTTP/1.0\r\n\r\n")
        .await
        .unwrap();
    assert!(broken.is_empty());

    let ok = send_request(relay_addr, b"GET /ok HTTP/1.0\r\n\r\n")
        .await
        .unwrap();
    assert!(ok.ends_with(b"Foo: Bar\r\n\r\n/ok"));

    assert!(wait_until(|| stats.snapshot().total_sessions == 2, 100).await);
    assert!(wait_until(|| stats.snapshot().failed_sessions == 1, 100).await);
}
