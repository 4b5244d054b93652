//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use emoji_proxy::config::ProxyConfig;
use emoji_proxy::http::HttpServer;
use emoji_proxy::lifecycle::Shutdown;
use emoji_proxy::rewrite::DecorationSequencer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// `<html><body><li>Banana</li><p>Hello friend</p></body></html>`, gzipped.
pub const GZIP_FRUIT_PAGE: [u8; 70] = [
    0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x03, 0xb3, 0xc9, 0x28, 0xc9, 0xcd, 0xb1,
    0xb3, 0x49, 0xca, 0x4f, 0xa9, 0xb4, 0xb3, 0xc9, 0xc9, 0xb4, 0x73, 0x4a, 0xcc, 0x03, 0x42, 0x1b,
    0x7d, 0x20, 0xd3, 0xa6, 0xc0, 0xce, 0x23, 0x35, 0x27, 0x27, 0x5f, 0x21, 0xad, 0x28, 0x33, 0x35,
    0x2f, 0xc5, 0x46, 0xbf, 0xc0, 0xce, 0x46, 0x1f, 0xa2, 0x50, 0x1f, 0xac, 0x0b, 0x00, 0x61, 0x08,
    0xe1, 0xb9, 0x3c, 0x00, 0x00, 0x00,
];

/// What a mock origin writes back.
#[derive(Debug, Clone)]
pub struct OriginReply {
    pub status_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl OriginReply {
    pub fn html(body: &str) -> Self {
        Self::new("200 OK", body.as_bytes()).header("Content-Type", "text/html; charset=utf-8")
    }

    pub fn new(status: &str, body: &[u8]) -> Self {
        Self {
            status_line: status.to_string(),
            headers: Vec::new(),
            body: body.to_vec(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {}\r\n", self.status_line);
        for (name, value) in &self.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        if !self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        {
            out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        out.push_str("Connection: close\r\n\r\n");
        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Read until the end of the request head so the peer never sees a reset.
async fn read_head(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Start a mock origin on an ephemeral port answering with `f()`.
pub async fn start_programmable_origin<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OriginReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_head(&mut socket).await;
                        let reply = f().await;
                        tokio::time::sleep(reply.delay).await;
                        let _ = socket.write_all(&reply.to_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Start a mock origin that always gives the same reply.
pub async fn start_origin(reply: OriginReply) -> SocketAddr {
    start_programmable_origin(move || {
        let reply = reply.clone();
        async move { reply }
    })
    .await
}

/// An address with nothing listening on it.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub sequencer: Arc<DecorationSequencer>,
    pub shutdown: Shutdown,
}

/// Start the proxy on an ephemeral port.
pub async fn start_proxy(mut config: ProxyConfig) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let server = HttpServer::new(config).unwrap();
    let sequencer = server.sequencer().clone();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningProxy {
        addr,
        sequencer,
        shutdown,
    }
}

/// A response as it came off the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Send one request with `target` as the literal request target and read the
/// whole response. Panics if the proxy does not answer within 10 seconds.
pub async fn raw_request(proxy: SocketAddr, method: &str, target: &str) -> RawResponse {
    let exchange = async {
        let mut stream = TcpStream::connect(proxy).await.unwrap();
        let request = format!(
            "{method} {target} HTTP/1.1\r\nHost: {proxy}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        raw
    };
    let raw = tokio::time::timeout(Duration::from_secs(10), exchange)
        .await
        .expect("proxy left the connection hanging");
    parse_response(&raw)
}

pub async fn raw_get(proxy: SocketAddr, target: &str) -> RawResponse {
    raw_request(proxy, "GET", target).await
}

fn parse_response(raw: &[u8]) -> RawResponse {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response head terminator");
    let head = String::from_utf8_lossy(&raw[..split]).into_owned();
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap();
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts.next().unwrap();
    let status = parts.next().unwrap().parse().unwrap();
    let reason = parts.next().unwrap_or_default().to_string();

    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    RawResponse {
        status,
        reason,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}
