//! A one-shot HTTP endpoint that records a request and answers with a fixed status.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Default, Clone)]
pub struct Request {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub struct MockHttp {
    listener: TcpListener,
    status: u16,
    body: &'static str,
}

impl MockHttp {
    pub async fn bind(status: u16, body: &'static str) -> MockHttp {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        MockHttp {
            listener,
            status,
            body,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    /// Answers a single request, then closes the connection.
    pub fn serve(self) -> JoinHandle<Request> {
        tokio::spawn(async move {
            let (stream, _) = self.listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = Request::default();

            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            request.request_line = line.trim_end().to_string();

            loop {
                line.clear();
                reader.read_line(&mut line).await.unwrap();
                let header = line.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((key, value)) = header.split_once(':') {
                    request
                        .headers
                        .push((key.trim().to_string(), value.trim().to_string()));
                }
            }

            let length = request
                .header("content-length")
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(0);
            let mut body = vec![0; length];
            reader.read_exact(&mut body).await.unwrap();
            request.body = String::from_utf8(body).unwrap();

            let response = format!(
                "HTTP/1.1 {} {}\r\n\
                 Content-Type: application/json\r\n\
                 Content-Length: {}\r\n\
                 X-Message-Id: mock-message-id\r\n\
                 Connection: close\r\n\
                 \r\n\
                 {}",
                self.status,
                reason(self.status),
                self.body.len(),
                self.body
            );
            let stream = reader.get_mut();
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;

            request
        })
    }

    pub fn into_listener(self) -> TcpListener {
        self.listener
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        202 => "Accepted",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        _ => "Unknown",
    }
}
