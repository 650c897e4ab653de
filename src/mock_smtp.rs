//! A scripted SMTP endpoint for exercising the dispatcher without a network.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the endpoint answers a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Accept,
    RejectAuth,
    RejectRecipient,
    /// Accepts the TCP connection but never sends a greeting.
    Silent,
}

#[derive(Debug, Default, Clone)]
pub struct Delivery {
    pub mail_from: String,
    pub rcpt_to: Vec<String>,
    pub data: String,
}

impl Delivery {
    pub fn header(&self, name: &str) -> Option<&str> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.data
            .lines()
            .take_while(|line| !line.is_empty())
            .find(|line| line.to_ascii_lowercase().starts_with(&prefix))
            .map(|line| line[prefix.len()..].trim())
    }
}

/// What the endpoint saw during one session.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    pub auth_attempts: usize,
    pub deliveries: Vec<Delivery>,
    pub quit: bool,
}

pub struct MockSmtp {
    listener: TcpListener,
    script: Script,
}

impl MockSmtp {
    pub async fn bind(script: Script) -> MockSmtp {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        MockSmtp { listener, script }
    }

    pub fn addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap()
    }

    /// Serves `sessions` connections one after another, returning a transcript per session.
    pub fn serve(self, sessions: usize) -> JoinHandle<Vec<Transcript>> {
        tokio::spawn(async move {
            let mut transcripts = Vec::with_capacity(sessions);
            for _ in 0..sessions {
                let (stream, _) = self.listener.accept().await.unwrap();
                transcripts.push(session(stream, self.script).await);
            }
            transcripts
        })
    }

    pub fn into_listener(self) -> TcpListener {
        self.listener
    }
}

async fn session(stream: TcpStream, script: Script) -> Transcript {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut transcript = Transcript::default();
    let mut current = Delivery::default();

    if script == Script::Silent {
        // Hold the socket until the client gives up.
        while let Ok(Some(_)) = lines.next_line().await {}
        return transcript;
    }

    write.write_all(b"220 mock.local ESMTP ready\r\n").await.unwrap();

    // The session ends when the client sends QUIT or hangs up.
    while let Ok(Some(line)) = lines.next_line().await {
        let upper = line.to_ascii_uppercase();
        let reply: &[u8] = if upper.starts_with("EHLO") || upper.starts_with("HELO") {
            b"250-mock.local\r\n250 AUTH PLAIN LOGIN\r\n"
        } else if upper.starts_with("AUTH") {
            transcript.auth_attempts += 1;
            match script {
                Script::RejectAuth => b"535 5.7.8 Username and Password not accepted\r\n",
                _ => b"235 2.7.0 Authentication successful\r\n",
            }
        } else if upper.starts_with("MAIL FROM:") {
            current = Delivery {
                mail_from: angle_addr(&line),
                ..Delivery::default()
            };
            b"250 2.1.0 OK\r\n"
        } else if upper.starts_with("RCPT TO:") {
            match script {
                Script::RejectRecipient => b"550 5.1.1 no such user\r\n",
                _ => {
                    current.rcpt_to.push(angle_addr(&line));
                    b"250 2.1.5 OK\r\n"
                }
            }
        } else if upper == "DATA" {
            write.write_all(b"354 Go ahead\r\n").await.unwrap();
            while let Ok(Some(data_line)) = lines.next_line().await {
                if data_line == "." {
                    break;
                }
                current.data.push_str(&data_line);
                current.data.push('\n');
            }
            transcript.deliveries.push(std::mem::take(&mut current));
            b"250 2.0.0 OK queued\r\n"
        } else if upper == "QUIT" {
            transcript.quit = true;
            let _ = write.write_all(b"221 2.0.0 Bye\r\n").await;
            break;
        } else {
            b"250 OK\r\n"
        };
        if write.write_all(reply).await.is_err() {
            break;
        }
    }

    transcript
}

fn angle_addr(line: &str) -> String {
    match (line.find('<'), line.find('>')) {
        (Some(start), Some(end)) if start < end => line[start + 1..end].to_string(),
        _ => String::new(),
    }
}
