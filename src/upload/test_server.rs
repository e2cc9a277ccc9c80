//! One-shot HTTP responder for upload tests

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

/// What the responder saw
#[derive(Debug, Default)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn content_length(&self) -> usize {
        self.header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

fn read_head(reader: &mut impl BufRead) -> CapturedRequest {
    let mut captured = CapturedRequest::default();
    reader.read_line(&mut captured.request_line).unwrap();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            captured.headers.push((k.trim().to_string(), v.trim().to_string()));
        }
    }
    captured
}

pub struct TestServer {
    pub url: String,
    handle: JoinHandle<CapturedRequest>,
}

impl TestServer {
    /// Answer one request with `status` and a JSON `body`
    pub fn respond(status: u16, body: &str) -> Self {
        Self::spawn(status, body.to_string(), Duration::ZERO)
    }

    /// Like [`respond`](Self::respond) but wait `delay` before answering
    pub fn respond_after(status: u16, body: &str, delay: Duration) -> Self {
        Self::spawn(status, body.to_string(), delay)
    }

    /// Read the body `chunk` bytes at a time, pausing between reads. Stops at
    /// end of stream, so a client that gives up leaves a short body.
    pub fn read_slowly(chunk: usize, pause: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut captured = read_head(&mut reader);
            let length = captured.content_length();

            let mut buf = vec![0; chunk];
            while captured.body.len() < length {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => captured.body.extend_from_slice(&buf[..n]),
                }
                std::thread::sleep(pause);
            }
            captured
        });

        Self { url, handle }
    }

    fn spawn(status: u16, body: String, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut captured = read_head(&mut reader);

            captured.body = vec![0; captured.content_length()];
            reader.read_exact(&mut captured.body).unwrap();

            std::thread::sleep(delay);

            let reason = if status < 400 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            let mut stream = stream;
            // The client may have given up already.
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
            captured
        });

        Self { url, handle }
    }

    /// Wait for the responder and return the request it captured
    pub fn request(self) -> CapturedRequest {
        self.handle.join().unwrap()
    }
}
