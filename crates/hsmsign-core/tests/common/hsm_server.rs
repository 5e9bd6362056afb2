//! Minimal scripted HTTP/1.1 server standing in for the HSM workload API.
//!
//! Each accepted connection reads one full request (head plus
//! `Content-Length` body), records it, writes the next canned response
//! verbatim and closes. Runs on a background thread until the process exits.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone, Default)]
pub struct Recorded {
    requests: Arc<Mutex<Vec<String>>>,
}

impl Recorded {
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

/// Starts a server answering connections with `responses` in order; once they
/// run out, connections are closed without a response. Returns the base URL
/// (e.g. "http://127.0.0.1:12345") and the request log.
pub fn start(responses: Vec<String>) -> (String, Recorded) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let recorded = Recorded::default();
    spawn_accept_loop(
        move || listener.accept().map(|(s, _)| s),
        responses,
        recorded.clone(),
    );
    (format!("http://127.0.0.1:{}", port), recorded)
}

/// Same as [`start`] but listening on a Unix socket at `path`.
#[cfg(unix)]
pub fn start_unix(path: &std::path::Path, responses: Vec<String>) -> Recorded {
    let listener = std::os::unix::net::UnixListener::bind(path).expect("bind unix");
    let recorded = Recorded::default();
    spawn_accept_loop(
        move || listener.accept().map(|(s, _)| s),
        responses,
        recorded.clone(),
    );
    recorded
}

fn spawn_accept_loop<A, S>(mut accept: A, responses: Vec<String>, recorded: Recorded)
where
    A: FnMut() -> std::io::Result<S> + Send + 'static,
    S: Read + Write + Send + 'static,
{
    let responses = Arc::new(Mutex::new(VecDeque::from(responses)));
    thread::spawn(move || {
        while let Ok(mut stream) = accept() {
            let request = read_request(&mut stream);
            recorded.requests.lock().unwrap().push(request);
            if let Some(response) = responses.lock().unwrap().pop_front() {
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        }
    });
}

/// Reads until the end of the head, then the declared body.
fn read_request<S: Read>(stream: &mut S) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        if let Some(head_end) = find(&data, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..head_end]).to_string();
            let body_len = content_length(&head);
            if data.len() >= head_end + 4 + body_len {
                break;
            }
        }
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(n, _)| n.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0)
}

/// JSON response with a correct Content-Length.
pub fn json_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    )
}
