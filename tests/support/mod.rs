#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SAMPLE_CSV: &str = "\
Name,Math,Science,English,Attendance (%),Strengths,Weaknesses,Comments,Suggestions,Parent Feedback
Sam,85,78,92,95,Reading,Fractions,\"Works hard, asks questions\",Practice math daily,
Ava,91,88,79,98.5,Science labs,Essay structure,Curious,Read more,Thanks for the update
Sam,60,70,65,80,Art,Spelling,Needs focus,Use flashcards,
";

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn write_sample(dir: &Path) -> PathBuf {
    let p = dir.join("ptm_data.csv");
    std::fs::write(&p, SAMPLE_CSV).expect("write sample csv");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

/// Spawns ptmd against `data_file`. `api` is `Some((base_url, key))` to
/// enable suggestions.
pub fn spawn_sidecar(workspace: &Path, data_file: &Path, api: Option<(&str, &str)>) -> Sidecar {
    spawn_sidecar_with_env(workspace, data_file, api, &[])
}

/// Like `spawn_sidecar`, with `extra_env` applied last.
pub fn spawn_sidecar_with_env(
    workspace: &Path,
    data_file: &Path,
    api: Option<(&str, &str)>,
    extra_env: &[(&str, &str)],
) -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_ptmd");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env("PTMD_DATA_FILE", data_file)
        .env("PTMD_SECRETS_FILE", workspace.join("no-secrets.toml"))
        .env("PTMD_TIMEOUT_SECS", "5")
        .env_remove("GEMINI_API_KEY");
    for proxy in [
        "HTTP_PROXY",
        "HTTPS_PROXY",
        "ALL_PROXY",
        "http_proxy",
        "https_proxy",
        "all_proxy",
    ] {
        cmd.env_remove(proxy);
    }
    if let Some((base, key)) = api {
        cmd.env("PTMD_API_BASE", base).env("GEMINI_API_KEY", key);
    }
    for (k, v) in extra_env {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn ptmd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

impl Sidecar {
    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{}", payload).expect("write request");
        self.stdin.flush().expect("flush request");
        let value = self.read_response(method);
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(json!({}))
    }

    pub fn request_err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write raw line");
        self.stdin.flush().expect("flush raw line");
        self.read_response("raw")
    }

    fn read_response(&mut self, method: &str) -> serde_json::Value {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .expect("read response line");
        assert!(!line.trim().is_empty(), "empty response for {}", method);
        serde_json::from_str(line.trim()).expect("parse response json")
    }

    pub fn shutdown(self) {
        let Sidecar {
            mut child, stdin, ..
        } = self;
        drop(stdin);
        let _ = child.wait();
    }
}

/// One-shot HTTP stub: answers the first request with `status` and `body`,
/// then hands back the raw request text.
pub fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    let handle = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let raw = read_http_request(&mut stream);
        let resp = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(resp.as_bytes()).expect("write stub response");
        stream.flush().expect("flush stub response");
        raw
    });
    (format!("http://{addr}"), handle)
}

fn read_http_request(stream: &mut std::net::TcpStream) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).expect("read request");
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= pos + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// A local address with nothing listening on it.
pub fn closed_port_base() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}
