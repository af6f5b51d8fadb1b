//! Shared test infrastructure for integration tests.
//!
//! Each integration test compiles this module separately and uses only a
//! subset of it.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};
use std::thread;
use tempfile::TempDir;

/// Minimal canned-response HTTP registry bound to a loopback port.
///
/// Serves `GET /<package>` from the response map; anything else gets a 404.
/// The listener thread is detached and dies with the test process.
pub struct StubRegistry {
    address: String,
}

impl StubRegistry {
    pub fn serve(responses: HashMap<String, (u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub registry");
        let address = format!("http://{}", listener.local_addr().expect("local addr"));
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    continue;
                };
                let mut raw = Vec::new();
                let mut buffer = [0u8; 1024];
                loop {
                    match stream.read(&mut buffer) {
                        Ok(0) => break,
                        Ok(n) => {
                            raw.extend_from_slice(&buffer[..n]);
                            if raw.windows(4).any(|window| window == b"\r\n\r\n") {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                let request = String::from_utf8_lossy(&raw);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .trim_start_matches('/')
                    .to_string();
                let (status, body) = responses
                    .get(&path)
                    .cloned()
                    .unwrap_or((404, "{}".to_string()));
                let reason = if status == 200 { "OK" } else { "Not Found" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Self { address }
    }

    pub fn url(&self) -> &str {
        &self.address
    }
}

/// Canned registry body for one package.
pub fn registry_body(name: &str, version: &str) -> String {
    format!(
        r#"{{ "Package": "{name}", "Version": "{version}", "MD5sum": "0123456789abcdef0123456789abcdef", "Repository": "CRAN" }}"#
    )
}

/// Scratch project populated with fixture files (relative path, contents).
pub fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("temp project");
    for (rel, contents) in files {
        let path = dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(&path, contents).expect("write fixture");
    }
    dir
}

/// Project config pointing the registry at a stub.
pub fn registry_config(url: &str) -> String {
    format!(r#"{{ "registry": "{url}", "timeout_ms": 5000 }}"#)
}

/// Run the drydock binary against a project and capture its output.
pub fn run_drydock(project_root: &Path, args: &[&str]) -> Output {
    let binary = env!("CARGO_BIN_EXE_drydock");
    Command::new(binary)
        .args(args)
        .arg("--project")
        .arg(project_root)
        .output()
        .expect("run drydock")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}
