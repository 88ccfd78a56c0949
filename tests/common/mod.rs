//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use tempfile::TempDir;

/// Scratch workspace holding a `packages/` tree and an output directory.
pub struct PackageFixture {
    temp_dir: TempDir,
}

/// Captured run of the `pkgidx` binary.
#[derive(Debug)]
pub struct RunResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<Output> for RunResult {
    fn from(output: Output) -> Self {
        RunResult {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

impl PackageFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(temp_dir.path().join("packages")).expect("create packages dir");
        PackageFixture { temp_dir }
    }

    #[allow(dead_code)]
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root().join("packages")
    }

    pub fn write_package(&self, rel: &str, doc: &Value) {
        let path = self.packages_dir().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create package parent");
        }
        let text = serde_json::to_string_pretty(doc).expect("serialize package");
        fs::write(&path, text).expect("write package");
    }

    #[allow(dead_code)]
    pub fn write_raw(&self, rel: &str, text: &str) {
        fs::write(self.packages_dir().join(rel), text).expect("write raw package");
    }

    /// Run `pkgidx <args...>` with the fixture root as working directory.
    pub fn run(&self, args: &[&str]) -> RunResult {
        Command::new(env!("CARGO_BIN_EXE_pkgidx"))
            .args(args)
            .current_dir(self.root())
            .env_remove("RUST_LOG")
            .env_remove("HTTP_PROXY")
            .env_remove("http_proxy")
            .env_remove("HTTPS_PROXY")
            .env_remove("https_proxy")
            .env_remove("ALL_PROXY")
            .env_remove("all_proxy")
            .output()
            .expect("run pkgidx")
            .into()
    }

    #[allow(dead_code)]
    pub fn read_json(&self, rel: &str) -> Value {
        let text = fs::read_to_string(self.root().join(rel)).expect("read output");
        serde_json::from_str(&text).expect("parse output")
    }
}

/// A document that passes validation, with a single oras source.
#[allow(dead_code)]
pub fn valid_package(name: &str, query: &str, oci_ref: &str) -> Value {
    json!({
        "name": name,
        "version": "1.0.0",
        "query": query,
        "description": format!("{name} artifacts"),
        "maintainer": {"name": "Ada", "email": "ada@example.org"},
        "tags": ["linux-x64"],
        "sources": [
            {"type": "oras", "repo": "example/demo", "rel": "v1.0.0", "oci-ref": oci_ref}
        ]
    })
}

/// Serve `200 OK` for paths starting with `/ok`, `404` for everything else.
/// Returns the base URL, e.g. `http://127.0.0.1:4242`.
#[allow(dead_code)]
pub fn serve_downloads() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
    let addr = listener.local_addr().expect("stub address");
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else {
                continue;
            };
            let mut reader = BufReader::new(&stream);
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }
            loop {
                let mut header = String::new();
                match reader.read_line(&mut header) {
                    Ok(0) | Err(_) => break,
                    Ok(_) if header.trim_end().is_empty() => break,
                    Ok(_) => {}
                }
            }
            let path = request_line.split_whitespace().nth(1).unwrap_or("/");
            let status = if path.starts_with("/ok") {
                "200 OK"
            } else {
                "404 Not Found"
            };
            let response =
                format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            let mut writer = &stream;
            let _ = writer.write_all(response.as_bytes());
            let _ = writer.flush();
        }
    });
    format!("http://{addr}")
}
