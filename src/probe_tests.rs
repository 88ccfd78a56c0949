use super::*;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
struct StubRequest {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
}

impl StubRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Minimal HTTP/1.1 server answering each connection with one canned response.
struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<StubRequest>>>,
}

impl StubServer {
    fn start<F>(respond: F) -> Self
    where
        F: Fn(&StubRequest, SocketAddr) -> String + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let addr = listener.local_addr().expect("stub address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    continue;
                };
                let Some(request) = read_request(&stream) else {
                    continue;
                };
                let response = respond(&request, addr);
                seen.lock().expect("lock requests").push(request);
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });
        StubServer { addr, requests }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().expect("lock requests").clone()
    }
}

fn read_request(stream: &std::net::TcpStream) -> Option<StubRequest> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let mut headers = Vec::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((key, value)) = header.split_once(':') {
            headers.push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }
    Some(StubRequest {
        method,
        target,
        headers,
    })
}

fn response(status: &str, extra_headers: &[(&str, String)], body: &str) -> String {
    let mut out = format!("HTTP/1.1 {status}\r\n");
    for (key, value) in extra_headers {
        out.push_str(&format!("{key}: {value}\r\n"));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));
    out
}

fn config() -> ProbeConfig {
    ProbeConfig {
        timeout: Duration::from_secs(5),
        registry_scheme: "http".to_string(),
    }
}

fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);
    format!("http://{addr}/gone.tar.gz")
}

#[test]
fn http_probe_is_reachable_only_on_200() {
    let server = StubServer::start(|request, _| match request.target.as_str() {
        "/ok.tar.gz" => response("200 OK", &[], ""),
        "/missing.tar.gz" => response("404 Not Found", &[], ""),
        _ => response("500 Internal Server Error", &[], ""),
    });
    let prober = HttpProber::new(&config());

    assert_eq!(prober.probe(&server.url("/ok.tar.gz")), Probe::Reachable);
    assert_eq!(
        prober.probe(&server.url("/missing.tar.gz")),
        Probe::Unreachable("HTTP 404".to_string())
    );
    assert!(!prober.probe(&server.url("/broken")).is_reachable());
    assert!(server.requests().iter().all(|r| r.method == "HEAD"));
}

#[test]
fn http_probe_follows_redirects() {
    let server = StubServer::start(|request, addr| match request.target.as_str() {
        "/latest" => response(
            "302 Found",
            &[("Location", format!("http://{addr}/v2/asset.zip"))],
            "",
        ),
        "/v2/asset.zip" => response("200 OK", &[], ""),
        _ => response("404 Not Found", &[], ""),
    });
    let prober = HttpProber::new(&config());

    assert!(prober.probe(&server.url("/latest")).is_reachable());
}

#[test]
fn http_probe_maps_connection_failures_to_unreachable() {
    let prober = HttpProber::new(&config());
    assert!(!prober.probe(&closed_port_url()).is_reachable());
    assert!(!prober.probe("not a url").is_reachable());
}

fn registry_stub() -> StubServer {
    StubServer::start(|request, addr| {
        let authorized = request.header("authorization") == Some("Bearer pull-token");
        match request.target.as_str() {
            target if target.starts_with("/token?") => response(
                "200 OK",
                &[("Content-Type", "application/json".to_string())],
                r#"{"token":"pull-token"}"#,
            ),
            "/v2/org/pkg/manifests/a" if authorized => response(
                "200 OK",
                &[(
                    "Content-Type",
                    "application/vnd.oci.image.manifest.v1+json".to_string(),
                )],
                r#"{"schemaVersion":2}"#,
            ),
            target if target.starts_with("/v2/org/pkg/") && !authorized => response(
                "401 Unauthorized",
                &[(
                    "WWW-Authenticate",
                    format!(
                        r#"Bearer realm="http://{addr}/token",service="registry.test",scope="repository:org/pkg:pull""#
                    ),
                )],
                "",
            ),
            _ => response("404 Not Found", &[], ""),
        }
    })
}

#[test]
fn oras_probe_answers_bearer_challenge() {
    let server = registry_stub();
    let prober = OrasProber::new(&config());

    let probe = prober.probe(&format!("{}/org/pkg:a", server.addr));

    assert_eq!(probe, Probe::Reachable);
    let requests = server.requests();
    assert_eq!(requests.len(), 3, "{requests:?}");
    let token_request = &requests[1];
    assert!(token_request.target.contains("service=registry.test"));
    assert!(token_request.target.contains("scope=repository"));
    assert!(requests[2]
        .header("accept")
        .is_some_and(|accept| accept.contains("application/vnd.oci.image.manifest.v1+json")));
}

#[test]
fn oras_probe_reports_missing_manifest() {
    let server = registry_stub();
    let prober = OrasProber::new(&config());

    let probe = prober.probe(&format!("{}/org/pkg:nope", server.addr));

    assert_eq!(probe, Probe::Unreachable("HTTP 404".to_string()));
}

#[test]
fn oras_probe_maps_faults_to_unreachable() {
    let prober = OrasProber::new(&config());
    let addr = closed_port_url()
        .trim_start_matches("http://")
        .trim_end_matches("/gone.tar.gz")
        .to_string();

    assert!(!prober.probe(&format!("{addr}/org/pkg:a")).is_reachable());
    assert!(!prober.probe("no-slash-reference").is_reachable());
}

#[test]
fn parses_tag_and_digest_references() {
    assert_eq!(
        OciReference::parse("ghcr.io/org/pkg:linux-x64").expect("tag reference"),
        OciReference {
            registry: "ghcr.io".to_string(),
            repository: "org/pkg".to_string(),
            reference: "linux-x64".to_string(),
        }
    );
    let digest = OciReference::parse("ghcr.io/org/pkg@sha256:abc").expect("digest reference");
    assert_eq!(digest.repository, "org/pkg");
    assert_eq!(digest.reference, "sha256:abc");
    let untagged = OciReference::parse("localhost:5000/org/pkg").expect("untagged reference");
    assert_eq!(untagged.registry, "localhost:5000");
    assert_eq!(untagged.reference, "latest");
    assert_eq!(
        untagged.manifest_url("https"),
        "https://localhost:5000/v2/org/pkg/manifests/latest"
    );
    assert!(OciReference::parse("ghcr.io").is_err());
}

#[test]
fn digest_with_appended_tag_is_rejected() {
    let err = OciReference::parse("ghcr.io/org/pkg@sha256:abc:linux-x64")
        .expect_err("tagged digest must not parse");
    assert!(err.to_string().contains("cannot carry a tag"), "{err}");
    assert!(OciReference::parse("ghcr.io/org/pkg@sha256").is_err());

    let prober = OrasProber::new(&config());
    let probe = prober.probe("127.0.0.1:1/org/pkg@sha256:abc:linux-x64");
    assert!(
        probe.reason().is_some_and(|reason| reason.contains("cannot carry a tag")),
        "{probe:?}"
    );
}

#[test]
fn parses_bearer_challenge_with_quoted_commas() {
    let challenge = BearerChallenge::parse(
        r#"Bearer realm="https://ghcr.io/token", service="ghcr.io",scope="repository:org/pkg:pull,push""#,
    )
    .expect("challenge");
    assert_eq!(challenge.realm, "https://ghcr.io/token");
    assert_eq!(challenge.service.as_deref(), Some("ghcr.io"));
    assert_eq!(challenge.scope.as_deref(), Some("repository:org/pkg:pull,push"));
    assert_eq!(BearerChallenge::parse(r#"Basic realm="x""#), None);
}

struct FixedProber(bool);

impl Prober for FixedProber {
    fn probe(&self, _reference: &str) -> Probe {
        if self.0 {
            Probe::Reachable
        } else {
            Probe::Unreachable("stubbed".to_string())
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[test]
fn source_probers_route_by_kind() {
    let probers =
        SourceProbers::with_probers(Box::new(FixedProber(true)), Box::new(FixedProber(false)));
    let descriptor = |kind| DownloadDescriptor {
        file: PathBuf::from("pkg.json"),
        tag: "a".to_string(),
        kind,
        reference: "ref".to_string(),
    };

    assert!(probers.probe(&descriptor(SourceKind::Http)).is_reachable());
    assert_eq!(
        probers.probe(&descriptor(SourceKind::Oras)),
        Probe::Unreachable("stubbed".to_string())
    );
}
