//! `RestTableauClient` against a scripted HTTP listener on localhost.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tm_domain::config::{AuthMethod, Credentials, TableauConfig};
use tm_domain::error::Error;
use tm_tableau::{AuthToken, RestTableauClient, TableauApi};

/// Answers each connection with the next scripted `(status, body)`; the
/// last entry repeats. Records the request line of every request.
struct Scripted {
    url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Scripted {
    async fn start(script: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let (status, body) = script[served.min(script.len() - 1)];
                served += 1;
                let line = answer(stream, status, body).await;
                seen.lock().push(line);
            }
        });

        Self { url, requests }
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

/// Read one request (headers plus `Content-Length` body), reply and close.
async fn answer(mut stream: TcpStream, status: u16, body: &str) -> String {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        raw.extend_from_slice(&chunk[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        if n == 0 {
            break raw.len();
        }
    };
    let head = String::from_utf8_lossy(&raw[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while raw.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
    }

    let response = format!(
        "HTTP/1.1 {status} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await.unwrap();
    stream.shutdown().await.ok();

    head.lines().next().unwrap_or_default().to_owned()
}

fn client(url: &str, max_retries: u32, page_size: u32) -> RestTableauClient {
    let mut cfg = TableauConfig::new(credentials(url));
    cfg.api_version = Some("3.19".into());
    cfg.max_retries = max_retries;
    cfg.page_size = page_size;
    RestTableauClient::new(&cfg).unwrap()
}

fn credentials(url: &str) -> Credentials {
    Credentials {
        server_url: url.into(),
        site_id: "finance".into(),
        auth: AuthMethod::Token {
            name: "ci".into(),
            value: "secret".into(),
        },
    }
}

fn token() -> AuthToken {
    AuthToken {
        token: "t".into(),
        site_id: "site-luid".into(),
        site_content_url: "finance".into(),
        user_id: "u".into(),
        api_version: "3.19".into(),
    }
}

const SIGNED_IN: &str = r#"{"credentials":{"token":"tok","site":{"id":"site-luid","contentUrl":"finance"},"user":{"id":"user-1"}}}"#;

#[tokio::test]
async fn sign_in_is_attempted_once_even_on_server_errors() {
    let server = Scripted::start(vec![(500, "boom")]).await;
    let client = client(&server.url, 3, 100);

    let err = client.sign_in(&credentials(&server.url)).await.unwrap_err();

    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(server.requests(), vec!["POST /api/3.19/auth/signin HTTP/1.1"]);
}

#[tokio::test]
async fn sign_in_returns_the_site_scoped_token() {
    let server = Scripted::start(vec![(200, SIGNED_IN)]).await;
    let client = client(&server.url, 3, 100);

    let auth = client.sign_in(&credentials(&server.url)).await.unwrap();

    assert_eq!(auth.token, "tok");
    assert_eq!(auth.site_id, "site-luid");
    assert_eq!(auth.api_version, "3.19");
}

#[tokio::test]
async fn unavailable_server_is_retried_then_succeeds() {
    let server = Scripted::start(vec![
        (503, ""),
        (
            200,
            r#"{"pagination":{"pageNumber":"1","pageSize":"100","totalAvailable":"1"},"workbooks":{"workbook":[{"id":"wb-1","name":"Sales"}]}}"#,
        ),
    ])
    .await;
    let client = client(&server.url, 1, 100);

    let workbooks = client.list_workbooks(&token()).await.unwrap();

    assert_eq!(workbooks.len(), 1);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn expired_token_is_not_retried() {
    let server = Scripted::start(vec![(
        401,
        r#"{"error":{"summary":"Signin Error","detail":"Token expired","code":"401002"}}"#,
    )])
    .await;
    let client = client(&server.url, 3, 100);

    let err = client.list_workbooks(&token()).await.unwrap_err();

    assert!(matches!(err, Error::SessionExpired(_)));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn pages_are_requested_until_total_available() {
    let server = Scripted::start(vec![
        (
            200,
            r#"{"pagination":{"pageNumber":"1","pageSize":"1","totalAvailable":"2"},"users":{"user":[{"id":"user-1","name":"alice","siteRole":"Viewer"}]}}"#,
        ),
        (
            200,
            r#"{"pagination":{"pageNumber":"2","pageSize":"1","totalAvailable":"2"},"users":{"user":[{"id":"user-2","name":"bob","siteRole":"Viewer"}]}}"#,
        ),
    ])
    .await;
    let client = client(&server.url, 0, 1);

    let users = client.list_users(&token()).await.unwrap();

    assert_eq!(users.len(), 2);
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("pageNumber=1"));
    assert!(requests[1].contains("pageNumber=2"));
}
