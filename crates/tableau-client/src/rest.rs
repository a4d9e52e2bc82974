//! REST implementation of [`TableauApi`].
//!
//! `RestTableauClient` wraps a `reqwest::Client` and translates every
//! trait method into the corresponding call against a Tableau Server or
//! Tableau Cloud site, with retry + exponential back-off on transient
//! (5xx / 429 / timeout) failures.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tm_domain::config::{AuthMethod, Credentials, TableauConfig};
use tm_domain::error::{Error, Result};
use tm_domain::trace::TraceEvent;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::provider::TableauApi;
use crate::types::{
    lenient, AuthToken, Datasource, GranteeCapabilities, Group, PermissionsResponse, Project,
    ServerInfoResponse, SignInResponse, Site, User, View, Workbook,
};

/// Used when `TABLEAU_API_VERSION` is unset and `serverinfo` cannot be read.
pub const FALLBACK_API_VERSION: &str = "3.4";

/// `serverinfo` is reachable without a token from this version on.
const PROBE_API_VERSION: &str = "2.4";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A REST client for one Tableau server.
///
/// Created once and shared for the lifetime of the process. The
/// underlying `reqwest::Client` maintains a connection pool; the REST API
/// version is resolved at most once.
#[derive(Debug)]
pub struct RestTableauClient {
    http: Client,
    base_url: Url,
    pinned_version: Option<String>,
    probed_version: OnceCell<String>,
    max_retries: u32,
    page_size: u32,
}

impl RestTableauClient {
    /// Build a new client from the resolved `TableauConfig`.
    pub fn new(cfg: &TableauConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(cfg.request_timeout)
            .danger_accept_invalid_certs(!cfg.verify_ssl)
            .user_agent(concat!("tableau-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        if !cfg.verify_ssl {
            tracing::warn!("TLS certificate verification is disabled");
        }

        let base_url = Url::parse(&cfg.credentials.server_url)
            .map_err(|e| Error::Http(format!("{}: {e}", cfg.credentials.server_url)))?;

        Ok(Self {
            http,
            base_url,
            pinned_version: cfg.api_version.clone(),
            probed_version: OnceCell::new(),
            max_retries: cfg.max_retries,
            page_size: cfg.page_size,
        })
    }

    // ── version negotiation ──────────────────────────────────────────

    /// The REST API version used for sign-in. Pinned by config, otherwise
    /// probed once via `serverinfo`.
    pub async fn api_version(&self) -> String {
        if let Some(ref pinned) = self.pinned_version {
            return pinned.clone();
        }
        self.probed_version
            .get_or_init(|| self.probe_api_version())
            .await
            .clone()
    }

    async fn probe_api_version(&self) -> String {
        let url = match self.url(&["api", PROBE_API_VERSION, "serverinfo"]) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "cannot build serverinfo URL");
                return FALLBACK_API_VERSION.to_owned();
            }
        };
        let probed = async {
            let resp = self
                .execute_with_retry("GET /serverinfo", 0, None, || self.http.get(url.clone()))
                .await?;
            read_json::<ServerInfoResponse>(resp, "GET /serverinfo").await
        }
        .await;

        match probed {
            Ok(info) => {
                tracing::debug!(
                    api_version = %info.server_info.rest_api_version,
                    "probed REST API version"
                );
                info.server_info.rest_api_version
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = FALLBACK_API_VERSION,
                    "serverinfo probe failed, using fallback API version"
                );
                FALLBACK_API_VERSION.to_owned()
            }
        }
    }

    // ── request helpers ──────────────────────────────────────────────

    /// Decorate a `RequestBuilder` with the standard headers.
    fn decorate(&self, rb: RequestBuilder, auth: Option<&AuthToken>) -> RequestBuilder {
        let trace_id = Uuid::new_v4().to_string();
        let rb = rb
            .header("Accept", "application/json")
            .header("X-Trace-Id", &trace_id);
        match auth {
            Some(auth) => rb.header("X-Tableau-Auth", &auth.token),
            None => rb,
        }
    }

    /// Append percent-encoded path segments to the server URL.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Http(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `/api/{version}/sites/{site}/...segments`
    fn site_url(&self, auth: &AuthToken, segments: &[&str]) -> Result<Url> {
        let mut all = vec!["api", auth.api_version.as_str(), "sites", auth.site_id.as_str()];
        all.extend_from_slice(segments);
        self.url(&all)
    }

    /// `/api/{version}/auth/{action}`
    fn auth_url(&self, version: &str, action: &str) -> Result<Url> {
        self.url(&["api", version, "auth", action])
    }

    // ── retry engine ─────────────────────────────────────────────────

    /// Execute a request with retry + exponential back-off on transient errors.
    ///
    /// * Retries on 5xx, 429, timeouts and connection failures.
    /// * Does **not** retry other 4xx responses.
    /// * 401 becomes `Error::SessionExpired`, 404 becomes `Error::NotFound`.
    /// * Emits a `TraceEvent::TableauCall` after every attempt.
    async fn execute_with_retry(
        &self,
        endpoint: &str,
        max_retries: u32,
        auth: Option<&AuthToken>,
        build_request: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let mut last_err: Option<Error> = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = backoff(attempt);
                tracing::debug!(endpoint, attempt, ?backoff, "retrying Tableau call");
                tokio::time::sleep(backoff).await;
            }

            let start = Instant::now();
            let rb = self.decorate(build_request(), auth);
            let result = rb.send().await;
            let duration_ms = start.elapsed().as_millis() as u64;

            match result {
                Ok(resp) => {
                    let status = resp.status();

                    TraceEvent::TableauCall {
                        endpoint: endpoint.to_owned(),
                        status: status.as_u16(),
                        duration_ms,
                        attempt,
                    }
                    .emit();

                    if status.is_success() {
                        return Ok(resp);
                    }

                    let body = resp.text().await.unwrap_or_default();
                    match classify(endpoint, status, &body) {
                        Failure::Transient(e) => last_err = Some(e),
                        Failure::Fatal(e) => return Err(e),
                    }
                }
                Err(e) => {
                    let status = e.status().map(|s| s.as_u16()).unwrap_or(0);

                    TraceEvent::TableauCall {
                        endpoint: endpoint.to_owned(),
                        status,
                        duration_ms,
                        attempt,
                    }
                    .emit();

                    last_err = Some(from_reqwest(e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Remote(format!("{endpoint}: all retries exhausted"))))
    }

    // ── typed fetch helpers ──────────────────────────────────────────

    /// Fetch every page of a list endpoint.
    ///
    /// Tableau wraps items as `{"<collection>": {"<item>": [...]}}` and
    /// omits the wrapper entirely when the list is empty.
    async fn get_all<T: DeserializeOwned>(
        &self,
        auth: &AuthToken,
        endpoint: &str,
        segments: &[&str],
        (collection, item): (&str, &str),
        extra_query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = self.site_url(auth, segments)?;
        let mut out = Vec::new();
        let mut page_number: u32 = 1;

        loop {
            let resp = self
                .execute_with_retry(endpoint, self.max_retries, Some(auth), || {
                    self.http
                        .get(url.clone())
                        .query(&[("pageSize", self.page_size), ("pageNumber", page_number)])
                        .query(extra_query)
                })
                .await?;

            let body: Value = read_json(resp, endpoint).await?;
            let items = body
                .get(collection)
                .and_then(|c| c.get(item))
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new()));
            let batch: Vec<T> = serde_json::from_value(items).map_err(|e| {
                Error::Remote(format!("{endpoint}: unexpected response shape: {e}"))
            })?;

            let fetched = batch.len();
            out.extend(batch);

            let total = body
                .pointer("/pagination/totalAvailable")
                .and_then(lenient::value_u64);
            if !has_more_pages(fetched, out.len(), total) {
                break;
            }
            page_number += 1;
        }

        tracing::debug!(endpoint, count = out.len(), pages = page_number, "fetched list");
        Ok(out)
    }

    /// Fetch a single object wrapped as `{"<key>": {...}}`.
    async fn get_one<T: DeserializeOwned>(
        &self,
        auth: &AuthToken,
        endpoint: &str,
        segments: &[&str],
        key: &str,
        extra_query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.site_url(auth, segments)?;
        let resp = self
            .execute_with_retry(endpoint, self.max_retries, Some(auth), || {
                self.http.get(url.clone()).query(extra_query)
            })
            .await?;
        let mut body: Value = read_json(resp, endpoint).await?;
        let inner = body
            .get_mut(key)
            .map(Value::take)
            .ok_or_else(|| Error::Remote(format!("{endpoint}: response has no `{key}`")))?;
        serde_json::from_value(inner)
            .map_err(|e| Error::Remote(format!("{endpoint}: unexpected response shape: {e}")))
    }

    async fn get_bytes(
        &self,
        auth: &AuthToken,
        endpoint: &str,
        segments: &[&str],
        extra_query: &[(&str, &str)],
    ) -> Result<Vec<u8>> {
        let url = self.site_url(auth, segments)?;
        let resp = self
            .execute_with_retry(endpoint, self.max_retries, Some(auth), || {
                self.http.get(url.clone()).query(extra_query)
            })
            .await?;
        let bytes = resp.bytes().await.map_err(from_reqwest)?;
        Ok(bytes.to_vec())
    }

    async fn get_permissions(
        &self,
        auth: &AuthToken,
        endpoint: &str,
        segments: &[&str],
    ) -> Result<Vec<GranteeCapabilities>> {
        let url = self.site_url(auth, segments)?;
        let resp = self
            .execute_with_retry(endpoint, self.max_retries, Some(auth), || {
                self.http.get(url.clone())
            })
            .await?;
        let parsed: PermissionsResponse = read_json(resp, endpoint).await?;
        Ok(parsed.permissions.into_grants())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait]
impl TableauApi for RestTableauClient {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthToken> {
        let version = self.api_version().await;
        let url = self.auth_url(&version, "signin")?;
        let body = sign_in_body(credentials);

        let resp = self
            .execute_with_retry("POST /auth/signin", 0, None, || {
                self.http.post(url.clone()).json(&body)
            })
            .await
            .map_err(|e| match e {
                Error::SessionExpired(msg) => Error::Auth(format!("sign-in rejected: {msg}")),
                other => Error::Auth(other.to_string()),
            })?;

        let parsed: SignInResponse = read_json(resp, "POST /auth/signin")
            .await
            .map_err(|e| Error::Auth(e.to_string()))?;

        Ok(AuthToken {
            token: parsed.credentials.token,
            site_id: parsed.credentials.site.id,
            site_content_url: parsed.credentials.site.content_url,
            user_id: parsed.credentials.user.id,
            api_version: version,
        })
    }

    async fn sign_out(&self, auth: &AuthToken) -> Result<()> {
        let url = self.auth_url(&auth.api_version, "signout")?;
        match self
            .execute_with_retry("POST /auth/signout", 0, Some(auth), || {
                self.http.post(url.clone())
            })
            .await
        {
            // The token is already invalid, which is what sign-out wanted.
            Ok(_) | Err(Error::SessionExpired(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_workbooks(&self, auth: &AuthToken) -> Result<Vec<Workbook>> {
        self.get_all(
            auth,
            "GET /workbooks",
            &["workbooks"],
            ("workbooks", "workbook"),
            &[],
        )
        .await
    }

    async fn get_workbook(&self, auth: &AuthToken, workbook_id: &str) -> Result<Workbook> {
        self.get_one(
            auth,
            "GET /workbooks/{id}",
            &["workbooks", workbook_id],
            "workbook",
            &[],
        )
        .await
    }

    async fn list_workbook_views(
        &self,
        auth: &AuthToken,
        workbook_id: &str,
        include_usage: bool,
    ) -> Result<Vec<View>> {
        let query: &[(&str, &str)] = if include_usage {
            &[("includeUsageStatistics", "true")]
        } else {
            &[]
        };
        // Unpaged on the server side; a single request returns every view.
        let url = self.site_url(auth, &["workbooks", workbook_id, "views"])?;
        let endpoint = "GET /workbooks/{id}/views";
        let resp = self
            .execute_with_retry(endpoint, self.max_retries, Some(auth), || {
                self.http.get(url.clone()).query(query)
            })
            .await?;
        let body: Value = read_json(resp, endpoint).await?;
        let items = body
            .pointer("/views/view")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        serde_json::from_value(items)
            .map_err(|e| Error::Remote(format!("{endpoint}: unexpected response shape: {e}")))
    }

    async fn list_views(&self, auth: &AuthToken) -> Result<Vec<View>> {
        self.get_all(auth, "GET /views", &["views"], ("views", "view"), &[])
            .await
    }

    async fn get_view(&self, auth: &AuthToken, view_id: &str) -> Result<View> {
        self.get_one(auth, "GET /views/{id}", &["views", view_id], "view", &[])
            .await
    }

    async fn view_csv(&self, auth: &AuthToken, view_id: &str) -> Result<String> {
        let bytes = self
            .get_bytes(auth, "GET /views/{id}/data", &["views", view_id, "data"], &[])
            .await?;
        String::from_utf8(bytes)
            .map_err(|e| Error::Remote(format!("view {view_id} data is not UTF-8: {e}")))
    }

    async fn view_image(&self, auth: &AuthToken, view_id: &str) -> Result<Vec<u8>> {
        self.get_bytes(
            auth,
            "GET /views/{id}/image",
            &["views", view_id, "image"],
            &[("resolution", "high")],
        )
        .await
    }

    async fn list_datasources(&self, auth: &AuthToken) -> Result<Vec<Datasource>> {
        self.get_all(
            auth,
            "GET /datasources",
            &["datasources"],
            ("datasources", "datasource"),
            &[],
        )
        .await
    }

    async fn get_datasource(&self, auth: &AuthToken, datasource_id: &str) -> Result<Datasource> {
        self.get_one(
            auth,
            "GET /datasources/{id}",
            &["datasources", datasource_id],
            "datasource",
            &[],
        )
        .await
    }

    async fn download_datasource(
        &self,
        auth: &AuthToken,
        datasource_id: &str,
        include_extract: bool,
    ) -> Result<Vec<u8>> {
        let include = if include_extract { "true" } else { "false" };
        self.get_bytes(
            auth,
            "GET /datasources/{id}/content",
            &["datasources", datasource_id, "content"],
            &[("includeExtract", include)],
        )
        .await
    }

    async fn workbook_permissions(
        &self,
        auth: &AuthToken,
        workbook_id: &str,
    ) -> Result<Vec<GranteeCapabilities>> {
        self.get_permissions(
            auth,
            "GET /workbooks/{id}/permissions",
            &["workbooks", workbook_id, "permissions"],
        )
        .await
    }

    async fn project_permissions(
        &self,
        auth: &AuthToken,
        project_id: &str,
    ) -> Result<Vec<GranteeCapabilities>> {
        self.get_permissions(
            auth,
            "GET /projects/{id}/permissions",
            &["projects", project_id, "permissions"],
        )
        .await
    }

    async fn list_users(&self, auth: &AuthToken) -> Result<Vec<User>> {
        self.get_all(auth, "GET /users", &["users"], ("users", "user"), &[])
            .await
    }

    async fn get_user(&self, auth: &AuthToken, user_id: &str) -> Result<User> {
        self.get_one(auth, "GET /users/{id}", &["users", user_id], "user", &[])
            .await
    }

    async fn list_groups(&self, auth: &AuthToken) -> Result<Vec<Group>> {
        self.get_all(auth, "GET /groups", &["groups"], ("groups", "group"), &[])
            .await
    }

    async fn list_group_users(&self, auth: &AuthToken, group_id: &str) -> Result<Vec<User>> {
        self.get_all(
            auth,
            "GET /groups/{id}/users",
            &["groups", group_id, "users"],
            ("users", "user"),
            &[],
        )
        .await
    }

    async fn list_user_groups(&self, auth: &AuthToken, user_id: &str) -> Result<Vec<Group>> {
        self.get_all(
            auth,
            "GET /users/{id}/groups",
            &["users", user_id, "groups"],
            ("groups", "group"),
            &[],
        )
        .await
    }

    async fn list_projects(&self, auth: &AuthToken) -> Result<Vec<Project>> {
        self.get_all(
            auth,
            "GET /projects",
            &["projects"],
            ("projects", "project"),
            &[],
        )
        .await
    }

    async fn get_site(&self, auth: &AuthToken) -> Result<Site> {
        self.get_one(auth, "GET /sites/{id}", &[], "site", &[]).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request body of `POST /auth/signin`.
fn sign_in_body(credentials: &Credentials) -> Value {
    let site = json!({ "contentUrl": credentials.site_id });
    match &credentials.auth {
        AuthMethod::Token { name, value } => json!({
            "credentials": {
                "personalAccessTokenName": name,
                "personalAccessTokenSecret": value,
                "site": site,
            }
        }),
        AuthMethod::Password { username, password } => json!({
            "credentials": {
                "name": username,
                "password": password,
                "site": site,
            }
        }),
    }
}

/// A non-success response, split by whether another attempt may help.
#[derive(Debug)]
enum Failure {
    /// 429 and 5xx: retried while attempts remain.
    Transient(Error),
    Fatal(Error),
}

/// Map a non-success HTTP status onto the domain error.
///
/// 401 means the token is no longer valid and becomes `SessionExpired`;
/// the session layer signs in again on that error alone.
fn classify(endpoint: &str, status: StatusCode, body: &str) -> Failure {
    let detail = error_detail(body);
    let code = status.as_u16();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Failure::Transient(Error::RateLimited(format!("{endpoint}: {detail}")));
    }
    if status.is_server_error() {
        return Failure::Transient(Error::Remote(format!(
            "{endpoint} returned {code}: {detail}"
        )));
    }

    Failure::Fatal(match status {
        StatusCode::UNAUTHORIZED => Error::SessionExpired(format!("{endpoint}: {detail}")),
        StatusCode::NOT_FOUND if detail.is_empty() => Error::NotFound(endpoint.to_owned()),
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        _ => Error::Remote(format!("{endpoint} returned {code}: {detail}")),
    })
}

/// Delay before retry number `attempt` (1-based): 200ms, 400ms, 800ms, ...
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(200u64.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1))))
}

/// Whether another page should be requested after one that returned
/// `fetched` items, bringing the running total to `so_far`.
///
/// An empty page always stops, so a server that overstates
/// `totalAvailable` cannot loop forever. Without a total there is nothing
/// to page through.
fn has_more_pages(fetched: usize, so_far: usize, total: Option<u64>) -> bool {
    match total {
        Some(total) => fetched > 0 && (so_far as u64) < total,
        None => false,
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response, endpoint: &str) -> Result<T> {
    let body = resp.text().await.map_err(from_reqwest)?;
    serde_json::from_str(&body)
        .map_err(|e| Error::Remote(format!("failed to parse {endpoint} response: {e}")))
}

/// Summarise a Tableau error body (`{"error": {summary, detail, code}}`),
/// falling back to the start of the raw body.
fn error_detail(body: &str) -> String {
    const MAX_RAW: usize = 200;

    if let Ok(v) = serde_json::from_str::<Value>(body) {
        if let Some(err) = v.get("error") {
            let field = |k: &str| err.get(k).and_then(Value::as_str).unwrap_or_default();
            let (summary, detail, code) = (field("summary"), field("detail"), field("code"));
            let mut out = match (summary.is_empty(), detail.is_empty()) {
                (false, false) => format!("{summary}: {detail}"),
                (false, true) => summary.to_owned(),
                (true, _) => detail.to_owned(),
            };
            if !code.is_empty() {
                out.push_str(&format!(" ({code})"));
            }
            return out;
        }
    }

    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_RAW) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_owned(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(server_url: &str) -> TableauConfig {
        TableauConfig::new(Credentials {
            server_url: server_url.into(),
            site_id: "finance".into(),
            auth: AuthMethod::Token {
                name: "ci".into(),
                value: "secret".into(),
            },
        })
    }

    fn token() -> AuthToken {
        AuthToken {
            token: "t".into(),
            site_id: "9a8b7c6d".into(),
            site_content_url: "finance".into(),
            user_id: "u".into(),
            api_version: "3.19".into(),
        }
    }

    #[test]
    fn site_urls_include_version_and_site_luid() {
        let client = RestTableauClient::new(&config("https://tableau.example.com")).unwrap();
        let url = client
            .site_url(&token(), &["workbooks", "wb-1", "views"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://tableau.example.com/api/3.19/sites/9a8b7c6d/workbooks/wb-1/views"
        );
    }

    #[test]
    fn server_path_prefix_is_kept_and_ids_are_escaped() {
        let client = RestTableauClient::new(&config("https://example.com/tableau")).unwrap();
        let url = client.site_url(&token(), &["views", "a/b?c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/tableau/api/3.19/sites/9a8b7c6d/views/a%2Fb%3Fc"
        );
    }

    #[tokio::test]
    async fn pinned_api_version_skips_the_probe() {
        let mut cfg = config("https://tableau.example.com");
        cfg.api_version = Some("3.21".into());
        let client = RestTableauClient::new(&cfg).unwrap();
        assert_eq!(client.api_version().await, "3.21");
    }

    #[test]
    fn token_sign_in_body_uses_pat_fields() {
        let body = sign_in_body(&config("https://x").credentials);
        assert_eq!(body["credentials"]["personalAccessTokenName"], "ci");
        assert_eq!(body["credentials"]["personalAccessTokenSecret"], "secret");
        assert_eq!(body["credentials"]["site"]["contentUrl"], "finance");
        assert!(body["credentials"].get("password").is_none());
    }

    #[test]
    fn password_sign_in_body_uses_name_and_password() {
        let creds = Credentials {
            server_url: "https://x".into(),
            site_id: String::new(),
            auth: AuthMethod::Password {
                username: "admin".into(),
                password: "pw".into(),
            },
        };
        let body = sign_in_body(&creds);
        assert_eq!(body["credentials"]["name"], "admin");
        assert_eq!(body["credentials"]["password"], "pw");
        assert_eq!(body["credentials"]["site"]["contentUrl"], "");
    }

    #[test]
    fn error_detail_prefers_structured_errors() {
        let body = r#"{"error":{"summary":"Resource Not Found","detail":"View 'x' could not be found.","code":"404011"}}"#;
        assert_eq!(
            error_detail(body),
            "Resource Not Found: View 'x' could not be found. (404011)"
        );
    }

    #[test]
    fn error_detail_truncates_raw_bodies() {
        let body = "x".repeat(500);
        let detail = error_detail(&body);
        assert_eq!(detail.chars().count(), 201);
        assert!(detail.ends_with('…'));
    }

    #[test]
    fn unauthorized_is_session_expired_and_not_retried() {
        let body = r#"{"error":{"summary":"Signin Error","detail":"Token expired","code":"401002"}}"#;
        match classify("GET /workbooks", StatusCode::UNAUTHORIZED, body) {
            Failure::Fatal(Error::SessionExpired(msg)) => assert!(msg.contains("401002")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn not_found_carries_the_server_detail() {
        let body = r#"{"error":{"detail":"View 'v' could not be found.","code":"404011"}}"#;
        match classify("GET /views/v", StatusCode::NOT_FOUND, body) {
            Failure::Fatal(Error::NotFound(msg)) => assert!(msg.contains("View 'v'")),
            other => panic!("unexpected {other:?}"),
        }
        match classify("GET /views/v", StatusCode::NOT_FOUND, "") {
            Failure::Fatal(Error::NotFound(msg)) => assert_eq!(msg, "GET /views/v"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        assert!(matches!(
            classify("GET /users", StatusCode::TOO_MANY_REQUESTS, ""),
            Failure::Transient(Error::RateLimited(_))
        ));
        match classify("GET /users", StatusCode::SERVICE_UNAVAILABLE, "maintenance") {
            Failure::Transient(Error::Remote(msg)) => {
                assert_eq!(msg, "GET /users returned 503: maintenance")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_client_errors_are_fatal_remote_errors() {
        assert!(matches!(
            classify("GET /groups", StatusCode::FORBIDDEN, ""),
            Failure::Fatal(Error::Remote(_))
        ));
        assert!(matches!(
            classify("GET /groups", StatusCode::BAD_REQUEST, ""),
            Failure::Fatal(Error::Remote(_))
        ));
    }

    #[test]
    fn backoff_doubles_from_200ms() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn paging_stops_at_total_available() {
        assert!(has_more_pages(100, 100, Some(250)));
        assert!(has_more_pages(100, 200, Some(250)));
        assert!(!has_more_pages(50, 250, Some(250)));
    }

    #[test]
    fn paging_stops_on_empty_page_or_missing_total() {
        assert!(!has_more_pages(0, 100, Some(250)));
        assert!(!has_more_pages(100, 100, None));
    }
}
