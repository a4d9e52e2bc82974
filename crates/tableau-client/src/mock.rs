//! In-memory [`TableauApi`] used by tests across the workspace.
//!
//! Records every call, counts sign-ins and sign-outs, and can be scripted
//! to expire sessions, reject sign-ins, fail sign-outs or add latency.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tm_domain::config::Credentials;
use tm_domain::error::{Error, Result};

use crate::provider::TableauApi;
use crate::types::{
    AuthToken, Capability, Datasource, Grantee, GranteeCapabilities, Group, IdRef, Project, Site,
    User, View, ViewUsage, Workbook,
};

#[derive(Debug, Default)]
struct Fixtures {
    site: Site,
    workbooks: Vec<Workbook>,
    views: Vec<View>,
    view_csv: HashMap<String, String>,
    view_png: HashMap<String, Vec<u8>>,
    datasources: Vec<Datasource>,
    datasource_content: HashMap<String, Vec<u8>>,
    workbook_permissions: HashMap<String, Vec<GranteeCapabilities>>,
    project_permissions: HashMap<String, Vec<GranteeCapabilities>>,
    users: Vec<User>,
    groups: Vec<Group>,
    memberships: HashMap<String, Vec<String>>,
    projects: Vec<Project>,
}

#[derive(Debug, Default)]
struct Script {
    /// Successful sign-ins allowed before every further attempt fails.
    sign_in_budget: Option<u32>,
    fail_sign_out: bool,
    /// The next N REST calls fail with `SessionExpired`.
    expire_next: u32,
    /// The first call with each of these names fails with `SessionExpired`.
    expire_once: HashSet<String>,
    /// Fail a call with `Remote` when its name matches.
    fail_calls: HashMap<String, String>,
    latency: Option<Duration>,
}

#[derive(Debug, Default)]
struct Ledger {
    calls: Vec<String>,
    sign_ins: u32,
    sign_in_attempts: u32,
    sign_outs: u32,
    live_tokens: HashSet<String>,
    max_live_tokens: usize,
    in_flight: usize,
    max_in_flight: usize,
    next_token: u64,
}

/// Scriptable in-memory Tableau site.
#[derive(Debug, Default)]
pub struct MockTableau {
    fixtures: Mutex<Fixtures>,
    script: Mutex<Script>,
    ledger: Mutex<Ledger>,
}

impl MockTableau {
    /// An empty site: every list is empty, every lookup is `NotFound`.
    pub fn new() -> Self {
        let mock = Self::default();
        mock.fixtures.lock().site = Site {
            id: "site-luid".into(),
            name: "Default".into(),
            ..Default::default()
        };
        mock
    }

    /// A small, realistic site used by most tests.
    pub fn sample() -> Self {
        let mock = Self::new();
        {
            let mut f = mock.fixtures.lock();
            f.site = Site {
                id: "site-luid".into(),
                name: "Finance".into(),
                content_url: "finance".into(),
                admin_mode: Some("ContentAndUsers".into()),
                state: Some("Active".into()),
                storage_quota: Some(100 * 1024),
                user_quota: None,
            };

            f.projects = vec![
                Project {
                    id: "proj-1".into(),
                    name: "Sales".into(),
                    description: Some("Sales reporting".into()),
                    content_permissions: Some("ManagedByOwner".into()),
                    parent_project_id: None,
                    owner: Some(IdRef::new("user-1")),
                },
                Project {
                    id: "proj-2".into(),
                    name: "Operations".into(),
                    description: None,
                    content_permissions: Some("LockedToProject".into()),
                    parent_project_id: None,
                    owner: Some(IdRef::new("user-1")),
                },
            ];

            f.workbooks = vec![
                Workbook {
                    id: "wb-1".into(),
                    name: "Regional Sales".into(),
                    description: Some("Quarterly revenue by region".into()),
                    content_url: Some("RegionalSales".into()),
                    size: Some(2),
                    project: Some(IdRef::named("proj-1", "Sales")),
                    owner: Some(IdRef::new("user-1")),
                    ..Default::default()
                },
                Workbook {
                    id: "wb-2".into(),
                    name: "Warehouse Ops".into(),
                    description: None,
                    content_url: Some("WarehouseOps".into()),
                    size: Some(5),
                    project: Some(IdRef::named("proj-2", "Operations")),
                    owner: Some(IdRef::new("user-2")),
                    ..Default::default()
                },
            ];

            f.views = vec![
                View {
                    id: "view-1".into(),
                    name: "Revenue Overview".into(),
                    content_url: Some("RegionalSales/sheets/RevenueOverview".into()),
                    workbook: Some(IdRef::new("wb-1")),
                    usage: Some(ViewUsage {
                        total_view_count: 42,
                    }),
                    ..Default::default()
                },
                View {
                    id: "view-2".into(),
                    name: "Sales Map".into(),
                    content_url: Some("RegionalSales/sheets/SalesMap".into()),
                    workbook: Some(IdRef::new("wb-1")),
                    usage: Some(ViewUsage {
                        total_view_count: 7,
                    }),
                    ..Default::default()
                },
                View {
                    id: "view-3".into(),
                    name: "Stock Levels".into(),
                    content_url: Some("WarehouseOps/sheets/StockLevels".into()),
                    workbook: Some(IdRef::new("wb-2")),
                    usage: Some(ViewUsage {
                        total_view_count: 0,
                    }),
                    ..Default::default()
                },
            ];
            f.view_csv.insert(
                "view-1".into(),
                "Region,Revenue\nNorth,1200\nSouth,950\nEast,1430\nWest,870\nCentral,660\nOverseas,120\n"
                    .into(),
            );
            f.view_csv
                .insert("view-3".into(), "Item,Qty\nBolts,500\n".into());
            f.view_png
                .insert("view-1".into(), b"\x89PNG\r\n\x1a\nrevenue".to_vec());

            f.datasources = vec![Datasource {
                id: "ds-1".into(),
                name: "Orders".into(),
                description: Some("Orders extract".into()),
                content_url: Some("Orders".into()),
                kind: Some("hyper".into()),
                size: Some(1),
                has_extracts: Some(true),
                project: Some(IdRef::named("proj-1", "Sales")),
                owner: Some(IdRef::new("user-1")),
                ..Default::default()
            }];

            f.users = vec![
                User {
                    id: "user-1".into(),
                    name: "alice".into(),
                    site_role: "SiteAdministratorCreator".into(),
                    full_name: Some("Alice Analyst".into()),
                    email: Some("alice@example.com".into()),
                    last_login: None,
                },
                User {
                    id: "user-2".into(),
                    name: "bob".into(),
                    site_role: "Explorer".into(),
                    full_name: None,
                    email: None,
                    last_login: None,
                },
                User {
                    id: "user-3".into(),
                    name: "carol".into(),
                    site_role: "Viewer".into(),
                    full_name: Some("Carol".into()),
                    email: None,
                    last_login: None,
                },
            ];

            f.groups = vec![
                Group {
                    id: "group-1".into(),
                    name: "All Users".into(),
                    domain: None,
                },
                Group {
                    id: "group-2".into(),
                    name: "Analysts".into(),
                    domain: None,
                },
            ];
            f.memberships.insert(
                "group-1".into(),
                vec!["user-1".into(), "user-2".into(), "user-3".into()],
            );
            f.memberships.insert("group-2".into(), vec!["user-1".into()]);

            f.workbook_permissions.insert(
                "wb-1".into(),
                vec![
                    grant(Grantee::Group("group-1".into()), &[("Read", "Allow")]),
                    grant(
                        Grantee::User("user-2".into()),
                        &[("Read", "Allow"), ("ExportData", "Deny")],
                    ),
                ],
            );
            f.workbook_permissions.insert(
                "wb-2".into(),
                vec![grant(
                    Grantee::Group("group-2".into()),
                    &[("Read", "Allow"), ("Write", "Allow")],
                )],
            );
            f.project_permissions.insert(
                "proj-1".into(),
                vec![grant(Grantee::Group("group-1".into()), &[("Read", "Allow")])],
            );
        }
        mock
    }

    // ── fixture builders ─────────────────────────────────────────────

    pub fn with_workbooks(self, workbooks: Vec<Workbook>) -> Self {
        self.fixtures.lock().workbooks = workbooks;
        self
    }

    pub fn with_view_csv(self, view_id: &str, csv: &str) -> Self {
        self.fixtures
            .lock()
            .view_csv
            .insert(view_id.to_owned(), csv.to_owned());
        self
    }

    pub fn with_datasource_content(self, datasource_id: &str, content: Vec<u8>) -> Self {
        self.fixtures
            .lock()
            .datasource_content
            .insert(datasource_id.to_owned(), content);
        self
    }

    // ── scripting ────────────────────────────────────────────────────

    /// Every sign-in attempt fails.
    pub fn fail_sign_in(&self) {
        self.script.lock().sign_in_budget = Some(0);
    }

    /// The first `n` sign-ins succeed, later attempts fail.
    pub fn allow_sign_ins(&self, n: u32) {
        self.script.lock().sign_in_budget = Some(n);
    }

    pub fn fail_sign_out(&self) {
        self.script.lock().fail_sign_out = true;
    }

    /// The next `n` REST calls (excluding sign-in/out) fail with
    /// `SessionExpired` and invalidate the token that made them.
    pub fn expire_next_calls(&self, n: u32) {
        self.script.lock().expire_next = n;
    }

    /// The first call matching `call`, either a name like `list_group_users`
    /// or a full entry like `list_group_users:group-2`, fails with
    /// `SessionExpired` and invalidates its token. Later calls succeed.
    pub fn expire_call_once(&self, call: &str) {
        self.script.lock().expire_once.insert(call.to_owned());
    }

    /// Calls named `call` fail with `Error::Remote(message)`.
    pub fn fail_call(&self, call: &str, message: &str) {
        self.script
            .lock()
            .fail_calls
            .insert(call.to_owned(), message.to_owned());
    }

    pub fn set_latency(&self, latency: Duration) {
        self.script.lock().latency = Some(latency);
    }

    // ── inspection ───────────────────────────────────────────────────

    /// Every REST call in order, named like `list_workbooks` or
    /// `get_view:view-1`. Sign-in and sign-out are included.
    pub fn calls(&self) -> Vec<String> {
        self.ledger.lock().calls.clone()
    }

    /// Calls other than sign-in and sign-out.
    pub fn rest_calls(&self) -> Vec<String> {
        self.ledger
            .lock()
            .calls
            .iter()
            .filter(|c| *c != "sign_in" && *c != "sign_out")
            .cloned()
            .collect()
    }

    pub fn sign_ins(&self) -> u32 {
        self.ledger.lock().sign_ins
    }

    pub fn sign_in_attempts(&self) -> u32 {
        self.ledger.lock().sign_in_attempts
    }

    pub fn sign_outs(&self) -> u32 {
        self.ledger.lock().sign_outs
    }

    /// Tokens issued and not yet signed out or expired.
    pub fn live_sessions(&self) -> usize {
        self.ledger.lock().live_tokens.len()
    }

    /// The largest number of simultaneously live tokens ever observed.
    pub fn max_live_sessions(&self) -> usize {
        self.ledger.lock().max_live_tokens
    }

    /// The largest number of REST calls ever waiting on latency at once.
    pub fn max_in_flight(&self) -> usize {
        self.ledger.lock().max_in_flight
    }

    // ── internals ────────────────────────────────────────────────────

    async fn enter(&self, call: String, auth: &AuthToken) -> Result<()> {
        let latency = self.script.lock().latency;
        if let Some(latency) = latency {
            {
                let mut ledger = self.ledger.lock();
                ledger.in_flight += 1;
                ledger.max_in_flight = ledger.max_in_flight.max(ledger.in_flight);
            }
            tokio::time::sleep(latency).await;
            self.ledger.lock().in_flight -= 1;
        }

        let mut ledger = self.ledger.lock();
        ledger.calls.push(call.clone());

        let mut script = self.script.lock();
        if script.expire_next > 0 {
            script.expire_next -= 1;
            ledger.live_tokens.remove(&auth.token);
            return Err(Error::SessionExpired(format!("{call}: 401002 token expired")));
        }
        if !ledger.live_tokens.contains(&auth.token) {
            return Err(Error::SessionExpired(format!("{call}: unknown token")));
        }
        let name = call.split(':').next().unwrap_or_default();
        if script.expire_once.remove(call.as_str()) || script.expire_once.remove(name) {
            ledger.live_tokens.remove(&auth.token);
            return Err(Error::SessionExpired(format!("{call}: 401002 token expired")));
        }
        if let Some(message) = script.fail_calls.get(name) {
            return Err(Error::Remote(message.clone()));
        }
        Ok(())
    }
}

fn grant(grantee: Grantee, caps: &[(&str, &str)]) -> GranteeCapabilities {
    GranteeCapabilities {
        grantee,
        capabilities: caps
            .iter()
            .map(|(name, mode)| Capability {
                name: (*name).to_owned(),
                mode: (*mode).to_owned(),
            })
            .collect(),
    }
}

fn not_found(kind: &str, id: &str) -> Error {
    Error::NotFound(format!("{kind} '{id}' could not be found"))
}

#[async_trait]
impl TableauApi for MockTableau {
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthToken> {
        let latency = self.script.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut ledger = self.ledger.lock();
        ledger.calls.push("sign_in".into());
        ledger.sign_in_attempts += 1;

        let mut script = self.script.lock();
        if let Some(budget) = script.sign_in_budget.as_mut() {
            if *budget == 0 {
                return Err(Error::Auth("401001 signin error: invalid credentials".into()));
            }
            *budget -= 1;
        }
        drop(script);

        ledger.sign_ins += 1;
        ledger.next_token += 1;
        let token = format!("token-{}", ledger.next_token);
        ledger.live_tokens.insert(token.clone());
        ledger.max_live_tokens = ledger.max_live_tokens.max(ledger.live_tokens.len());

        Ok(AuthToken {
            token,
            site_id: self.fixtures.lock().site.id.clone(),
            site_content_url: credentials.site_id.clone(),
            user_id: "user-1".into(),
            api_version: "3.19".into(),
        })
    }

    async fn sign_out(&self, auth: &AuthToken) -> Result<()> {
        let mut ledger = self.ledger.lock();
        ledger.calls.push("sign_out".into());
        ledger.sign_outs += 1;
        ledger.live_tokens.remove(&auth.token);
        if self.script.lock().fail_sign_out {
            return Err(Error::Http("connection reset during sign-out".into()));
        }
        Ok(())
    }

    async fn list_workbooks(&self, auth: &AuthToken) -> Result<Vec<Workbook>> {
        self.enter("list_workbooks".into(), auth).await?;
        Ok(self.fixtures.lock().workbooks.clone())
    }

    async fn get_workbook(&self, auth: &AuthToken, workbook_id: &str) -> Result<Workbook> {
        self.enter(format!("get_workbook:{workbook_id}"), auth).await?;
        self.fixtures
            .lock()
            .workbooks
            .iter()
            .find(|w| w.id == workbook_id)
            .cloned()
            .ok_or_else(|| not_found("Workbook", workbook_id))
    }

    async fn list_workbook_views(
        &self,
        auth: &AuthToken,
        workbook_id: &str,
        include_usage: bool,
    ) -> Result<Vec<View>> {
        self.enter(format!("list_workbook_views:{workbook_id}"), auth)
            .await?;
        let f = self.fixtures.lock();
        if !f.workbooks.iter().any(|w| w.id == workbook_id) {
            return Err(not_found("Workbook", workbook_id));
        }
        Ok(f.views
            .iter()
            .filter(|v| v.workbook.as_ref().map(|w| w.id.as_str()) == Some(workbook_id))
            .cloned()
            .map(|mut v| {
                if !include_usage {
                    v.usage = None;
                }
                v
            })
            .collect())
    }

    async fn list_views(&self, auth: &AuthToken) -> Result<Vec<View>> {
        self.enter("list_views".into(), auth).await?;
        Ok(self
            .fixtures
            .lock()
            .views
            .iter()
            .cloned()
            .map(|mut v| {
                v.usage = None;
                v
            })
            .collect())
    }

    async fn get_view(&self, auth: &AuthToken, view_id: &str) -> Result<View> {
        self.enter(format!("get_view:{view_id}"), auth).await?;
        self.fixtures
            .lock()
            .views
            .iter()
            .find(|v| v.id == view_id)
            .cloned()
            .ok_or_else(|| not_found("View", view_id))
    }

    async fn view_csv(&self, auth: &AuthToken, view_id: &str) -> Result<String> {
        self.enter(format!("view_csv:{view_id}"), auth).await?;
        self.fixtures
            .lock()
            .view_csv
            .get(view_id)
            .cloned()
            .ok_or_else(|| not_found("View", view_id))
    }

    async fn view_image(&self, auth: &AuthToken, view_id: &str) -> Result<Vec<u8>> {
        self.enter(format!("view_image:{view_id}"), auth).await?;
        self.fixtures
            .lock()
            .view_png
            .get(view_id)
            .cloned()
            .ok_or_else(|| not_found("View", view_id))
    }

    async fn list_datasources(&self, auth: &AuthToken) -> Result<Vec<Datasource>> {
        self.enter("list_datasources".into(), auth).await?;
        Ok(self.fixtures.lock().datasources.clone())
    }

    async fn get_datasource(&self, auth: &AuthToken, datasource_id: &str) -> Result<Datasource> {
        self.enter(format!("get_datasource:{datasource_id}"), auth)
            .await?;
        self.fixtures
            .lock()
            .datasources
            .iter()
            .find(|d| d.id == datasource_id)
            .cloned()
            .ok_or_else(|| not_found("Datasource", datasource_id))
    }

    async fn download_datasource(
        &self,
        auth: &AuthToken,
        datasource_id: &str,
        include_extract: bool,
    ) -> Result<Vec<u8>> {
        self.enter(
            format!("download_datasource:{datasource_id}:{include_extract}"),
            auth,
        )
        .await?;
        self.fixtures
            .lock()
            .datasource_content
            .get(datasource_id)
            .cloned()
            .ok_or_else(|| not_found("Datasource", datasource_id))
    }

    async fn workbook_permissions(
        &self,
        auth: &AuthToken,
        workbook_id: &str,
    ) -> Result<Vec<GranteeCapabilities>> {
        self.enter(format!("workbook_permissions:{workbook_id}"), auth)
            .await?;
        let f = self.fixtures.lock();
        if !f.workbooks.iter().any(|w| w.id == workbook_id) {
            return Err(not_found("Workbook", workbook_id));
        }
        Ok(f.workbook_permissions
            .get(workbook_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn project_permissions(
        &self,
        auth: &AuthToken,
        project_id: &str,
    ) -> Result<Vec<GranteeCapabilities>> {
        self.enter(format!("project_permissions:{project_id}"), auth)
            .await?;
        let f = self.fixtures.lock();
        if !f.projects.iter().any(|p| p.id == project_id) {
            return Err(not_found("Project", project_id));
        }
        Ok(f.project_permissions
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_users(&self, auth: &AuthToken) -> Result<Vec<User>> {
        self.enter("list_users".into(), auth).await?;
        Ok(self.fixtures.lock().users.clone())
    }

    async fn get_user(&self, auth: &AuthToken, user_id: &str) -> Result<User> {
        self.enter(format!("get_user:{user_id}"), auth).await?;
        self.fixtures
            .lock()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| not_found("User", user_id))
    }

    async fn list_groups(&self, auth: &AuthToken) -> Result<Vec<Group>> {
        self.enter("list_groups".into(), auth).await?;
        Ok(self.fixtures.lock().groups.clone())
    }

    async fn list_group_users(&self, auth: &AuthToken, group_id: &str) -> Result<Vec<User>> {
        self.enter(format!("list_group_users:{group_id}"), auth)
            .await?;
        let f = self.fixtures.lock();
        let members = f
            .memberships
            .get(group_id)
            .ok_or_else(|| not_found("Group", group_id))?;
        Ok(f.users
            .iter()
            .filter(|u| members.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn list_user_groups(&self, auth: &AuthToken, user_id: &str) -> Result<Vec<Group>> {
        self.enter(format!("list_user_groups:{user_id}"), auth)
            .await?;
        let f = self.fixtures.lock();
        if !f.users.iter().any(|u| u.id == user_id) {
            return Err(not_found("User", user_id));
        }
        Ok(f.groups
            .iter()
            .filter(|g| {
                f.memberships
                    .get(&g.id)
                    .is_some_and(|members| members.iter().any(|m| m == user_id))
            })
            .cloned()
            .collect())
    }

    async fn list_projects(&self, auth: &AuthToken) -> Result<Vec<Project>> {
        self.enter("list_projects".into(), auth).await?;
        Ok(self.fixtures.lock().projects.clone())
    }

    async fn get_site(&self, auth: &AuthToken) -> Result<Site> {
        self.enter("get_site".into(), auth).await?;
        Ok(self.fixtures.lock().site.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_domain::config::AuthMethod;

    fn creds() -> Credentials {
        Credentials {
            server_url: "https://tableau.example.com".into(),
            site_id: String::new(),
            auth: AuthMethod::Token {
                name: "a".into(),
                value: "b".into(),
            },
        }
    }

    #[tokio::test]
    async fn signed_out_tokens_are_rejected() {
        let mock = MockTableau::sample();
        let token = mock.sign_in(&creds()).await.unwrap();
        assert_eq!(mock.list_workbooks(&token).await.unwrap().len(), 2);
        mock.sign_out(&token).await.unwrap();
        assert!(matches!(
            mock.list_workbooks(&token).await,
            Err(Error::SessionExpired(_))
        ));
        assert_eq!(mock.live_sessions(), 0);
    }

    #[tokio::test]
    async fn scripted_expiry_invalidates_the_token() {
        let mock = MockTableau::sample();
        let token = mock.sign_in(&creds()).await.unwrap();
        mock.expire_next_calls(1);
        assert!(matches!(
            mock.get_site(&token).await,
            Err(Error::SessionExpired(_))
        ));
        assert!(matches!(
            mock.get_site(&token).await,
            Err(Error::SessionExpired(_))
        ));
    }

    #[tokio::test]
    async fn sign_in_budget_is_enforced() {
        let mock = MockTableau::new();
        mock.allow_sign_ins(1);
        assert!(mock.sign_in(&creds()).await.is_ok());
        assert!(matches!(mock.sign_in(&creds()).await, Err(Error::Auth(_))));
        assert_eq!(mock.sign_ins(), 1);
        assert_eq!(mock.sign_in_attempts(), 2);
    }

    #[tokio::test]
    async fn user_groups_follow_memberships() {
        let mock = MockTableau::sample();
        let token = mock.sign_in(&creds()).await.unwrap();
        let groups = mock.list_user_groups(&token, "user-1").await.unwrap();
        assert_eq!(groups.len(), 2);
        let groups = mock.list_user_groups(&token, "user-3").await.unwrap();
        assert_eq!(groups.len(), 1);
        assert!(matches!(
            mock.list_user_groups(&token, "nobody").await,
            Err(Error::NotFound(_))
        ));
    }
}
