//! Read-only resources addressed by `tableau://` URIs.
//!
//! - `tableau://workbooks/{id}`: JSON metadata snapshot of a workbook
//! - `tableau://views/{id}/data`: the view's data as CSV

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tm_domain::error::{Error, Result};
use tm_domain::trace::TraceEvent;
use tm_sessions::SessionManager;
use url::Url;

pub const SCHEME: &str = "tableau";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Workbook { id: String },
    ViewData { id: String },
}

impl ResourceUri {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidUri(raw.to_owned());
        let url = Url::parse(raw).map_err(|_| invalid())?;
        if url.scheme() != SCHEME || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid());
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.collect())
            .unwrap_or_default();
        match (url.host_str(), segments.as_slice()) {
            (Some("workbooks"), [id]) if !id.is_empty() => Ok(Self::Workbook {
                id: (*id).to_owned(),
            }),
            (Some("views"), [id, "data"]) if !id.is_empty() => Ok(Self::ViewData {
                id: (*id).to_owned(),
            }),
            _ => Err(invalid()),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Workbook { .. } => "application/json",
            Self::ViewData { .. } => "text/csv",
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workbook { id } => write!(f, "{SCHEME}://workbooks/{id}"),
            Self::ViewData { id } => write!(f, "{SCHEME}://views/{id}/data"),
        }
    }
}

/// The body of one resource read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// One `resources/list` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub uri_template: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub mime_type: &'static str,
}

#[derive(Debug)]
pub struct ResourceProvider {
    sessions: Arc<SessionManager>,
}

impl ResourceProvider {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub async fn read(&self, uri: &str) -> Result<ResourceContent> {
        let started = Instant::now();
        let result = self.read_inner(uri).await;
        TraceEvent::ResourceRead {
            uri: uri.to_owned(),
            outcome: match result {
                Ok(_) => "ok".to_owned(),
                Err(ref e) => e.kind().to_string(),
            },
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
        result
    }

    async fn read_inner(&self, raw: &str) -> Result<ResourceContent> {
        let uri = ResourceUri::parse(raw)?;
        let text = match uri {
            ResourceUri::Workbook { ref id } => {
                self.sessions
                    .with_session(|s| async move {
                        let workbook = s.api().get_workbook(s.auth(), id).await?;
                        let views = s.api().list_workbook_views(s.auth(), id, false).await?;
                        let snapshot = json!({
                            "id": workbook.id,
                            "name": workbook.name,
                            "description": workbook.description,
                            "contentUrl": workbook.content_url,
                            "webpageUrl": workbook.webpage_url,
                            "createdAt": workbook.created_at,
                            "updatedAt": workbook.updated_at,
                            "size": workbook.size,
                            "project": workbook.project,
                            "owner": workbook.owner,
                            "views": views
                                .iter()
                                .map(|v| json!({ "id": v.id, "name": v.name, "contentUrl": v.content_url }))
                                .collect::<Vec<_>>(),
                        });
                        Ok::<_, Error>(serde_json::to_string_pretty(&snapshot)?)
                    })
                    .await?
            }
            ResourceUri::ViewData { ref id } => {
                self.sessions
                    .with_session(|s| async move { s.api().view_csv(s.auth(), id).await })
                    .await?
            }
        };

        Ok(ResourceContent {
            uri: uri.to_string(),
            mime_type: uri.mime_type().to_owned(),
            text,
        })
    }

    /// One workbook resource per workbook on the site.
    pub async fn list(&self) -> Result<Vec<ResourceEntry>> {
        let workbooks = self
            .sessions
            .with_session(|s| async move { s.api().list_workbooks(s.auth()).await })
            .await?;
        Ok(workbooks
            .into_iter()
            .map(|wb| ResourceEntry {
                uri: ResourceUri::Workbook { id: wb.id }.to_string(),
                name: format!("Workbook: {}", wb.name),
                description: wb.description.filter(|d| !d.is_empty()),
                mime_type: "application/json".into(),
            })
            .collect())
    }

    pub fn templates(&self) -> Vec<ResourceTemplate> {
        vec![
            ResourceTemplate {
                uri_template: "tableau://workbooks/{id}",
                name: "Workbook metadata",
                description: "JSON snapshot of a workbook and its views",
                mime_type: "application/json",
            },
            ResourceTemplate {
                uri_template: "tableau://views/{id}/data",
                name: "View data",
                description: "The underlying data of a view as CSV",
                mime_type: "text/csv",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_shapes_parse_and_print_back() {
        for raw in ["tableau://workbooks/wb-1", "tableau://views/v-9/data"] {
            let uri = ResourceUri::parse(raw).unwrap();
            assert_eq!(uri.to_string(), raw);
        }
        assert_eq!(
            ResourceUri::parse("tableau://views/v-9/data").unwrap(),
            ResourceUri::ViewData { id: "v-9".into() }
        );
    }

    #[test]
    fn other_shapes_are_invalid() {
        for raw in [
            "https://workbooks/wb-1",
            "tableau://workbooks/",
            "tableau://workbooks/a/b",
            "tableau://views/v-1",
            "tableau://views/v-1/image",
            "tableau://datasources/ds-1",
            "tableau://workbooks/wb-1?x=1",
            "not a uri",
        ] {
            assert!(
                matches!(ResourceUri::parse(raw), Err(Error::InvalidUri(_))),
                "{raw} should be rejected"
            );
        }
    }
}
