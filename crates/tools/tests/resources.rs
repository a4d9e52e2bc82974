use std::sync::Arc;

use tm_domain::config::{AuthMethod, Credentials};
use tm_domain::error::Error;
use tm_sessions::SessionManager;
use tm_tableau::MockTableau;
use tm_tools::ResourceProvider;

fn provider(mock: &Arc<MockTableau>) -> ResourceProvider {
    let credentials = Credentials {
        server_url: "https://x.example.com".into(),
        site_id: String::new(),
        auth: AuthMethod::Password {
            username: "admin".into(),
            password: "pw".into(),
        },
    };
    ResourceProvider::new(Arc::new(SessionManager::new(mock.clone(), credentials)))
}

#[tokio::test]
async fn workbook_resource_is_a_json_snapshot() {
    let mock = Arc::new(MockTableau::sample());
    let resources = provider(&mock);

    let content = resources.read("tableau://workbooks/wb-1").await.unwrap();
    assert_eq!(content.uri, "tableau://workbooks/wb-1");
    assert_eq!(content.mime_type, "application/json");

    let snapshot: serde_json::Value = serde_json::from_str(&content.text).unwrap();
    assert_eq!(snapshot["name"], "Regional Sales");
    assert_eq!(snapshot["project"]["name"], "Sales");
    assert_eq!(snapshot["views"].as_array().unwrap().len(), 2);
    assert_eq!(snapshot["views"][0]["id"], "view-1");
    assert_eq!(mock.sign_outs(), 1);
}

#[tokio::test]
async fn view_data_resource_is_csv() {
    let mock = Arc::new(MockTableau::sample());
    let resources = provider(&mock);

    let content = resources.read("tableau://views/view-3/data").await.unwrap();
    assert_eq!(content.mime_type, "text/csv");
    assert_eq!(content.text, "Item,Qty\nBolts,500\n");
}

#[tokio::test]
async fn malformed_uri_is_rejected_before_sign_in() {
    let mock = Arc::new(MockTableau::sample());
    let resources = provider(&mock);

    let err = resources.read("tableau://sites/site-luid").await.unwrap_err();
    assert!(matches!(err, Error::InvalidUri(_)));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn missing_workbook_is_not_found() {
    let mock = Arc::new(MockTableau::sample());
    let resources = provider(&mock);

    let err = resources.read("tableau://workbooks/nope").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn list_enumerates_workbooks() {
    let mock = Arc::new(MockTableau::sample());
    let resources = provider(&mock);

    let entries = resources.list().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].uri, "tableau://workbooks/wb-1");
    assert_eq!(entries[0].name, "Workbook: Regional Sales");
    assert_eq!(entries[1].description, None);

    let templates = resources.templates();
    assert_eq!(templates.len(), 2);
    assert_eq!(templates[1].uri_template, "tableau://views/{id}/data");
}
