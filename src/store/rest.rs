use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{DocumentStore, StoreError};
use crate::docs::content::ContentTree;
use crate::docs::types::{DocumentPatch, DocumentStatus, StoredDocument, DEFAULT_TITLE};

const TABLE: &str = "documents";

/// Hosted relational store reached through a PostgREST-style HTTP API
#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
        })
    }

    /// Send requests on behalf of a signed-in user so row policies apply
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, TABLE)
    }

    fn request(&self, method: reqwest::Method, query: &[(&str, String)]) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);

        self.client
            .request(method, self.table_url())
            .query(query)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Accept", "application/json")
            .header("Prefer", "return=representation")
    }

    async fn rows(response: reqwest::Response) -> Result<Vec<StoredDocument>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("{}: {}", status, body)));
        }
        Ok(response.json().await?)
    }

    fn first_row(rows: Vec<StoredDocument>, id: &str) -> Result<StoredDocument, StoreError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

fn id_filter(id: &str) -> (&'static str, String) {
    ("id", format!("eq.{}", id))
}

fn insert_body(owner: &str, now: i64) -> Value {
    json!({
        "title": DEFAULT_TITLE,
        "content": ContentTree::empty().to_json_string(),
        "status": DocumentStatus::Draft,
        "owner": owner,
        "created_at": now,
        "updated_at": now,
    })
}

/// Content always goes out as serialized text, whatever form it was read in
fn patch_body(patch: &DocumentPatch, now: i64) -> Value {
    let mut body = Map::new();
    if let Some(title) = &patch.title {
        body.insert("title".to_string(), json!(title));
    }
    if let Some(content) = patch.serialized_content() {
        body.insert("content".to_string(), json!(content));
    }
    if let Some(status) = patch.status {
        body.insert("status".to_string(), json!(status));
    }
    body.insert("updated_at".to_string(), json!(now));
    Value::Object(body)
}

#[async_trait]
impl DocumentStore for RestStore {
    async fn create(&self, owner: &str) -> Result<String, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let response = self
            .request(reqwest::Method::POST, &[])
            .json(&insert_body(owner, now))
            .send()
            .await?;

        let created = Self::first_row(Self::rows(response).await?, "new document")
            .map_err(|_| StoreError::Backend("insert returned no row".to_string()))?;
        Ok(created.id)
    }

    async fn fetch(&self, id: &str) -> Result<StoredDocument, StoreError> {
        let response = self
            .request(reqwest::Method::GET, &[id_filter(id), ("select", "*".to_string())])
            .send()
            .await?;

        Self::first_row(Self::rows(response).await?, id)
    }

    async fn update(&self, id: &str, patch: &DocumentPatch) -> Result<StoredDocument, StoreError> {
        let now = chrono::Utc::now().timestamp_millis();
        let response = self
            .request(reqwest::Method::PATCH, &[id_filter(id)])
            .json(&patch_body(patch, now))
            .send()
            .await?;

        Self::first_row(Self::rows(response).await?, id)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::DELETE, &[id_filter(id)])
            .send()
            .await?;

        Self::first_row(Self::rows(response).await?, id).map(|_| ())
    }

    async fn list(&self, owner: &str) -> Result<Vec<StoredDocument>, StoreError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &[
                    ("owner", format!("eq.{}", owner)),
                    ("order", "updated_at.desc".to_string()),
                    ("select", "*".to_string()),
                ],
            )
            .send()
            .await?;

        Self::rows(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubServer;

    const TWO_ROWS: &str = r#"[
        {"id":"doc-2","title":"Newer","content":"{\"type\":\"doc\",\"content\":[]}","status":"draft","owner":"user-1","created_at":1,"updated_at":9},
        {"id":"doc-1","title":"Older","content":{"type":"doc","content":[]},"status":"published","owner":"user-1","created_at":1,"updated_at":5}
    ]"#;

    #[test]
    fn test_table_url_trims_slash() {
        let store = RestStore::new("https://db.example.com/", "anon").unwrap();
        assert_eq!(store.table_url(), "https://db.example.com/rest/v1/documents");
    }

    #[test]
    fn test_insert_body_defaults() {
        let body = insert_body("user-1", 10);
        assert_eq!(body["title"], DEFAULT_TITLE);
        assert_eq!(body["status"], "draft");
        assert_eq!(body["owner"], "user-1");

        let content = body["content"].as_str().unwrap();
        assert_eq!(content.parse::<ContentTree>().unwrap(), ContentTree::empty());
    }

    #[test]
    fn test_patch_body_serializes_content_and_stamps() {
        let patch = DocumentPatch {
            title: None,
            content: Some(ContentTree::empty()),
            status: Some(DocumentStatus::Published),
        };
        let body = patch_body(&patch, 42);

        assert!(body.get("title").is_none());
        assert!(body["content"].is_string());
        assert_eq!(body["status"], "published");
        assert_eq!(body["updated_at"], 42);
    }

    #[test]
    fn test_rows_decode_both_content_encodings() {
        let rows: Vec<StoredDocument> = serde_json::from_value(json!([
            {"id":"a","title":"t","content":ContentTree::empty().to_json_string(),
             "status":"draft","owner":"u","created_at":1,"updated_at":2},
            {"id":"b","title":"t","content":ContentTree::empty().to_json(),
             "status":"published","owner":"u","created_at":1,"updated_at":2}
        ]))
        .unwrap();

        for row in rows {
            assert_eq!(row.into_document().unwrap().content, ContentTree::empty());
        }
    }

    #[test]
    fn test_first_row_missing_is_not_found() {
        assert_eq!(
            RestStore::first_row(Vec::new(), "x").unwrap_err(),
            StoreError::NotFound("x".to_string())
        );
    }

    #[tokio::test]
    async fn test_update_without_matching_row_is_not_found() {
        let server = StubServer::start(vec![(200, "[]")]).await;
        let store = RestStore::new(&server.base_url, "anon").unwrap();
        let patch = DocumentPatch {
            title: Some("Plan".into()),
            ..DocumentPatch::default()
        };

        let err = store.update("doc-1", &patch).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("doc-1".to_string()));

        let sent = &server.requests()[0];
        assert_eq!(sent.method, "PATCH");
        assert_eq!(sent.target, "/rest/v1/documents?id=eq.doc-1");
        assert_eq!(sent.header("apikey"), Some("anon"));
        assert_eq!(sent.header("prefer"), Some("return=representation"));
        assert_eq!(sent.json()["title"], "Plan");
        assert!(sent.json()["updated_at"].is_i64());
    }

    #[tokio::test]
    async fn test_delete_without_matching_row_is_not_found() {
        let server = StubServer::start(vec![(200, "[]")]).await;
        let store = RestStore::new(&server.base_url, "anon").unwrap();

        let err = store.delete("doc-1").await.unwrap_err();
        assert_eq!(err, StoreError::NotFound("doc-1".to_string()));
        assert_eq!(server.requests()[0].method, "DELETE");
    }

    #[tokio::test]
    async fn test_list_filters_by_owner_newest_first() {
        let server = StubServer::start(vec![(200, TWO_ROWS)]).await;
        let store = RestStore::new(&server.base_url, "anon")
            .unwrap()
            .with_access_token("user-token");

        let rows = store.list("user-1").await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["doc-2", "doc-1"]);

        let sent = &server.requests()[0];
        assert_eq!(sent.method, "GET");
        assert!(sent.target.contains("owner=eq.user-1"), "{}", sent.target);
        assert!(sent.target.contains("order=updated_at.desc"), "{}", sent.target);
        assert_eq!(sent.header("authorization"), Some("Bearer user-token"));
    }

    #[tokio::test]
    async fn test_create_returns_inserted_id() {
        let server = StubServer::start(vec![(201, TWO_ROWS)]).await;
        let store = RestStore::new(&server.base_url, "anon").unwrap();

        assert_eq!(store.create("user-1").await.unwrap(), "doc-2");

        let sent = &server.requests()[0];
        assert_eq!(sent.method, "POST");
        assert_eq!(sent.json()["owner"], "user-1");
        assert_eq!(sent.json()["status"], "draft");
    }

    #[tokio::test]
    async fn test_error_status_is_backend_error() {
        let server = StubServer::start(vec![(500, r#"{"message":"boom"}"#)]).await;
        let store = RestStore::new(&server.base_url, "anon").unwrap();

        match store.fetch("doc-1").await {
            Err(StoreError::Backend(message)) => {
                assert!(message.contains("500"), "{message}");
                assert!(message.contains("boom"), "{message}");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
