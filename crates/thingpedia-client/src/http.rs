//! HTTP Thingpedia client
//!
//! Talks to the `/api/v3` REST interface of a Thingpedia server. DSL
//! endpoints answer with plain source text; everything else answers with
//! a JSON envelope `{"result": "ok", "data": ...}` or `{"error": ...}`.

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ThingpediaClient};
use crate::types::{
    DeviceFactory, DeviceListRecord, DeviceNameRecord, DeviceSetupMap, EntityLookupResult,
    EntityTypeRecord, LocationInput, LocationRecord,
};

/// Public Thingpedia server
pub const THINGPEDIA_URL: &str = "https://thingpedia.stanford.edu/thingpedia";

/// Request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DSL_MEDIA_TYPE: &str = "application/x-thingtalk";

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    result: Option<String>,
    data: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct DiscoveryResult {
    kind: String,
}

pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    locale: String,
    developer_key: Option<String>,
}

impl HttpClient {
    pub fn new(
        base_url: impl Into<String>,
        locale: impl Into<String>,
        developer_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        info!(url = %base_url, "Using Thingpedia server");
        Ok(Self {
            client,
            base_url,
            locale: locale.into(),
            developer_key,
        })
    }

    /// Full URL of an API path, e.g. `["devices", "code", kind]`
    ///
    /// Each segment is percent-encoded, so a kind cannot escape its
    /// position in the path.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["api", "v3"])
                .extend(segments.iter().copied());
        }
        url
    }

    /// Query parameters sent with every request
    fn common_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("locale", self.locale.clone())];
        if let Some(key) = &self.developer_key {
            query.push(("developer_key", key.clone()));
        }
        query
    }

    async fn check(&self, segments: &[&str], response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        let path = display_path(segments);
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(path));
        }
        let body = response.text().await.unwrap_or_default();
        warn!(path = %path, status = %status, "Thingpedia request failed");
        Err(ClientError::Server(format!("{}: {}", status, body)))
    }

    async fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        accept: &str,
    ) -> Result<Response, ClientError> {
        debug!(path = %display_path(segments), "GET");
        let response = self
            .client
            .get(self.endpoint(segments))
            .query(&self.common_query())
            .query(query)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await?;
        self.check(segments, response).await
    }

    async fn get_source(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<String, ClientError> {
        Ok(self.get(segments, query, DSL_MEDIA_TYPE).await?.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let body = self.get(segments, query, "application/json").await?.text().await?;
        unwrap_envelope(&display_path(segments), &body)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        debug!(path = %display_path(segments), "POST");
        let response = self
            .client
            .post(self.endpoint(segments))
            .query(&self.common_query())
            .json(body)
            .send()
            .await?;
        let body = self.check(segments, response).await?.text().await?;
        unwrap_envelope(&display_path(segments), &body)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, ClientError> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    if let Some(error) = envelope.error {
        let message = match error {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        return Err(ClientError::Server(message));
    }
    match (envelope.result.as_deref(), envelope.data) {
        (Some("ok") | None, Some(data)) => Ok(data),
        (result, _) => Err(ClientError::Server(format!(
            "unexpected response from {} (result: {})",
            path,
            result.unwrap_or("missing")
        ))),
    }
}

fn display_path(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

fn join_kinds(kinds: &[String]) -> String {
    kinds.join(",")
}

#[async_trait]
impl ThingpediaClient for HttpClient {
    fn locale(&self) -> &str {
        &self.locale
    }

    async fn get_module_location(&self, kind: &str) -> Result<String, ClientError> {
        let response = self
            .get(&["devices", "package", kind], &[], "application/zip")
            .await?;
        Ok(response.url().to_string())
    }

    async fn get_device_code(&self, kind: &str) -> Result<String, ClientError> {
        self.get_source(&["devices", "code", kind], &[]).await
    }

    async fn get_schemas(
        &self,
        kinds: &[String],
        with_metadata: bool,
    ) -> Result<String, ClientError> {
        let query = if with_metadata {
            vec![("meta", "1".to_string())]
        } else {
            Vec::new()
        };
        self.get_source(&["schema", &join_kinds(kinds)], &query)
            .await
    }

    async fn get_device_list(
        &self,
        category: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<DeviceListRecord>, ClientError> {
        let mut query = vec![
            ("page", page.to_string()),
            ("page_size", page_size.to_string()),
        ];
        if let Some(category) = category {
            query.push(("class", category.to_string()));
        }
        self.get_json(&["devices", "all"], &query).await
    }

    async fn search_device(&self, search: &str) -> Result<Vec<DeviceListRecord>, ClientError> {
        self.get_json(&["devices", "search"], &[("q", search.to_string())])
            .await
    }

    async fn get_device_factories(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<DeviceFactory>, ClientError> {
        let query: Vec<_> = category.map(|c| ("class", c.to_string())).into_iter().collect();
        self.get_json(&["devices", "setup"], &query).await
    }

    async fn get_device_setup(&self, kinds: &[String]) -> Result<DeviceSetupMap, ClientError> {
        self.get_json(&["devices", "setup", &join_kinds(kinds)], &[])
            .await
    }

    async fn get_kind_by_discovery(
        &self,
        public_data: &serde_json::Value,
    ) -> Result<String, ClientError> {
        let result: DiscoveryResult = self.post_json(&["devices", "discovery"], public_data).await?;
        Ok(result.kind)
    }

    async fn get_examples_by_key(&self, key: &str) -> Result<String, ClientError> {
        self.get_source(&["examples", "search"], &[("q", key.to_string())])
            .await
    }

    async fn get_examples_by_kinds(&self, kinds: &[String]) -> Result<String, ClientError> {
        self.get_source(&["examples", "by-kinds", &join_kinds(kinds)], &[])
            .await
    }

    async fn click_example(&self, example_id: i64) -> Result<(), ClientError> {
        let id = example_id.to_string();
        let segments = ["examples", "click", id.as_str()];
        let response = self
            .client
            .post(self.endpoint(&segments))
            .query(&self.common_query())
            .send()
            .await?;
        self.check(&segments, response).await?;
        Ok(())
    }

    async fn lookup_entity(
        &self,
        entity_type: &str,
        search_term: &str,
    ) -> Result<EntityLookupResult, ClientError> {
        // entity lookups carry `meta` next to `data`, outside the usual envelope
        let body = self
            .get(&["entities", "lookup", entity_type], &[("q", search_term.to_string())], "application/json")
            .await?
            .text()
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn lookup_location(
        &self,
        search_term: &str,
        around: Option<LocationInput>,
    ) -> Result<Vec<LocationRecord>, ClientError> {
        let mut query = vec![("q", search_term.to_string())];
        if let Some(around) = around {
            query.push(("latitude", around.latitude.to_string()));
            query.push(("longitude", around.longitude.to_string()));
        }
        self.get_json(&["locations", "lookup"], &query).await
    }

    async fn get_all_examples(&self) -> Result<String, ClientError> {
        self.get_source(&["examples", "all"], &[]).await
    }

    async fn get_all_device_names(&self) -> Result<Vec<DeviceNameRecord>, ClientError> {
        self.get_json(&["devices", "names"], &[]).await
    }

    async fn get_all_entity_types(&self) -> Result<Vec<EntityTypeRecord>, ClientError> {
        self.get_json(&["entities", "all"], &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(developer_key: Option<&str>) -> HttpClient {
        HttpClient::new(
            "https://example.org/thingpedia/",
            "en-US",
            developer_key.map(str::to_string),
            DEFAULT_TIMEOUT,
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint() {
        let client = client(None);
        assert_eq!(
            client.endpoint(&["devices", "code", "com.twitter"]).as_str(),
            "https://example.org/thingpedia/api/v3/devices/code/com.twitter"
        );
        assert_eq!(
            client.endpoint(&["schema", "com.twitter,com.weather"]).as_str(),
            "https://example.org/thingpedia/api/v3/schema/com.twitter,com.weather"
        );
        assert_eq!(client.locale(), "en-US");
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let client = client(None);
        let url = client.endpoint(&["devices", "code", "com.evil/../../admin?x=1#frag"]);
        assert_eq!(
            url.as_str(),
            "https://example.org/thingpedia/api/v3/devices/code/com.evil%2F..%2F..%2Fadmin%3Fx=1%23frag"
        );
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
        assert_eq!(url.path_segments().map(|s| s.count()), Some(5));
    }

    #[test]
    fn test_invalid_base_url() {
        for base in ["not a url", "mailto:someone@example.org"] {
            assert!(matches!(
                HttpClient::new(base, "en-US", None, DEFAULT_TIMEOUT),
                Err(ClientError::InvalidUrl(_))
            ));
        }
    }

    #[test]
    fn test_common_query() {
        assert_eq!(client(None).common_query(), vec![("locale", "en-US".to_string())]);
        assert_eq!(
            client(Some("secret")).common_query(),
            vec![
                ("locale", "en-US".to_string()),
                ("developer_key", "secret".to_string())
            ]
        );
    }

    #[test]
    fn test_join_kinds() {
        let kinds = vec!["com.twitter".to_string(), "com.weather".to_string()];
        assert_eq!(join_kinds(&kinds), "com.twitter,com.weather");
        assert_eq!(join_kinds(&[]), "");
    }

    #[test]
    fn test_unwrap_envelope() {
        let names: Vec<DeviceNameRecord> = unwrap_envelope(
            "/devices/names",
            r#"{"result":"ok","data":[{"kind":"com.twitter","kind_canonical":"twitter"}]}"#,
        )
        .unwrap();
        assert_eq!(names[0].kind_canonical, "twitter");

        let err = unwrap_envelope::<Vec<DeviceNameRecord>>("/x", r#"{"error":"Invalid kind"}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::Server(message) if message == "Invalid kind"));

        let err = unwrap_envelope::<Vec<DeviceNameRecord>>("/x", r#"{"result":"error"}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::Server(_)));

        let err = unwrap_envelope::<Vec<DeviceNameRecord>>("/x", "not json").unwrap_err();
        assert!(matches!(err, ClientError::Json(_)));
    }
}
