//! HTTP client for the device file API.
//!
//! Every request carries HTTP Basic credentials; the device answers 401
//! without them. No request timeout is configured: a stalled device stalls
//! the current call until the transport gives up.

use crate::config::Config;
use crate::mime;
use crate::protocol::{FileEntry, SaveRequest, Stats, StopTarget};
use crate::upload::{FileTransfer, UploadItem};
use reqwest::{RequestBuilder, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} returned HTTP {status}")]
    Status {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Client for one device, cheap to clone.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl DeviceClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(
            config.http_base(),
            config.username.clone(),
            config.password.clone(),
        )
    }

    pub fn with_base_url(base_url: String, username: String, password: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.username, Some(&self.password))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.username, Some(&self.password))
    }

    /// `GET /api/files`
    pub async fn list_files(&self) -> Result<Vec<FileEntry>, ApiError> {
        let resp = self
            .get("/api/files")
            .query(&[("t", cache_buster())])
            .send()
            .await?;
        let resp = expect_success(resp, "list")?;
        Ok(resp.json().await?)
    }

    /// `GET /api/read?file=NAME`
    pub async fn read_file(&self, name: &str) -> Result<String, ApiError> {
        let resp = self.get(&raw_query("/api/read", "file", name)).send().await?;
        let resp = expect_success(resp, "read")?;
        Ok(resp.text().await?)
    }

    /// `POST /api/save`
    pub async fn save_file(&self, request: &SaveRequest) -> Result<(), ApiError> {
        let resp = self.post("/api/save").json(request).send().await?;
        expect_success(resp, "save")?;
        tracing::debug!("Saved {}", request.filename);
        Ok(())
    }

    /// `POST /api/run?file=NAME`. The status code is not checked.
    pub async fn run_file(&self, name: &str) -> Result<(), ApiError> {
        let resp = self.post(&raw_query("/api/run", "file", name)).send().await?;
        tracing::debug!("Run {} -> {}", name, resp.status());
        Ok(())
    }

    /// `POST /api/stop?target=NAME|ALL`. The status code is not checked.
    pub async fn stop(&self, target: &StopTarget) -> Result<(), ApiError> {
        let resp = self
            .post(&raw_query("/api/stop", "target", target.as_query()))
            .send()
            .await?;
        tracing::debug!("Stop {} -> {}", target, resp.status());
        Ok(())
    }

    /// `POST /api/delete?file=NAME`
    pub async fn delete_file(&self, name: &str) -> Result<(), ApiError> {
        let resp = self
            .post(&raw_query("/api/delete", "file", name))
            .send()
            .await?;
        expect_success(resp, "delete")?;
        Ok(())
    }

    /// `GET /api/stats`
    pub async fn stats(&self) -> Result<Stats, ApiError> {
        let resp = self
            .get("/api/stats")
            .query(&[("t", cache_buster())])
            .send()
            .await?;
        let resp = expect_success(resp, "stats")?;
        Ok(resp.json().await?)
    }

    /// `POST /api/upload` as multipart field `file`. Only 200 counts as success.
    pub async fn upload(&self, item: UploadItem) -> Result<(), ApiError> {
        let UploadItem { name, bytes } = item;
        let content_type = mime::content_type_for(&bytes, &name);
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name.clone())
            .mime_str(content_type)?;
        // The device splits `filename="..."` on quotes only; `/` must stay literal.
        let form = reqwest::multipart::Form::new()
            .percent_encode_noop()
            .part("file", part);

        let resp = self.post("/api/upload").multipart(form).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(ApiError::Status {
                operation: "upload",
                status: resp.status(),
            });
        }
        tracing::debug!("Uploaded {} ({} bytes)", name, size);
        Ok(())
    }
}

impl FileTransfer for DeviceClient {
    async fn transfer(&self, item: UploadItem) -> Result<(), ApiError> {
        self.upload(item).await
    }
}

fn expect_success(
    resp: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, ApiError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(ApiError::Status {
            operation,
            status: resp.status(),
        })
    }
}

/// `path?key=value` with `value` left as-is.
///
/// The device takes everything after `=` as the file name without decoding
/// it, so `/` must not become `%2F`. Only characters a request line cannot
/// carry (space, quotes, `#`, `<`, `>`) are escaped by URL parsing.
fn raw_query(path: &str, key: &str, value: &str) -> String {
    format!("{}?{}={}", path, key, value)
}

/// Millisecond timestamp appended as `t=` so the device's responses are never cached.
fn cache_buster() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // admin:admin
    const AUTH: &str = "Basic YWRtaW46YWRtaW4=";

    fn client(server: &MockServer) -> DeviceClient {
        DeviceClient::with_base_url(server.uri(), "admin".to_string(), "admin".to_string())
    }

    async fn only_request(server: &MockServer) -> wiremock::Request {
        let mut requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        requests.remove(0)
    }

    #[tokio::test]
    async fn upload_sends_multipart_file_field_with_relative_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .and(header("authorization", AUTH))
            .and(body_string_contains(
                r#"name="file"; filename="site/index.html""#,
            ))
            .and(body_string_contains("<h1>hi</h1>"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let item = UploadItem {
            name: "site/index.html".to_string(),
            bytes: b"<h1>hi</h1>".to_vec(),
        };

        client(&server).upload(item).await.unwrap();
    }

    #[tokio::test]
    async fn upload_treats_non_200_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        let item = UploadItem {
            name: "a.py".to_string(),
            bytes: b"x = 1".to_vec(),
        };

        let err = client(&server).upload(item).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Status {
                operation: "upload",
                status: StatusCode::CREATED
            }
        ));
    }

    #[tokio::test]
    async fn stop_all_uses_target_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/stop"))
            .and(query_param("target", "ALL"))
            .and(header("authorization", AUTH))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).stop(&StopTarget::All).await.unwrap();
    }

    #[tokio::test]
    async fn list_files_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/files"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"[{"name":"main.py","size":10,"type":"file"}]"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let files = client(&server).list_files().await.unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "main.py");
        let request = only_request(&server).await;
        assert!(request.url.query_pairs().any(|(k, v)| k == "t" && !v.is_empty()));
    }

    #[tokio::test]
    async fn delete_failure_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/delete"))
            .and(query_param("file", "blink.py"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server).delete_file("blink.py").await;

        assert!(matches!(
            result,
            Err(ApiError::Status {
                operation: "delete",
                status: StatusCode::INTERNAL_SERVER_ERROR
            })
        ));
    }

    #[tokio::test]
    async fn nested_names_keep_their_slashes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/read"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>hi</h1>"))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server)
            .read_file("portfolio/index.html")
            .await
            .unwrap();

        assert_eq!(body, "<h1>hi</h1>");
        let request = only_request(&server).await;
        assert_eq!(request.url.query(), Some("file=portfolio/index.html"));
    }

    #[tokio::test]
    async fn delete_sends_name_unencoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/delete"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        client(&server).delete_file("site/css/main.css").await.unwrap();

        let request = only_request(&server).await;
        assert_eq!(request.url.query(), Some("file=site/css/main.css"));
    }
}
