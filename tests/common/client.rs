//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all mixtape-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use std::time::Duration;

/// HTTP test client, optionally identifying as a user through the
/// requester header
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Display name sent with every request
    pub requester: Option<String>,
}

impl TestClient {
    /// Creates an anonymous client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            requester: None,
        }
    }

    /// Creates a client that identifies as [`TEST_USER_NAME`]
    pub fn as_user(base_url: String) -> Self {
        let mut client = Self::new(base_url);
        client.requester = Some(TEST_USER_NAME.to_string());
        client
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(format!("{}{}", self.base_url, path));
        match &self.requester {
            Some(name) => builder.header(REQUESTER_HEADER, name),
            None => builder,
        }
    }

    // ========================================================================
    // Track Endpoints
    // ========================================================================

    /// POST /v1/tracks/upload with a single `file` field
    pub async fn upload_track(&self, filename: &str, data: Vec<u8>) -> Response {
        let form = Form::new().part("file", Part::bytes(data).file_name(filename.to_string()));
        self.upload_form(form).await
    }

    /// POST /v1/tracks/upload with an arbitrary form
    pub async fn upload_form(&self, form: Form) -> Response {
        self.post("/v1/tracks/upload")
            .multipart(form)
            .send()
            .await
            .expect("Upload request failed")
    }

    /// POST /v1/tracks/merge with `files` and text parameters
    pub async fn merge_tracks(&self, files: &[(&str, Vec<u8>)], params: &[(&str, &str)]) -> Response {
        let mut form = Form::new();
        for (name, data) in files {
            form = form.part("files", Part::bytes(data.clone()).file_name(name.to_string()));
        }
        for (key, value) in params {
            form = form.text(key.to_string(), value.to_string());
        }
        self.merge_form(form).await
    }

    /// POST /v1/tracks/merge with an arbitrary form
    pub async fn merge_form(&self, form: Form) -> Response {
        self.post("/v1/tracks/merge")
            .multipart(form)
            .send()
            .await
            .expect("Merge request failed")
    }

    // ========================================================================
    // Static Assets
    // ========================================================================

    /// GET an absolute URL returned by the server
    pub async fn get_url(&self, url: &str) -> Response {
        self.client
            .get(url)
            .send()
            .await
            .expect("GET request failed")
    }

    /// Polls `url` until it answers 200 or the artwork timeout elapses
    pub async fn wait_for_asset(&self, url: &str) -> Option<Vec<u8>> {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(ARTWORK_WAIT_TIMEOUT_MS) {
            let response = self.get_url(url).await;
            if response.status().is_success() {
                return Some(response.bytes().await.expect("Failed to read body").to_vec());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }
}
