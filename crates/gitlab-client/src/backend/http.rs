//! GitLab REST v4 backend over blocking HTTP.
//!
//! Status codes are inspected by hand (the agent does not turn them into
//! errors) so that GitLab's `{"message": ...}` bodies reach the caller.

use crate::backend::Api;
use crate::error::{Error, Result};
use crate::types::{Branch, CreateBranchOptions, CreateGroupOptions, Group, UpdateGroupOptions};
use serde::de::DeserializeOwned;
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://gitlab.com/api/v4";

const USER_AGENT: &str = concat!("glprov/", env!("CARGO_PKG_VERSION"));

/// Blocking GitLab API backend.
pub struct HttpApi {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API root, e.g. `https://gitlab.com/api/v4`.
    base_url: String,
    /// Personal/project access token.
    token: Option<String>,
}

impl HttpApi {
    /// Create a backend for the given API root.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the configured API root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn branches_url(&self, project: &str) -> String {
        format!(
            "{}/projects/{}/repository/branches",
            self.base_url,
            urlencoding::encode(project)
        )
    }

    fn branch_url(&self, project: &str, name: &str) -> String {
        format!(
            "{}/{}",
            self.branches_url(project),
            urlencoding::encode(name)
        )
    }

    fn groups_url(&self) -> String {
        format!("{}/groups", self.base_url)
    }

    fn group_url(&self, id: &str) -> String {
        format!("{}/{}", self.groups_url(), urlencoding::encode(id))
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        let request = request
            .header("Accept", "application/json")
            .header("User-Agent", USER_AGENT);
        match &self.token {
            Some(token) => request.header("PRIVATE-TOKEN", token.as_str()),
            None => request,
        }
    }
}

/// Extract GitLab's error message from a failed response.
fn error_message(response: &mut Response<Body>) -> String {
    let status = response.status().as_u16();
    let text = response.body_mut().read_to_string().unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .map(|m| match m {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
        });

    match message {
        Some(m) => m,
        None if !text.trim().is_empty() => text.trim().to_string(),
        None => format!("HTTP {status}"),
    }
}

/// Map the status code, returning the response for further reading on success.
fn check(mut response: Response<Body>, resource: &str) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if status == 404 {
        return Err(Error::not_found(resource));
    }
    if !(200..300).contains(&status) {
        return Err(Error::Api {
            status,
            message: error_message(&mut response),
        });
    }
    Ok(response)
}

fn decode<T: DeserializeOwned>(response: Response<Body>, resource: &str) -> Result<T> {
    let mut response = check(response, resource)?;
    Ok(response.body_mut().read_json()?)
}

impl Api for HttpApi {
    fn create_branch(&self, project: &str, options: &CreateBranchOptions) -> Result<Branch> {
        let resource = format!("project {project}");
        log::debug!(
            "POST branch {} from {} in project {}",
            options.branch,
            options.reference,
            project
        );
        let response = self
            .authorize(self.agent.post(&self.branches_url(project)))
            .send_json(options)?;
        decode(response, &resource)
    }

    fn get_branch(&self, project: &str, name: &str) -> Result<Branch> {
        let resource = format!("branch {name} in project {project}");
        log::debug!("GET {resource}");
        let response = self
            .authorize(self.agent.get(&self.branch_url(project, name)))
            .call()?;
        decode(response, &resource)
    }

    fn delete_branch(&self, project: &str, name: &str) -> Result<()> {
        let resource = format!("branch {name} in project {project}");
        log::debug!("DELETE {resource}");
        let response = self
            .authorize(self.agent.delete(&self.branch_url(project, name)))
            .call()?;
        check(response, &resource).map(|_| ())
    }

    fn create_group(&self, options: &CreateGroupOptions) -> Result<Group> {
        log::debug!(
            "POST group {:?} (parent {:?})",
            options.settings.path,
            options.parent_id
        );
        let response = self
            .authorize(self.agent.post(&self.groups_url()))
            .send_json(options)?;
        decode(response, "parent group")
    }

    fn get_group(&self, id: &str) -> Result<Group> {
        let resource = format!("group {id}");
        log::debug!("GET {resource}");
        let response = self.authorize(self.agent.get(&self.group_url(id))).call()?;
        decode(response, &resource)
    }

    fn update_group(&self, id: u64, options: &UpdateGroupOptions) -> Result<Group> {
        let resource = format!("group {id}");
        log::debug!("PUT {resource}");
        let response = self
            .authorize(self.agent.put(&self.group_url(&id.to_string())))
            .send_json(options)?;
        decode(response, &resource)
    }

    fn delete_group(&self, id: u64) -> Result<()> {
        let resource = format!("group {id}");
        log::debug!("DELETE {resource}");
        let response = self
            .authorize(self.agent.delete(&self.group_url(&id.to_string())))
            .call()?;
        check(response, &resource).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupSettings;
    use httpmock::prelude::*;
    use serde_json::json;

    fn backend(server: &MockServer) -> HttpApi {
        HttpApi::new(
            server.url("/api/v4"),
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_urls_encode_paths() {
        let api = HttpApi::new(DEFAULT_BASE_URL, None, Duration::from_secs(1));
        assert_eq!(
            api.branch_url("group/project", "feature/x"),
            "https://gitlab.com/api/v4/projects/group%2Fproject/repository/branches/feature%2Fx"
        );
        assert_eq!(
            api.group_url("parent/child"),
            "https://gitlab.com/api/v4/groups/parent%2Fchild"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = HttpApi::new("https://gitlab.example.com/api/v4/", None, Duration::from_secs(1));
        assert_eq!(api.base_url(), "https://gitlab.example.com/api/v4");
    }

    #[test]
    fn test_get_branch_sends_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/projects/42/repository/branches/main")
                .header("PRIVATE-TOKEN", "secret");
            then.status(200).json_body(json!({
                "name": "main",
                "default": true,
                "can_push": true,
                "web_url": "https://gitlab.example.com/p/-/tree/main",
                "commit": {"id": "abc123", "short_id": "abc", "parent_ids": []}
            }));
        });

        let branch = backend(&server).get_branch("42", "main").unwrap();
        mock.assert();
        assert!(branch.default);
        assert_eq!(branch.commit.unwrap().id, "abc123");
    }

    #[test]
    fn test_get_branch_404_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/projects/42/repository/branches/gone");
            then.status(404).json_body(json!({"message": "404 Branch Not Found"}));
        });

        let err = backend(&server).get_branch("42", "gone").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_create_branch_surfaces_api_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/v4/projects/42/repository/branches")
                .body_contains("\"ref\":\"nope\"");
            then.status(400).json_body(json!({"message": "Invalid reference name: nope"}));
        });

        let err = backend(&server)
            .create_branch(
                "42",
                &CreateBranchOptions {
                    branch: "feature".to_string(),
                    reference: "nope".to_string(),
                },
            )
            .unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid reference name: nope");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_delete_group_accepts_202() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/api/v4/groups/7");
            then.status(202).json_body(json!({"message": "202 Accepted"}));
        });

        backend(&server).delete_group(7).unwrap();
        mock.assert();
    }

    #[test]
    fn test_update_group_sends_only_changed_settings() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/v4/groups/7")
                .json_body(json!({"description": "updated"}));
            then.status(200).json_body(json!({
                "id": 7, "name": "foo", "path": "foo", "description": "updated",
                "visibility": "public", "full_path": "foo"
            }));
        });

        let settings = GroupSettings {
            description: Some("updated".to_string()),
            ..Default::default()
        };
        let group = backend(&server).update_group(7, &settings).unwrap();
        mock.assert();
        assert_eq!(group.description, "updated");
    }

    #[test]
    fn test_server_error_is_retryable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/groups/7");
            then.status(502).body("Bad Gateway");
        });

        let err = backend(&server).get_group("7").unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Bad Gateway"));
    }
}
