//! GitHub REST implementation of [`RemoteRepository`].

use crate::config::SyncConfig;
use crate::error::RemoteError;
use crate::remote::{
    BlobEncoding, NewTreeEntry, RemoteRepository, TreeEntryObject, TreeListingEntry,
};
use crate::types::ObjectId;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const USER_AGENT: &str = concat!("notesync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: ObjectId,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    tree: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeListingEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Repository client for the GitHub Git Data API.
pub struct GitHubRemote {
    client: Client,
    api_base: String,
    owner: String,
    repository: String,
    access_token: String,
}

impl GitHubRemote {
    pub fn new(
        api_base: impl Into<String>,
        owner: impl Into<String>,
        repository: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RemoteError::other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
            repository: repository.into(),
            access_token: access_token.into(),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, RemoteError> {
        Self::new(
            config.api_base_url.clone(),
            config.owner.clone(),
            config.repository.clone(),
            config.access_token.clone(),
        )
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_base, self.owner, self.repository, suffix
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Send a request and turn non-success statuses into [`RemoteError`].
    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let message = match response.json::<ErrorBody>().await {
            Ok(ErrorBody {
                message: Some(message),
            }) => message,
            _ => status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        };
        Err(RemoteError::from_status(
            status.as_u16(),
            format!("{} ({}): {}", url, status.as_u16(), message),
        ))
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, RemoteError> {
        let response = self.send(builder).await?;
        Ok(response.json::<T>().await?)
    }

    fn tree_entry_json(entry: &NewTreeEntry) -> Value {
        match &entry.object {
            TreeEntryObject::Inline(content) => json!({
                "path": entry.path,
                "mode": entry.mode,
                "type": "blob",
                "content": content,
            }),
            TreeEntryObject::Blob(sha) => json!({
                "path": entry.path,
                "mode": entry.mode,
                "type": "blob",
                "sha": sha,
            }),
            TreeEntryObject::Delete => json!({
                "path": entry.path,
                "mode": entry.mode,
                "type": "blob",
                "sha": Value::Null,
            }),
        }
    }
}

#[async_trait]
impl RemoteRepository for GitHubRemote {
    async fn check_repository(&self) -> Result<(), RemoteError> {
        let url = self.repo_url("");
        self.send(self.request(Method::GET, url)).await?;
        Ok(())
    }

    async fn head_commit(&self, branch: &str) -> Result<Option<ObjectId>, RemoteError> {
        let url = self.repo_url(&format!("/git/ref/heads/{}", branch));
        // Empty If-None-Match defeats conditional caching so a freshly moved
        // ref is observed.
        let builder = self
            .request(Method::GET, url)
            .header("If-None-Match", "");
        let response = builder.send().await?;
        let status = response.status().as_u16();
        // 409 is returned for a repository with no commits at all
        if status == 404 || status == 409 {
            debug!(branch, status, "Branch has no head commit");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RemoteError::from_status(
                status,
                format!("Failed to resolve head of branch {}", branch),
            ));
        }
        let body: RefResponse = response.json().await?;
        Ok(Some(body.object.sha))
    }

    async fn commit_tree(&self, commit: &str) -> Result<ObjectId, RemoteError> {
        let url = self.repo_url(&format!("/git/commits/{}", commit));
        let body: CommitResponse = self.send_json(self.request(Method::GET, url)).await?;
        Ok(body.tree.sha)
    }

    async fn list_tree(&self, tree: &str) -> Result<Vec<TreeListingEntry>, RemoteError> {
        let url = self.repo_url(&format!("/git/trees/{}", tree));
        let builder = self
            .request(Method::GET, url)
            .query(&[("recursive", "1")]);
        let body: TreeResponse = self.send_json(builder).await?;
        complete_listing(tree, body)
    }

    async fn get_blob(&self, blob: &str) -> Result<String, RemoteError> {
        let url = self.repo_url(&format!("/git/blobs/{}", blob));
        let body: BlobResponse = self.send_json(self.request(Method::GET, url)).await?;
        match body.encoding.as_deref() {
            None | Some("base64") => Ok(body.content),
            Some("utf-8") => Ok(BASE64.encode(body.content.as_bytes())),
            Some(other) => Err(RemoteError::other(format!(
                "Unsupported blob encoding {} for {}",
                other, blob
            ))),
        }
    }

    async fn create_blob(
        &self,
        content: &str,
        encoding: BlobEncoding,
    ) -> Result<ObjectId, RemoteError> {
        let url = self.repo_url("/git/blobs");
        let builder = self
            .request(Method::POST, url)
            .json(&json!({ "content": content, "encoding": encoding }));
        let body: ShaResponse = self.send_json(builder).await?;
        Ok(body.sha)
    }

    async fn create_tree(
        &self,
        entries: &[NewTreeEntry],
        base_tree: Option<&str>,
    ) -> Result<ObjectId, RemoteError> {
        let url = self.repo_url("/git/trees");
        let tree: Vec<Value> = entries.iter().map(Self::tree_entry_json).collect();
        let mut payload = json!({ "tree": tree });
        if let Some(base) = base_tree {
            payload["base_tree"] = json!(base);
        }
        let body: ShaResponse = self
            .send_json(self.request(Method::POST, url).json(&payload))
            .await?;
        Ok(body.sha)
    }

    async fn create_commit(
        &self,
        tree: &str,
        parent: Option<&str>,
        message: &str,
    ) -> Result<ObjectId, RemoteError> {
        let url = self.repo_url("/git/commits");
        let parents: Vec<&str> = parent.into_iter().collect();
        let payload = json!({ "tree": tree, "message": message, "parents": parents });
        let body: ShaResponse = self
            .send_json(self.request(Method::POST, url).json(&payload))
            .await?;
        Ok(body.sha)
    }

    async fn create_ref(&self, branch: &str, commit: &str) -> Result<(), RemoteError> {
        let url = self.repo_url("/git/refs");
        let payload = json!({ "ref": format!("refs/heads/{}", branch), "sha": commit });
        self.send(self.request(Method::POST, url).json(&payload))
            .await?;
        Ok(())
    }

    async fn update_ref(&self, branch: &str, commit: &str) -> Result<(), RemoteError> {
        let url = self.repo_url(&format!("/git/refs/heads/{}", branch));
        let payload = json!({ "sha": commit, "force": false });
        self.send(self.request(Method::PATCH, url).json(&payload))
            .await?;
        Ok(())
    }

    async fn create_initial_commit(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<(), RemoteError> {
        let url = self.repo_url(&format!("/contents/{}", path));
        let payload = json!({
            "message": message,
            "content": BASE64.encode(content.as_bytes()),
            "branch": branch,
        });
        self.send(self.request(Method::PUT, url).json(&payload))
            .await?;
        Ok(())
    }
}

/// Entries of a recursive listing. A truncated listing is an error: paths
/// missing from it would be classified as deleted on the remote.
fn complete_listing(tree: &str, body: TreeResponse) -> Result<Vec<TreeListingEntry>, RemoteError> {
    if body.truncated {
        return Err(RemoteError::other(format!(
            "Remote tree {} listing was truncated after {} entries",
            tree,
            body.tree.len()
        )));
    }
    Ok(body.tree)
}
