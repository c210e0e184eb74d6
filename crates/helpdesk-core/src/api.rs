//! REST collaborators backing snapshots and authoritative actions.
//!
//! The wire format is owned by the server; this client only assumes each
//! call returns the updated entity or a list of entities.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::config::CoreConfig;
use crate::error::RequestError;
use crate::models::{Agent, ChatMessage, Role, Task, Thread};

#[async_trait(?Send)]
pub trait SupportApi {
    async fn fetch_threads(&self, org_id: &str) -> Result<Vec<Thread>, RequestError>;

    async fn search_threads(&self, org_id: &str, query: &str) -> Result<Vec<Thread>, RequestError>;

    async fn fetch_messages(&self, thread_id: &str) -> Result<Vec<ChatMessage>, RequestError>;

    /// First open of an unread thread ("claim")
    async fn mark_thread_read(&self, thread_id: &str, role: Role) -> Result<(), RequestError>;

    /// Re-open of a read thread with unseen messages ("catch up")
    async fn mark_thread_seen(&self, thread_id: &str) -> Result<(), RequestError>;

    /// `None` unassigns.
    async fn assign_thread(
        &self,
        thread_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Thread, RequestError>;

    async fn fetch_tasks(&self, org_id: &str) -> Result<Vec<Task>, RequestError>;

    async fn fetch_unread_task_count(&self, org_id: &str) -> Result<u32, RequestError>;

    async fn assign_task(
        &self,
        task_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Task, RequestError>;

    async fn fetch_agents(&self, org_id: &str) -> Result<Vec<Agent>, RequestError>;

    /// The authenticated user's own record, including the persisted `online` flag
    async fn fetch_agent(&self, user_id: &str) -> Result<Agent, RequestError>;
}

#[derive(Deserialize)]
struct UnreadCount {
    count: u32,
}

/// reqwest-backed implementation.
pub struct HttpSupportApi {
    client: Client,
    base_url: String,
}

impl HttpSupportApi {
    pub fn new(config: &CoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, RequestError> {
        let response = request.send().await.map_err(|e| RequestError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(RequestError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, RequestError> {
        let response = self.send(endpoint, request).await?;
        response.json::<T>().await.map_err(|e| RequestError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait(?Send)]
impl SupportApi for HttpSupportApi {
    async fn fetch_threads(&self, org_id: &str) -> Result<Vec<Thread>, RequestError> {
        let request = self.client.get(self.url("/threads")).query(&[("orgId", org_id)]);
        self.json("threads", request).await
    }

    async fn search_threads(&self, org_id: &str, query: &str) -> Result<Vec<Thread>, RequestError> {
        let request = self
            .client
            .get(self.url("/threads/search"))
            .query(&[("orgId", org_id), ("q", query)]);
        self.json("threads/search", request).await
    }

    async fn fetch_messages(&self, thread_id: &str) -> Result<Vec<ChatMessage>, RequestError> {
        let request = self.client.get(self.url(&format!("/threads/{}/messages", thread_id)));
        self.json("threads/messages", request).await
    }

    async fn mark_thread_read(&self, thread_id: &str, role: Role) -> Result<(), RequestError> {
        let request = self
            .client
            .patch(self.url(&format!("/threads/{}/read", thread_id)))
            .json(&json!({ "role": role.as_str() }));
        self.send("threads/read", request).await.map(|_| ())
    }

    async fn mark_thread_seen(&self, thread_id: &str) -> Result<(), RequestError> {
        let request = self
            .client
            .patch(self.url(&format!("/threads/{}/seen", thread_id)));
        self.send("threads/seen", request).await.map(|_| ())
    }

    async fn assign_thread(
        &self,
        thread_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Thread, RequestError> {
        let request = self
            .client
            .patch(self.url(&format!("/threads/{}/assign", thread_id)))
            .json(&json!({ "agentId": agent_id }));
        self.json("threads/assign", request).await
    }

    async fn fetch_tasks(&self, org_id: &str) -> Result<Vec<Task>, RequestError> {
        let request = self.client.get(self.url("/tasks")).query(&[("orgId", org_id)]);
        self.json("tasks", request).await
    }

    async fn fetch_unread_task_count(&self, org_id: &str) -> Result<u32, RequestError> {
        let request = self
            .client
            .get(self.url("/tasks/unread-count"))
            .query(&[("orgId", org_id)]);
        let body: UnreadCount = self.json("tasks/unread-count", request).await?;
        Ok(body.count)
    }

    async fn assign_task(
        &self,
        task_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Task, RequestError> {
        let request = self
            .client
            .patch(self.url(&format!("/tasks/{}/assign", task_id)))
            .json(&json!({ "agentId": agent_id }));
        self.json("tasks/assign", request).await
    }

    async fn fetch_agents(&self, org_id: &str) -> Result<Vec<Agent>, RequestError> {
        let request = self.client.get(self.url("/agents")).query(&[("orgId", org_id)]);
        self.json("agents", request).await
    }

    async fn fetch_agent(&self, user_id: &str) -> Result<Agent, RequestError> {
        let request = self.client.get(self.url(&format!("/agents/{}", user_id)));
        self.json("agents/id", request).await
    }
}
