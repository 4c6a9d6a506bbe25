use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::BotConfig;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat API returned HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },
    #[error("unknown user {0}")]
    UnknownUser(String),
}

/// The group chat the bot watches and posts into.
#[async_trait]
pub trait GroupChat: Send + Sync {
    /// Ids of everyone currently in the group.
    async fn list_members(&self) -> Result<BTreeSet<String>, ChatError>;
    async fn username_of(&self, member_id: &str) -> Result<String, ChatError>;
    async fn send_message(&self, text: &str) -> Result<(), ChatError>;
}

#[derive(Debug, Deserialize)]
struct ThreadMembers {
    members: Vec<ThreadMember>,
}

#[derive(Debug, Deserialize)]
struct ThreadMember {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    username: String,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    text: &'a str,
}

/// [`GroupChat`] over a JSON relay that fronts the messaging platform.
///
/// `GET {base}/threads/{thread}/members`, `GET {base}/users/{id}`,
/// `POST {base}/threads/{thread}/messages`, all with a bearer token.
pub struct HttpGroupChat {
    client: reqwest::Client,
    base_url: String,
    token: String,
    thread_id: String,
}

impl HttpGroupChat {
    pub fn new(config: &BotConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            token: config.api_token.clone(),
            thread_id: config.thread_id.clone(),
        })
    }

    fn members_url(&self) -> String {
        format!("{}/threads/{}/members", self.base_url, self.thread_id)
    }

    fn user_url(&self, member_id: &str) -> String {
        format!("{}/users/{member_id}", self.base_url)
    }

    fn messages_url(&self) -> String {
        format!("{}/threads/{}/messages", self.base_url, self.thread_id)
    }
}

fn check_status(endpoint: &str, resp: reqwest::Response) -> Result<reqwest::Response, ChatError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(ChatError::Status {
            endpoint: endpoint.to_owned(),
            status: resp.status().as_u16(),
        })
    }
}

#[async_trait]
impl GroupChat for HttpGroupChat {
    async fn list_members(&self) -> Result<BTreeSet<String>, ChatError> {
        let url = self.members_url();
        let resp = self.client.get(&url).bearer_auth(&self.token).send().await?;
        let body: ThreadMembers = check_status(&url, resp)?.json().await?;
        Ok(body.members.into_iter().map(|member| member.id).collect())
    }

    async fn username_of(&self, member_id: &str) -> Result<String, ChatError> {
        let url = self.user_url(member_id);
        let resp = self.client.get(&url).bearer_auth(&self.token).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ChatError::UnknownUser(member_id.to_owned()));
        }
        let info: UserInfo = check_status(&url, resp)?.json().await?;
        Ok(info.username)
    }

    async fn send_message(&self, text: &str) -> Result<(), ChatError> {
        let url = self.messages_url();
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&OutgoingMessage { text })
            .send()
            .await?;
        check_status(&url, resp)?;
        Ok(())
    }
}
