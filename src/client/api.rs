use std::time::Duration;
use async_trait::async_trait;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;
use crate::client::state::{Request, Response};
use crate::client::ClientError;
use crate::config;
use crate::models::last_recipient::LastRecipient;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const CONTACTS_TIMEOUT: Duration = Duration::from_secs(30);
const FOLDERS_TIMEOUT: Duration = Duration::from_secs(15);

/// Read side of the bridge HTTP API.
#[async_trait]
pub trait BridgeApi: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, ClientError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpBridgeApi {
    base: Url,
    client: reqwest::Client,
}

impl HttpBridgeApi {
    pub fn new(base: Url) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().build()?;
        Ok(HttpBridgeApi { base, client })
    }

    /// `/api/<segments..>` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Link(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, timeout: Duration) -> Result<T, ClientError> {
        debug!("GET {}", url);
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl BridgeApi for HttpBridgeApi {
    async fn fetch(&self, request: &Request) -> Result<Response, ClientError> {
        match request {
            Request::AvailableMessengers => {
                let url = self.endpoint(&["available-messengers"])?;
                Ok(Response::AvailableMessengers(self.get(url, DEFAULT_TIMEOUT).await?))
            }
            Request::Contacts => {
                let contacts_url = self.endpoint(&["contacts"])?;
                let last_url = self.endpoint(&["last-recipient"])?;
                let (contacts, last) = futures::join!(
                    self.get(contacts_url, CONTACTS_TIMEOUT),
                    self.get::<Option<LastRecipient>>(last_url, DEFAULT_TIMEOUT)
                );
                let last_recipient = last.unwrap_or_else(|e| {
                    debug!("No last recipient: {}", e);
                    None
                });
                Ok(Response::Contacts {
                    contacts: contacts?,
                    last_recipient,
                })
            }
            Request::Messages { entity_id } => {
                let url = self.endpoint(&["messages", entity_id])?;
                Ok(Response::Messages(self.get(url, DEFAULT_TIMEOUT).await?))
            }
            Request::Folders => {
                let url = self.endpoint(&["folders"])?;
                Ok(Response::Folders(self.get(url, FOLDERS_TIMEOUT).await?))
            }
            Request::FolderMessages { folder_id } => {
                let mut url = self.endpoint(&["folders", folder_id, "messages"])?;
                url.query_pairs_mut()
                    .append_pair("limit", &config::FOLDER_MESSAGE_LIMIT.to_string());
                Ok(Response::FolderMessages(self.get(url, FOLDERS_TIMEOUT).await?))
            }
            Request::FolderMessage {
                folder_id,
                message_id,
            } => {
                let url = self.endpoint(&["folders", folder_id, "messages", message_id])?;
                Ok(Response::FolderMessage(self.get(url, FOLDERS_TIMEOUT).await?))
            }
            Request::SettingsStatus => {
                let url = self.endpoint(&["settings", "status"])?;
                Ok(Response::SettingsStatus(self.get(url, DEFAULT_TIMEOUT).await?))
            }
        }
    }
}
