//! REST implementation of the remote API.
//!
//! Every response is wrapped in the platform envelope
//! `{ErrorCode, ErrorStatus, Message, Response}`; `ErrorCode == 1` is success.
//! 5xx statuses are surfaced as `RemoteError::Transport` so the executor can
//! treat them as possibly applied.

use super::components::{ProfileResponse, FULL_COMPONENTS, INVENTORY_COMPONENTS};
use super::{EquipStatus, ProfileScope, RemoteApi, SocketPlugRequest, TransferRequest};
use crate::catalog::Catalog;
use crate::error::{EngineError, EngineResult, PlatformErrorCode, RemoteError, RemoteResult};
use async_trait::async_trait;
use loadout_types::{CharacterId, ItemInstanceId, MembershipId, ProfileSnapshot};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

const SUCCESS_CODE: i32 = 1;

/// HTTP remote configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpRemoteConfig {
    /// Base URL including the `/Platform` prefix.
    pub api_base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub membership_type: i32,
    pub timeout_secs: u64,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.bungie.net/Platform".to_string(),
            api_key: String::new(),
            access_token: None,
            membership_type: 3,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<T> {
    error_code: i32,
    #[serde(default)]
    error_status: String,
    #[serde(default)]
    message: String,
    response: Option<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TransferBody {
    item_reference_hash: u32,
    stack_size: u32,
    transfer_to_vault: bool,
    item_id: String,
    character_id: String,
    membership_type: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EquipBody {
    item_id: String,
    character_id: String,
    membership_type: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EquipManyBody {
    item_ids: Vec<String>,
    character_id: String,
    membership_type: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlugBody {
    socket_index: u32,
    socket_array_type: u32,
    plug_item_hash: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertPlugBody {
    plug: PlugBody,
    item_id: String,
    character_id: String,
    membership_type: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LockBody {
    state: bool,
    item_id: String,
    character_id: String,
    membership_type: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EquipManyResponse {
    equip_results: Vec<EquipResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EquipResult {
    item_instance_id: String,
    equip_status: i32,
}

/// Remote API over HTTP.
///
/// Profile responses carry only hashes and instance state; the catalog
/// supplies the rest of each item.
pub struct HttpRemoteApi {
    config: HttpRemoteConfig,
    client: Client,
    catalog: Arc<dyn Catalog>,
    access_token: Arc<RwLock<Option<String>>>,
}

impl HttpRemoteApi {
    /// Creates a client for the configured endpoint.
    pub fn new(config: HttpRemoteConfig, catalog: Arc<dyn Catalog>) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Config(format!("failed to create HTTP client: {e}")))?;
        let access_token = Arc::new(RwLock::new(config.access_token.clone()));
        Ok(Self {
            config,
            client,
            catalog,
            access_token,
        })
    }

    /// Replaces the bearer token (e.g. after an OAuth refresh).
    pub async fn set_access_token(&self, token: impl Into<String>) {
        *self.access_token.write().await = Some(token.into());
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("X-API-Key", &self.config.api_key);
        match self.access_token.read().await.as_ref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> RemoteResult<T> {
        debug!("POST {}", path);
        let request = self.authorize(self.client.post(self.url(path)).json(body)).await;
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Network(format!("request to {path} failed: {e}")))?;
        read_envelope(response).await
    }

    async fn action(&self, path: &str, body: &impl Serialize) -> RemoteResult<()> {
        let _: serde_json::Value = self.post(path, body).await?;
        Ok(())
    }
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RemoteError::Network(format!("failed to read response: {e}")))?;

    if status.is_server_error() {
        return Err(RemoteError::Transport {
            status: status.as_u16(),
            message: text,
        });
    }

    let envelope: Envelope<T> = match serde_json::from_str(&text) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(RemoteError::Transport {
                status: status.as_u16(),
                message: text,
            });
        }
        Err(e) => return Err(RemoteError::Malformed(e.to_string())),
    };

    if envelope.error_code != SUCCESS_CODE {
        return Err(RemoteError::Domain {
            code: PlatformErrorCode::from_status(&envelope.error_status, envelope.error_code),
            message: envelope.message,
        });
    }

    envelope
        .response
        .ok_or_else(|| RemoteError::Malformed("missing Response".to_string()))
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn transfer_item(&self, request: &TransferRequest) -> RemoteResult<()> {
        let body = TransferBody {
            item_reference_hash: request.item_hash.get(),
            stack_size: request.stack_size,
            transfer_to_vault: request.to_vault,
            item_id: request.item.to_string(),
            character_id: request.character.to_string(),
            membership_type: self.config.membership_type,
        };
        self.action("/Destiny2/Actions/Items/TransferItem/", &body).await
    }

    async fn equip_item(&self, item: ItemInstanceId, character: CharacterId) -> RemoteResult<()> {
        let body = EquipBody {
            item_id: item.to_string(),
            character_id: character.to_string(),
            membership_type: self.config.membership_type,
        };
        self.action("/Destiny2/Actions/Items/EquipItem/", &body).await
    }

    async fn equip_items(
        &self,
        items: &[ItemInstanceId],
        character: CharacterId,
    ) -> RemoteResult<Vec<EquipStatus>> {
        let body = EquipManyBody {
            item_ids: items.iter().map(ToString::to_string).collect(),
            character_id: character.to_string(),
            membership_type: self.config.membership_type,
        };
        let response: EquipManyResponse =
            self.post("/Destiny2/Actions/Items/EquipItems/", &body).await?;

        response
            .equip_results
            .into_iter()
            .map(|result| {
                let item: ItemInstanceId = result.item_instance_id.parse().map_err(|_| {
                    RemoteError::Malformed(format!("bad item id {}", result.item_instance_id))
                })?;
                Ok(if result.equip_status == SUCCESS_CODE {
                    EquipStatus::ok(item)
                } else {
                    EquipStatus::failed(
                        item,
                        RemoteError::domain(PlatformErrorCode::from_code(result.equip_status)),
                    )
                })
            })
            .collect()
    }

    async fn insert_socket_plug(&self, request: &SocketPlugRequest) -> RemoteResult<()> {
        let body = InsertPlugBody {
            plug: PlugBody {
                socket_index: request.socket_index,
                socket_array_type: 0,
                plug_item_hash: request.plug.get(),
            },
            item_id: request.item.to_string(),
            character_id: request.character.to_string(),
            membership_type: self.config.membership_type,
        };
        self.action("/Destiny2/Actions/Items/InsertSocketPlugFree/", &body)
            .await
    }

    async fn set_lock_state(
        &self,
        item: ItemInstanceId,
        character: CharacterId,
        locked: bool,
    ) -> RemoteResult<()> {
        let body = LockBody {
            state: locked,
            item_id: item.to_string(),
            character_id: character.to_string(),
            membership_type: self.config.membership_type,
        };
        self.action("/Destiny2/Actions/Items/SetLockState/", &body).await
    }

    async fn fetch_profile(
        &self,
        membership: MembershipId,
        scope: ProfileScope,
    ) -> RemoteResult<ProfileSnapshot> {
        let components = match scope {
            ProfileScope::Full => FULL_COMPONENTS,
            ProfileScope::Inventory => INVENTORY_COMPONENTS,
        };
        let path = format!(
            "/Destiny2/{}/Profile/{}/",
            self.config.membership_type, membership
        );
        debug!("GET {} components={}", path, components);

        let request = self
            .authorize(
                self.client
                    .get(self.url(&path))
                    .query(&[("components", components)]),
            )
            .await;
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Network(format!("profile fetch failed: {e}")))?;
        let profile: ProfileResponse = read_envelope(response).await?;
        profile.into_snapshot(membership, self.catalog.as_ref())
    }
}
