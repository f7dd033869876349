// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskboard_core::{IdentityError, RoleId, UserId};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::authority::{Authority, Permission, Role};

/// Tokens are renewed when they expire within this margin.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Page size of list requests.
const PER_PAGE: u32 = 100;

/// Connection settings of the management API.
#[derive(Clone, Debug)]
pub struct ManagementConfig {
    /// Tenant domain, for example `example.eu.auth0.com`.
    pub domain: String,

    pub client_id: String,

    pub client_secret: SecretString,

    /// Audience of the management API token. Defaults to `https://<domain>/api/v2/`.
    pub audience: Option<String>,

    /// Id of the resource server holding all permissions as scopes.
    pub resource_server_id: String,

    /// Identifier of the same resource server, used when granting its scopes to roles.
    pub api_identifier: String,

    /// Timeout of every request.
    pub timeout: Duration,
}

impl ManagementConfig {
    fn audience(&self) -> String {
        self.audience
            .clone()
            .unwrap_or_else(|| format!("https://{}/api/v2/", self.domain))
    }
}

#[derive(Debug)]
struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct RoleResponse {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<RoleResponse> for Role {
    type Error = ManagementError;

    fn try_from(response: RoleResponse) -> Result<Self, Self::Error> {
        Ok(Role {
            id: response.id.parse()?,
            name: response.name,
            description: response.description.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct Scope {
    value: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ResourceServer {
    #[serde(default)]
    scopes: Vec<Scope>,
}

/// One page of a list requested with `include_totals=true`.
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(alias = "roles", alias = "permissions", alias = "users")]
    items: Vec<T>,
    total: usize,
}

/// Requests pages starting from 0 until `total` entries were collected.
///
/// A page without entries before that means the list changed or the API stopped early, this is
/// an error and never a shorter list.
async fn collect_pages<T, F>(mut fetch: F) -> Result<Vec<T>, ManagementError>
where
    F: AsyncFnMut(u32) -> Result<Page<T>, ManagementError>,
{
    let mut items = Vec::new();
    let mut page = 0;
    loop {
        let next = fetch(page).await?;
        let received = next.items.len();
        items.extend(next.items);

        if items.len() >= next.total {
            return Ok(items);
        }
        if received == 0 {
            return Err(ManagementError::IncompleteList {
                received: items.len(),
                total: next.total,
            });
        }
        page += 1;
    }
}

#[derive(Debug, Deserialize)]
struct RolePermission {
    permission_name: String,
}

#[derive(Debug, Deserialize)]
struct RoleMember {
    user_id: String,
}

/// Client of an Auth0-compatible management API.
///
/// Requests are authenticated with a bearer token obtained through a client-credentials exchange.
/// The token is cached inside the client and renewed shortly before it expires; clones of the
/// client share the cache.
///
/// Permissions are the scopes of one resource server, registering or removing them reads and
/// rewrites its whole scope list. Clones of the client take turns on these updates, separate
/// processes sharing one resource server can still overwrite each other's changes.
#[derive(Clone, Debug)]
pub struct ManagementClient {
    config: Arc<ManagementConfig>,
    base_url: Url,
    http: reqwest::Client,
    token: Arc<Mutex<Option<CachedToken>>>,
    scopes: Arc<Mutex<()>>,
}

impl ManagementClient {
    pub fn new(config: ManagementConfig) -> Result<Self, ManagementError> {
        let base_url = Url::parse(&format!("https://{}/", config.domain))
            .map_err(|_| ManagementError::InvalidDomain(config.domain.clone()))?;
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            config: Arc::new(config),
            base_url,
            http,
            token: Arc::default(),
            scopes: Arc::default(),
        })
    }

    /// Url of an endpoint, every segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ManagementError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ManagementError::InvalidDomain(self.config.domain.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn access_token(&self) -> Result<SecretString, ManagementError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh(Instant::now())) {
            return Ok(token.token.clone());
        }

        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.config.client_id,
            client_secret: self.config.client_secret.expose_secret(),
            audience: self.config.audience(),
        };
        let response = self
            .http
            .post(self.endpoint(&["oauth", "token"])?)
            .json(&request)
            .send()
            .await?;
        let response: TokenResponse = Self::parse(response).await?;

        debug!(expires_in = response.expires_in, "obtained management api token");

        let token = SecretString::from(response.access_token);
        cached.replace(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
        Ok(token)
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, ManagementError> {
        let token = self.access_token().await?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ManagementError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ManagementError::Status { status, message });
        }
        Ok(response.json().await?)
    }

    async fn check(response: reqwest::Response) -> Result<(), ManagementError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ManagementError::Status { status, message });
        }
        Ok(())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ManagementError> {
        let mut url = self.endpoint(segments)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        debug!(%url, "GET");
        let response = self.request(Method::GET, url).await?.send().await?;
        Self::parse(response).await
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<reqwest::Response, ManagementError> {
        let url = self.endpoint(segments)?;
        debug!(%url, %method, "sending");
        Ok(self.request(method, url).await?.json(body).send().await?)
    }

    /// Collects every page of a list endpoint.
    async fn get_all<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ManagementError> {
        collect_pages(async |page| {
            let mut query = query.to_vec();
            query.extend([
                ("page", page.to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("include_totals", "true".to_string()),
            ]);
            self.get::<Page<T>>(segments, &query).await
        })
        .await
    }

    async fn resource_server(&self) -> Result<ResourceServer, ManagementError> {
        self.get(
            &["api", "v2", "resource-servers", &self.config.resource_server_id],
            &[],
        )
        .await
    }

    async fn update_scopes(&self, scopes: Vec<Scope>) -> Result<(), ManagementError> {
        let response = self
            .send(
                Method::PATCH,
                &["api", "v2", "resource-servers", &self.config.resource_server_id],
                &json!({ "scopes": scopes }),
            )
            .await?;
        Self::check(response).await
    }

    fn permission_body(&self, names: &[String]) -> serde_json::Value {
        let permissions: Vec<_> = names
            .iter()
            .map(|name| {
                json!({
                    "resource_server_identifier": self.config.api_identifier,
                    "permission_name": name,
                })
            })
            .collect();
        json!({ "permissions": permissions })
    }

    /// Roles matching the name filter. The API filters case-insensitively by substring.
    async fn filter_roles(&self, filter: &str) -> Result<Vec<Role>, ManagementError> {
        let roles: Vec<RoleResponse> = self
            .get_all(&["api", "v2", "roles"], &[("name_filter", filter.to_string())])
            .await?;
        roles.into_iter().map(Role::try_from).collect()
    }
}

impl Authority for ManagementClient {
    type Error = ManagementError;

    async fn create_role(&self, name: &str, description: &str) -> Result<Role, Self::Error> {
        let response = self
            .send(
                Method::POST,
                &["api", "v2", "roles"],
                &json!({ "name": name, "description": description }),
            )
            .await?;
        let role: RoleResponse = Self::parse(response).await?;
        role.try_into()
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, Self::Error> {
        Ok(self
            .filter_roles(name)
            .await?
            .into_iter()
            .find(|role| role.name == name))
    }

    async fn roles_with_prefix(&self, prefix: &str) -> Result<Vec<Role>, Self::Error> {
        Ok(self
            .filter_roles(prefix)
            .await?
            .into_iter()
            .filter(|role| role.name.starts_with(prefix))
            .collect())
    }

    async fn delete_role(&self, role: &RoleId) -> Result<(), Self::Error> {
        let url = self.endpoint(&["api", "v2", "roles", role.as_str()])?;
        let response = self.request(Method::DELETE, url).await?.send().await?;
        Self::check(response).await
    }

    async fn create_permissions(&self, permissions: &[Permission]) -> Result<(), Self::Error> {
        let _guard = self.scopes.lock().await;
        let mut scopes: BTreeMap<String, Scope> = self
            .resource_server()
            .await?
            .scopes
            .into_iter()
            .map(|scope| (scope.value.clone(), scope))
            .collect();

        for permission in permissions {
            scopes
                .entry(permission.name.clone())
                .or_insert_with(|| Scope {
                    value: permission.name.clone(),
                    description: permission.description.clone(),
                });
        }

        self.update_scopes(scopes.into_values().collect()).await
    }

    async fn permissions_with_prefix(&self, prefix: &str) -> Result<Vec<Permission>, Self::Error> {
        Ok(self
            .resource_server()
            .await?
            .scopes
            .into_iter()
            .filter(|scope| scope.value.starts_with(prefix))
            .map(|scope| Permission::new(scope.value, scope.description))
            .collect())
    }

    async fn delete_permissions(&self, names: &[String]) -> Result<(), Self::Error> {
        let _guard = self.scopes.lock().await;
        let scopes = self
            .resource_server()
            .await?
            .scopes
            .into_iter()
            .filter(|scope| !names.contains(&scope.value))
            .collect();
        self.update_scopes(scopes).await
    }

    async fn grant_permissions(&self, role: &RoleId, names: &[String]) -> Result<(), Self::Error> {
        let response = self
            .send(
                Method::POST,
                &["api", "v2", "roles", role.as_str(), "permissions"],
                &self.permission_body(names),
            )
            .await?;
        Self::check(response).await
    }

    async fn revoke_permissions(&self, role: &RoleId, names: &[String]) -> Result<(), Self::Error> {
        let response = self
            .send(
                Method::DELETE,
                &["api", "v2", "roles", role.as_str(), "permissions"],
                &self.permission_body(names),
            )
            .await?;
        Self::check(response).await
    }

    async fn role_permissions(&self, role: &RoleId) -> Result<Vec<String>, Self::Error> {
        let permissions: Vec<RolePermission> = self
            .get_all(&["api", "v2", "roles", role.as_str(), "permissions"], &[])
            .await?;
        Ok(permissions
            .into_iter()
            .map(|permission| permission.permission_name)
            .collect())
    }

    async fn assign_roles(&self, user: &UserId, roles: &[RoleId]) -> Result<(), Self::Error> {
        let response = self
            .send(
                Method::POST,
                &["api", "v2", "users", user.as_str(), "roles"],
                &json!({ "roles": roles }),
            )
            .await?;
        Self::check(response).await
    }

    async fn unassign_roles(&self, user: &UserId, roles: &[RoleId]) -> Result<(), Self::Error> {
        let response = self
            .send(
                Method::DELETE,
                &["api", "v2", "users", user.as_str(), "roles"],
                &json!({ "roles": roles }),
            )
            .await?;
        Self::check(response).await
    }

    async fn user_roles(&self, user: &UserId) -> Result<Vec<Role>, Self::Error> {
        let roles: Vec<RoleResponse> = self
            .get_all(&["api", "v2", "users", user.as_str(), "roles"], &[])
            .await?;
        roles.into_iter().map(Role::try_from).collect()
    }

    async fn role_members(&self, role: &RoleId) -> Result<Vec<UserId>, Self::Error> {
        let members: Vec<RoleMember> = self
            .get_all(&["api", "v2", "roles", role.as_str(), "users"], &[])
            .await?;
        members
            .into_iter()
            .map(|member| member.user_id.parse().map_err(ManagementError::from))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum ManagementError {
    #[error("invalid authority domain '{0}'")]
    InvalidDomain(String),

    /// Connection, timeout or body decoding error.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("management api responded with {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("management api returned invalid identifier: {0}")]
    Identity(#[from] IdentityError),

    /// A list ended before all of its entries were returned.
    #[error("management api returned {received} of {total} entries")]
    IncompleteList { received: usize, total: usize },
}
