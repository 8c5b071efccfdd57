//! Authenticated vCloud Director session

use crate::error::{ClientError, Result};
use crate::wire::{LinkedEntity, OrgList, fault_from_body};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use vcdflow_cloud::ProviderConfig;
use vcdflow_cloud::model::Reference;

/// API version requested on every call
pub const API_VERSION: &str = "33.0";

pub const AUTH_HEADER: &str = "x-vcloud-authorization";

fn accept_header() -> String {
    format!("application/*+json;version={}", API_VERSION)
}

/// Logged-in session bound to one organization and VDC
pub struct VcdSession {
    client: reqwest::Client,
    base_url: String,
    org: Reference,
    vdc: Reference,
}

impl VcdSession {
    /// Log in with `user@org` and resolve the organization and VDC
    pub async fn connect(config: &ProviderConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?;
        let base_url = config.url.trim_end_matches('/').to_string();

        let login = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.allow_unverified_ssl)
            .build()?;
        let response = login
            .post(format!("{}/sessions", base_url))
            .basic_auth(config.login(), Some(&config.password))
            .header(ACCEPT, accept_header())
            .send()
            .await?;
        let response = check(response).await?;

        let token = response
            .headers()
            .get(AUTH_HEADER)
            .cloned()
            .ok_or_else(|| {
                ClientError::UnexpectedResponse(format!("login response carries no {}", AUTH_HEADER))
            })?;
        debug!(user = %config.login(), "Logged in");

        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, token);
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&accept_header())
                .map_err(|e| ClientError::UnexpectedResponse(e.to_string()))?,
        );
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.allow_unverified_ssl)
            .default_headers(headers)
            .build()?;

        let mut session = Self {
            client,
            base_url,
            org: Reference::default(),
            vdc: Reference::default(),
        };
        session.org = session.resolve_org(&config.org).await?;
        session.vdc = session
            .resolve_vdc(&session.org, config.vdc.as_deref())
            .await?;

        info!(org = %session.org.name, vdc = %session.vdc.name, "Connected to vCloud Director");
        Ok(session)
    }

    async fn resolve_org(&self, name: &str) -> Result<Reference> {
        let orgs: OrgList = self.get(&format!("{}/org", self.base_url)).await?;
        orgs.org
            .into_iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| ClientError::NotFound {
                kind: "organization",
                name: name.to_string(),
            })
    }

    /// The named VDC of the organization, or its first VDC
    async fn resolve_vdc(&self, org: &Reference, selector: Option<&str>) -> Result<Reference> {
        let org: LinkedEntity = self.get(&org.href).await?;
        let vdcs = org.children("vdc+json");
        let found = match selector {
            Some(name) => vdcs.into_iter().find(|v| v.name == name),
            None => vdcs.into_iter().next(),
        };
        found.ok_or_else(|| ClientError::NotFound {
            kind: "VDC",
            name: selector.unwrap_or("<first>").to_string(),
        })
    }

    pub fn org(&self) -> &Reference {
        &self.org
    }

    pub fn vdc(&self) -> &Reference {
        &self.vdc
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(%method, %url, "vCloud request");
        self.client.request(method, url)
    }

    /// Request with a JSON body of the given vCloud media type
    pub(crate) fn request_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        media_type: &str,
        body: &B,
    ) -> RequestBuilder {
        self.request(method, url)
            .header(
                CONTENT_TYPE,
                format!("application/vnd.vmware.{}+json", media_type),
            )
            .json(body)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.request(Method::GET, url).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turn non-success responses into classified faults
pub(crate) async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized(fault_from_body(status, &body).message));
    }
    Err(ClientError::Api(fault_from_body(status, &body)))
}
