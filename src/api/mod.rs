use std::time::Duration;

use reqwest::{Method, Request, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    CampaignId, CampaignStats, CampaignSummary, Company, CompanyGroup, CriteriaSuggestions,
    Objective, Segment, SegmentId, Template,
};
use crate::targeting::{TargetingCriteria, TargetingQuery};
use crate::wizard::CampaignDraft;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid base url: {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },

    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server rejected the request: {message}")]
    Rejected { message: String },
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            proxy: None,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct CreateCampaignResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub campagne_id: Option<CampaignId>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct SegmentCreated {
    pub id: SegmentId,
    #[serde(default)]
    pub nom: String,
}

#[derive(Clone, Debug, Serialize)]
struct NewSegment<'a> {
    nom: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    criteres: &'a TargetingCriteria,
}

#[derive(Debug, Deserialize)]
struct Acknowledgement {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Thin typed client over the ProspectLab JSON API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(options: &ClientOptions) -> Result<Self, ApiError> {
        let mut raw = options.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url = Url::parse(&raw).map_err(|e| ApiError::InvalidBaseUrl {
            url: options.base_url.clone(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl {
                url: options.base_url.clone(),
                message: "not a base url".to_string(),
            });
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("prospectlab/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(options.timeout_seconds.max(1)));
        if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| ApiError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::ClientBuild { source: e })?;

        Ok(Self {
            client,
            base_url,
            token: options
                .api_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidBaseUrl {
                url: format!("{}{}", self.base_url, path),
                message: e.to_string(),
            })
    }

    fn builder(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, ApiError> {
        let url = self.endpoint(path)?;
        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    fn build(&self, builder: reqwest::RequestBuilder, path: &str) -> Result<Request, ApiError> {
        builder.build().map_err(|e| ApiError::Request {
            url: path.to_string(),
            source: e,
        })
    }

    async fn execute<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let url = request.url().to_string();
        tracing::debug!(method = %request.method(), %url, "api request");
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ApiError::Request {
                url: url.clone(),
                source: e,
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
                message: error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode { url, source: e })
    }

    /// Request for the candidate pool of `query`. `All` hits the
    /// unfiltered endpoint.
    pub fn companies_request(&self, query: &TargetingQuery) -> Result<Request, ApiError> {
        match query {
            TargetingQuery::All => {
                let path = "api/entreprises/emails";
                self.build(self.builder(Method::GET, path)?, path)
            }
            TargetingQuery::Filtered(criteria) => {
                let path = "api/ciblage/entreprises";
                let pairs = criteria.to_query_pairs();
                self.build(self.builder(Method::GET, path)?.query(&pairs), path)
            }
        }
    }

    pub async fn fetch_companies(&self, query: &TargetingQuery) -> Result<Vec<Company>, ApiError> {
        let request = self.companies_request(query)?;
        self.execute(request).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.build(self.builder(Method::GET, path)?, path)?;
        self.execute(request).await
    }

    pub async fn objectives(&self) -> Result<Vec<Objective>, ApiError> {
        self.get_json("api/ciblage/objectifs").await
    }

    pub async fn segments(&self) -> Result<Vec<Segment>, ApiError> {
        self.get_json("api/ciblage/segments").await
    }

    pub fn save_segment_request(
        &self,
        nom: &str,
        description: Option<&str>,
        criteres: &TargetingCriteria,
    ) -> Result<Request, ApiError> {
        let path = "api/ciblage/segments";
        let body = NewSegment {
            nom,
            description,
            criteres,
        };
        self.build(self.builder(Method::POST, path)?.json(&body), path)
    }

    pub async fn save_segment(
        &self,
        nom: &str,
        description: Option<&str>,
        criteres: &TargetingCriteria,
    ) -> Result<SegmentCreated, ApiError> {
        let request = self.save_segment_request(nom, description, criteres)?;
        self.execute(request).await
    }

    pub async fn groups(&self) -> Result<Vec<CompanyGroup>, ApiError> {
        self.get_json("api/groupes-entreprises").await
    }

    pub async fn suggestions(&self) -> Result<CriteriaSuggestions, ApiError> {
        self.get_json("api/ciblage/suggestions?with_counts=1").await
    }

    pub async fn templates(&self) -> Result<Vec<Template>, ApiError> {
        self.get_json("api/templates").await
    }

    pub fn campaigns_request(&self, statut: Option<&str>) -> Result<Request, ApiError> {
        let path = "api/campagnes";
        let mut builder = self.builder(Method::GET, path)?;
        if let Some(statut) = statut.map(str::trim).filter(|s| !s.is_empty()) {
            builder = builder.query(&[("statut", statut)]);
        }
        self.build(builder, path)
    }

    pub async fn campaigns(&self, statut: Option<&str>) -> Result<Vec<CampaignSummary>, ApiError> {
        let request = self.campaigns_request(statut)?;
        self.execute(request).await
    }

    pub fn create_campaign_request(&self, draft: &CampaignDraft) -> Result<Request, ApiError> {
        let path = "api/campagnes";
        self.build(self.builder(Method::POST, path)?.json(draft), path)
    }

    /// Submits the draft. A body with `success: false` is turned into
    /// [`ApiError::Rejected`].
    pub async fn create_campaign(&self, draft: &CampaignDraft) -> Result<CreateCampaignResponse, ApiError> {
        let request = self.create_campaign_request(draft)?;
        let response: CreateCampaignResponse = self.execute(request).await?;
        if !response.success {
            return Err(ApiError::Rejected {
                message: response
                    .error
                    .unwrap_or_else(|| "campaign was not created".to_string()),
            });
        }
        Ok(response)
    }

    pub async fn delete_campaign(&self, id: CampaignId) -> Result<(), ApiError> {
        let path = format!("api/campagnes/{}", id);
        let request = self.build(self.builder(Method::DELETE, &path)?, &path)?;
        let ack: Acknowledgement = self.execute(request).await?;
        if ack.success {
            Ok(())
        } else {
            Err(ApiError::Rejected {
                message: ack.error.unwrap_or_else(|| format!("campaign {} not deleted", id)),
            })
        }
    }

    pub async fn campaign_stats(&self, id: CampaignId) -> Result<CampaignStats, ApiError> {
        self.get_json(&format!("api/tracking/campagne/{}", id)).await
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.as_str())
        .map(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Recipient;
    use crate::wizard::SendMode;

    fn client(token: Option<&str>) -> ApiClient {
        ApiClient::new(&ClientOptions {
            base_url: "http://crm.local:5000/prospectlab".to_string(),
            api_token: token.map(|t| t.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn unfiltered_pool_uses_the_emails_endpoint() {
        let req = client(None).companies_request(&TargetingQuery::All).unwrap();
        assert_eq!(
            req.url().as_str(),
            "http://crm.local:5000/prospectlab/api/entreprises/emails"
        );
        assert!(req.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn criteria_become_query_parameters() {
        let query = TargetingQuery::Filtered(TargetingCriteria {
            secteur_contains: Some("Santé".to_string()),
            groupe_ids: vec![1, 4],
            exclude_already_contacted: true,
            ..Default::default()
        });
        let req = client(Some("tok")).companies_request(&query).unwrap();
        assert_eq!(req.url().path(), "/prospectlab/api/ciblage/entreprises");
        let pairs: Vec<(String, String)> = req
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("secteur_contains".to_string(), "Santé".to_string()),
                ("exclude_already_contacted".to_string(), "1".to_string()),
                ("groupe_ids".to_string(), "1,4".to_string()),
            ]
        );
        assert_eq!(
            req.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer tok"
        );
    }

    #[test]
    fn campaign_post_carries_json_body() {
        let draft = CampaignDraft {
            nom: "Audit digital".to_string(),
            template_id: Some("audit".to_string()),
            sujet: "Bonjour".to_string(),
            recipients: vec![Recipient {
                email: "a@acme.fr".to_string(),
                nom: None,
                entreprise: "Acme".to_string(),
                entreprise_id: 1,
            }],
            custom_message: None,
            delay: 2,
            send_mode: SendMode::Now,
            scheduled_at_iso: None,
        };
        let req = client(None).create_campaign_request(&draft).unwrap();
        assert_eq!(req.method(), Method::POST);
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert_eq!(value["send_mode"], "now");
        assert_eq!(value["scheduled_at_iso"], serde_json::Value::Null);
        assert_eq!(value["recipients"][0]["email"], "a@acme.fr");
    }

    #[test]
    fn status_filter_is_optional() {
        let c = client(None);
        assert_eq!(c.campaigns_request(None).unwrap().url().query(), None);
        assert_eq!(
            c.campaigns_request(Some("completed")).unwrap().url().query(),
            Some("statut=completed")
        );
    }

    #[test]
    fn bad_base_url_is_reported() {
        let err = ApiClient::new(&ClientOptions {
            base_url: "not a url".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ApiError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn server_error_field_is_extracted() {
        assert_eq!(
            error_message(r#"{"error":"Aucun destinataire fourni"}"#).as_deref(),
            Some("Aucun destinataire fourni")
        );
        assert_eq!(error_message("<html>"), None);
    }
}
