use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use tracing::trace;

use crate::config::EngineConfig;
use crate::errors::{SuggestError, SuggestResult};
use crate::model::{Coordinates, PlaceHit};
use crate::normalize::{normalize, GeocoderRawHit, PrimaryEnvelope, RawHit};

/// A remote list of place-name candidates for a typed prefix.
#[async_trait]
pub trait PlaceSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &str, limit: usize) -> SuggestResult<Vec<PlaceHit>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeQuery {
    /// Field-by-field lookup; the provider matches each part separately.
    Structured {
        city: String,
        street: Option<String>,
        region: Option<String>,
    },
    FreeText(String),
}

/// Resolves a place description into coordinates. `Ok(None)` means the
/// provider answered but found nothing.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &GeocodeQuery) -> SuggestResult<Option<Coordinates>>;
}

fn http_client(config: &EngineConfig) -> SuggestResult<Client> {
    Ok(Client::builder().user_agent(&config.user_agent).build()?)
}

fn endpoint(base: &str, path: &str) -> SuggestResult<Url> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|err| SuggestError::Config(format!("invalid source URL {raw}: {err}")))
}

/// The marketplace API's own place-name registry: `GET {base}/geo/search`.
pub struct HttpPlaceSource {
    http: Client,
    url: Url,
    envelope: PrimaryEnvelope,
    api_token: Option<SecretString>,
}

impl HttpPlaceSource {
    pub fn new(config: &EngineConfig) -> SuggestResult<Self> {
        Ok(Self {
            http: http_client(config)?,
            url: endpoint(&config.primary_base_url, "geo/search")?,
            envelope: config.primary_envelope,
            api_token: config.primary_api_token.clone(),
        })
    }
}

#[async_trait]
impl PlaceSource for HttpPlaceSource {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn search(&self, query: &str, limit: usize) -> SuggestResult<Vec<PlaceHit>> {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());

        let mut request = self.http.get(url);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SuggestError::Status(status));
        }

        let body = response.bytes().await?;
        let raw = self.envelope.decode(&body)?;
        trace!(records = raw.len(), "registry responded");
        Ok(normalize(raw))
    }
}

/// Nominatim-compatible forward geocoder. Serves both as the fallback
/// suggestion source and as the coordinate resolver.
pub struct NominatimClient {
    http: Client,
    url: Url,
    locale: String,
    country_codes: String,
}

impl NominatimClient {
    pub fn new(config: &EngineConfig) -> SuggestResult<Self> {
        Ok(Self {
            http: http_client(config)?,
            url: endpoint(&config.geocoder_base_url, "search")?,
            locale: config.locale.clone(),
            country_codes: config.country_codes.clone(),
        })
    }

    async fn fetch(&self, limit: usize, params: &[(&str, &str)]) -> SuggestResult<Vec<GeocoderRawHit>> {
        let mut url = self.url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("format", "jsonv2")
                .append_pair("addressdetails", "1")
                .append_pair("limit", &limit.to_string())
                .append_pair("accept-language", &self.locale)
                .append_pair("countrycodes", &self.country_codes);
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SuggestError::Status(status));
        }
        let body = response.bytes().await?;
        GeocoderRawHit::decode_all(&body)
    }
}

#[async_trait]
impl PlaceSource for NominatimClient {
    fn name(&self) -> &'static str {
        "geocoder"
    }

    async fn search(&self, query: &str, limit: usize) -> SuggestResult<Vec<PlaceHit>> {
        let records = self.fetch(limit, &[("q", query)]).await?;
        trace!(records = records.len(), "geocoder responded");
        Ok(normalize(records.into_iter().map(RawHit::Geocoder).collect()))
    }
}

#[async_trait]
impl Geocoder for NominatimClient {
    async fn geocode(&self, query: &GeocodeQuery) -> SuggestResult<Option<Coordinates>> {
        let records = match query {
            GeocodeQuery::Structured {
                city,
                street,
                region,
            } => {
                let mut params = vec![("city", city.as_str())];
                if let Some(street) = street {
                    params.push(("street", street.as_str()));
                }
                if let Some(region) = region {
                    params.push(("state", region.as_str()));
                }
                self.fetch(1, &params).await?
            }
            GeocodeQuery::FreeText(text) => self.fetch(1, &[("q", text.as_str())]).await?,
        };
        Ok(records.iter().find_map(GeocoderRawHit::coordinates))
    }
}
