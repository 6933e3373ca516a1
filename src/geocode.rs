use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::chain::guarded;
use crate::config::EngineConfig;
use crate::errors::{SuggestError, SuggestResult};
use crate::model::{Coordinates, PlaceRef};
use crate::sources::{GeocodeQuery, Geocoder};

/// Coordinates found at each level of a lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Resolution {
    pub city: Option<Coordinates>,
    pub street: Option<Coordinates>,
}

impl Resolution {
    /// The street result when there is one, else the city result.
    pub fn best(&self) -> Option<Coordinates> {
        self.street.or(self.city)
    }
}

/// Turns a picked place (and optionally a street) into coordinates.
///
/// Each lookup tries a structured query first and a free-text query second,
/// mirroring the suggestion chain. Failures end in `None`; callers keep
/// whatever coordinate they had before.
#[derive(Clone)]
pub struct ForwardGeocoder {
    geocoder: Arc<dyn Geocoder>,
    country_name: String,
    timeout: Duration,
}

impl ForwardGeocoder {
    pub fn new(geocoder: Arc<dyn Geocoder>, config: &EngineConfig) -> Self {
        Self {
            geocoder,
            country_name: config.country_name.clone(),
            timeout: config.request_timeout(),
        }
    }

    pub async fn resolve(&self, place: &PlaceRef, cancel: &CancellationToken) -> Option<Coordinates> {
        self.resolve_levels(place, cancel).await.best()
    }

    /// Like [`ForwardGeocoder::resolve`], but keeps the city-level result apart
    /// from the street-level one so callers can reuse it.
    pub async fn resolve_levels(&self, place: &PlaceRef, cancel: &CancellationToken) -> Resolution {
        let name = place.name.trim();
        if name.is_empty() {
            return Resolution::default();
        }
        let region = place
            .region
            .as_deref()
            .map(str::trim)
            .filter(|region| !region.is_empty());
        let street = place
            .street
            .as_deref()
            .map(str::trim)
            .filter(|street| !street.is_empty());

        let city = match place.coords {
            Some(coords) => Some(coords),
            None => match self.city(name, region, cancel).await {
                Ok(found) => found,
                Err(_) => return Resolution::default(),
            },
        };

        let Some(street) = street else {
            return Resolution { city, street: None };
        };
        match self.street(name, street, region, cancel).await {
            Ok(Some(coords)) => Resolution {
                city,
                street: Some(coords),
            },
            Ok(None) => {
                debug!(name, street, "street not found; using city coordinates");
                Resolution { city, street: None }
            }
            Err(_) => Resolution::default(),
        }
    }

    async fn city(
        &self,
        name: &str,
        region: Option<&str>,
        cancel: &CancellationToken,
    ) -> SuggestResult<Option<Coordinates>> {
        let structured = GeocodeQuery::Structured {
            city: name.to_string(),
            street: None,
            region: region.map(str::to_string),
        };
        let free_text = self.free_text(&[Some(name), region]);
        self.lookup(structured, free_text, cancel).await
    }

    async fn street(
        &self,
        name: &str,
        street: &str,
        region: Option<&str>,
        cancel: &CancellationToken,
    ) -> SuggestResult<Option<Coordinates>> {
        let structured = GeocodeQuery::Structured {
            city: name.to_string(),
            street: Some(street.to_string()),
            region: region.map(str::to_string),
        };
        let free_text = self.free_text(&[Some(street), Some(name), region]);
        self.lookup(structured, free_text, cancel).await
    }

    // Only cancellation is reported as an error; provider failures end in None.
    async fn lookup(
        &self,
        structured: GeocodeQuery,
        free_text: GeocodeQuery,
        cancel: &CancellationToken,
    ) -> SuggestResult<Option<Coordinates>> {
        for query in [structured, free_text] {
            match guarded(self.geocoder.geocode(&query), cancel, self.timeout).await {
                Ok(Some(coords)) => return Ok(Some(coords)),
                Ok(None) => trace!(?query, "geocoder found nothing"),
                Err(SuggestError::Cancelled) => {
                    trace!(?query, "geocoding cancelled");
                    return Err(SuggestError::Cancelled);
                }
                Err(err) => warn!(?err, ?query, "geocoding request failed"),
            }
        }
        Ok(None)
    }

    fn free_text(&self, parts: &[Option<&str>]) -> GeocodeQuery {
        let text = parts
            .iter()
            .flatten()
            .copied()
            .chain(std::iter::once(self.country_name.as_str()))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        GeocodeQuery::FreeText(text)
    }
}
