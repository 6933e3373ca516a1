//! Provider adapters. Each source gets its own raw record type; both funnel into
//! [`PlaceHit`] through [`normalize`].

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::errors::SuggestResult;
use crate::model::{synthesize_id, Coordinates, PlaceHit};

/// How the primary place source wraps its array of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryEnvelope {
    /// `[ {...}, ... ]`
    Array,
    /// `{ "hits": [ ... ] }`
    Hits,
    /// `{ "data": [ ... ] }`
    Data,
}

impl PrimaryEnvelope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryEnvelope::Array => "array",
            PrimaryEnvelope::Hits => "hits",
            PrimaryEnvelope::Data => "data",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "array" => Some(PrimaryEnvelope::Array),
            "hits" => Some(PrimaryEnvelope::Hits),
            "data" => Some(PrimaryEnvelope::Data),
            _ => None,
        }
    }

    /// Unwraps the response body into raw records. A record that does not fit
    /// [`PrimaryRawHit`] is dropped on its own; it does not fail the batch.
    pub fn decode(&self, body: &[u8]) -> SuggestResult<Vec<RawHit>> {
        let records: Vec<Value> = match self {
            PrimaryEnvelope::Array => serde_json::from_slice(body)?,
            PrimaryEnvelope::Hits => serde_json::from_slice::<HitsEnvelope>(body)?.hits,
            PrimaryEnvelope::Data => serde_json::from_slice::<DataEnvelope>(body)?.data,
        };
        Ok(records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<PrimaryRawHit>(record) {
                Ok(hit) => Some(RawHit::Primary(hit)),
                Err(err) => {
                    trace!(?err, "dropping undecodable primary record");
                    None
                }
            })
            .collect())
    }
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Value>,
}

#[derive(Deserialize)]
struct DataEnvelope {
    #[serde(default)]
    data: Vec<Value>,
}

/// Record from the structured place-name registry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrimaryRawHit {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub voivodeship: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub simc_type: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default, alias = "lng")]
    pub lon: Option<Value>,
}

/// Record from a Nominatim-compatible geocoder (`format=jsonv2&addressdetails=1`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeocoderRawHit {
    #[serde(default)]
    pub place_id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<GeocoderAddress>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub addresstype: Option<String>,
    #[serde(default)]
    pub lat: Option<Value>,
    #[serde(default)]
    pub lon: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeocoderAddress {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub hamlet: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub county: Option<String>,
}

impl PrimaryRawHit {
    /// Both values, or neither when either is missing or out of range.
    pub fn coordinates(&self) -> Option<Coordinates> {
        valid_coordinates(self.lat.as_ref(), self.lon.as_ref())
    }
}

impl GeocoderRawHit {
    pub fn coordinates(&self) -> Option<Coordinates> {
        valid_coordinates(self.lat.as_ref(), self.lon.as_ref())
    }

    /// Parses a geocoder response body. Unlike the primary source there is
    /// only one shape: a bare array.
    pub fn decode_all(body: &[u8]) -> SuggestResult<Vec<Self>> {
        let records: Vec<Value> = serde_json::from_slice(body)?;
        Ok(records
            .into_iter()
            .filter_map(|record| serde_json::from_value::<Self>(record).ok())
            .collect())
    }
}

#[derive(Debug, Clone)]
pub enum RawHit {
    Primary(PrimaryRawHit),
    Geocoder(GeocoderRawHit),
}

/// Maps raw records to canonical hits, preserving order. Records without a
/// usable name are dropped. No deduplication happens here.
pub fn normalize(raw: Vec<RawHit>) -> Vec<PlaceHit> {
    let total = raw.len();
    let hits: Vec<PlaceHit> = raw.into_iter().filter_map(RawHit::into_hit).collect();
    if hits.len() < total {
        trace!(
            dropped = total - hits.len(),
            total,
            "dropped records without a usable name"
        );
    }
    hits
}

impl RawHit {
    fn into_hit(self) -> Option<PlaceHit> {
        match self {
            RawHit::Primary(raw) => {
                let coords = raw.coordinates();
                let name = first_non_empty([raw.name, raw.city])?;
                let region = first_non_empty([raw.region, raw.voivodeship]);
                let county = first_non_empty([raw.county]);
                let kind = first_non_empty([raw.kind, raw.simc_type]);
                let id = raw
                    .id
                    .as_ref()
                    .and_then(id_string)
                    .unwrap_or_else(|| {
                        synthesize_id(&name, region.as_deref(), county.as_deref())
                    });
                Some(PlaceHit {
                    id,
                    name,
                    region,
                    county,
                    kind,
                    lat: coords.map(|c| c.lat),
                    lon: coords.map(|c| c.lng),
                })
            }
            RawHit::Geocoder(raw) => {
                let coords = raw.coordinates();
                let address = raw.address.unwrap_or_default();
                let name = first_non_empty([
                    address.city,
                    address.town,
                    address.village,
                    address.hamlet,
                    raw.name,
                ])?;
                let region = first_non_empty([address.state]);
                let county = first_non_empty([address.county]);
                // `type` is often just "administrative" for boundaries; the
                // address type says whether it is a city, town or a road.
                let kind = first_non_empty([raw.addresstype, raw.kind]);
                let id = raw
                    .place_id
                    .as_ref()
                    .and_then(id_string)
                    .unwrap_or_else(|| {
                        synthesize_id(&name, region.as_deref(), county.as_deref())
                    });
                Some(PlaceHit {
                    id,
                    name,
                    region,
                    county,
                    kind,
                    lat: coords.map(|c| c.lat),
                    lon: coords.map(|c| c.lng),
                })
            }
        }
    }
}

fn first_non_empty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn valid_coordinates(lat: Option<&Value>, lon: Option<&Value>) -> Option<Coordinates> {
    let coords = Coordinates::new(lat.and_then(number)?, lon.and_then(number)?);
    coords.is_valid().then_some(coords)
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}
