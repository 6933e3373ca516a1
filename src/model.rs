use serde::{Deserialize, Serialize};

/// A place candidate in the shape every downstream stage consumes.
///
/// `name` is never empty. `id` is either what the provider supplied or
/// `name|region|county`, so it is stable enough to key a rendered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceHit {
    pub id: String,
    pub name: String,
    pub region: Option<String>,
    pub county: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl PlaceHit {
    /// Builds a hit from a bare name, synthesizing its id.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: synthesize_id(&name, None, None),
            name,
            region: None,
            county: None,
            kind: None,
            lat: None,
            lon: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self.id = synthesize_id(&self.name, self.region.as_deref(), self.county.as_deref());
        self
    }

    pub fn with_county(mut self, county: impl Into<String>) -> Self {
        self.county = Some(county.into());
        self.id = synthesize_id(&self.name, self.region.as_deref(), self.county.as_deref());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_coordinates(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    /// `None` unless both values are present and in range.
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }).filter(Coordinates::is_valid),
            _ => None,
        }
    }

    pub fn to_place_ref(&self) -> PlaceRef {
        PlaceRef {
            name: self.name.clone(),
            region: self.region.clone(),
            street: None,
            coords: self.coordinates(),
        }
    }
}

pub(crate) fn synthesize_id(name: &str, region: Option<&str>, county: Option<&str>) -> String {
    format!(
        "{}|{}|{}",
        name,
        region.unwrap_or_default(),
        county.unwrap_or_default()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// What the forward geocoder is asked to locate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceRef {
    pub name: String,
    pub region: Option<String>,
    pub street: Option<String>,
    pub coords: Option<Coordinates>,
}

impl PlaceRef {
    pub fn city(name: impl Into<String>, region: Option<String>) -> Self {
        Self {
            name: name.into(),
            region,
            ..Self::default()
        }
    }

    pub fn with_street(mut self, street: impl Into<String>) -> Self {
        let street = street.into();
        self.street = if street.trim().is_empty() {
            None
        } else {
            Some(street)
        };
        self
    }
}
