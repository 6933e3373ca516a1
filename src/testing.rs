//! In-process fakes shared by the unit tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::errors::{SuggestError, SuggestResult};
use crate::field::{FieldHost, SuggestionView};
use crate::model::{Coordinates, PlaceHit};
use crate::sources::{GeocodeQuery, Geocoder, PlaceSource};

pub fn hit(name: &str) -> PlaceHit {
    PlaceHit::named(name)
}

/// Scripted place source. Unknown queries answer with an empty list, or with
/// an error when built through [`FakeSource::failing`].
pub struct FakeSource {
    name: &'static str,
    replies: HashMap<String, Vec<PlaceHit>>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            replies: HashMap::new(),
            delays: HashMap::new(),
            default_delay: None,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn reply(mut self, query: &str, hits: Vec<PlaceHit>) -> Self {
        self.replies.insert(query.to_string(), hits);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn delayed_for(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PlaceSource for FakeSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(&self, query: &str, _limit: usize) -> SuggestResult<Vec<PlaceHit>> {
        self.calls.lock().push(query.to_string());
        if let Some(delay) = self.delays.get(query).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SuggestError::Status(StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(self.replies.get(query).cloned().unwrap_or_default())
    }
}

type GeocodeFn = Box<dyn Fn(&GeocodeQuery) -> SuggestResult<Option<Coordinates>> + Send + Sync>;

pub struct FakeGeocoder {
    respond: GeocodeFn,
    calls: Mutex<Vec<GeocodeQuery>>,
}

impl FakeGeocoder {
    pub fn new(
        respond: impl Fn(&GeocodeQuery) -> SuggestResult<Option<Coordinates>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always(coords: Option<Coordinates>) -> Self {
        Self::new(move |_| Ok(coords))
    }

    pub fn calls(&self) -> Vec<GeocodeQuery> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, query: &GeocodeQuery) -> SuggestResult<Option<Coordinates>> {
        self.calls.lock().push(query.clone());
        (self.respond)(query)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Name(String),
    Region(Option<String>),
    Coords(f64, f64),
    Submit(String),
}

#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<HostEvent>>,
    views: Mutex<Vec<SuggestionView>>,
}

impl RecordingHost {
    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().clone()
    }

    pub fn last_view(&self) -> Option<SuggestionView> {
        self.views.lock().last().cloned()
    }
}

impl FieldHost for RecordingHost {
    fn on_name_change(&self, name: &str) {
        self.events.lock().push(HostEvent::Name(name.to_string()));
    }

    fn on_region_change(&self, region: Option<&str>) {
        self.events
            .lock()
            .push(HostEvent::Region(region.map(str::to_string)));
    }

    fn on_coords_change(&self, lat: f64, lng: f64) {
        self.events.lock().push(HostEvent::Coords(lat, lng));
    }

    fn on_suggestions(&self, view: &SuggestionView) {
        self.views.lock().push(view.clone());
    }

    fn on_submit(&self, text: &str) {
        self.events.lock().push(HostEvent::Submit(text.to_string()));
    }
}
