//! One suggestion-enabled input field: typing, dropdown, pick, coordinates.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::cache::{MemoryCache, SuggestionCache};
use crate::chain::SourceChain;
use crate::config::EngineConfig;
use crate::debounce::Debouncer;
use crate::errors::SuggestResult;
use crate::geocode::ForwardGeocoder;
use crate::model::{Coordinates, PlaceHit, PlaceRef};
use crate::rank::{DedupKey, RankOptions};
use crate::selection::{InputEffect, Key, KeyOutcome, SelectionState, SuggestionRow};
use crate::sources::{Geocoder, HttpPlaceSource, NominatimClient, PlaceSource};

/// Effects a field hands back to the form or map that embeds it.
pub trait FieldHost: Send + Sync {
    fn on_name_change(&self, name: &str);
    fn on_region_change(&self, region: Option<&str>);
    fn on_coords_change(&self, lat: f64, lng: f64);

    /// The dropdown changed and should be re-rendered.
    fn on_suggestions(&self, _view: &SuggestionView) {}

    /// Enter on a free-text field with no highlighted row.
    fn on_submit(&self, _text: &str) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionView {
    pub query: String,
    pub open: bool,
    pub loading: bool,
    pub rows: Vec<SuggestionRow>,
}

impl From<&SelectionState> for SuggestionView {
    fn from(state: &SelectionState) -> Self {
        Self {
            query: state.query().to_string(),
            open: state.is_open(),
            loading: state.is_loading(),
            rows: state.rows(),
        }
    }
}

/// The places in the product that embed a suggestion field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldPreset {
    /// Listing editor location picker, with a street refinement input.
    ListingLocation,
    /// Header search bar; Enter on raw text navigates to a search.
    SearchBar,
    GeoAutocomplete,
    /// City filter next to the results map.
    MapCityFilter,
}

impl FieldPreset {
    pub fn rank_options(self) -> RankOptions {
        match self {
            Self::ListingLocation | Self::MapCityFilter => RankOptions {
                dedup: DedupKey::NameRegion,
                limit: 10,
            },
            Self::SearchBar | Self::GeoAutocomplete => RankOptions {
                dedup: DedupKey::Name,
                limit: 8,
            },
        }
    }

    pub fn allow_free_text(self) -> bool {
        matches!(self, Self::SearchBar)
    }

    pub fn street_enabled(self) -> bool {
        matches!(self, Self::ListingLocation)
    }
}

#[derive(Debug, Clone)]
pub struct FieldOptions {
    pub preset: FieldPreset,
    pub name: String,
    pub region: Option<String>,
    pub coords: Option<Coordinates>,
    pub street_enabled: bool,
    pub allow_free_text: bool,
}

impl FieldOptions {
    pub fn for_preset(preset: FieldPreset) -> Self {
        Self {
            preset,
            name: String::new(),
            region: None,
            coords: None,
            street_enabled: preset.street_enabled(),
            allow_free_text: preset.allow_free_text(),
        }
    }

    pub fn with_initial(mut self, name: impl Into<String>, region: Option<String>) -> Self {
        self.name = name.into();
        self.region = region;
        self
    }

    pub fn with_coordinates(mut self, coords: Coordinates) -> Self {
        self.coords = Some(coords);
        self
    }
}

/// Sources, cache, and geocoder shared by every field in the process.
#[derive(Clone)]
pub struct SuggestEngine {
    config: EngineConfig,
    primary: Arc<dyn PlaceSource>,
    fallback: Arc<dyn PlaceSource>,
    cache: Arc<dyn SuggestionCache>,
    geocoder: ForwardGeocoder,
}

impl SuggestEngine {
    /// Wires the HTTP registry as primary and one Nominatim client as both
    /// the suggestion fallback and the geocoder, over the process-wide cache.
    pub fn from_config(config: EngineConfig) -> SuggestResult<Self> {
        let primary = Arc::new(HttpPlaceSource::new(&config)?);
        let nominatim = Arc::new(NominatimClient::new(&config)?);
        debug!(profile = ?config.public_profile(), "suggest engine configured");
        Ok(Self::new(
            config,
            primary,
            nominatim.clone(),
            nominatim,
            MemoryCache::shared(),
        ))
    }

    pub fn new(
        config: EngineConfig,
        primary: Arc<dyn PlaceSource>,
        fallback: Arc<dyn PlaceSource>,
        geocoder: Arc<dyn Geocoder>,
        cache: Arc<dyn SuggestionCache>,
    ) -> Self {
        let geocoder = ForwardGeocoder::new(geocoder, &config);
        Self {
            config,
            primary,
            fallback,
            cache,
            geocoder,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn geocoder(&self) -> &ForwardGeocoder {
        &self.geocoder
    }

    pub fn chain(&self, rank: RankOptions) -> SourceChain {
        SourceChain::new(
            self.primary.clone(),
            self.fallback.clone(),
            self.cache.clone(),
            &self.config,
            rank,
        )
    }

    /// Must be called inside a Tokio runtime; typing spawns debounced searches.
    pub fn field(&self, options: FieldOptions, host: Arc<dyn FieldHost>) -> SuggestField {
        let mut selection = SelectionState::new(self.config.min_chars, options.allow_free_text);
        selection.set_query(options.name.clone());
        let picked = (!options.name.trim().is_empty()).then(|| PlaceRef {
            coords: options.coords,
            ..PlaceRef::city(options.name.clone(), options.region.clone())
        });

        SuggestField {
            inner: Arc::new(FieldInner {
                chain: self.chain(options.preset.rank_options()),
                host,
                state: Mutex::new(FieldState {
                    selection,
                    picked,
                    street: None,
                    coords: options.coords,
                }),
            }),
            geocoder: self.geocoder.clone(),
            debouncer: Debouncer::new(self.config.debounce_delay(), self.config.min_chars),
            geocoding: Mutex::new(None),
            preset: options.preset,
            street_enabled: options.street_enabled,
        }
    }
}

struct FieldState {
    selection: SelectionState,
    picked: Option<PlaceRef>,
    street: Option<String>,
    coords: Option<Coordinates>,
}

struct FieldInner {
    chain: SourceChain,
    host: Arc<dyn FieldHost>,
    state: Mutex<FieldState>,
}

impl FieldInner {
    fn apply(&self, query: &str, hits: Vec<PlaceHit>, token: &CancellationToken) {
        let view = {
            let mut state = self.state.lock();
            if token.is_cancelled() {
                trace!(query, "dropping superseded suggestions");
                return;
            }
            if !state.selection.resolve(hits) {
                trace!(query, "dropdown closed before suggestions arrived");
                return;
            }
            SuggestionView::from(&state.selection)
        };
        self.host.on_suggestions(&view);
    }

    fn publish(&self) {
        let view = SuggestionView::from(&self.state.lock().selection);
        self.host.on_suggestions(&view);
    }
}

/// A live input field. Dropping it cancels the pending search, the in-flight
/// request, and any running geocode.
pub struct SuggestField {
    inner: Arc<FieldInner>,
    geocoder: ForwardGeocoder,
    debouncer: Debouncer,
    geocoding: Mutex<Option<CancellationToken>>,
    preset: FieldPreset,
    street_enabled: bool,
}

impl SuggestField {
    pub fn preset(&self) -> FieldPreset {
        self.preset
    }

    pub fn input(&self, text: &str) {
        let effect = self.inner.state.lock().selection.input(text);
        match effect {
            InputEffect::Search(query) => {
                let inner = Arc::clone(&self.inner);
                self.debouncer.schedule(&query, move |query, token| async move {
                    match inner.chain.fetch(&query, &token).await {
                        Ok(hits) => inner.apply(&query, hits, &token),
                        Err(err) if err.is_cancelled() => trace!(query = %query, "search cancelled"),
                        Err(err) => warn!(?err, query = %query, "search failed"),
                    }
                });
            }
            InputEffect::Cleared => self.debouncer.cancel_all(),
        }
        self.inner.publish();
    }

    pub async fn key(&self, key: Key) -> KeyOutcome {
        let outcome = self.inner.state.lock().selection.key(key);
        match &outcome {
            KeyOutcome::Ignored => return outcome,
            KeyOutcome::Moved(_) => {}
            KeyOutcome::Commit(hit) => {
                self.inner.publish();
                self.pick(hit).await;
                return outcome;
            }
            KeyOutcome::Submit(text) => {
                self.debouncer.cancel_all();
                self.inner.host.on_submit(text);
            }
            KeyOutcome::Closed => self.debouncer.cancel_all(),
        }
        self.inner.publish();
        outcome
    }

    pub async fn click(&self, index: usize) -> Option<PlaceHit> {
        let hit = self.inner.state.lock().selection.click(index)?;
        self.inner.publish();
        self.pick(&hit).await;
        Some(hit)
    }

    /// Blur or a pointer event outside the widget.
    pub fn dismiss(&self) {
        self.debouncer.cancel_all();
        self.inner.state.lock().selection.dismiss();
        self.inner.publish();
    }

    /// Selects `hit` programmatically, as if it had been clicked.
    pub async fn commit(&self, hit: &PlaceHit) -> Option<Coordinates> {
        {
            let mut state = self.inner.state.lock();
            state.selection.set_query(hit.name.clone());
            state.selection.dismiss();
        }
        self.inner.publish();
        self.pick(hit).await
    }

    /// Street refinement on fields that have one. Re-resolves coordinates
    /// when a place has already been picked.
    pub async fn set_street(&self, street: &str) -> Option<Coordinates> {
        if !self.street_enabled {
            return None;
        }
        let place = {
            let mut state = self.inner.state.lock();
            let street = street.trim();
            state.street = (!street.is_empty()).then(|| street.to_string());
            state.picked.clone()?
        };
        self.locate(place).await
    }

    /// An authoritative coordinate from outside (e.g. a map click). Does not
    /// search and is not echoed back through `on_coords_change`.
    pub fn push_coordinates(&self, lat: f64, lng: f64) -> bool {
        let coords = Coordinates::new(lat, lng);
        if !coords.is_valid() {
            warn!(lat, lng, "ignoring out-of-range coordinates");
            return false;
        }
        self.cancel_geocoding();
        self.inner.state.lock().coords = Some(coords);
        true
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.inner.state.lock().coords
    }

    pub fn street(&self) -> Option<String> {
        self.inner.state.lock().street.clone()
    }

    pub fn view(&self) -> SuggestionView {
        SuggestionView::from(&self.inner.state.lock().selection)
    }

    async fn pick(&self, hit: &PlaceHit) -> Option<Coordinates> {
        self.debouncer.cancel_all();
        let place = hit.to_place_ref();
        self.inner.state.lock().picked = Some(place.clone());
        debug!(name = %hit.name, region = ?hit.region, "place picked");

        let host = &self.inner.host;
        host.on_name_change(&hit.name);
        host.on_region_change(hit.region.as_deref());
        self.locate(place).await
    }

    async fn locate(&self, place: PlaceRef) -> Option<Coordinates> {
        let token = CancellationToken::new();
        if let Some(previous) = self.geocoding.lock().replace(token.clone()) {
            previous.cancel();
        }

        let place = {
            let state = self.inner.state.lock();
            match state.street.as_deref() {
                Some(street) if self.street_enabled => place.with_street(street),
                _ => place,
            }
        };
        let resolution = self.geocoder.resolve_levels(&place, &token).await;
        let coords = {
            let mut state = self.inner.state.lock();
            if token.is_cancelled() {
                return None;
            }
            if let (Some(picked), Some(city)) = (state.picked.as_mut(), resolution.city) {
                picked.coords.get_or_insert(city);
            }
            let Some(coords) = resolution.best() else {
                debug!(name = %place.name, "no coordinates; keeping previous value");
                return None;
            };
            state.coords = Some(coords);
            coords
        };
        self.inner.host.on_coords_change(coords.lat, coords.lng);
        Some(coords)
    }

    fn cancel_geocoding(&self) {
        if let Some(token) = self.geocoding.lock().take() {
            token.cancel();
        }
    }
}

impl Drop for SuggestField {
    fn drop(&mut self) {
        self.cancel_geocoding();
        self.debouncer.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use crate::testing::{hit, FakeGeocoder, FakeSource, HostEvent, RecordingHost};

    use super::*;

    struct Harness {
        primary: Arc<FakeSource>,
        geocoder: Arc<FakeGeocoder>,
        host: Arc<RecordingHost>,
        field: SuggestField,
    }

    fn harness(primary: FakeSource, geocoder: FakeGeocoder, options: FieldOptions) -> Harness {
        let primary = Arc::new(primary);
        let geocoder = Arc::new(geocoder);
        let host = Arc::new(RecordingHost::default());
        let engine = SuggestEngine::new(
            EngineConfig::default(),
            primary.clone(),
            Arc::new(FakeSource::new("fallback")),
            geocoder.clone(),
            Arc::new(MemoryCache::default()),
        );
        let field = engine.field(options, host.clone());
        Harness {
            primary,
            geocoder,
            host,
            field,
        }
    }

    fn search_bar() -> FieldOptions {
        FieldOptions::for_preset(FieldPreset::SearchBar)
    }

    #[test]
    fn presets_pick_dedup_key_and_features() {
        assert_eq!(
            FieldPreset::ListingLocation.rank_options().dedup,
            DedupKey::NameRegion
        );
        assert_eq!(FieldPreset::SearchBar.rank_options().limit, 8);
        assert!(FieldPreset::SearchBar.allow_free_text());
        assert!(!FieldPreset::MapCityFilter.allow_free_text());
        assert!(FieldPreset::ListingLocation.street_enabled());
        assert!(!FieldPreset::GeoAutocomplete.street_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn typing_burst_runs_one_search() {
        let h = harness(
            FakeSource::new("primary").reply("War", vec![hit("Warszawa"), hit("Warka")]),
            FakeGeocoder::always(None),
            search_bar(),
        );
        for text in ["W", "Wa", "War"] {
            h.field.input(text);
            sleep(Duration::from_millis(50)).await;
        }
        sleep(Duration::from_millis(300)).await;

        assert_eq!(h.primary.calls(), vec!["War"]);
        let view = h.host.last_view().unwrap();
        assert!(view.open);
        assert!(!view.loading);
        assert_eq!(view.rows.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_superseded_response_never_lands() {
        let h = harness(
            FakeSource::new("primary")
                .reply("Wro", vec![hit("Wrocław")])
                .reply("War", vec![hit("Warszawa")])
                .delayed_for("Wro", Duration::from_secs(1)),
            FakeGeocoder::always(None),
            search_bar(),
        );
        h.field.input("Wro");
        sleep(Duration::from_millis(250)).await;
        h.field.input("War");
        sleep(Duration::from_secs(2)).await;

        let view = h.field.view();
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].hit.name, "Warszawa");
        assert!(h
            .host
            .last_view()
            .is_some_and(|last| last.rows[0].hit.name == "Warszawa"));
    }

    #[tokio::test(start_paused = true)]
    async fn short_input_never_searches() {
        let h = harness(
            FakeSource::new("primary"),
            FakeGeocoder::always(None),
            search_bar(),
        );
        h.field.input("G");
        sleep(Duration::from_millis(500)).await;
        assert!(h.primary.calls().is_empty());
        assert!(!h.field.view().open);
    }

    #[tokio::test(start_paused = true)]
    async fn picking_a_hit_without_coordinates_geocodes_once() {
        let h = harness(
            FakeSource::new("primary")
                .reply("Kra", vec![hit("Kraków").with_region("małopolskie")]),
            FakeGeocoder::always(Some(Coordinates::new(50.06, 19.94))),
            FieldOptions::for_preset(FieldPreset::GeoAutocomplete),
        );
        h.field.input("Kra");
        sleep(Duration::from_millis(250)).await;

        assert_eq!(h.field.key(Key::ArrowDown).await, KeyOutcome::Moved(Some(0)));
        let outcome = h.field.key(Key::Enter).await;
        assert!(matches!(outcome, KeyOutcome::Commit(ref picked) if picked.name == "Kraków"));

        assert_eq!(h.geocoder.calls().len(), 1);
        assert_eq!(
            h.host.events(),
            vec![
                HostEvent::Name("Kraków".into()),
                HostEvent::Region(Some("małopolskie".into())),
                HostEvent::Coords(50.06, 19.94),
            ]
        );
        assert_eq!(h.field.coordinates(), Some(Coordinates::new(50.06, 19.94)));
        assert_eq!(h.field.view().query, "Kraków");
    }

    #[tokio::test(start_paused = true)]
    async fn enter_on_search_bar_submits_raw_text() {
        let h = harness(
            FakeSource::new("primary").reply("Gdy", vec![hit("Gdynia")]),
            FakeGeocoder::always(None),
            search_bar(),
        );
        h.field.input("Gdy");
        sleep(Duration::from_millis(250)).await;

        assert_eq!(h.field.key(Key::Enter).await, KeyOutcome::Submit("Gdy".into()));
        assert_eq!(h.host.events(), vec![HostEvent::Submit("Gdy".into())]);
        assert!(h.geocoder.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn escape_discards_late_results() {
        let h = harness(
            FakeSource::new("primary")
                .reply("Sop", vec![hit("Sopot")])
                .delayed(Duration::from_millis(500)),
            FakeGeocoder::always(None),
            search_bar(),
        );
        h.field.input("Sop");
        sleep(Duration::from_millis(250)).await;
        assert_eq!(h.field.key(Key::Escape).await, KeyOutcome::Closed);
        sleep(Duration::from_secs(1)).await;

        let view = h.field.view();
        assert!(!view.open);
        assert!(view.rows.is_empty());
        assert_eq!(view.query, "Sop");
    }

    #[tokio::test]
    async fn pushed_coordinates_are_stored_without_echo_or_search() {
        let h = harness(
            FakeSource::new("primary"),
            FakeGeocoder::always(None),
            FieldOptions::for_preset(FieldPreset::MapCityFilter),
        );
        assert!(h.field.push_coordinates(54.52, 18.53));
        assert!(!h.field.push_coordinates(120.0, 18.53));

        assert_eq!(h.field.coordinates(), Some(Coordinates::new(54.52, 18.53)));
        assert!(h.host.events().is_empty());
        assert!(h.primary.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_geocode_keeps_previous_coordinates() {
        let h = harness(
            FakeSource::new("primary"),
            FakeGeocoder::always(None),
            FieldOptions::for_preset(FieldPreset::ListingLocation)
                .with_initial("Warszawa", Some("mazowieckie".into()))
                .with_coordinates(Coordinates::new(52.23, 21.01)),
        );
        assert_eq!(h.field.view().query, "Warszawa");

        let coords = h.field.commit(&hit("Zakopane")).await;
        assert_eq!(coords, None);
        assert_eq!(h.field.coordinates(), Some(Coordinates::new(52.23, 21.01)));
        assert!(!h
            .host
            .events()
            .iter()
            .any(|event| matches!(event, HostEvent::Coords(..))));
    }

    #[tokio::test]
    async fn street_refines_picked_city() {
        let h = harness(
            FakeSource::new("primary"),
            FakeGeocoder::new(|query| match query {
                crate::sources::GeocodeQuery::Structured {
                    street: Some(_), ..
                } => Ok(Some(Coordinates::new(54.35, 18.65))),
                _ => Ok(None),
            }),
            FieldOptions::for_preset(FieldPreset::ListingLocation),
        );
        let gdansk = hit("Gdańsk").with_coordinates(54.37, 18.62);
        assert_eq!(
            h.field.commit(&gdansk).await,
            Some(Coordinates::new(54.37, 18.62))
        );
        assert!(h.geocoder.calls().is_empty());

        assert_eq!(
            h.field.set_street("Długa").await,
            Some(Coordinates::new(54.35, 18.65))
        );
        assert_eq!(h.field.street().as_deref(), Some("Długa"));
        assert_eq!(
            h.host.events().last(),
            Some(&HostEvent::Coords(54.35, 18.65))
        );
    }

    #[tokio::test]
    async fn street_edits_reuse_the_looked_up_city() {
        let h = harness(
            FakeSource::new("primary"),
            FakeGeocoder::new(|query| match query {
                crate::sources::GeocodeQuery::Structured {
                    street: Some(street),
                    ..
                } if street == "Długa" => Ok(Some(Coordinates::new(54.35, 18.65))),
                crate::sources::GeocodeQuery::Structured { street: None, .. } => {
                    Ok(Some(Coordinates::new(54.37, 18.62)))
                }
                _ => Ok(None),
            }),
            FieldOptions::for_preset(FieldPreset::ListingLocation),
        );
        assert_eq!(
            h.field.commit(&hit("Gdańsk")).await,
            Some(Coordinates::new(54.37, 18.62))
        );
        assert_eq!(h.geocoder.calls().len(), 1);

        assert_eq!(
            h.field.set_street("Długa").await,
            Some(Coordinates::new(54.35, 18.65))
        );
        assert_eq!(h.geocoder.calls().len(), 2);

        // Unknown street: structured and free-text street lookups only.
        assert_eq!(
            h.field.set_street("Nieistniejąca").await,
            Some(Coordinates::new(54.37, 18.62))
        );
        assert_eq!(h.geocoder.calls().len(), 4);
    }

    #[tokio::test]
    async fn out_of_range_hit_coordinates_never_reach_the_host() {
        let h = harness(
            FakeSource::new("primary"),
            FakeGeocoder::always(Some(Coordinates::new(50.06, 19.94))),
            FieldOptions::for_preset(FieldPreset::GeoAutocomplete),
        );
        let bogus = hit("Kraków").with_coordinates(500.0, -999.0);
        assert_eq!(
            h.field.commit(&bogus).await,
            Some(Coordinates::new(50.06, 19.94))
        );
        assert_eq!(h.geocoder.calls().len(), 1);
        assert_eq!(
            h.host.events().last(),
            Some(&HostEvent::Coords(50.06, 19.94))
        );
    }

    #[tokio::test]
    async fn street_is_ignored_on_fields_without_one() {
        let h = harness(
            FakeSource::new("primary"),
            FakeGeocoder::always(Some(Coordinates::new(1.0, 1.0))),
            search_bar(),
        );
        h.field.commit(&hit("Gdańsk")).await;
        let before = h.geocoder.calls().len();
        assert_eq!(h.field.set_street("Długa").await, None);
        assert_eq!(h.geocoder.calls().len(), before);
    }
}
