mod cache;
mod chain;
mod config;
mod debounce;
mod errors;
mod field;
mod geocode;
mod model;
mod normalize;
mod rank;
mod selection;
mod sources;
mod text;

#[cfg(test)]
mod testing;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use cache::{MemoryCache, SuggestionCache};
pub use chain::SourceChain;
pub use config::{EngineConfig, PublicEngineConfig};
pub use debounce::{Debouncer, Schedule};
pub use errors::{SuggestError, SuggestResult};
pub use field::{
    FieldHost, FieldOptions, FieldPreset, SuggestEngine, SuggestField, SuggestionView,
};
pub use geocode::{ForwardGeocoder, Resolution};
pub use model::{Coordinates, PlaceHit, PlaceRef};
pub use normalize::{
    normalize, GeocoderAddress, GeocoderRawHit, PrimaryEnvelope, PrimaryRawHit, RawHit,
};
pub use rank::{
    is_allowed_kind, rank, rank_scored, score, DedupKey, RankOptions, ScoredHit, ALLOWED_KINDS,
    CAPITAL_BONUS, CAPITAL_REGIONS, CITY_TYPE_BONUS, COUNTY_BONUS, DEFAULT_LIMIT,
    EXACT_MATCH_BONUS, PREFIX_BONUS,
};
pub use selection::{InputEffect, Key, KeyOutcome, SelectionState, SuggestionRow};
pub use sources::{GeocodeQuery, Geocoder, HttpPlaceSource, NominatimClient, PlaceSource};
pub use text::{cache_key, fold, highlight, Segment};

/// Installs the global `tracing` subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,location_suggest=debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}
