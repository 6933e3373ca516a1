//! Filtering, scoring, deduplication and ordering of place hits.
//!
//! Everything here is a pure function of its inputs: the same hits and query
//! always produce the same list, and ranking an already ranked list is a no-op.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::PlaceHit;
use crate::text::{contains_city_marker, fold};

pub const EXACT_MATCH_BONUS: i32 = 110;
pub const PREFIX_BONUS: i32 = 45;
pub const CITY_TYPE_BONUS: i32 = 45;
pub const COUNTY_BONUS: i32 = 30;
pub const CAPITAL_BONUS: i32 = 75;

pub const DEFAULT_LIMIT: usize = 8;

/// Settlement and administrative types worth suggesting, folded. Registry
/// (SIMC) names first, then the OSM vocabulary the geocoder uses.
pub const ALLOWED_KINDS: &[&str] = &[
    "miasto",
    "miasto na prawach powiatu",
    "dzielnica",
    "delegatura",
    "część miasta",
    "osiedle",
    "wieś",
    "city",
    "town",
    "village",
    "hamlet",
    "suburb",
    "neighbourhood",
    "quarter",
    "city_district",
    "borough",
    "municipality",
    "administrative",
];

/// Voivodeship seats and their voivodeship, folded. Two voivodeships have a
/// split seat, so both cities are listed. Polish geography only.
pub const CAPITAL_REGIONS: &[(&str, &str)] = &[
    ("warszawa", "mazowieckie"),
    ("kraków", "małopolskie"),
    ("wrocław", "dolnośląskie"),
    ("poznań", "wielkopolskie"),
    ("gdańsk", "pomorskie"),
    ("łódź", "łódzkie"),
    ("katowice", "śląskie"),
    ("lublin", "lubelskie"),
    ("białystok", "podlaskie"),
    ("szczecin", "zachodniopomorskie"),
    ("bydgoszcz", "kujawsko-pomorskie"),
    ("toruń", "kujawsko-pomorskie"),
    ("olsztyn", "warmińsko-mazurskie"),
    ("rzeszów", "podkarpackie"),
    ("kielce", "świętokrzyskie"),
    ("opole", "opolskie"),
    ("zielona góra", "lubuskie"),
    ("gorzów wielkopolski", "lubuskie"),
];

const REGION_PREFIX: &str = "województwo ";

/// Which fields make two hits "the same place".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum DedupKey {
    #[default]
    Name,
    NameRegion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankOptions {
    pub dedup: DedupKey,
    pub limit: usize,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            dedup: DedupKey::default(),
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub hit: PlaceHit,
    pub score: i32,
    position: usize,
}

pub fn rank(hits: Vec<PlaceHit>, query: &str, options: RankOptions) -> Vec<PlaceHit> {
    rank_scored(hits, query, options)
        .into_iter()
        .map(|scored| scored.hit)
        .collect()
}

pub fn rank_scored(hits: Vec<PlaceHit>, query: &str, options: RankOptions) -> Vec<ScoredHit> {
    let q = fold(query);
    let mut kept: Vec<ScoredHit> = Vec::with_capacity(hits.len());
    let mut groups: HashMap<(String, String), usize> = HashMap::new();

    for (position, hit) in hits.into_iter().enumerate() {
        if !is_allowed_kind(hit.kind.as_deref()) {
            continue;
        }
        let scored = ScoredHit {
            score: score_folded(&hit, &q),
            hit,
            position,
        };
        let key = dedup_key(&scored.hit, options.dedup);
        match groups.get(&key) {
            Some(&slot) => {
                if scored.score > kept[slot].score {
                    kept[slot] = scored;
                }
            }
            None => {
                groups.insert(key, kept.len());
                kept.push(scored);
            }
        }
    }

    kept.sort_by(|a, b| b.score.cmp(&a.score).then(a.position.cmp(&b.position)));
    kept.truncate(options.limit);
    kept
}

/// Score of a single hit against a raw query.
pub fn score(hit: &PlaceHit, query: &str) -> i32 {
    score_folded(hit, &fold(query))
}

fn score_folded(hit: &PlaceHit, q: &str) -> i32 {
    let name = fold(&hit.name);
    let mut total = 0;

    if !q.is_empty() {
        if name == q {
            total += EXACT_MATCH_BONUS;
        } else if name.starts_with(q) {
            total += PREFIX_BONUS;
        }
    }

    if hit
        .kind
        .as_deref()
        .is_some_and(|kind| contains_city_marker(&fold(kind)))
    {
        total += CITY_TYPE_BONUS;
    }

    if let Some(county) = hit.county.as_deref().map(fold) {
        if county == name || contains_city_marker(&county) {
            total += COUNTY_BONUS;
        }
    }

    if is_capital(&name, hit.region.as_deref()) {
        total += CAPITAL_BONUS;
    }

    total
}

pub fn is_allowed_kind(kind: Option<&str>) -> bool {
    let Some(kind) = kind.map(fold).filter(|kind| !kind.is_empty()) else {
        return true;
    };
    ALLOWED_KINDS.contains(&kind.as_str()) || contains_city_marker(&kind)
}

fn is_capital(folded_name: &str, region: Option<&str>) -> bool {
    let Some(region) = region.map(fold_region) else {
        return false;
    };
    CAPITAL_REGIONS
        .iter()
        .any(|(capital, capital_region)| *capital == folded_name && *capital_region == region)
}

fn fold_region(region: &str) -> String {
    let folded = fold(region);
    match folded.strip_prefix(REGION_PREFIX) {
        Some(rest) => rest.to_string(),
        None => folded,
    }
}

fn dedup_key(hit: &PlaceHit, key: DedupKey) -> (String, String) {
    let name = fold(&hit.name);
    match key {
        DedupKey::Name => (name, String::new()),
        DedupKey::NameRegion => (
            name,
            hit.region.as_deref().map(fold_region).unwrap_or_default(),
        ),
    }
}
