//! Text folding shared by the cache, the ranker and the dropdown highlighter.
//!
//! Folding is Unicode lowercase plus whitespace collapsing. Diacritics are kept:
//! "Łódź" and "Lodz" are different keys, which is what users of the Polish
//! place registry expect.

use serde::Serialize;

const CITY_MARKERS: &[&str] = &["miasto", "city"];

/// Trims, collapses inner whitespace and lowercases.
pub fn fold(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Key used to index the suggestion cache.
pub fn cache_key(query: &str) -> String {
    fold(query)
}

/// Length in characters after trimming; this is what the min-length gate counts.
pub fn query_len(query: &str) -> usize {
    query.trim().chars().count()
}

pub fn contains_city_marker(folded: &str) -> bool {
    CITY_MARKERS.iter().any(|marker| folded.contains(marker))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub emphasized: bool,
}

/// Splits `name` into plain and emphasized runs where it matches `query`
/// case-insensitively. Only the first match is emphasized.
pub fn highlight(name: &str, query: &str) -> Vec<Segment> {
    let needle = fold(query);
    if needle.is_empty() {
        return vec![plain(name)];
    }

    // Folding can change byte lengths, so match over per-char folded forms and
    // map the hit back to byte offsets in the original name.
    let chars: Vec<(usize, char)> = name.char_indices().collect();
    let needle_chars: Vec<char> = needle.chars().collect();
    let folded: Vec<String> = chars
        .iter()
        .map(|(_, c)| c.to_lowercase().collect::<String>())
        .collect();

    for start in 0..chars.len() {
        let mut matched = String::new();
        let mut end = start;
        while end < chars.len() && matched.chars().count() < needle_chars.len() {
            matched.push_str(&folded[end]);
            end += 1;
        }
        if matched == needle {
            let from = chars[start].0;
            let to = chars.get(end).map_or(name.len(), |(idx, _)| *idx);
            let mut segments = Vec::with_capacity(3);
            if from > 0 {
                segments.push(plain(&name[..from]));
            }
            segments.push(Segment {
                text: name[from..to].to_string(),
                emphasized: true,
            });
            if to < name.len() {
                segments.push(plain(&name[to..]));
            }
            return segments;
        }
    }

    vec![plain(name)]
}

fn plain(text: &str) -> Segment {
    Segment {
        text: text.to_string(),
        emphasized: false,
    }
}
