//! Dropdown state for one input field: open/closed, highlighted row, loading.

use serde::Serialize;

use crate::model::PlaceHit;
use crate::text::{highlight, query_len, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    ArrowUp,
    Enter,
    Escape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEffect {
    /// Long enough to search; the dropdown is open and loading.
    Search(String),
    /// Too short; the dropdown is closed and emptied.
    Cleared,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Ignored,
    Moved(Option<usize>),
    Commit(PlaceHit),
    /// Enter without a highlighted row on a field that allows free text.
    Submit(String),
    Closed,
}

#[derive(Debug, Clone)]
pub struct SelectionState {
    query: String,
    open: bool,
    active: Option<usize>,
    loading: bool,
    hits: Vec<PlaceHit>,
    min_chars: usize,
    allow_free_text: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRow {
    pub hit: PlaceHit,
    pub segments: Vec<Segment>,
    pub active: bool,
}

impl SelectionState {
    pub fn new(min_chars: usize, allow_free_text: bool) -> Self {
        Self {
            query: String::new(),
            open: false,
            active: None,
            loading: false,
            hits: Vec::new(),
            min_chars,
            allow_free_text,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn hits(&self) -> &[PlaceHit] {
        &self.hits
    }

    /// Sets the text without searching, e.g. an initial value or a picked name.
    pub fn set_query(&mut self, text: impl Into<String>) {
        self.query = text.into();
    }

    pub fn input(&mut self, text: &str) -> InputEffect {
        self.query = text.to_string();
        self.active = None;
        if query_len(text) < self.min_chars {
            self.close();
            return InputEffect::Cleared;
        }
        self.open = true;
        self.loading = true;
        InputEffect::Search(text.trim().to_string())
    }

    /// Applies a finished search. Ignored once the dropdown was closed, so a
    /// late response cannot reopen it.
    pub fn resolve(&mut self, hits: Vec<PlaceHit>) -> bool {
        if !self.open {
            return false;
        }
        self.hits = hits;
        self.loading = false;
        self.active = None;
        true
    }

    pub fn key(&mut self, key: Key) -> KeyOutcome {
        match key {
            Key::ArrowDown | Key::ArrowUp if !self.open || self.hits.is_empty() => {
                KeyOutcome::Ignored
            }
            Key::ArrowDown => {
                let last = self.hits.len() - 1;
                self.active = Some(self.active.map_or(0, |index| (index + 1).min(last)));
                KeyOutcome::Moved(self.active)
            }
            Key::ArrowUp => {
                self.active = self.active.map(|index| index.saturating_sub(1));
                KeyOutcome::Moved(self.active)
            }
            Key::Enter => {
                let highlighted = self.active.and_then(|index| self.hits.get(index).cloned());
                match highlighted {
                    Some(hit) if self.open => {
                        self.commit(&hit);
                        KeyOutcome::Commit(hit)
                    }
                    _ if self.allow_free_text && !self.query.trim().is_empty() => {
                        let text = self.query.trim().to_string();
                        self.close();
                        KeyOutcome::Submit(text)
                    }
                    _ => KeyOutcome::Ignored,
                }
            }
            Key::Escape => {
                if !self.open {
                    return KeyOutcome::Ignored;
                }
                self.close();
                KeyOutcome::Closed
            }
        }
    }

    pub fn click(&mut self, index: usize) -> Option<PlaceHit> {
        if !self.open {
            return None;
        }
        let hit = self.hits.get(index).cloned()?;
        self.commit(&hit);
        Some(hit)
    }

    /// Escape, blur, or a pointer event outside the widget. Text is kept.
    pub fn dismiss(&mut self) {
        self.close();
    }

    pub fn rows(&self) -> Vec<SuggestionRow> {
        self.hits
            .iter()
            .enumerate()
            .map(|(index, hit)| SuggestionRow {
                hit: hit.clone(),
                segments: highlight(&hit.name, &self.query),
                active: self.active == Some(index),
            })
            .collect()
    }

    fn commit(&mut self, hit: &PlaceHit) {
        self.query = hit.name.clone();
        self.close();
    }

    fn close(&mut self) {
        self.open = false;
        self.loading = false;
        self.active = None;
        self.hits.clear();
    }
}
