//! Generic multi-key stable sort with locale-aware text collation.
//!
//! Every key function must yield a value for every item, and a key column
//! must be all numbers or all text. Violations are caller bugs and surface
//! as [`SortError`] rather than as a silently odd ordering.

use std::cmp::Ordering;
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A comparable sort key
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    pub fn text(s: &str) -> Self {
        SortKey::Text(s.to_string())
    }

    fn kind(&self) -> &'static str {
        match self {
            SortKey::Number(_) => "number",
            SortKey::Text(_) => "text",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SortError {
    #[error("sort key #{key} mixes {first} and {second} values")]
    MixedKeyTypes {
        key: usize,
        first: &'static str,
        second: &'static str,
    },
    #[error("item #{item} yields no value for sort key #{key}")]
    MissingKey { item: usize, key: usize },
}

/// Key extractor used by [`sort_by`]
pub type KeyFn<'a, T> = Box<dyn Fn(&T) -> Option<SortKey> + 'a>;

/// String comparison for one locale.
///
/// Compares on the accent- and case-folded form first. Strings that differ
/// only in case are ordered lowercase first, or uppercase first for locales
/// whose collation puts capitals first (Danish, Maltese). The raw text breaks
/// any remaining tie so the order stays total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collator {
    locale: String,
}

/// Languages whose collation tailoring sorts uppercase before lowercase
const UPPER_FIRST_LANGUAGES: [&str; 2] = ["da", "mt"];

impl Default for Collator {
    fn default() -> Self {
        Self::new("en")
    }
}

impl Collator {
    pub fn new(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
        }
    }

    /// Primary language subtag, e.g. `da` for `da-DK`
    fn language(&self) -> &str {
        self.locale.split(['-', '_']).next().unwrap_or("")
    }

    fn upper_first(&self) -> bool {
        let language = self.language();
        UPPER_FIRST_LANGUAGES.iter().any(|l| l.eq_ignore_ascii_case(language))
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        fold(a)
            .cmp(&fold(b))
            .then_with(|| {
                if self.upper_first() {
                    Ordering::Equal
                } else {
                    swap_case(a).cmp(&swap_case(b))
                }
            })
            .then_with(|| a.cmp(b))
    }

    pub fn compare_keys(&self, a: &SortKey, b: &SortKey) -> Ordering {
        match (a, b) {
            (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
            (SortKey::Text(x), SortKey::Text(y)) => self.compare(x, y),
            // Columns are validated before comparing
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        }
    }
}

/// Case-swapped text: lowercase letters then order before their capitals
fn swap_case(s: &str) -> String {
    s.chars()
        .flat_map(|c| {
            if c.is_lowercase() {
                c.to_uppercase().collect::<Vec<_>>()
            } else {
                c.to_lowercase().collect()
            }
        })
        .collect()
}

fn fold(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Stable sort of `items` by `keys`, compared left to right.
pub fn sort_by<T>(items: Vec<T>, keys: &[KeyFn<T>], collator: &Collator) -> Result<Vec<T>, SortError> {
    if keys.is_empty() || items.len() < 2 {
        return Ok(items);
    }

    let mut rows: Vec<(usize, Vec<SortKey>)> = Vec::with_capacity(items.len());
    for (item_idx, item) in items.iter().enumerate() {
        let row = keys
            .iter()
            .enumerate()
            .map(|(key_idx, key)| {
                key(item).ok_or(SortError::MissingKey {
                    item: item_idx,
                    key: key_idx,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((item_idx, row));
    }

    for key_idx in 0..keys.len() {
        let first = rows[0].1[key_idx].kind();
        if let Some((_, row)) = rows.iter().find(|(_, row)| row[key_idx].kind() != first) {
            return Err(SortError::MixedKeyTypes {
                key: key_idx,
                first,
                second: row[key_idx].kind(),
            });
        }
    }

    rows.sort_by(|(_, a), (_, b)| {
        a.iter()
            .zip(b)
            .map(|(x, y)| collator.compare_keys(x, y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(rows
        .into_iter()
        .filter_map(|(idx, _)| slots[idx].take())
        .collect())
}
