use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ── Geometry ──────────────────────────────────────────────────────────────────

/// Absolute page coordinate a pointer action is issued at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Point relative to the box origin.
    pub fn offset(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
}

/// Opaque reference to an element owned by the host surface.
/// Only valid until the host re-renders the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(u64);

impl ElementHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

// ── Tooltip snapshot ──────────────────────────────────────────────────────────

/// Cleaned text fields read from the tooltip currently on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TooltipContent {
    fields: IndexMap<String, String>,
}

impl TooltipContent {
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.fields.insert(name.into(), text.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TooltipContent {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut content = Self::default();
        for (k, v) in iter {
            content.insert(k, v);
        }
        content
    }
}

// ── Harvest mappings ──────────────────────────────────────────────────────────

/// date → value, in sweep (chronological) order.
pub type SeriesMapping = IndexMap<NaiveDate, String>;

/// row key → (column key → cell text), in encounter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMapping {
    rows: IndexMap<String, IndexMap<String, String>>,
}

impl TableMapping {
    /// Merge one observed cell. Returns true when the (row, column) pair is new.
    pub fn merge(&mut self, row: &str, column: &str, value: &str) -> bool {
        self.rows
            .entry(row.to_string())
            .or_default()
            .insert(column.to_string(), value.to_string())
            .is_none()
    }

    /// Distinct (row, column) pairs observed so far.
    pub fn key_count(&self) -> usize {
        self.rows.values().map(IndexMap::len).sum()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, key: &str) -> Option<&IndexMap<String, String>> {
        self.rows.get(key)
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &IndexMap<String, String>)> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Validated result of one successful harvest attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Harvest {
    Series(SeriesMapping),
    Table(TableMapping),
}

impl Harvest {
    pub fn len(&self) -> usize {
        match self {
            Harvest::Series(s) => s.len(),
            Harvest::Table(t) => t.row_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// One flat output row: column name → text, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: IndexMap<String, String>,
}

impl Record {
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }
}
