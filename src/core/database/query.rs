//! Statement building blocks.
//!
//! User-supplied values only ever travel as [`BindValue`]s. The two
//! identifiers that are interpolated into SQL text, the schema and the
//! table, come from a validated [`SchemaName`] and the closed [`Table`]
//! enum respectively.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::DatabaseError;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier pattern is valid")
});

/// Default schema holding the serving tables.
pub const DEFAULT_SCHEMA: &str = "serving";

/// A schema name that is safe to interpolate into SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaName(String);

impl SchemaName {
    /// Validate a schema name.
    pub fn parse(name: &str) -> Result<Self, DatabaseError> {
        let name = name.trim();
        if IDENTIFIER.is_match(name) {
            Ok(Self(name.to_string()))
        } else {
            Err(DatabaseError::InvalidSchema(name.to_string()))
        }
    }

    /// The schema as it appears in SQL text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SchemaName {
    fn default() -> Self {
        Self(DEFAULT_SCHEMA.to_string())
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SchemaName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// The serving tables this crate reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    CellMetrics,
    SpeciesMapping,
    SpeciesDim,
    IucnProfiles,
    OsmFeatures,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Self::CellMetrics => "gbif_cell_metrics",
            Self::SpeciesMapping => "gbif_species_h3_mapping",
            Self::SpeciesDim => "gbif_species_dim",
            Self::IucnProfiles => "iucn_species_profiles",
            Self::OsmFeatures => "osm_hex_features",
        }
    }

    /// `schema.table` for use in a FROM clause.
    pub fn qualified(self, schema: &SchemaName) -> String {
        format!("{}.{}", schema.as_str(), self.name())
    }
}

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Integer(i64),
    TextArray(Vec<String>),
}

/// A parameterized statement: SQL text with `$n` placeholders plus binds.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            binds: Vec::new(),
        }
    }

    /// Append a bind and return the placeholder that refers to it.
    pub fn push_bind(&mut self, value: BindValue) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    pub fn bind(mut self, value: BindValue) -> Self {
        self.binds.push(value);
        self
    }

    pub fn bind_text(self, value: impl Into<String>) -> Self {
        self.bind(BindValue::Text(value.into()))
    }

    pub fn bind_int(self, value: impl Into<i64>) -> Self {
        self.bind(BindValue::Integer(value.into()))
    }

    pub fn bind_text_array(self, values: Vec<String>) -> Self {
        self.bind(BindValue::TextArray(values))
    }
}

/// Escape `%`, `_` and `\` so a user string matches literally inside LIKE.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_name_accepts_identifiers() {
        assert_eq!(SchemaName::parse("serving").unwrap().as_str(), "serving");
        assert_eq!(SchemaName::parse(" gold_2024 ").unwrap().as_str(), "gold_2024");
    }

    #[test]
    fn test_schema_name_rejects_injection() {
        assert!(SchemaName::parse("serving; DROP TABLE x").is_err());
        assert!(SchemaName::parse("serving.other").is_err());
        assert!(SchemaName::parse("\"quoted\"").is_err());
        assert!(SchemaName::parse("").is_err());
        assert!(SchemaName::parse("1abc").is_err());
    }

    #[test]
    fn test_table_qualified() {
        let schema = SchemaName::default();
        assert_eq!(
            Table::CellMetrics.qualified(&schema),
            "serving.gbif_cell_metrics"
        );
        assert_eq!(Table::OsmFeatures.qualified(&schema), "serving.osm_hex_features");
    }

    #[test]
    fn test_push_bind_numbers_placeholders() {
        let mut q = SqlQuery::new("");
        assert_eq!(q.push_bind(BindValue::Text("a".into())), "$1");
        assert_eq!(q.push_bind(BindValue::Integer(7)), "$2");
        assert_eq!(q.binds.len(), 2);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("Lynx pardinus"), "Lynx pardinus");
        assert_eq!(escape_like("100%_x\\"), "100\\%\\_x\\\\");
    }
}
