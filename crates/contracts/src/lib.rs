use serde::{Deserialize, Serialize};

pub mod input;
pub mod sanitize;

pub use input::{CategoryPatch, EpisodePatch, NewCategory, NewEpisode, ValidationError};

/// Field the backend attaches to every record to name its schema type.
pub const TYPENAME_FIELD: &str = "__typename";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    Episode,
}

impl EntityKind {
    pub fn display_name(self) -> &'static str {
        match self {
            EntityKind::Category => "Category",
            EntityKind::Episode => "Episode",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A domain record as returned to REST callers.
///
/// `FIELDS` is the allowlist used to project backend objects into the record; anything
/// outside it (notably [`TYPENAME_FIELD`]) never reaches a caller.
pub trait Record: serde::de::DeserializeOwned {
    const FIELDS: &'static [&'static str];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl Record for Category {
    const FIELDS: &'static [&'static str] = &["id", "name", "description"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub featured: bool,
    pub categoryid: String,
}

impl Record for Episode {
    const FIELDS: &'static [&'static str] =
        &["id", "name", "description", "featured", "categoryid"];
}

/// Ordering applied to episode listings over the `name` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn parse(raw: Option<&str>) -> Result<Self, ValidationError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(SortOrder::Asc),
            Some(s) if s.eq_ignore_ascii_case("asc") => Ok(SortOrder::Asc),
            Some(s) if s.eq_ignore_ascii_case("desc") => Ok(SortOrder::Desc),
            Some(_) => Err(ValidationError::for_field("sort", "must be one of asc, desc")),
        }
    }
}
