use serde::{Deserialize, Serialize};
use sqlx::Type;
use utoipa::ToSchema;

/// Geographic node type matching the `geo_node_type` database enum
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type, ToSchema,
)]
#[sqlx(type_name = "geo_node_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeoNodeType {
    Continent,
    Subcontinent,
    Country,
    State,
    Province,
    Regency,
    City,
    District,
    Subdistrict,
    Village,
}

impl GeoNodeType {
    pub const ALL: [GeoNodeType; 10] = [
        GeoNodeType::Continent,
        GeoNodeType::Subcontinent,
        GeoNodeType::Country,
        GeoNodeType::State,
        GeoNodeType::Province,
        GeoNodeType::Regency,
        GeoNodeType::City,
        GeoNodeType::District,
        GeoNodeType::Subdistrict,
        GeoNodeType::Village,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeoNodeType::Continent => "CONTINENT",
            GeoNodeType::Subcontinent => "SUBCONTINENT",
            GeoNodeType::Country => "COUNTRY",
            GeoNodeType::State => "STATE",
            GeoNodeType::Province => "PROVINCE",
            GeoNodeType::Regency => "REGENCY",
            GeoNodeType::City => "CITY",
            GeoNodeType::District => "DISTRICT",
            GeoNodeType::Subdistrict => "SUBDISTRICT",
            GeoNodeType::Village => "VILLAGE",
        }
    }
}

impl std::fmt::Display for GeoNodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GeoNodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        GeoNodeType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(normalized))
            .ok_or_else(|| format!("Unknown geo node type '{}'", s))
    }
}
