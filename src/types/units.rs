//! Territorial units.

use serde::{Deserialize, Serialize};

/// Level of a territorial unit in the BDL hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum UnitLevel {
    /// Poland as a whole
    Country,
    /// Macroregion
    Macroregion,
    /// Voivodeship (województwo)
    Voivodeship,
    /// Region
    Region,
    /// Subregion (podregion)
    Subregion,
    /// County (powiat)
    Powiat,
    /// Municipality (gmina)
    Gmina,
}

impl UnitLevel {
    /// Numeric level used by the API.
    pub fn as_u8(self) -> u8 {
        self.into()
    }

    /// Level listed when a unit of this level is expanded.
    ///
    /// Browsing skips the statistical levels: country → voivodeship → powiat → gmina.
    /// Returns `None` for levels that are not expanded.
    pub fn child_level(self) -> Option<UnitLevel> {
        match self {
            UnitLevel::Country => Some(UnitLevel::Voivodeship),
            UnitLevel::Voivodeship => Some(UnitLevel::Powiat),
            UnitLevel::Powiat => Some(UnitLevel::Gmina),
            _ => None,
        }
    }
}

impl From<UnitLevel> for u8 {
    fn from(level: UnitLevel) -> u8 {
        match level {
            UnitLevel::Country => 0,
            UnitLevel::Macroregion => 1,
            UnitLevel::Voivodeship => 2,
            UnitLevel::Region => 3,
            UnitLevel::Subregion => 4,
            UnitLevel::Powiat => 5,
            UnitLevel::Gmina => 6,
        }
    }
}

impl TryFrom<u8> for UnitLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UnitLevel::Country),
            1 => Ok(UnitLevel::Macroregion),
            2 => Ok(UnitLevel::Voivodeship),
            3 => Ok(UnitLevel::Region),
            4 => Ok(UnitLevel::Subregion),
            5 => Ok(UnitLevel::Powiat),
            6 => Ok(UnitLevel::Gmina),
            _ => Err(format!("Invalid unit level: {}", value)),
        }
    }
}

impl std::fmt::Display for UnitLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A territorial unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    /// Unit id (12 digits)
    pub id: String,
    /// Display name
    pub name: String,
    /// Hierarchy level
    pub level: UnitLevel,
    /// Parent unit id
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl Unit {
    /// Label in the form `Name (id)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_levels() {
        assert_eq!(UnitLevel::Country.child_level(), Some(UnitLevel::Voivodeship));
        assert_eq!(UnitLevel::Voivodeship.child_level(), Some(UnitLevel::Powiat));
        assert_eq!(UnitLevel::Powiat.child_level(), Some(UnitLevel::Gmina));
        assert_eq!(UnitLevel::Gmina.child_level(), None);
    }

    #[test]
    fn test_unit_deserialize() {
        let unit: Unit = serde_json::from_value(serde_json::json!({
            "id": "011200000000",
            "name": "MAŁOPOLSKIE",
            "parentId": "010000000000",
            "level": 2,
            "kind": "0",
            "hasDescription": false
        }))
        .unwrap();

        assert_eq!(unit.level, UnitLevel::Voivodeship);
        assert_eq!(unit.parent_id.as_deref(), Some("010000000000"));
        assert_eq!(unit.label(), "MAŁOPOLSKIE (011200000000)");
    }

    #[test]
    fn test_invalid_level() {
        assert!(UnitLevel::try_from(9).is_err());
    }
}
