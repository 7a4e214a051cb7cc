use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductFamily {
    Isodec,
    Isoroof,
    Isopanel,
    Isowall,
    Isofrig,
}

impl ProductFamily {
    pub const ALL: [ProductFamily; 5] =
        [Self::Isodec, Self::Isoroof, Self::Isopanel, Self::Isowall, Self::Isofrig];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Isodec => "isodec",
            Self::Isoroof => "isoroof",
            Self::Isopanel => "isopanel",
            Self::Isowall => "isowall",
            Self::Isofrig => "isofrig",
        }
    }

    /// Usage a family is sold for when the order text does not say.
    pub fn default_usage(&self) -> Usage {
        match self {
            Self::Isodec | Self::Isoroof => Usage::Roof,
            Self::Isopanel | Self::Isowall => Usage::Wall,
            Self::Isofrig => Usage::ColdRoom,
        }
    }
}

impl fmt::Display for ProductFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubFamily {
    Eps,
    Pir,
    #[serde(rename = "3g")]
    ThreeG,
    Foil,
    Plus,
}

impl SubFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eps => "eps",
            Self::Pir => "pir",
            Self::ThreeG => "3g",
            Self::Foil => "foil",
            Self::Plus => "plus",
        }
    }
}

impl fmt::Display for SubFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usage {
    Roof,
    Wall,
    ColdRoom,
}

impl Usage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roof => "roof",
            Self::Wall => "wall",
            Self::ColdRoom => "cold_room",
        }
    }

    /// Whether panels in this usage bridge supports horizontally.
    pub fn has_span(&self) -> bool {
        !matches!(self, Self::Wall)
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureType {
    Metal,
    Concrete,
    Wood,
}

impl StructureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metal => "metal",
            Self::Concrete => "concrete",
            Self::Wood => "wood",
        }
    }
}

impl fmt::Display for StructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StructureType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metal" => Ok(Self::Metal),
            "concrete" => Ok(Self::Concrete),
            "wood" => Ok(Self::Wood),
            other => Err(format!("unsupported structure type `{other}` (expected metal|concrete|wood)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProductFamily, StructureType, SubFamily, Usage};

    #[test]
    fn family_default_usage_covers_every_family() {
        assert_eq!(ProductFamily::Isodec.default_usage(), Usage::Roof);
        assert_eq!(ProductFamily::Isoroof.default_usage(), Usage::Roof);
        assert_eq!(ProductFamily::Isopanel.default_usage(), Usage::Wall);
        assert_eq!(ProductFamily::Isowall.default_usage(), Usage::Wall);
        assert_eq!(ProductFamily::Isofrig.default_usage(), Usage::ColdRoom);
    }

    #[test]
    fn sub_family_serializes_with_catalog_spelling() {
        let encoded = serde_json::to_string(&SubFamily::ThreeG).expect("serialize");
        assert_eq!(encoded, "\"3g\"");
    }

    #[test]
    fn structure_type_parses_case_insensitively() {
        assert_eq!(" Wood ".parse::<StructureType>(), Ok(StructureType::Wood));
        assert!("steel".parse::<StructureType>().is_err());
    }

    #[test]
    fn only_walls_have_no_span() {
        assert!(Usage::Roof.has_span());
        assert!(Usage::ColdRoom.has_span());
        assert!(!Usage::Wall.has_span());
    }
}
