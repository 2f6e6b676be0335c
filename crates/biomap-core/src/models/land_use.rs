//! Land-use class reference table.
//!
//! Codes and colors follow the MapBiomas Collection 8 legend for the classes
//! present in the state-level agriculture raster.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandUseCategory {
    Agricultural,
    Forest,
    Water,
    Urban,
    Grassland,
    Other,
    Nodata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandUseClass {
    pub class_id: u16,
    pub name: String,
    /// `#RRGGBB`
    pub color: String,
    pub category: LandUseCategory,
}

impl LandUseClass {
    pub fn new(class_id: u16, name: &str, color: &str, category: LandUseCategory) -> Self {
        Self {
            class_id,
            name: name.to_string(),
            color: color.to_string(),
            category,
        }
    }

    /// Placeholder for codes missing from the table.
    pub fn unknown(class_id: u16) -> Self {
        Self::new(class_id, &format!("Classe {}", class_id), "#808080", LandUseCategory::Other)
    }

    pub fn rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.color).unwrap_or([128, 128, 128])
    }
}

const MAPBIOMAS_CLASSES: &[(u16, &str, &str, LandUseCategory)] = &[
    (0, "Sem dados", "#000000", LandUseCategory::Nodata),
    (3, "Formação Florestal", "#1F8D49", LandUseCategory::Forest),
    (4, "Formação Savânica", "#7DC975", LandUseCategory::Forest),
    (9, "Silvicultura", "#6D4C41", LandUseCategory::Forest),
    (11, "Área Alagada", "#519799", LandUseCategory::Water),
    (12, "Formação Campestre", "#D6BC74", LandUseCategory::Grassland),
    (15, "Pastagem", "#FFD966", LandUseCategory::Agricultural),
    (20, "Cana-de-açúcar", "#C5E1A5", LandUseCategory::Agricultural),
    (21, "Mosaico Agricultura-Pastagem", "#FFEFC3", LandUseCategory::Agricultural),
    (24, "Infraestrutura Urbana", "#AF2A2A", LandUseCategory::Urban),
    (25, "Outra Área não Vegetada", "#FF99FF", LandUseCategory::Other),
    (33, "Rio, Lago e Oceano", "#0000FF", LandUseCategory::Water),
    (35, "Dendê", "#66BB6A", LandUseCategory::Agricultural),
    (39, "Soja", "#E1BEE7", LandUseCategory::Agricultural),
    (40, "Arroz", "#FFCDD2", LandUseCategory::Agricultural),
    (41, "Outras Temporárias", "#DCEDC8", LandUseCategory::Agricultural),
    (46, "Café", "#8D6E63", LandUseCategory::Agricultural),
    (47, "Citros", "#FFA726", LandUseCategory::Agricultural),
    (48, "Outras Perenes", "#A1887F", LandUseCategory::Agricultural),
    (62, "Algodão", "#F8BBD9", LandUseCategory::Agricultural),
];

/// Immutable code → class lookup shared by zonal statistics and tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct LandUseTable {
    classes: BTreeMap<u16, LandUseClass>,
}

impl LandUseTable {
    pub fn mapbiomas() -> Self {
        Self::from_classes(
            MAPBIOMAS_CLASSES
                .iter()
                .map(|(id, name, color, category)| LandUseClass::new(*id, name, color, *category)),
        )
    }

    pub fn from_classes(classes: impl IntoIterator<Item = LandUseClass>) -> Self {
        Self {
            classes: classes.into_iter().map(|c| (c.class_id, c)).collect(),
        }
    }

    pub fn get(&self, class_id: u16) -> Option<&LandUseClass> {
        self.classes.get(&class_id)
    }

    /// Known class or the grey `Classe N` fallback.
    pub fn resolve(&self, class_id: u16) -> LandUseClass {
        self.get(class_id).cloned().unwrap_or_else(|| LandUseClass::unknown(class_id))
    }

    /// Codes that never count toward statistics.
    pub fn is_nodata(&self, class_id: u16) -> bool {
        matches!(self.get(class_id), Some(c) if c.category == LandUseCategory::Nodata)
    }

    /// Tile color for a code. Nodata and unmapped codes are fully transparent.
    pub fn rgba(&self, class_id: u16, alpha: u8) -> [u8; 4] {
        match self.get(class_id) {
            Some(class) if class.category != LandUseCategory::Nodata => {
                let [r, g, b] = class.rgb();
                [r, g, b, alpha]
            }
            _ => [0, 0, 0, 0],
        }
    }

    /// Classes in ascending code order.
    pub fn legend(&self) -> impl Iterator<Item = &LandUseClass> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for LandUseTable {
    fn default() -> Self {
        Self::mapbiomas()
    }
}

fn parse_hex_color(color: &str) -> Option<[u8; 3]> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_classes() {
        let table = LandUseTable::mapbiomas();

        let pasture = table.resolve(15);
        assert_eq!(pasture.name, "Pastagem");
        assert_eq!(pasture.category, LandUseCategory::Agricultural);

        let unknown = table.resolve(99);
        assert_eq!(unknown.name, "Classe 99");
        assert_eq!(unknown.color, "#808080");
        assert_eq!(unknown.category, LandUseCategory::Other);
    }

    #[test]
    fn test_rgba_transparency() {
        let table = LandUseTable::mapbiomas();

        assert_eq!(table.rgba(15, 200), [0xFF, 0xD9, 0x66, 200]);
        assert_eq!(table.rgba(0, 200), [0, 0, 0, 0], "class 0 is transparent");
        assert_eq!(table.rgba(99, 200), [0, 0, 0, 0], "unmapped codes are transparent");
    }

    #[test]
    fn test_nodata_detection() {
        let table = LandUseTable::mapbiomas();
        assert!(table.is_nodata(0));
        assert!(!table.is_nodata(3));
        assert!(!table.is_nodata(99));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#1F8D49"), Some([0x1F, 0x8D, 0x49]));
        assert_eq!(parse_hex_color("1F8D49"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }
}
