//! Static reference data for mineral enrichment and context inference.

use std::collections::{BTreeMap, HashMap};

use crate::db::models::{MineralClass, MineralProperties, RockType};

#[derive(Debug, Clone, PartialEq)]
pub struct MineralReference {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub class: MineralClass,
    pub hardness: f64,
    pub density: f64,
    pub color: &'static str,
    pub luster: &'static str,
    pub crystal_system: &'static str,
    /// Element symbol and weight percentage.
    pub composition: &'static [(&'static str, f64)],
    pub occurrence: &'static str,
    pub significance: &'static str,
}

impl MineralReference {
    pub fn composition_map(&self) -> BTreeMap<String, f64> {
        self.composition
            .iter()
            .map(|(element, pct)| (element.to_string(), *pct))
            .collect()
    }

    pub fn properties(&self) -> MineralProperties {
        MineralProperties {
            density: self.density,
            hardness: self.hardness,
            color: self.color.to_string(),
            luster: self.luster.to_string(),
            crystal_system: self.crystal_system.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormationReference {
    pub name: &'static str,
    pub age: &'static str,
    pub rock_type: RockType,
    pub composition: &'static [&'static str],
    pub environment: &'static str,
    pub characteristics: &'static str,
}

const MINERALS: &[MineralReference] = &[
    MineralReference {
        name: "Quartz",
        aliases: &["silica", "rock crystal", "smoky quartz", "rose quartz"],
        class: MineralClass::Silicate,
        hardness: 7.0,
        density: 2.65,
        color: "Colorless to white",
        luster: "Vitreous",
        crystal_system: "Hexagonal",
        composition: &[("Si", 46.7), ("O", 53.3)],
        occurrence: "Very common in igneous, sedimentary, and metamorphic rocks",
        significance: "One of the most abundant minerals in Earth's crust",
    },
    MineralReference {
        name: "Feldspar",
        aliases: &[
            "orthoclase",
            "k feldspar",
            "potassium feldspar",
            "plagioclase",
            "microcline",
        ],
        class: MineralClass::Silicate,
        hardness: 6.0,
        density: 2.56,
        color: "White to pink",
        luster: "Vitreous",
        crystal_system: "Triclinic/Monoclinic",
        composition: &[("Al", 9.1), ("Si", 30.3), ("O", 48.6), ("K", 12.0)],
        occurrence: "Major component of igneous rocks",
        significance: "Most abundant mineral group in Earth's crust",
    },
    MineralReference {
        name: "Mica",
        aliases: &["muscovite", "biotite"],
        class: MineralClass::Silicate,
        hardness: 2.5,
        density: 2.8,
        color: "Black to silver",
        luster: "Pearly",
        crystal_system: "Monoclinic",
        composition: &[("K", 8.8), ("Al", 12.1), ("Si", 25.4), ("O", 43.2)],
        occurrence: "Common in igneous and metamorphic rocks",
        significance: "Important for dating geological processes",
    },
    MineralReference {
        name: "Calcite",
        aliases: &["calcium carbonate", "iceland spar"],
        class: MineralClass::Carbonate,
        hardness: 3.0,
        density: 2.71,
        color: "White to colorless",
        luster: "Vitreous",
        crystal_system: "Hexagonal",
        composition: &[("Ca", 40.0), ("C", 12.0), ("O", 48.0)],
        occurrence: "Primary component of limestone and marble",
        significance: "Important for understanding sedimentary environments",
    },
    MineralReference {
        name: "Pyrite",
        aliases: &["fool's gold", "iron pyrite"],
        class: MineralClass::Sulfide,
        hardness: 6.5,
        density: 5.02,
        color: "Brass yellow",
        luster: "Metallic",
        crystal_system: "Isometric",
        composition: &[("Fe", 46.6), ("S", 53.4)],
        occurrence: "Common in sedimentary and hydrothermal environments",
        significance: "Indicator of reducing chemical conditions",
    },
    MineralReference {
        name: "Hematite",
        aliases: &["haematite", "specularite"],
        class: MineralClass::Oxide,
        hardness: 6.0,
        density: 5.3,
        color: "Red to black",
        luster: "Metallic",
        crystal_system: "Hexagonal",
        composition: &[("Fe", 69.9), ("O", 30.1)],
        occurrence: "Banded iron formations and oxidized zones",
        significance: "Principal iron ore; records oxidizing conditions",
    },
];

const FORMATIONS: &[FormationReference] = &[
    FormationReference {
        name: "Granite Intrusion",
        age: "Mesozoic to Cenozoic",
        rock_type: RockType::Igneous,
        composition: &["Quartz", "Feldspar", "Mica"],
        environment: "Deep crustal intrusion",
        characteristics: "Coarse-grained, light-colored",
    },
    FormationReference {
        name: "Limestone Formation",
        age: "Paleozoic to Recent",
        rock_type: RockType::Sedimentary,
        composition: &["Calcite", "Aragonite"],
        environment: "Marine shallow water",
        characteristics: "Fine to coarse-grained, fossiliferous",
    },
    FormationReference {
        name: "Gneiss Complex",
        age: "Precambrian to Paleozoic",
        rock_type: RockType::Metamorphic,
        composition: &["Quartz", "Feldspar", "Mica"],
        environment: "High-grade metamorphism",
        characteristics: "Banded texture, high-grade minerals",
    },
];

/// Folds case, separators and spacing so "K-Feldspar", "k_feldspar" and
/// " k  feldspar " all resolve to the same key.
pub fn normalize_name(raw: &str) -> String {
    let folded: String = raw
        .chars()
        .map(|c| match c {
            '_' | '-' => ' ',
            '\u{2019}' => '\'',
            other => other,
        })
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Read-only lookup over the built-in mineral and formation tables.
#[derive(Debug, Clone)]
pub struct ReferenceCatalog {
    minerals: &'static [MineralReference],
    formations: &'static [FormationReference],
    index: HashMap<String, usize>,
}

impl Default for ReferenceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ReferenceCatalog {
    pub fn builtin() -> Self {
        let mut index = HashMap::new();
        for (i, mineral) in MINERALS.iter().enumerate() {
            index.insert(normalize_name(mineral.name), i);
            for alias in mineral.aliases {
                index.insert(normalize_name(alias), i);
            }
        }
        Self {
            minerals: MINERALS,
            formations: FORMATIONS,
            index,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&MineralReference> {
        self.index
            .get(&normalize_name(name))
            .map(|&i| &self.minerals[i])
    }

    pub fn formation_for(&self, rock_type: RockType) -> Option<&FormationReference> {
        self.formations.iter().find(|f| f.rock_type == rock_type)
    }

    pub fn minerals(&self) -> &[MineralReference] {
        self.minerals
    }

    pub fn formations(&self) -> &[FormationReference] {
        self.formations
    }
}
