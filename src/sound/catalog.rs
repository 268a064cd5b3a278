// Built-in sound catalog

/// One bundled sound
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub title: &'static str,
}

/// A category of bundled sounds
#[derive(Debug, Clone, Copy)]
pub struct CatalogGroup {
    pub id: &'static str,
    pub title: &'static str,
    pub sounds: &'static [CatalogEntry],
}

/// Group that receives user-imported sounds
pub const CUSTOM_GROUP_ID: &str = "custom";
pub const CUSTOM_GROUP_TITLE: &str = "Custom";

pub const CATALOG: &[CatalogGroup] = &[
    CatalogGroup {
        id: "nature",
        title: "Nature",
        sounds: &[
            CatalogEntry { name: "rain", title: "Rain" },
            CatalogEntry { name: "storm", title: "Storm" },
            CatalogEntry { name: "wind", title: "Wind" },
            CatalogEntry { name: "summer-night", title: "Summer Night" },
        ],
    },
    CatalogGroup {
        id: "interiors",
        title: "Interiors",
        sounds: &[
            CatalogEntry { name: "coffee-shop", title: "Coffee Shop" },
            CatalogEntry { name: "fireplace", title: "Fireplace" },
        ],
    },
    CatalogGroup {
        id: "noise",
        title: "Noise",
        sounds: &[
            CatalogEntry { name: "pink-noise", title: "Pink Noise" },
            CatalogEntry { name: "white-noise", title: "White Noise" },
        ],
    },
];

/// Bundled audio file of a built-in sound, relative to the resource dir
pub fn resource_path(name: &str) -> String {
    format!("sounds/{}.ogg", name)
}

pub fn is_built_in(name: &str) -> bool {
    CATALOG
        .iter()
        .flat_map(|group| group.sounds.iter())
        .any(|entry| entry.name == name)
}
