/// Classification codes that describe vegetation in ASPRS LAS terms
pub const VEGETATION_CLASSIFICATIONS: &[u8] = &[3, 4, 5];

/// Classification kept when no explicit filter is requested (high vegetation)
pub const DEFAULT_VEGETATION_CLASSIFICATIONS: &[u8] = &[5];

pub struct ClassInfo {
    pub id: u8,
    pub name: &'static str,
}

pub const CLASS_MAP: &[ClassInfo] = &[
    ClassInfo {
        id: 0,
        name: "created, never classified",
    },
    ClassInfo {
        id: 1,
        name: "unclassified",
    },
    ClassInfo {
        id: 2,
        name: "ground",
    },
    ClassInfo {
        id: 3,
        name: "vegetation - low",
    },
    ClassInfo {
        id: 4,
        name: "vegetation - medium",
    },
    ClassInfo {
        id: 5,
        name: "vegetation - high",
    },
    ClassInfo {
        id: 6,
        name: "buildings",
    },
    ClassInfo {
        id: 7,
        name: "low point (noise)",
    },
    ClassInfo {
        id: 9,
        name: "water",
    },
];

pub fn get_class_name(id: u8) -> String {
    CLASS_MAP
        .iter()
        .find(|c| c.id == id)
        .map_or("unknown", |c| c.name)
        .to_string()
}

/// True when the code belongs to one of the vegetation classes.
pub fn is_vegetation(id: u8) -> bool {
    VEGETATION_CLASSIFICATIONS.contains(&id)
}
