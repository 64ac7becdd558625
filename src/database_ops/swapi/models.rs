use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One catalog record as decoded from `{base_url}/{id}/`.
pub type RawRecord = Value;

/// Fields copied verbatim from a record, in `Character::from_record` destructuring order.
pub const SCALAR_FIELDS: [&str; 8] = [
    "birth_year",
    "eye_color",
    "gender",
    "hair_color",
    "height",
    "mass",
    "name",
    "skin_color",
];

/// Fields holding URLs to other catalog resources; resolved to names before insert.
pub const REFERENCE_FIELDS: [&str; 5] =
    ["films", "homeworld", "species", "starships", "vehicles"];

/// Row shape of the `characters` table. The primary key is assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub birth_year: String,
    pub eye_color: String,
    pub films: String,
    pub gender: String,
    pub hair_color: String,
    pub height: String,
    pub homeworld: String,
    pub mass: String,
    pub name: String,
    pub skin_color: String,
    pub species: String,
    pub starships: String,
    pub vehicles: String,
}

impl Character {
    /// `resolved` holds display strings in `REFERENCE_FIELDS` order.
    pub fn from_record(raw: &RawRecord, resolved: [String; 5]) -> Self {
        let [films, homeworld, species, starships, vehicles] = resolved;
        let [birth_year, eye_color, gender, hair_color, height, mass, name, skin_color] =
            SCALAR_FIELDS.map(|key| scalar_text(raw, key));
        Self {
            birth_year,
            eye_color,
            films,
            gender,
            hair_color,
            height,
            homeworld,
            mass,
            name,
            skin_color,
            species,
            starships,
            vehicles,
        }
    }
}

/// Scalar as text: strings as-is, other JSON scalars via their JSON form, missing/null as "".
pub fn scalar_text(raw: &RawRecord, key: &str) -> String {
    match raw.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
