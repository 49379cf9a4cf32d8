//! Geographic and lexical tags used for category browsing.
//!
//! The rules are rough rectangles and name matches, not real geography; a
//! station can be both `South` and `Sea`, for instance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::EcoGaresError;
use crate::geo::{GeoPoint, PARIS};
use crate::scoring::AmenityCounts;
use crate::station::Station;

/// Major French cities recognised by the `City` tag (case-sensitive substring).
pub const MAJOR_CITIES: [&str; 32] = [
    "Paris",
    "Marseille",
    "Lyon",
    "Toulouse",
    "Nice",
    "Nantes",
    "Montpellier",
    "Strasbourg",
    "Bordeaux",
    "Lille",
    "Rennes",
    "Reims",
    "Saint-Étienne",
    "Toulon",
    "Le Havre",
    "Grenoble",
    "Dijon",
    "Angers",
    "Nîmes",
    "Villeurbanne",
    "Saint-Denis",
    "Aix-en-Provence",
    "Clermont-Ferrand",
    "Le Mans",
    "Brest",
    "Tours",
    "Amiens",
    "Limoges",
    "Annecy",
    "Perpignan",
    "Metz",
    "Besançon",
];

const PARIS_RADIUS_KM: f64 = 20.0;
const NATURE_MIN_BIKES: usize = 2;
const NATURE_MIN_PARIS_DISTANCE_KM: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    South,
    North,
    Paris,
    Mountain,
    Sea,
    Ocean,
    City,
    Nature,
}

impl Tag {
    pub const ALL: [Tag; 8] = [
        Tag::South,
        Tag::North,
        Tag::Paris,
        Tag::Mountain,
        Tag::Sea,
        Tag::Ocean,
        Tag::City,
        Tag::Nature,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::South => "south",
            Tag::North => "north",
            Tag::Paris => "paris",
            Tag::Mountain => "mountain",
            Tag::Sea => "sea",
            Tag::Ocean => "ocean",
            Tag::City => "city",
            Tag::Nature => "nature",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = EcoGaresError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EcoGaresError::validation(format!("unknown category '{s}'")))
    }
}

pub type TagSet = BTreeSet<Tag>;

/// Tags derived from position and name alone, computed once after load.
#[must_use]
pub fn compute_tags(station: &Station) -> TagSet {
    let GeoPoint { lat, lon } = station.location;
    let mut tags = TagSet::new();

    if lat < 45.7 {
        tags.insert(Tag::South);
    }
    if lat > 49.0 {
        tags.insert(Tag::North);
    }
    if station.location.distance_km(&PARIS) < PARIS_RADIUS_KM {
        tags.insert(Tag::Paris);
    }

    let alps = lon > 5.5 && lat > 44.0 && lat < 46.2;
    let pyrenees = lat < 43.2 && lon < 3.0;
    if alps || pyrenees {
        tags.insert(Tag::Mountain);
    }

    if lat < 43.7 && lon > 3.0 {
        tags.insert(Tag::Sea);
    }
    let atlantic = lon < -1.0 && lat < 48.0;
    let channel = lat > 48.5 && lon < -1.5;
    if atlantic || channel {
        tags.insert(Tag::Ocean);
    }

    if is_major_city(station.short_name()) {
        tags.insert(Tag::City);
    }
    tags
}

/// Stations with a few bike parkings well away from Paris.
#[must_use]
pub fn is_nature(station: &Station, counts: &AmenityCounts) -> bool {
    counts.bikes > NATURE_MIN_BIKES
        && station.location.distance_km(&PARIS) > NATURE_MIN_PARIS_DISTANCE_KM
}

/// [`compute_tags`] plus the count-dependent `Nature` tag.
#[must_use]
pub fn compute_tags_with_counts(station: &Station, counts: &AmenityCounts) -> TagSet {
    let mut tags = compute_tags(station);
    if is_nature(station, counts) {
        tags.insert(Tag::Nature);
    }
    tags
}

fn is_major_city(name: &str) -> bool {
    MAJOR_CITIES.iter().any(|city| name.contains(city))
}
