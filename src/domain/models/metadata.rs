//! Static aircraft metadata and the model-string classification heuristic.

use serde::{Deserialize, Serialize};

/// Broad aircraft category derived from the model string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AircraftCategory {
    Commercial,
    Business,
    #[serde(rename = "General Aviation")]
    GeneralAviation,
    Military,
    Other,
    Unknown,
}

impl AircraftCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commercial => "Commercial",
            Self::Business => "Business",
            Self::GeneralAviation => "General Aviation",
            Self::Military => "Military",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "Commercial" => Some(Self::Commercial),
            "Business" => Some(Self::Business),
            "General Aviation" => Some(Self::GeneralAviation),
            "Military" => Some(Self::Military),
            "Other" => Some(Self::Other),
            "Unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for AircraftCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const COMMERCIAL_INDICATORS: &[&str] = &[
    "boeing", "airbus", "a320", "a330", "a340", "a350", "a380", "b737", "b747", "b767", "b777",
    "b787", "737", "747", "767", "777", "787", "embraer", "crj", "dash",
];

const BUSINESS_INDICATORS: &[&str] = &[
    "citation",
    "gulfstream",
    "lear",
    "falcon",
    "challenger",
    "global",
    "phenom",
    "legacy",
];

const GENERAL_AVIATION_INDICATORS: &[&str] =
    &["cessna", "piper", "beechcraft", "cirrus", "diamond", "mooney"];

const MILITARY_INDICATORS: &[&str] = &["f-", "c-130", "blackhawk", "apache", "chinook"];

/// Indicator lists in priority order. The first list with a match wins.
const CLASSIFICATION_ORDER: &[(AircraftCategory, &[&str])] = &[
    (AircraftCategory::Commercial, COMMERCIAL_INDICATORS),
    (AircraftCategory::Business, BUSINESS_INDICATORS),
    (AircraftCategory::GeneralAviation, GENERAL_AVIATION_INDICATORS),
    (AircraftCategory::Military, MILITARY_INDICATORS),
];

/// Classify a model string by case-insensitive substring match.
///
/// Empty or missing models are `Unknown`; models matching no indicator are
/// `Other`.
pub fn classify_model(model: Option<&str>) -> AircraftCategory {
    let model = match model.map(str::trim) {
        Some(m) if !m.is_empty() => m.to_lowercase(),
        _ => return AircraftCategory::Unknown,
    };

    CLASSIFICATION_ORDER
        .iter()
        .find(|(_, indicators)| indicators.iter().any(|i| model.contains(i)))
        .map_or(AircraftCategory::Other, |(category, _)| *category)
}

/// Where a metadata record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrigin {
    /// Bulk-loaded from tabular data.
    Preload,
    /// Resolved by the external metadata source.
    External,
    /// Negative cache entry: nothing richer was available.
    Placeholder,
    /// Created by the persistence layer to satisfy referential integrity.
    AutoCreated,
}

impl RecordOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preload => "preload",
            Self::External => "external",
            Self::Placeholder => "placeholder",
            Self::AutoCreated => "auto_created",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preload" => Some(Self::Preload),
            "external" => Some(Self::External),
            "placeholder" => Some(Self::Placeholder),
            "auto_created" => Some(Self::AutoCreated),
            _ => None,
        }
    }
}

/// Best-effort static description of one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftMetadata {
    pub icao24: String,
    pub registration: Option<String>,
    pub aircraft_type: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub airline: Option<String>,
    pub airline_iata: Option<String>,
    pub airline_icao: Option<String>,
    pub owner: Option<String>,
    pub operator: Option<String>,
    pub construction_number: Option<String>,
    pub first_flight: Option<String>,
    pub engines: Option<String>,
    pub seats: Option<u32>,
    pub category: Option<AircraftCategory>,
    pub origin: RecordOrigin,
}

impl AircraftMetadata {
    /// A record holding only the identifier.
    pub fn placeholder(icao24: impl Into<String>) -> Self {
        Self::empty(icao24, RecordOrigin::Placeholder)
    }

    /// A placeholder written by the persistence layer.
    pub fn auto_created(icao24: impl Into<String>) -> Self {
        Self::empty(icao24, RecordOrigin::AutoCreated)
    }

    fn empty(icao24: impl Into<String>, origin: RecordOrigin) -> Self {
        Self {
            icao24: icao24.into(),
            registration: None,
            aircraft_type: None,
            manufacturer: None,
            model: None,
            airline: None,
            airline_iata: None,
            airline_icao: None,
            owner: None,
            operator: None,
            construction_number: None,
            first_flight: None,
            engines: None,
            seats: None,
            category: None,
            origin,
        }
    }

    /// Carries at least one descriptive field worth attaching to a state.
    pub fn is_resolved(&self) -> bool {
        self.aircraft_type.is_some() || self.registration.is_some()
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(
            self.origin,
            RecordOrigin::Placeholder | RecordOrigin::AutoCreated
        )
    }
}
