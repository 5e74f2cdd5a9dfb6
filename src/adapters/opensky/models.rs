//! Wire format of the OpenSky aircraft metadata endpoint.

use serde::{Deserialize, Serialize};

use crate::domain::ports::RemoteAircraftRecord;

/// Body of `GET /api/metadata/aircraft/icao/{icao24}`.
///
/// Every field may be missing or null; empty strings are treated as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSkyAircraftRecord {
    #[serde(default)]
    pub icao24: Option<String>,
    #[serde(default)]
    pub registration: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub typecode: Option<String>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub operator_icao: Option<String>,
    #[serde(default)]
    pub operator_iata: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<OpenSkyAircraftRecord> for RemoteAircraftRecord {
    fn from(r: OpenSkyAircraftRecord) -> Self {
        Self {
            registration: present(r.registration),
            model: present(r.model),
            typecode: present(r.typecode),
            manufacturer: present(r.manufacturer_name),
            owner: present(r.owner),
            operator: present(r.operator),
            operator_icao: present(r.operator_icao),
            operator_iata: present(r.operator_iata),
            serial_number: present(r.serial_number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_partial_record() {
        let json = r#"{
            "icao24": "3c6444",
            "registration": "D-AIZA",
            "manufacturerName": "Airbus",
            "model": "A320 214",
            "typecode": "A320",
            "operator": "",
            "owner": null,
            "built": "2009-01-01"
        }"#;

        let record: RemoteAircraftRecord = serde_json::from_str::<OpenSkyAircraftRecord>(json)
            .unwrap()
            .into();

        assert_eq!(record.registration.as_deref(), Some("D-AIZA"));
        assert_eq!(record.manufacturer.as_deref(), Some("Airbus"));
        assert_eq!(record.typecode.as_deref(), Some("A320"));
        assert_eq!(record.operator, None);
        assert_eq!(record.owner, None);
    }
}
