use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single row from the `info_records` table.
///
/// Instances are produced one at a time by the streaming read path and handed
/// straight to the wire; nothing retains them after the consumer moves on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoRecord {
    pub info_id: i64,
    pub first_name: String,
    pub birth_date: DateTime<Utc>,
    /// Opaque binary payload; encoded as base64 on the JSON wire.
    #[serde(with = "base64_bytes", default)]
    pub encrypted_key: Option<Vec<u8>>,
}

/// Optional predicates for the streaming read. An absent field means
/// "no constraint on this column."
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFilter {
    pub info_id: Option<i64>,
    pub first_name: Option<String>,
}

impl RecordFilter {
    /// Query strings arrive with empty values for blank form fields; treat
    /// those the same as an absent parameter.
    pub fn normalized(mut self) -> Self {
        if self
            .first_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            self.first_name = None;
        }
        self
    }
}

/// Accumulated result of one atomic multi-statement invocation.
///
/// Owned exclusively by the executing call while it runs; once returned to
/// the caller it is treated as immutable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
    pub inserted_rows: i64,
    pub updated_rows: i64,
    pub deleted_rows: i64,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| STANDARD.decode(text).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_record() -> InfoRecord {
        InfoRecord {
            info_id: 42,
            first_name: "Marina".to_string(),
            birth_date: Utc.with_ymd_and_hms(1990, 5, 17, 0, 0, 0).unwrap(),
            encrypted_key: Some(vec![0xde, 0xad, 0xbe, 0xef]),
        }
    }

    #[test]
    fn info_record_serializes_camel_case_with_base64_key() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["infoId"], json!(42));
        assert_eq!(value["firstName"], json!("Marina"));
        assert_eq!(value["encryptedKey"], json!("3q2+7w=="));
    }

    #[test]
    fn info_record_round_trips_missing_key_as_null() {
        let record = InfoRecord {
            encrypted_key: None,
            ..sample_record()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["encryptedKey"].is_null());

        let back: InfoRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn filter_normalization_drops_blank_names() {
        let filter = RecordFilter {
            info_id: Some(7),
            first_name: Some("   ".to_string()),
        }
        .normalized();
        assert_eq!(filter.info_id, Some(7));
        assert!(filter.first_name.is_none());

        let untouched = RecordFilter {
            info_id: None,
            first_name: Some("Jo".to_string()),
        }
        .normalized();
        assert_eq!(untouched.first_name.as_deref(), Some("Jo"));
    }

    #[test]
    fn outcome_wire_shape_is_camel_case() {
        let outcome = OperationOutcome {
            success: true,
            message: "committed".to_string(),
            inserted_rows: 1,
            updated_rows: 2,
            deleted_rows: 0,
        };
        let value = serde_json::to_value(outcome).unwrap();
        assert_eq!(value["insertedRows"], json!(1));
        assert_eq!(value["updatedRows"], json!(2));
        assert_eq!(value["deletedRows"], json!(0));
    }
}
