use crate::domain::lenient;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animal {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub tag_id: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl Animal {
    /// Animals without an id or tag cannot be referenced by milk or health records.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.tag_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date_purchased: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnimalRef {
    Id(String),
    Embedded {
        #[serde(rename = "_id")]
        id: String,
        #[serde(rename = "tagId", default)]
        tag_id: Option<String>,
    },
}

impl AnimalRef {
    pub fn id(&self) -> &str {
        match self {
            AnimalRef::Id(id) => id,
            AnimalRef::Embedded { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilkRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub animal_id: Option<AnimalRef>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub morning_milk: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub evening_milk: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub date: Option<String>,
}

impl MilkRecord {
    pub fn total(&self) -> Option<f64> {
        Some(self.morning_milk? + self.evening_milk?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthKind {
    LabTest,
    Medication,
    ReproductiveHealth,
    Vaccination,
    HealthCheck,
}

impl HealthKind {
    pub const ALL: [HealthKind; 5] = [
        HealthKind::LabTest,
        HealthKind::Medication,
        HealthKind::ReproductiveHealth,
        HealthKind::Vaccination,
        HealthKind::HealthCheck,
    ];

    /// Path segment under `/api`.
    pub fn resource(self) -> &'static str {
        match self {
            HealthKind::LabTest => "labTests",
            HealthKind::Medication => "medications",
            HealthKind::ReproductiveHealth => "reproductiveHealth",
            HealthKind::Vaccination => "vaccinations",
            HealthKind::HealthCheck => "healthChecks",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            HealthKind::LabTest => "Lab Tests",
            HealthKind::Medication => "Medications",
            HealthKind::ReproductiveHealth => "Reproductive Health",
            HealthKind::Vaccination => "Vaccinations",
            HealthKind::HealthCheck => "Health Checks",
        }
    }

    /// The field holding the record's primary date.
    pub fn date_field(self) -> &'static str {
        match self {
            HealthKind::ReproductiveHealth => "breedingDate",
            _ => "date",
        }
    }

    /// Detail fields shown after tag and date, in form order.
    pub fn detail_fields(self) -> &'static [&'static str] {
        match self {
            HealthKind::LabTest => &["typeOfTest", "results", "followUpActions"],
            HealthKind::Medication => &[
                "medicationName",
                "dosage",
                "method",
                "administeredBy",
                "notes",
            ],
            HealthKind::ReproductiveHealth => &[
                "pregnancyCheckDate",
                "result",
                "calvingDate",
                "postPartumHealthStatus",
            ],
            HealthKind::Vaccination => &["vaccine", "dosage", "nextDueDate"],
            HealthKind::HealthCheck => &["weight", "bodyConditionScore", "vetNotes"],
        }
    }
}

impl fmt::Display for HealthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown health record kind {0:?}")]
pub struct ParseHealthKindError(String);

impl FromStr for HealthKind {
    type Err = ParseHealthKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "labtest" | "labtests" | "lab" => Ok(HealthKind::LabTest),
            "medication" | "medications" => Ok(HealthKind::Medication),
            "reproductivehealth" | "reproductive" => Ok(HealthKind::ReproductiveHealth),
            "vaccination" | "vaccinations" => Ok(HealthKind::Vaccination),
            "healthcheck" | "healthchecks" | "check" => Ok(HealthKind::HealthCheck),
            _ => Err(ParseHealthKindError(s.to_string())),
        }
    }
}

/// Health records of every kind share a tag and a date; the rest is kind-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub tag_id: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl HealthRecord {
    pub fn field_text(&self, name: &str) -> String {
        match self.fields.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub cost: f64,
    pub date_purchased: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilkEntry {
    pub animal_id: String,
    pub morning_milk: f64,
    pub evening_milk: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEntry {
    pub tag_id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimalUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
}

#[derive(Clone, PartialEq)]
pub struct AnimalImage {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for AnimalImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimalImage")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAnimal {
    pub tag_id: String,
    pub breed: String,
    pub image: AnimalImage,
}
