use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::Frequency;

/// A medication row. The store owns it; the reminder engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub id: i64,
    pub name: String,
    pub dosage: String,
    pub med_type: String,
    pub notes: Option<String>,
    pub frequency: Frequency,
    /// `"HH:MM"` strings; meaning depends on `frequency`.
    pub times: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

/// Input for creating or replacing a medication (no id yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationInput {
    pub name: String,
    pub dosage: String,
    pub med_type: String,
    pub notes: Option<String>,
    pub frequency: Frequency,
    pub times: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl MedicationInput {
    pub fn into_medication(self, id: i64) -> Medication {
        Medication {
            id,
            name: self.name,
            dosage: self.dosage,
            med_type: self.med_type,
            notes: self.notes,
            frequency: self.frequency,
            times: self.times,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
        }
    }
}

impl From<&Medication> for MedicationInput {
    fn from(med: &Medication) -> Self {
        Self {
            name: med.name.clone(),
            dosage: med.dosage.clone(),
            med_type: med.med_type.clone(),
            notes: med.notes.clone(),
            frequency: med.frequency,
            times: med.times.clone(),
            start_date: med.start_date,
            end_date: med.end_date,
            is_active: med.is_active,
        }
    }
}
