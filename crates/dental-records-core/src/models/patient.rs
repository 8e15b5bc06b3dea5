//! Patient record models.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chart::TeethChart;
use super::lenient;
use super::payment::{pending_amount, PaymentStatus};

/// Prefix of every clinic-issued patient ID.
pub const PATIENT_ID_PREFIX: &str = "PA";

/// Format a sequence number as a patient ID (`7` -> `PA007`).
pub fn format_patient_id(sequence: u32) -> String {
    format!("{}{:03}", PATIENT_ID_PREFIX, sequence)
}

/// Extract the sequence number from a `PA<digits>` ID.
///
/// Returns `None` for anything else, including IDs from other systems.
pub fn parse_patient_sequence(id: &str) -> Option<u32> {
    let digits = id.strip_prefix(PATIENT_ID_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// A dental patient record as captured by the clinic form.
///
/// Field names serialize in camelCase to stay compatible with exports from
/// the browser form. Unknown fields are kept in `extra` and written back.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    /// Clinic ID (`PA001`)
    #[serde(default, deserialize_with = "lenient::text")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::years")]
    pub age: u32,
    #[serde(default, deserialize_with = "lenient::text")]
    pub sex: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub phone: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub occupation: String,

    // Chief complaint
    #[serde(default, deserialize_with = "lenient::text")]
    pub complaint: String,
    /// History of present illness
    #[serde(default, deserialize_with = "lenient::text")]
    pub hopi: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub intensity: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub nature: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub aggravating: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub relief: String,

    // Medical history
    #[serde(default, deserialize_with = "lenient::flag")]
    pub hypertension: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub diabetes: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub thyroid: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub medical_others: String,

    // Dental history
    #[serde(default, deserialize_with = "lenient::flag")]
    pub prev_extractions: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub prev_restorations: bool,
    #[serde(default, rename = "prevRCT", deserialize_with = "lenient::flag")]
    pub prev_rct: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub prev_ortho: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub prev_prosth: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub dental_others: String,

    // Clinical examination
    #[serde(default, deserialize_with = "lenient::flag")]
    pub impaction: bool,
    /// Oral prophylaxis / cleaning indicated
    #[serde(default, deserialize_with = "lenient::flag")]
    pub opc: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub abscess: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub rct_needed: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub crown_needed: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub mobility: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub cervical_dentin: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub gingival_recession: bool,
    /// Free-text tooth numbers the findings apply to
    #[serde(default, deserialize_with = "lenient::text")]
    pub tooth_numbers: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub clinical_others: String,

    // Treatment plan
    /// Glass ionomer cement restoration
    #[serde(default, deserialize_with = "lenient::flag")]
    pub gic: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub composite: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub treatment_crown: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub extraction: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub xray: bool,
    #[serde(default, rename = "treatmentRCT", deserialize_with = "lenient::flag")]
    pub treatment_rct: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub treatment_ortho: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub treatment_others: String,

    // Prescription
    #[serde(default, deserialize_with = "lenient::flag")]
    pub amox_clav: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub paracetamol: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub zerodol_p: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub hifinac: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub flagyl: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub pan: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub prescription_others: String,

    // Payment
    #[serde(default, deserialize_with = "lenient::amount")]
    pub paid: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub total: f64,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub pending: f64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub payment_method: String,

    // Visit
    #[serde(default, deserialize_with = "lenient::flag")]
    pub home_visit: bool,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub new_patient: bool,
    #[serde(default, deserialize_with = "lenient::text")]
    pub appointment: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub consultant: String,
    #[serde(default, deserialize_with = "lenient::amount")]
    pub expenses: f64,

    /// Tooth chart
    #[serde(default)]
    pub teeth_conditions: TeethChart,

    /// Creation timestamp (RFC 3339), empty if never stamped
    #[serde(default, deserialize_with = "lenient::text")]
    pub created_at: String,
    /// Last update timestamp (RFC 3339), empty if never stamped
    #[serde(default, deserialize_with = "lenient::text")]
    pub updated_at: String,

    /// Fields this version does not model, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PatientRecord {
    /// Create a record with only the identifying fields set.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// The clinic's built-in demonstration patient.
    pub fn sample() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let mut patient = Self::new(format_patient_id(1), "Sample Patient");
        patient.age = 35;
        patient.sex = "Male".into();
        patient.phone = "9876543210".into();
        patient.address = "123 Main Street, City".into();
        patient.occupation = "Engineer".into();
        patient.complaint = "Tooth pain".into();
        patient.intensity = "moderate".into();
        patient.nature = "throbbing".into();
        patient.paid = 500.0;
        patient.total = 1000.0;
        patient.pending = 500.0;
        patient.payment_method = "Cash".into();
        patient.new_patient = true;
        // Both are valid chart positions, so these cannot fail.
        let _ = patient.teeth_conditions.set(16, super::ToothCondition::Decay);
        let _ = patient.teeth_conditions.set(17, super::ToothCondition::Filled);
        patient.created_at = now.clone();
        patient.updated_at = now;
        patient
    }

    /// Both identity fields are present.
    pub fn is_valid(&self) -> bool {
        !self.id.trim().is_empty() && !self.name.trim().is_empty()
    }

    /// Sequence number of this record's ID, if it is a clinic-issued ID.
    pub fn sequence(&self) -> Option<u32> {
        parse_patient_sequence(&self.id)
    }

    /// Recompute the pending balance from paid and total.
    pub fn recalculate_pending(&mut self) {
        self.pending = pending_amount(self.paid, self.total);
    }

    pub fn payment_status(&self) -> PaymentStatus {
        PaymentStatus::from_amounts(self.paid, self.total, self.pending)
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Case-insensitive match on name or ID, substring match on phone.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.id.to_lowercase().contains(&needle)
            || (!self.phone.is_empty() && self.phone.contains(term.trim()))
    }
}
