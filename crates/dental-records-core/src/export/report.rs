//! Printable patient report.

use serde::Serialize;

use crate::models::{format_rupees, PatientRecord};

/// A labelled line on the printed record.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportField {
    pub label: String,
    pub value: String,
}

/// A titled block of fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReportSection {
    pub title: String,
    pub fields: Vec<ReportField>,
}

impl ReportSection {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            fields: Vec::new(),
        }
    }

    fn field(mut self, label: &str, value: impl Into<String>) -> Self {
        self.fields.push(ReportField {
            label: label.to_string(),
            value: value.into(),
        });
        self
    }
}

/// Printable record for a single patient.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PrintReport {
    pub title: String,
    pub patient_id: String,
    /// Date of the last update, `DD/MM/YYYY`
    pub date: String,
    pub sections: Vec<ReportSection>,
}

impl PrintReport {
    /// Build the report from a patient record.
    pub fn from_patient(patient: &PatientRecord) -> Self {
        let demographics = ReportSection::new("Patient Demographics")
            .field("Name", patient.name.clone())
            .field("Age/Sex", format!("{}/{}", patient.age, patient.sex))
            .field("Phone", or(&patient.phone, "N/A"))
            .field("Address", or(&patient.address, "N/A"))
            .field("Occupation", or(&patient.occupation, "N/A"));

        let complaint = ReportSection::new("Chief Complaint & History")
            .field("Complaint", or(&patient.complaint, "None"))
            .field("History", or(&patient.hopi, "None"))
            .field("Intensity", or(&patient.intensity, "N/A"))
            .field("Nature", or(&patient.nature, "N/A"));

        let medical = ReportSection::new("Medical History")
            .field("Hypertension", yes_no(patient.hypertension))
            .field("Diabetes", yes_no(patient.diabetes))
            .field("Thyroid", yes_no(patient.thyroid))
            .field("Others", or(&patient.medical_others, "None"));

        let findings = patient.teeth_conditions.findings();
        let chart = ReportSection::new("Dental Chart").field(
            "Findings",
            if findings.is_empty() {
                "None".to_string()
            } else {
                findings
                    .iter()
                    .map(|(tooth, condition)| format!("{}: {}", tooth, condition))
                    .collect::<Vec<_>>()
                    .join(", ")
            },
        );

        let treatment = ReportSection::new("Treatment Plan")
            .field("GIC", yes_no(patient.gic))
            .field("Composite", yes_no(patient.composite))
            .field("Crown", yes_no(patient.treatment_crown))
            .field("RCT", yes_no(patient.treatment_rct))
            .field("Extraction", yes_no(patient.extraction))
            .field("Others", or(&patient.treatment_others, "None"));

        let payment = ReportSection::new("Payment Details")
            .field("Total", format_rupees(patient.total))
            .field("Paid", format_rupees(patient.paid))
            .field("Pending", format_rupees(patient.pending))
            .field("Method", or(&patient.payment_method, "N/A"));

        Self {
            title: "Dental Patient Record".to_string(),
            patient_id: patient.id.clone(),
            date: report_date(&patient.updated_at),
            sections: vec![demographics, complaint, medical, chart, treatment, payment],
        }
    }

    /// Plain-text rendering.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", self.title));
        out.push_str(&format!("Patient ID: {}\n", self.patient_id));
        out.push_str(&format!("Date: {}\n", self.date));

        for section in &self.sections {
            out.push_str(&format!("\n{}\n", section.title));
            out.push_str(&format!("{}\n", "-".repeat(section.title.chars().count())));
            for field in &section.fields {
                out.push_str(&format!("{}: {}\n", field.label, field.value));
            }
        }
        out
    }

    /// HTML fragment for the print view. All values are escaped.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<div class=\"print-content\">\n");
        html.push_str("  <div class=\"print-header\">\n");
        html.push_str(&format!("    <h1>{}</h1>\n", escape_html(&self.title)));
        html.push_str(&format!("    <p>Patient ID: {}</p>\n", escape_html(&self.patient_id)));
        html.push_str(&format!("    <p>Date: {}</p>\n", escape_html(&self.date)));
        html.push_str("  </div>\n");

        for section in &self.sections {
            html.push_str("  <div class=\"print-section\">\n");
            html.push_str(&format!("    <h3>{}</h3>\n", escape_html(&section.title)));
            for field in &section.fields {
                html.push_str(&format!(
                    concat!(
                        "    <div class=\"print-field\">",
                        "<span class=\"print-label\">{}:</span>",
                        "<span class=\"print-value\">{}</span>",
                        "</div>\n",
                    ),
                    escape_html(&field.label),
                    escape_html(&field.value),
                ));
            }
            html.push_str("  </div>\n");
        }

        html.push_str("</div>\n");
        html
    }
}

fn or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn report_date(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|_| "N/A".to_string())
}

/// Escape a string for HTML text content and attribute values.
fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
