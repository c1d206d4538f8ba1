use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{TimeRange, Treatment};

use crate::error::TreatmentError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTreatmentRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(default)]
    pub tooth_no: Option<i16>,
    pub procedure: String,
    pub cost: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateTreatmentRequest {
    pub fn new(patient_id: Uuid, doctor_id: Uuid, procedure: impl Into<String>, cost: Decimal) -> Self {
        Self {
            id: None,
            patient_id,
            doctor_id,
            tooth_no: None,
            procedure: procedure.into(),
            cost,
            notes: None,
        }
    }

    pub fn on_tooth(mut self, tooth_no: i16) -> Self {
        self.tooth_no = Some(tooth_no);
        self
    }
}

/// Soft edit before the lock. An empty `notes` clears them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTreatmentRequest {
    pub cost: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockRequest {
    pub cutoff: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockSummary {
    pub cutoff: DateTime<Utc>,
    pub locked: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomeQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl IncomeQuery {
    pub fn to_range(&self) -> Result<TimeRange, TreatmentError> {
        if self.to <= self.from {
            return Err(TreatmentError::validation("to", "must be after from"));
        }
        Ok(TimeRange::new(self.from, self.to))
    }
}

/// Export rows for a period and their total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeReport {
    pub range: TimeRange,
    pub rows: Vec<Treatment>,
    pub total: Decimal,
    pub count: usize,
}

impl IncomeReport {
    pub fn from_rows(range: TimeRange, rows: Vec<Treatment>) -> Result<Self, TreatmentError> {
        let total = rows
            .iter()
            .try_fold(Decimal::ZERO, |sum, t| sum.checked_add(t.cost))
            .ok_or_else(|| TreatmentError::validation("to", "income total is out of range; narrow the period"))?;
        Ok(Self {
            range,
            count: rows.len(),
            rows,
            total,
        })
    }
}
