use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub student_id: String,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    /// Advisory link to the booking this payment was made for. Not used
    /// in balance math.
    pub booking_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPaymentRequest {
    pub student_id: String,
    pub amount: Decimal,
    pub date: Option<DateTime<Utc>>,
    pub booking_id: Option<String>,
    pub notes: Option<String>,
}
