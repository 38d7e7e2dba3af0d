use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Student;

/// One scheduled class occasion. Holds its enrollments with the enrolled
/// students embedded, so callers never need follow-up lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub students: Vec<Enrollment>,
}

impl Booking {
    /// A booking with more than one enrolled student bills at the group
    /// rate for every student in it.
    pub fn is_group_lesson(&self) -> bool {
        self.students.len() > 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: String,
    pub attended: bool,
    pub student: Student,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBookingRequest {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub student_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBookingRequest {
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
    pub student_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRequest {
    pub student_id: String,
    pub attended: bool,
}
