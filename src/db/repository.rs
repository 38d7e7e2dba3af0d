use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::models::{
    Booking, Enrollment, NewBookingRequest, NewPaymentRequest, NewStudentRequest, Payment,
    Student, UpdateBookingRequest, UpdateStudentRequest,
};

/// sqlite has no decimal column type, so currency amounts live in TEXT
/// columns and are parsed here. A malformed stored amount reads as zero.
fn parse_money(raw: &str) -> Decimal {
    raw.trim().parse().unwrap_or_default()
}

#[derive(FromRow)]
struct StudentRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    private_rate: String,
    group_rate: String,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            private_rate: parse_money(&row.private_rate),
            group_rate: parse_money(&row.group_rate),
        }
    }
}

#[derive(FromRow)]
struct BookingRow {
    id: String,
    title: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    notes: Option<String>,
}

#[derive(FromRow)]
struct EnrollmentRow {
    booking_id: String,
    attended: bool,
    #[sqlx(flatten)]
    student: StudentRow,
}

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    student_id: String,
    amount: String,
    date: DateTime<Utc>,
    booking_id: Option<String>,
    notes: Option<String>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            student_id: row.student_id,
            amount: parse_money(&row.amount),
            date: row.date,
            booking_id: row.booking_id,
            notes: row.notes,
        }
    }
}

pub async fn fetch_students(db: &SqlitePool) -> Result<Vec<Student>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StudentRow>(
        "SELECT id, first_name, last_name, email, phone, private_rate, group_rate
         FROM students ORDER BY last_name, first_name",
    )
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(Student::from).collect())
}

pub async fn fetch_student(db: &SqlitePool, id: &str) -> Result<Option<Student>, sqlx::Error> {
    let row = sqlx::query_as::<_, StudentRow>(
        "SELECT id, first_name, last_name, email, phone, private_rate, group_rate
         FROM students WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row.map(Student::from))
}

pub async fn insert_student(
    db: &SqlitePool,
    req: NewStudentRequest,
) -> Result<Student, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let private_rate = req.private_rate.unwrap_or_default();
    let group_rate = req.group_rate.unwrap_or_default();

    sqlx::query(
        "INSERT INTO students (id, first_name, last_name, email, phone, private_rate, group_rate)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&id)
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(private_rate.to_string())
    .bind(group_rate.to_string())
    .execute(db)
    .await?;

    Ok(Student {
        id,
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        phone: req.phone,
        private_rate,
        group_rate,
    })
}

pub async fn update_student(
    db: &SqlitePool,
    id: &str,
    req: UpdateStudentRequest,
) -> Result<Option<Student>, sqlx::Error> {
    let private_rate = req.private_rate.unwrap_or_default();
    let group_rate = req.group_rate.unwrap_or_default();

    let result = sqlx::query(
        "UPDATE students
         SET first_name = ?1, last_name = ?2, email = ?3, phone = ?4,
             private_rate = ?5, group_rate = ?6
         WHERE id = ?7",
    )
    .bind(&req.first_name)
    .bind(&req.last_name)
    .bind(&req.email)
    .bind(&req.phone)
    .bind(private_rate.to_string())
    .bind(group_rate.to_string())
    .bind(id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_student(db, id).await
}

pub async fn delete_student(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM students WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Loads enrollments (with their students) for the given bookings and
/// attaches them. One query for the whole batch.
async fn attach_enrollments(
    db: &SqlitePool,
    rows: Vec<BookingRow>,
) -> Result<Vec<Booking>, sqlx::Error> {
    let enrollment_rows = sqlx::query_as::<_, EnrollmentRow>(
        "SELECT bs.booking_id, bs.attended,
                s.id, s.first_name, s.last_name, s.email, s.phone,
                s.private_rate, s.group_rate
         FROM booking_students bs
         JOIN students s ON s.id = bs.student_id",
    )
    .fetch_all(db)
    .await?;

    let mut by_booking: HashMap<String, Vec<Enrollment>> = HashMap::new();
    for row in enrollment_rows {
        let student = Student::from(row.student);
        by_booking.entry(row.booking_id).or_default().push(Enrollment {
            student_id: student.id.clone(),
            attended: row.attended,
            student,
        });
    }

    Ok(rows
        .into_iter()
        .map(|row| Booking {
            students: by_booking.remove(&row.id).unwrap_or_default(),
            id: row.id,
            title: row.title,
            start_time: row.start_time,
            end_time: row.end_time,
            notes: row.notes,
        })
        .collect())
}

pub async fn fetch_bookings(db: &SqlitePool) -> Result<Vec<Booking>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BookingRow>(
        "SELECT id, title, start_time, end_time, notes FROM bookings ORDER BY start_time ASC",
    )
    .fetch_all(db)
    .await?;

    attach_enrollments(db, rows).await
}

pub async fn fetch_booking(db: &SqlitePool, id: &str) -> Result<Option<Booking>, sqlx::Error> {
    let row = sqlx::query_as::<_, BookingRow>(
        "SELECT id, title, start_time, end_time, notes FROM bookings WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    match row {
        Some(row) => Ok(attach_enrollments(db, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Bookings with `start_time` in the half-open window `[from, to)`.
pub async fn fetch_bookings_starting_between(
    db: &SqlitePool,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Booking>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BookingRow>(
        "SELECT id, title, start_time, end_time, notes FROM bookings
         WHERE start_time >= ?1 AND start_time < ?2
         ORDER BY start_time ASC",
    )
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await?;

    attach_enrollments(db, rows).await
}

pub async fn insert_booking(
    db: &SqlitePool,
    req: NewBookingRequest,
) -> Result<Booking, sqlx::Error> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO bookings (id, title, start_time, end_time, notes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&id)
    .bind(&req.title)
    .bind(req.start_time)
    .bind(req.end_time)
    .bind(&req.notes)
    .execute(db)
    .await?;

    for student_id in &req.student_ids {
        sqlx::query(
            "INSERT INTO booking_students (id, booking_id, student_id, attended)
             VALUES (?1, ?2, ?3, 0)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(student_id)
        .execute(db)
        .await?;
    }

    Ok(fetch_booking(db, &id).await?.unwrap_or(Booking {
        id,
        title: req.title,
        start_time: req.start_time,
        end_time: req.end_time,
        notes: req.notes,
        students: Vec::new(),
    }))
}

pub async fn update_booking(
    db: &SqlitePool,
    id: &str,
    req: UpdateBookingRequest,
) -> Result<Option<Booking>, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE bookings SET title = ?1, start_time = ?2, end_time = ?3, notes = ?4
         WHERE id = ?5",
    )
    .bind(&req.title)
    .bind(req.start_time)
    .bind(req.end_time)
    .bind(&req.notes)
    .bind(id)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    // Replacing the student list resets attendance, matching the admin UI
    // flow where a re-rostered class starts from a clean sheet.
    if let Some(student_ids) = &req.student_ids {
        sqlx::query("DELETE FROM booking_students WHERE booking_id = ?")
            .bind(id)
            .execute(db)
            .await?;

        for student_id in student_ids {
            sqlx::query(
                "INSERT INTO booking_students (id, booking_id, student_id, attended)
                 VALUES (?1, ?2, ?3, 0)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id)
            .bind(student_id)
            .execute(db)
            .await?;
        }
    }

    fetch_booking(db, id).await
}

pub async fn delete_booking(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM bookings WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Idempotent set of the attended flag on one enrollment. Returns false
/// when the enrollment does not exist.
pub async fn set_attendance(
    db: &SqlitePool,
    booking_id: &str,
    student_id: &str,
    attended: bool,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE booking_students SET attended = ?1 WHERE booking_id = ?2 AND student_id = ?3",
    )
    .bind(attended)
    .bind(booking_id)
    .bind(student_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_payments(db: &SqlitePool) -> Result<Vec<Payment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        "SELECT id, student_id, amount, date, booking_id, notes
         FROM payments ORDER BY date DESC",
    )
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(Payment::from).collect())
}

pub async fn fetch_payments_for_student(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Vec<Payment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        "SELECT id, student_id, amount, date, booking_id, notes
         FROM payments WHERE student_id = ? ORDER BY date DESC",
    )
    .bind(student_id)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(Payment::from).collect())
}

pub async fn insert_payment(
    db: &SqlitePool,
    req: NewPaymentRequest,
) -> Result<Payment, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let date = req.date.unwrap_or_else(Utc::now);

    sqlx::query(
        "INSERT INTO payments (id, student_id, amount, date, booking_id, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&id)
    .bind(&req.student_id)
    .bind(req.amount.to_string())
    .bind(date)
    .bind(&req.booking_id)
    .bind(&req.notes)
    .execute(db)
    .await?;

    Ok(Payment {
        id,
        student_id: req.student_id,
        amount: req.amount,
        date,
        booking_id: req.booking_id,
        notes: req.notes,
    })
}

pub async fn delete_payment(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM payments WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
