use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::SqlitePool;

use crate::db::repository;
use crate::error::AppError;
use crate::models::Booking;

/// One lesson unit is 45 minutes of class time, the billing quantum.
const LESSON_UNIT_SECONDS: i64 = 45 * 60;

/// Billable lesson units for one booking. Fractional units are normal
/// (a 90-minute class is 2 units, a 30-minute class two thirds of one).
/// A non-positive duration bills zero rather than a negative charge.
fn lesson_units(booking: &Booking) -> Decimal {
    let seconds = (booking.end_time - booking.start_time).num_seconds();
    if seconds <= 0 {
        return Decimal::ZERO;
    }
    Decimal::from(seconds) / Decimal::from(LESSON_UNIT_SECONDS)
}

/// Total attended lesson units for a student across all bookings.
/// An unknown student simply has no enrollments and yields zero.
pub async fn total_lessons(db: &SqlitePool, student_id: &str) -> Result<Decimal, AppError> {
    let bookings = repository::fetch_bookings(db).await?;

    let mut total = Decimal::ZERO;
    for booking in &bookings {
        let attended = booking
            .students
            .iter()
            .any(|e| e.student_id == student_id && e.attended);
        if attended {
            total += lesson_units(booking);
        }
    }
    Ok(total)
}

/// Net balance for a student: attended lessons priced at the applicable
/// rate, minus all recorded payments. Positive means the student owes
/// money, negative means credit. Always recomputed from the current data,
/// never cached, and accumulated in decimal arithmetic throughout.
pub async fn balance(db: &SqlitePool, student_id: &str) -> Result<Decimal, AppError> {
    let Some(student) = repository::fetch_student(db, student_id).await? else {
        // Unknown student owes nothing.
        return Ok(Decimal::ZERO);
    };

    let bookings = repository::fetch_bookings(db).await?;

    let mut owed = Decimal::ZERO;
    for booking in &bookings {
        let attended = booking
            .students
            .iter()
            .any(|e| e.student_id == student_id && e.attended);
        if !attended {
            continue;
        }

        // Group classification is a property of the booking, so a shared
        // class bills the group rate to every student in it.
        let rate = if booking.is_group_lesson() {
            student.group_rate
        } else {
            student.private_rate
        };
        owed += lesson_units(booking) * rate;
    }

    let payments = repository::fetch_payments_for_student(db, student_id).await?;
    let paid: Decimal = payments.iter().map(|p| p.amount).sum();

    Ok(owed - paid)
}

/// Renders a balance the way the admin UI has always shown it: rounded to
/// whole kr, debts with a leading minus, credits with a leading plus.
/// The sign flip relative to the internal convention is deliberate.
pub fn format_balance(balance: Decimal) -> String {
    let rounded = balance.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        "0 kr".to_string()
    } else if rounded > Decimal::ZERO {
        format!("-{} kr", rounded)
    } else {
        format!("+{} kr", rounded.abs())
    }
}
