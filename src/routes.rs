use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::error;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{
    AttendanceRequest, Booking, NewBookingRequest, NewPaymentRequest, NewStudentRequest, Payment,
    Student, UpdateBookingRequest, UpdateStudentRequest,
};
use crate::services::ledger;
use crate::settings::EmailSettings;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/students", get(list_students).post(create_student))
        .route(
            "/api/students/{id}",
            get(get_student).put(update_student).delete(delete_student),
        )
        .route("/api/students/{id}/balance", get(student_balance))
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route(
            "/api/bookings/{id}",
            get(get_booking).put(update_booking).delete(delete_booking),
        )
        .route("/api/bookings/{id}/attendance", put(set_attendance))
        .route("/api/payments", get(list_payments).post(create_payment))
        .route("/api/payments/{id}", axum::routing::delete(delete_payment))
        .route(
            "/api/settings/email",
            get(get_email_settings).put(update_email_settings),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("select 1").execute(&state.db).await {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            error!("health check failed: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn list_students(State(state): State<AppState>) -> Result<Json<Vec<Student>>, AppError> {
    Ok(Json(repository::fetch_students(&state.db).await?))
}

async fn create_student(
    State(state): State<AppState>,
    Json(req): Json<NewStudentRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    if req.first_name.is_empty() || req.last_name.is_empty() || req.email.is_empty() {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    }
    validate_rates(&req.private_rate, &req.group_rate)?;
    let created = repository::insert_student(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Student>, AppError> {
    repository::fetch_student(&state.db, &id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStudentRequest>,
) -> Result<Json<Student>, AppError> {
    validate_rates(&req.private_rate, &req.group_rate)?;
    repository::update_student(&state.db, &id, req)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if repository::delete_student(&state.db, &id).await? {
        Ok(Json(json!({ "ok": true })))
    } else {
        Err(AppError::NotFound)
    }
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    total_lessons: Decimal,
    balance: Decimal,
    display: String,
}

async fn student_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BalanceResponse>, AppError> {
    let total_lessons = ledger::total_lessons(&state.db, &id).await?;
    let balance = ledger::balance(&state.db, &id).await?;
    Ok(Json(BalanceResponse {
        total_lessons,
        display: ledger::format_balance(balance),
        balance,
    }))
}

async fn list_bookings(State(state): State<AppState>) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(repository::fetch_bookings(&state.db).await?))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<NewBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    if req.title.is_empty() || req.student_ids.is_empty() {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    }
    let created = repository::insert_booking(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    repository::fetch_booking(&state.db, &id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    repository::update_booking(&state.db, &id, req)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if repository::delete_booking(&state.db, &id).await? {
        Ok(Json(json!({ "ok": true })))
    } else {
        Err(AppError::NotFound)
    }
}

async fn set_attendance(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AttendanceRequest>,
) -> Result<Json<Booking>, AppError> {
    if !repository::set_attendance(&state.db, &id, &req.student_id, req.attended).await? {
        return Err(AppError::NotFound);
    }
    repository::fetch_booking(&state.db, &id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn list_payments(State(state): State<AppState>) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(repository::fetch_payments(&state.db).await?))
}

async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<NewPaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    if req.amount < Decimal::ZERO {
        return Err(AppError::BadRequest(
            "Payment amount must not be negative".to_string(),
        ));
    }
    let created = repository::insert_payment(&state.db, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if repository::delete_payment(&state.db, &id).await? {
        Ok(Json(json!({ "ok": true })))
    } else {
        Err(AppError::NotFound)
    }
}

async fn get_email_settings(State(state): State<AppState>) -> Json<EmailSettings> {
    Json(EmailSettings {
        minutes_before: state.settings.reminder_lead_minutes().await,
    })
}

async fn update_email_settings(
    State(state): State<AppState>,
    Json(req): Json<EmailSettings>,
) -> Result<Json<Value>, AppError> {
    state
        .settings
        .set_reminder_lead_minutes(req.minutes_before)
        .await?;
    Ok(Json(json!({ "success": true, "settings": req })))
}

fn validate_rates(
    private_rate: &Option<Decimal>,
    group_rate: &Option<Decimal>,
) -> Result<(), AppError> {
    for rate in [private_rate, group_rate].into_iter().flatten() {
        if *rate < Decimal::ZERO {
            return Err(AppError::BadRequest(
                "Rates must not be negative".to_string(),
            ));
        }
    }
    Ok(())
}
