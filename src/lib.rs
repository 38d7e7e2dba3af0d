pub mod db;
pub mod error;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod services;
pub mod settings;
pub mod state;
