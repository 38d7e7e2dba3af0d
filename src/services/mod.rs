pub mod ledger;
pub mod reminder;
pub mod scheduler;

pub use reminder::{ReminderService, ReminderStats};
pub use scheduler::ReminderScheduler;
