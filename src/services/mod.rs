pub mod reminders;
pub mod requests;
pub mod suggestions;

pub use reminders::schedule_refill_reminders;
