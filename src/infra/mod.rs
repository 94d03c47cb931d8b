pub mod mailer;
pub mod push;
pub mod templates;
pub mod uploads;
