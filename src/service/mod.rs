pub mod cron;
pub mod dates;
pub mod levenshtein;
pub mod lifecycle;
pub mod matcher;
pub mod nicknames;
pub mod notify;
pub mod quiet_hours;
pub mod recommendations;
pub mod sms;
pub mod stats;
