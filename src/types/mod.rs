//! Wire types for the outbound APIs and SMS conversation state.

pub mod claude;
pub mod sms;
pub mod weather;
