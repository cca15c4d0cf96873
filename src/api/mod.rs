//! Clients for the third-party services: Anthropic, Twilio and WeatherAPI.

pub mod claude;
pub mod twilio;
pub mod weather;
