pub mod config;
pub mod diagnosis;
pub mod maneuver;
pub mod messages;
pub mod pipeline;
pub mod posture;
pub mod treatment;
pub mod types;
