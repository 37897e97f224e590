pub mod challenge;
pub mod game;
pub mod hub;
pub mod lobby;
pub mod types;
