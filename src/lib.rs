pub mod command;
pub mod controller;
pub mod drive;
pub mod hardware;
pub mod persistence;
pub mod robot;
pub mod telemetry;
