//! Commands run by the robot loop against a subsystem.

pub mod bindings;
pub mod drive_command;

pub use bindings::BindingsConfig;
pub use drive_command::DriveCommand;

/// A unit of robot behaviour bound to one subsystem.
///
/// The loop calls `initialize` once, then `execute` every tick until
/// `is_finished` returns true or the loop shuts down, and finally `end`.
pub trait Command {
    type Subsystem;

    fn initialize(&mut self, _subsystem: &mut Self::Subsystem) {}

    fn execute(&mut self, subsystem: &mut Self::Subsystem);

    fn end(&mut self, _subsystem: &mut Self::Subsystem, _interrupted: bool) {}

    fn is_finished(&self) -> bool {
        false
    }
}
