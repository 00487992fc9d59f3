pub mod probe;
pub mod shells;

pub use probe::ProbeGeometry;
pub use shells::{ShellOrder, ShellOrdering};
