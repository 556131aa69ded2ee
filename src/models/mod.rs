// Models module - Database entity representations

pub mod gate_pass;
pub mod mentor_assignment;
pub mod scan_event;
pub mod user;

pub use gate_pass::{GatePass, PassStatus};
pub use mentor_assignment::MentorAssignment;
pub use scan_event::ScanEvent;
pub use user::{User, UserRole};
