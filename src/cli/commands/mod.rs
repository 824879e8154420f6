pub mod frameworks;
pub mod inspect;

pub use frameworks::{FrameworksCommands, handle_frameworks_command};
pub use inspect::{InspectCommands, handle_inspect_command};
