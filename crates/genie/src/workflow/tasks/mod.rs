mod attachments;
mod directory;
mod launch;
mod script;
mod setup;

pub use attachments::AttachmentTask;
pub use directory::JobDirectoryTask;
pub use launch::LaunchTask;
pub use script::ScriptTask;
pub use setup::SetupTask;
