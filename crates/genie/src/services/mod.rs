//! Collaborators of the coordination core.
//!
//! Each collaborator is a narrow trait so that the core can be wired either
//! to the in-process implementations found here or to fakes in tests.

pub mod forward;
pub mod mail;
pub mod memory;
pub mod persistence;
pub mod process;
pub mod transfer;

pub use forward::{KillForwarder, NoKillForwarder};
pub use mail::{LoggingMailService, MailService};
pub use memory::{Catalog, MemoryStore};
pub use persistence::{JobPersistence, ResourceCatalog, StatusUpdate};
pub use process::{
    LocalProcessExecutor, ProcessExecutor, ProcessExit, ProcessSignal, ProcessSpec, StartedProcess,
    StdioDef,
};
pub use transfer::{FileTransfer, FileTransferRouter, LocalFileTransfer};
