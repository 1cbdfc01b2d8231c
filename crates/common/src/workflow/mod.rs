//! Deposit workflow orchestration
//!
//! Combines the pure step, file and import logic with a [`DepositBackend`].
//! Every mutation round-trips through the backend; local state is replaced
//! wholesale with what the backend returns and left untouched on failure.
//!
//! [`DepositBackend`]: crate::client::DepositBackend

mod editor;
mod files;

pub use editor::{DepositEditor, SaveOutcome};
pub use files::{FileManager, UploadReport};
