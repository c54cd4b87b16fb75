//! OAuth credentials and the background scheduler that keeps them fresh.
//!
//! Two independent slots exist: the application credential (client-credentials
//! grant) and the user credential (refresh-token grant with rotation). The
//! [`RefreshScheduler`] is the only writer of the [`CredentialStore`]; everyone
//! else reads `Arc` snapshots.

pub mod error;
pub mod identity;
pub mod scheduler;
pub mod settings_store;
pub mod store;
pub mod types;

pub use error::{RefreshError, StoreError};
pub use identity::{ClientIdentity, HttpIdentityClient, IdentityService, TokenGrant};
pub use scheduler::{IterationReport, RefreshPolicy, RefreshScheduler, SlotOutcome};
pub use settings_store::{JsonSettingsStore, SettingsMap, SettingsStore};
pub use store::CredentialStore;
pub use types::{Credential, CredentialSlot};
