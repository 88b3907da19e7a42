//! Production implementations of traits

mod connectivity;
mod credential_store;
mod dev_credential_store;
mod telegram_notifier;

pub use connectivity::{ProbeConnectivity, DEFAULT_PROBE_HOST};
pub use credential_store::KeychainCredentialStore;
pub use dev_credential_store::{DevFileCredentialStore, DEV_CREDENTIALS_FILE};
pub use telegram_notifier::TelegramNotifier;
