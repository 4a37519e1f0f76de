use llmfanout_core::config::ConfigSnapshot;
use std::path::PathBuf;
use std::sync::Arc;

mod arbitration;
pub(crate) mod errors;
mod stream_emulator;
mod upstream;
#[path = "core/runtime_config.rs"]
mod runtime_config;
#[path = "routing/rotation.rs"]
mod rotation;
#[path = "request/request_entry.rs"]
mod request_entry;

pub(crate) use errors::GatewayError;
pub(crate) use request_entry::{handle_chat_request, ChatReply};
pub(crate) use runtime_config::ConfigStore;
use rotation::CredentialRotator;

/// Process-wide gateway state shared by every HTTP handler.
pub(crate) struct GatewayState {
    config: Arc<ConfigStore>,
    rotator: CredentialRotator,
    client: reqwest::Client,
}

impl GatewayState {
    pub(crate) fn load(config_path: PathBuf) -> Result<Self, String> {
        let config = ConfigStore::load_or_init(config_path)?;
        Self::with_store(config)
    }

    pub(crate) fn with_store(config: ConfigStore) -> Result<Self, String> {
        let client = runtime_config::build_upstream_client(&config.snapshot())?;
        Ok(Self {
            config: Arc::new(config),
            rotator: CredentialRotator::new(),
            client,
        })
    }

    pub(crate) fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.config.snapshot()
    }

    pub(crate) fn reload_config(&self) -> Result<Arc<ConfigSnapshot>, String> {
        self.config.reload()
    }

    pub(crate) fn config_path(&self) -> Option<String> {
        self.config.path().map(|path| path.display().to_string())
    }

    /// Group the next chat request will be routed to; does not advance.
    pub(crate) fn next_group_index(&self) -> Option<usize> {
        self.rotator.peek_index(self.snapshot().group_count())
    }
}
