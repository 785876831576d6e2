//! Per-endpoint webhook secrets.

use peerpp_sdk::objects::HookKind;

/// Secrets Intra sends in `X-Secret`, one per hook endpoint.
#[derive(Clone)]
pub struct WebhookSecrets {
    pub create: String,
    pub delete: String,
    pub update: String,
}

impl WebhookSecrets {
    pub fn for_kind(&self, kind: HookKind) -> &str {
        match kind {
            HookKind::Create => &self.create,
            HookKind::Delete => &self.delete,
            HookKind::Update => &self.update,
        }
    }
}

impl std::fmt::Debug for WebhookSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebhookSecrets(<redacted>)")
    }
}
