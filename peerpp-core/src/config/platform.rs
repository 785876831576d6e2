//! Fixed identifiers of the Intra deployment the coordinator acts on.

/// Ids the coordinator needs to talk about itself and its campus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Intra user id of the service account that owns placeholders.
    pub bot_user_id: i64,
    /// Watched campus; staff of this campus may act for others.
    pub campus_id: i64,
    /// Cursus whose level is compared between correctors and leaders.
    pub cursus_id: i64,
    /// Intra group whose members may take over placeholders.
    pub evaluator_group_id: i64,
}
