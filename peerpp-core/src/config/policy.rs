//! Booking policy, reloadable at runtime.

/// A project whose evaluations are watched for Peer++ bookings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedProject {
    pub id: i64,
    pub slug: String,
}

/// Operator-tunable booking policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    pub projects: Vec<WatchedProject>,
    /// Percentage (0..=100) of required evaluations that actually get booked.
    pub random_booking_chance: u8,
    /// Days a placeholder may stay before the sweep releases it.
    pub lock_expiration_days: u32,
}

impl PolicyConfig {
    pub fn project(&self, project_id: i64) -> Option<&WatchedProject> {
        self.projects.iter().find(|p| p.id == project_id)
    }

    /// Case-insensitive lookup by slug.
    pub fn project_by_slug(&self, slug: &str) -> Option<&WatchedProject> {
        self.projects
            .iter()
            .find(|p| p.slug.eq_ignore_ascii_case(slug))
    }

    /// Slug of a project id, or `unknown-<id>` for unwatched projects.
    pub fn slug_of(&self, project_id: i64) -> String {
        self.project(project_id)
            .map(|p| p.slug.clone())
            .unwrap_or_else(|| format!("unknown-{project_id}"))
    }

    pub fn retention(&self) -> time::Duration {
        time::Duration::days(i64::from(self.lock_expiration_days))
    }
}
