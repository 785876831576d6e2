//! Scale-team webhook payloads sent by Intra.

use serde::{Deserialize, Serialize};

/// Which scale-team hook endpoint a delivery arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    Create,
    Delete,
    Update,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookKind::Create => write!(f, "create"),
            HookKind::Delete => write!(f, "delete"),
            HookKind::Update => write!(f, "update"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookTeam {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookScale {
    pub id: i64,
    pub correction_number: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookProject {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// The evaluator of the scale team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookUser {
    pub id: i64,
    pub login: String,
}

/// Intra sends `{}` for evaluations nobody marked as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truant {
    #[serde(default)]
    pub id: Option<i64>,
}

/// Body of the `create`, `delete` and `update` scale-team hooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleTeamHook {
    pub id: i64,
    pub team: HookTeam,
    pub scale: HookScale,
    pub project: HookProject,
    #[serde(default)]
    pub user: Option<HookUser>,
    #[serde(default)]
    pub truant: Option<Truant>,
    #[serde(default)]
    pub final_mark: Option<i64>,
}

impl ScaleTeamHook {
    pub fn is_truant(&self) -> bool {
        self.truant.as_ref().and_then(|t| t.id).is_some()
    }

    pub fn evaluator_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_hook_without_evaluator() {
        let json = r#"{
            "id": 100,
            "team": { "id": 9, "name": "jdoe's group", "project_id": 1314, "status": "waiting_for_correction" },
            "truant": {},
            "scale": { "id": 7, "correction_number": 3, "name": "libft" },
            "begin_at": "2024-03-15T10:00:00.000Z",
            "final_mark": null,
            "project": { "id": 1314, "name": "Libft", "slug": "libft" },
            "user": null
        }"#;
        let hook: ScaleTeamHook = serde_json::from_str(json).unwrap();
        assert!(hook.user.is_none());
        assert!(!hook.is_truant());
        assert_eq!(hook.scale.correction_number, 3);
    }

    #[test]
    fn update_hook_with_truant() {
        let json = r#"{
            "id": 100,
            "team": { "id": 9, "name": "t", "project_id": 1 },
            "truant": { "id": 77, "login": "bot" },
            "scale": { "id": 7, "correction_number": 2 },
            "final_mark": 0,
            "project": { "id": 1, "name": "P", "slug": "p" },
            "user": { "id": 77, "login": "bot", "email": "bot@x" }
        }"#;
        let hook: ScaleTeamHook = serde_json::from_str(json).unwrap();
        assert!(hook.is_truant());
        assert_eq!(hook.evaluator_id(), Some(77));
        assert_eq!(hook.final_mark, Some(0));
    }
}
