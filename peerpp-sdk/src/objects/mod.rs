pub mod intra;
pub mod slack;
pub mod webhook;

pub use intra::{
    AccessToken, GroupUser, IntraUser, MultipleCreate, NewGroupUser, NewScaleTeam, ProjectDetails,
    ProjectUser, ScaleTeam, TeamUser, UserRef, Visible,
};
pub use slack::{CommandResponse, PostMessage, SlashCommand, SlackUser};
pub use webhook::{HookKind, ScaleTeamHook};
