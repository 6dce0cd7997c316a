use crate::{access_store::AccessStore, domain::UserId, Result};

// ============== Roles ==============

/// Authority of a sender. Ordered: `Agent < Admin < Owner`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Agent,
    Admin,
    Owner,
}

impl Role {
    pub fn permits(self, required: Role) -> bool {
        self >= required
    }
}

/// Owner is the configured id and is never looked up in the admin set.
pub async fn role_of(owner: UserId, store: &AccessStore, user_id: UserId) -> Result<Role> {
    if user_id == owner {
        return Ok(Role::Owner);
    }
    if store.is_admin(user_id).await? {
        return Ok(Role::Admin);
    }
    Ok(Role::Agent)
}

// ============== Commands ==============

/// Slash commands understood by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Panel,
    AddUser,
    RemoveUser,
    ListUsers,
    Broadcast,
    AddAdmin,
    RemoveAdmin,
    ListAdmins,
}

impl BotCommand {
    pub const ALL: [BotCommand; 10] = [
        BotCommand::Start,
        BotCommand::Help,
        BotCommand::Panel,
        BotCommand::AddUser,
        BotCommand::RemoveUser,
        BotCommand::ListUsers,
        BotCommand::Broadcast,
        BotCommand::AddAdmin,
        BotCommand::RemoveAdmin,
        BotCommand::ListAdmins,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.keyword() == name)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            BotCommand::Start => "start",
            BotCommand::Help => "help",
            BotCommand::Panel => "panel",
            BotCommand::AddUser => "adduser",
            BotCommand::RemoveUser => "removeuser",
            BotCommand::ListUsers => "listusers",
            BotCommand::Broadcast => "broadcast",
            BotCommand::AddAdmin => "addadmin",
            BotCommand::RemoveAdmin => "removeadmin",
            BotCommand::ListAdmins => "listadmins",
        }
    }

    pub fn min_role(self) -> Role {
        match self {
            BotCommand::Start | BotCommand::Help => Role::Agent,
            BotCommand::Panel
            | BotCommand::AddUser
            | BotCommand::RemoveUser
            | BotCommand::ListUsers
            | BotCommand::Broadcast => Role::Admin,
            BotCommand::AddAdmin | BotCommand::RemoveAdmin | BotCommand::ListAdmins => Role::Owner,
        }
    }

    /// Argument placeholder and one-line description for `/help`.
    pub fn usage(self) -> (&'static str, &'static str) {
        match self {
            BotCommand::Start => ("", "greeting"),
            BotCommand::Help => ("", "commands available to you"),
            BotCommand::Panel => ("", "open the admin panel"),
            BotCommand::AddUser => ("<user_id>", "allow a user to receive broadcasts"),
            BotCommand::RemoveUser => ("<user_id>", "revoke a user"),
            BotCommand::ListUsers => ("", "list allowed users"),
            BotCommand::Broadcast => ("<text>", "send text to every allowed user"),
            BotCommand::AddAdmin => ("<user_id>", "grant the admin role"),
            BotCommand::RemoveAdmin => ("<user_id>", "revoke the admin role"),
            BotCommand::ListAdmins => ("", "list admins"),
        }
    }
}

// ============== Panel buttons ==============

/// Inline button actions on the admin panel (callback data tags).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelAction {
    AddUser,
    RemoveUser,
    ListUsers,
    Broadcast,
    Status,
    ListAdmins,
}

impl PanelAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "add_user" => Some(PanelAction::AddUser),
            "remove_user" => Some(PanelAction::RemoveUser),
            "list_users" => Some(PanelAction::ListUsers),
            "broadcast" => Some(PanelAction::Broadcast),
            "status" => Some(PanelAction::Status),
            "list_admins" => Some(PanelAction::ListAdmins),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            PanelAction::AddUser => "add_user",
            PanelAction::RemoveUser => "remove_user",
            PanelAction::ListUsers => "list_users",
            PanelAction::Broadcast => "broadcast",
            PanelAction::Status => "status",
            PanelAction::ListAdmins => "list_admins",
        }
    }

    pub fn min_role(self) -> Role {
        match self {
            PanelAction::ListAdmins => Role::Owner,
            _ => Role::Admin,
        }
    }
}
