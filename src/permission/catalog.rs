//! Builtin permission catalog and route metadata.
//!
//! Every permission the evaluator knows is declared here as a typed
//! `PermissionId`. String forms exist only at the edges: `front_id`
//! ("article_create") in storage and seed data, `module.action`
//! ("article.create") in logs and the management UI. Parsing happens once
//! at those edges; everything past them carries the enum.

use phf::phf_map;
use regex::Regex;

/// Permission modules. This set is closed; actions always belong to
/// exactly one module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    User,
    Article,
    Permission,
    Role,
}

impl Module {
    pub const ALL: [Module; 4] = [
        Module::User,
        Module::Article,
        Module::Permission,
        Module::Role,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Module::User => "user",
            Module::Article => "article",
            Module::Permission => "permission",
            Module::Role => "role",
        }
    }

    pub fn parse(name: &str) -> Option<Module> {
        match name {
            "user" => Some(Module::User),
            "article" => Some(Module::Article),
            "permission" => Some(Module::Permission),
            "role" => Some(Module::Role),
            _ => None,
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserAction {
    UpdateIntroMine,
    Manage,
    ListAccess,
    Ban,
    SetModerator,
    SetAdmin,
    UpdateRole,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArticleAction {
    Create,
    Reply,
    EditMine,
    EditOthers,
    DeleteMine,
    DeleteOthers,
    VoteUp,
    VoteDown,
    React,
    Save,
    Subscribe,
    Lock,
    Pin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionAction {
    Access,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoleAction {
    Access,
    Add,
    Edit,
}

/// A fully-qualified permission id. Invalid module/action pairings are
/// unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionId {
    User(UserAction),
    Article(ArticleAction),
    Permission(PermissionAction),
    Role(RoleAction),
}

impl PermissionId {
    pub fn module(self) -> Module {
        match self {
            PermissionId::User(_) => Module::User,
            PermissionId::Article(_) => Module::Article,
            PermissionId::Permission(_) => Module::Permission,
            PermissionId::Role(_) => Module::Role,
        }
    }

    pub fn action_str(self) -> &'static str {
        match self {
            PermissionId::User(a) => match a {
                UserAction::UpdateIntroMine => "update_intro_mine",
                UserAction::Manage => "manage",
                UserAction::ListAccess => "list_access",
                UserAction::Ban => "ban",
                UserAction::SetModerator => "set_moderator",
                UserAction::SetAdmin => "set_admin",
                UserAction::UpdateRole => "update_role",
            },
            PermissionId::Article(a) => match a {
                ArticleAction::Create => "create",
                ArticleAction::Reply => "reply",
                ArticleAction::EditMine => "edit_mine",
                ArticleAction::EditOthers => "edit_others",
                ArticleAction::DeleteMine => "delete_mine",
                ArticleAction::DeleteOthers => "delete_others",
                ArticleAction::VoteUp => "vote_up",
                ArticleAction::VoteDown => "vote_down",
                ArticleAction::React => "react",
                ArticleAction::Save => "save",
                ArticleAction::Subscribe => "subscribe",
                ArticleAction::Lock => "lock",
                ArticleAction::Pin => "pin",
            },
            PermissionId::Permission(a) => match a {
                PermissionAction::Access => "access",
            },
            PermissionId::Role(a) => match a {
                RoleAction::Access => "access",
                RoleAction::Add => "add",
                RoleAction::Edit => "edit",
            },
        }
    }

    /// Parse a `module`/`action` string pair. Returns None for anything
    /// outside the catalog; callers must treat that as not permitted.
    pub fn parse(module: &str, action: &str) -> Option<PermissionId> {
        let module = Module::parse(module)?;
        CATALOG
            .iter()
            .map(|entry| entry.id)
            .find(|id| id.module() == module && id.action_str() == action)
    }

    /// Parse a storage-side front id such as "article_create".
    pub fn parse_front_id(front_id: &str) -> Option<PermissionId> {
        CATALOG
            .iter()
            .find(|entry| entry.front_id == front_id)
            .map(|entry| entry.id)
    }
}

impl std::fmt::Display for PermissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.module(), self.action_str())
    }
}

/// One catalog row. `front_id` is always `{module}_{action}`; it is spelled
/// out so seed data and the phf route table can reference it as a literal.
#[derive(Clone, Copy, Debug)]
pub struct CatalogEntry {
    pub id: PermissionId,
    pub front_id: &'static str,
    pub name: &'static str,
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::Create),
        front_id: "article_create",
        name: "Create articles",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::Reply),
        front_id: "article_reply",
        name: "Reply to articles",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::EditMine),
        front_id: "article_edit_mine",
        name: "Edit own articles",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::EditOthers),
        front_id: "article_edit_others",
        name: "Edit any article",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::DeleteMine),
        front_id: "article_delete_mine",
        name: "Delete own articles",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::DeleteOthers),
        front_id: "article_delete_others",
        name: "Delete any article",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::VoteUp),
        front_id: "article_vote_up",
        name: "Vote articles up",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::VoteDown),
        front_id: "article_vote_down",
        name: "Vote articles down",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::React),
        front_id: "article_react",
        name: "React to articles",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::Save),
        front_id: "article_save",
        name: "Save articles",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::Subscribe),
        front_id: "article_subscribe",
        name: "Subscribe to articles",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::Lock),
        front_id: "article_lock",
        name: "Lock articles",
    },
    CatalogEntry {
        id: PermissionId::Article(ArticleAction::Pin),
        front_id: "article_pin",
        name: "Pin articles",
    },
    CatalogEntry {
        id: PermissionId::User(UserAction::UpdateIntroMine),
        front_id: "user_update_intro_mine",
        name: "Edit own introduction",
    },
    CatalogEntry {
        id: PermissionId::User(UserAction::Manage),
        front_id: "user_manage",
        name: "Access the management area",
    },
    CatalogEntry {
        id: PermissionId::User(UserAction::ListAccess),
        front_id: "user_list_access",
        name: "View the user list",
    },
    CatalogEntry {
        id: PermissionId::User(UserAction::Ban),
        front_id: "user_ban",
        name: "Ban users",
    },
    CatalogEntry {
        id: PermissionId::User(UserAction::SetModerator),
        front_id: "user_set_moderator",
        name: "Grant the moderator role",
    },
    CatalogEntry {
        id: PermissionId::User(UserAction::SetAdmin),
        front_id: "user_set_admin",
        name: "Grant the admin role",
    },
    CatalogEntry {
        id: PermissionId::User(UserAction::UpdateRole),
        front_id: "user_update_role",
        name: "Change user roles",
    },
    CatalogEntry {
        id: PermissionId::Permission(PermissionAction::Access),
        front_id: "permission_access",
        name: "View permissions",
    },
    CatalogEntry {
        id: PermissionId::Role(RoleAction::Access),
        front_id: "role_access",
        name: "View roles",
    },
    CatalogEntry {
        id: PermissionId::Role(RoleAction::Add),
        front_id: "role_add",
        name: "Create roles",
    },
    CatalogEntry {
        id: PermissionId::Role(RoleAction::Edit),
        front_id: "role_edit",
        name: "Edit roles",
    },
];

pub fn catalog_entry(id: PermissionId) -> &'static CatalogEntry {
    // The catalog covers every PermissionId variant by construction; the
    // completeness test keeps that honest.
    CATALOG
        .iter()
        .find(|entry| entry.id == id)
        .expect("permission id missing from catalog")
}

/// A method/path pair in regex source form. Anchors are part of the
/// pattern text, same as the seed data they came from.
#[derive(Clone, Copy, Debug)]
pub struct RouteRule {
    pub methods: &'static str,
    pub pattern: &'static str,
}

/// Route metadata: which method/path shapes each permission id governs.
/// The auth gate derives its login wall from this table; guards are wired
/// per route with typed lists, and a route appearing under several ids
/// means all of them are required.
static ROUTE_RULES: phf::Map<&'static str, &'static [RouteRule]> = phf_map! {
    "article_create" => &[
        RouteRule { methods: r"^GET$", pattern: r"^/articles/new($|/)" },
        RouteRule { methods: r"^POST$", pattern: r"^/articles($|/$)" },
    ],
    "article_reply" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/reply($|/)" },
    ],
    "article_edit_mine" => &[
        RouteRule { methods: r"^(GET|POST)$", pattern: r"^/articles/\d+/edit($|/)" },
    ],
    "article_delete_mine" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/delete($|/)" },
    ],
    "article_vote_up" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/vote($|/)" },
    ],
    "article_vote_down" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/vote($|/)" },
    ],
    "article_react" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/react($|/)" },
    ],
    "article_save" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/save($|/)" },
    ],
    "article_subscribe" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/subscribe($|/)" },
    ],
    "article_lock" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/lock($|/)" },
    ],
    "article_pin" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/articles/\d+/pin($|/)" },
    ],
    "user_update_intro_mine" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/settings/account($|/)" },
    ],
    "user_manage" => &[
        RouteRule { methods: r"^(GET|POST)$", pattern: r"^/manage($|/)" },
        RouteRule { methods: r"^POST$", pattern: r"^/users/\d+/ban($|/)" },
        RouteRule { methods: r"^POST$", pattern: r"^/users/\d+/set_role($|/)" },
    ],
    "user_ban" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/users/\d+/ban($|/)" },
    ],
    "user_update_role" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/users/\d+/set_role($|/)" },
    ],
    "user_list_access" => &[
        RouteRule { methods: r"^GET$", pattern: r"^/manage/users($|/)" },
    ],
    "permission_access" => &[
        RouteRule { methods: r"^GET$", pattern: r"^/manage/permissions($|/)" },
    ],
    "role_access" => &[
        RouteRule { methods: r"^GET$", pattern: r"^/manage/roles($|/)" },
    ],
    "role_add" => &[
        RouteRule { methods: r"^POST$", pattern: r"^/manage/roles($|/$)" },
    ],
    "role_edit" => &[
        RouteRule { methods: r"^(GET|POST)$", pattern: r"^/manage/roles/\d+/edit($|/)" },
    ],
};

/// Routes that require a session but no particular permission.
const AUTH_ONLY_RULES: &[RouteRule] = &[
    RouteRule {
        methods: r"^POST$",
        pattern: r"^/logout($|/)",
    },
    RouteRule {
        methods: r"^GET$",
        pattern: r"^/settings/account($|/)",
    },
    RouteRule {
        methods: r"^(GET|POST)$",
        pattern: r"^/notifications($|/)",
    },
    RouteRule {
        methods: r"^GET$",
        pattern: r"^/saved($|/)",
    },
];

#[derive(Debug)]
struct CompiledRule {
    methods: Regex,
    pattern: Regex,
}

impl CompiledRule {
    fn compile(rule: &RouteRule) -> CompiledRule {
        // Static patterns; a failure here is a boot-time defect, not an input.
        CompiledRule {
            methods: Regex::new(rule.methods).expect("invalid method pattern in route table"),
            pattern: Regex::new(rule.pattern).expect("invalid path pattern in route table"),
        }
    }

    fn matches(&self, method: &str, path: &str) -> bool {
        self.methods.is_match(method) && self.pattern.is_match(path)
    }
}

/// The route table with all patterns compiled. Built once at startup and
/// shared through app data.
#[derive(Debug)]
pub struct RouteTable {
    permission_rules: Vec<(PermissionId, CompiledRule)>,
    auth_rules: Vec<CompiledRule>,
}

impl RouteTable {
    /// Compiles the static tables. Panics on malformed entries; the table
    /// is part of the binary, so there is nothing to recover to.
    pub fn compile() -> RouteTable {
        let mut permission_rules = Vec::new();

        for (front_id, rules) in ROUTE_RULES.entries() {
            let id = PermissionId::parse_front_id(front_id)
                .expect("route table references a front id missing from the catalog");

            for rule in rules.iter() {
                permission_rules.push((id, CompiledRule::compile(rule)));
            }
        }

        let auth_rules = AUTH_ONLY_RULES.iter().map(CompiledRule::compile).collect();

        RouteTable {
            permission_rules,
            auth_rules,
        }
    }

    /// All permission ids whose route shapes match the request. The set is
    /// conjunctive: a route listed under several ids needs every one.
    pub fn required_for(&self, method: &str, path: &str) -> Vec<PermissionId> {
        let mut ids: Vec<PermissionId> = self
            .permission_rules
            .iter()
            .filter(|(_, rule)| rule.matches(method, path))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// True when the request shape requires a logged-in session, either
    /// because a permission governs it or because it is session-only.
    pub fn requires_auth(&self, method: &str, path: &str) -> bool {
        self.auth_rules.iter().any(|rule| rule.matches(method, path))
            || !self.required_for(method, path).is_empty()
    }
}
