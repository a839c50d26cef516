pub mod article_reacts;
pub mod article_saves;
pub mod article_subs;
pub mod article_votes;
pub mod articles;
pub mod notifications;
pub mod permissions;
pub mod role_permissions;
pub mod roles;
pub mod settings;
pub mod users;
