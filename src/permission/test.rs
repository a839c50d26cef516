#![cfg(test)]

use super::catalog::*;
use super::PermissionData;
use std::collections::HashSet;

fn granted(front_ids: &[&str]) -> HashSet<String> {
    front_ids.iter().map(|s| (*s).to_owned()).collect()
}

#[test]
fn catalog_front_ids_follow_module_action() {
    for entry in CATALOG {
        let expected = format!("{}_{}", entry.id.module().as_str(), entry.id.action_str());
        assert_eq!(
            entry.front_id, expected,
            "front id diverged for {}",
            entry.id
        );
    }
}

#[test]
fn catalog_has_no_duplicates() {
    let mut front_ids = HashSet::new();
    let mut ids = HashSet::new();

    for entry in CATALOG {
        assert!(front_ids.insert(entry.front_id), "duplicate {}", entry.front_id);
        assert!(ids.insert(entry.id), "duplicate id {}", entry.id);
    }
}

#[test]
fn parse_round_trips_every_catalog_entry() {
    for entry in CATALOG {
        let id = entry.id;
        assert_eq!(
            PermissionId::parse(id.module().as_str(), id.action_str()),
            Some(id)
        );
        assert_eq!(PermissionId::parse_front_id(entry.front_id), Some(id));
    }
}

#[test]
fn parse_rejects_unknown_names() {
    assert_eq!(PermissionId::parse("article", "fly"), None);
    assert_eq!(PermissionId::parse("spaceship", "create"), None);
    assert_eq!(PermissionId::parse("user", "access"), None);
    assert_eq!(PermissionId::parse_front_id("article-create"), None);
    assert_eq!(PermissionId::parse_front_id(""), None);
}

#[test]
fn display_joins_module_and_action_with_a_dot() {
    assert_eq!(
        PermissionId::Article(ArticleAction::VoteUp).to_string(),
        "article.vote_up"
    );
    assert_eq!(
        PermissionId::User(UserAction::UpdateIntroMine).to_string(),
        "user.update_intro_mine"
    );
}

#[test]
fn default_snapshot_denies_everything() {
    let data = PermissionData::default();
    for entry in CATALOG {
        assert!(!data.permit(entry.id));
    }
}

#[test]
fn update_enables_only_granted_ids() {
    let data = PermissionData::update(&granted(&["article_create", "article_reply"]), false);

    assert!(data.permit(PermissionId::Article(ArticleAction::Create)));
    assert!(data.permit(PermissionId::Article(ArticleAction::Reply)));
    assert!(!data.permit(PermissionId::Article(ArticleAction::EditMine)));
    assert!(!data.permit(PermissionId::User(UserAction::Manage)));
}

#[test]
fn update_is_a_full_rebuild() {
    let first = PermissionData::update(&granted(&["article_create"]), false);
    assert!(first.permit(PermissionId::Article(ArticleAction::Create)));

    // A second snapshot from different grants carries nothing over.
    let second = PermissionData::update(&granted(&["article_reply"]), false);
    assert!(!second.permit(PermissionId::Article(ArticleAction::Create)));
    assert!(second.permit(PermissionId::Article(ArticleAction::Reply)));
}

#[test]
fn super_admin_passes_every_catalog_check() {
    let data = PermissionData::update(&HashSet::new(), true);
    for entry in CATALOG {
        assert!(data.permit(entry.id));
    }
}

#[test]
fn unknown_grants_are_ignored() {
    let data = PermissionData::update(&granted(&["article_create", "galaxy_destroy"]), false);
    assert!(data.permit(PermissionId::Article(ArticleAction::Create)));
    assert_eq!(data.enabled_front_ids(), vec!["article_create"]);
}

#[test]
fn permit_named_parses_then_checks() {
    let data = PermissionData::update(&granted(&["article_create"]), false);

    assert!(data.permit_named("article", "create"));
    assert!(!data.permit_named("article", "reply"));
    assert!(!data.permit_named("article", "no_such_action"));
    assert!(!data.permit_named("", ""));
}

#[test]
fn permit_named_denies_unknown_even_for_super() {
    let data = PermissionData::update(&HashSet::new(), true);
    assert!(data.permit_named("article", "create"));
    assert!(!data.permit_named("article", "no_such_action"));
}

#[test]
fn enabled_front_ids_keeps_catalog_order() {
    let data = PermissionData::update(
        &granted(&["user_ban", "article_create", "role_edit"]),
        false,
    );
    assert_eq!(
        data.enabled_front_ids(),
        vec!["article_create", "user_ban", "role_edit"]
    );
}

#[test]
fn module_helpers() {
    assert!(super::valid_module("article"));
    assert!(super::valid_module("role"));
    assert!(!super::valid_module("forum"));
    assert_eq!(
        super::module_list(),
        vec!["user", "article", "permission", "role"]
    );
}

#[test]
fn route_table_compiles() {
    RouteTable::compile();
}

#[test]
fn required_for_collects_every_matching_id() {
    let table = RouteTable::compile();

    assert_eq!(
        table.required_for("POST", "/users/9/ban"),
        vec![
            PermissionId::User(UserAction::Manage),
            PermissionId::User(UserAction::Ban),
        ]
    );
    assert_eq!(
        table.required_for("POST", "/articles/12/vote"),
        vec![
            PermissionId::Article(ArticleAction::VoteUp),
            PermissionId::Article(ArticleAction::VoteDown),
        ]
    );
    assert_eq!(
        table.required_for("GET", "/manage/users"),
        vec![
            PermissionId::User(UserAction::Manage),
            PermissionId::User(UserAction::ListAccess),
        ]
    );
}

#[test]
fn required_for_is_empty_on_open_routes() {
    let table = RouteTable::compile();
    assert!(table.required_for("GET", "/articles/7").is_empty());
    assert!(table.required_for("GET", "/").is_empty());
    assert!(table.required_for("GET", "/login").is_empty());
}

#[test]
fn method_is_part_of_the_match() {
    let table = RouteTable::compile();
    assert!(table.required_for("GET", "/articles/12/vote").is_empty());
    assert!(!table.required_for("POST", "/articles").is_empty());
    assert!(table.required_for("GET", "/articles").is_empty());
}

#[test]
fn article_create_pattern_does_not_swallow_subpaths() {
    let table = RouteTable::compile();
    // POST /articles/12/reply belongs to article_reply alone.
    assert_eq!(
        table.required_for("POST", "/articles/12/reply"),
        vec![PermissionId::Article(ArticleAction::Reply)]
    );
}

#[test]
fn manage_prefix_covers_nested_pages() {
    let table = RouteTable::compile();

    let roles_edit = table.required_for("GET", "/manage/roles/3/edit");
    assert!(roles_edit.contains(&PermissionId::User(UserAction::Manage)));
    assert!(roles_edit.contains(&PermissionId::Role(RoleAction::Access)));
    assert!(roles_edit.contains(&PermissionId::Role(RoleAction::Edit)));
}

#[test]
fn requires_auth_covers_permission_and_session_routes() {
    let table = RouteTable::compile();

    assert!(table.requires_auth("POST", "/logout"));
    assert!(table.requires_auth("GET", "/notifications"));
    assert!(table.requires_auth("GET", "/settings/account"));
    assert!(table.requires_auth("GET", "/saved"));
    assert!(table.requires_auth("GET", "/manage"));
    assert!(table.requires_auth("POST", "/articles"));
    assert!(table.requires_auth("GET", "/manage/"));

    assert!(!table.requires_auth("GET", "/"));
    assert!(!table.requires_auth("GET", "/articles/3"));
    assert!(!table.requires_auth("GET", "/login"));
    assert!(!table.requires_auth("POST", "/login"));
    assert!(!table.requires_auth("POST", "/register"));
}
