//! Runtime site settings stored in the database.
//!
//! Rows load into an in-memory cache at startup so reads on the request
//! path never touch the database. Writes go through [`Settings::set_value`],
//! which updates the row and the cache together.

use crate::db::get_db_pool;
use crate::orm::settings;
use chrono::Utc;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use sea_orm::sea_query::Expr;
use sea_orm::{entity::*, query::*, DbErr};
use serde::{Deserialize, Serialize};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Loads all settings from the database and installs the global store.
/// Panics if called twice.
pub async fn init() -> Result<(), DbErr> {
    let store = Settings::default();
    store.load().await?;
    SETTINGS
        .set(store)
        .expect("settings::init() called more than once.");
    Ok(())
}

pub fn get_settings() -> &'static Settings {
    SETTINGS.get().expect("Settings are not initialized.")
}

/// A typed setting value. The `value_type` column picks the variant when
/// rows are read back.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    String(String),
    Int(i64),
    Bool(bool),
    Json(serde_json::Value),
}

impl SettingValue {
    /// Parse a stored row back into a typed value. Returns None when the
    /// type tag is unknown or the value does not parse as that type.
    pub fn parse(value: &str, value_type: &str) -> Option<Self> {
        match value_type {
            "string" => Some(Self::String(value.to_owned())),
            "int" => value.parse().ok().map(Self::Int),
            "bool" => value.parse().ok().map(Self::Bool),
            "json" => serde_json::from_str(value).ok().map(Self::Json),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Json(_) => "json",
        }
    }

    /// The string form stored in the `value` column.
    pub fn to_string_value(&self) -> String {
        match self {
            Self::String(v) => v.clone(),
            Self::Int(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Json(v) => v.to_string(),
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Cached view of the settings table.
#[derive(Debug, Default)]
pub struct Settings {
    cache: DashMap<String, SettingValue>,
}

impl Settings {
    /// Replace the cache with the current table contents.
    pub async fn load(&self) -> Result<(), DbErr> {
        let rows = settings::Entity::find().all(get_db_pool()).await?;

        self.cache.clear();
        for row in rows {
            match SettingValue::parse(&row.value, &row.value_type) {
                Some(value) => {
                    self.cache.insert(row.key, value);
                }
                None => {
                    log::warn!(
                        "Setting '{}' has unusable value '{}' of type '{}'; ignoring it.",
                        row.key,
                        row.value,
                        row.value_type
                    );
                }
            }
        }

        log::info!("Loaded {} site settings.", self.cache.len());
        Ok(())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.cache
            .get(key)
            .and_then(|v| v.as_string().map(str::to_owned))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_owned())
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.cache.get(key).and_then(|v| v.as_int())
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.cache.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Write a setting to the database, then to the cache.
    pub async fn set_value(&self, key: &str, value: SettingValue) -> Result<(), DbErr> {
        let db = get_db_pool();
        let exists = settings::Entity::find_by_id(key.to_owned())
            .one(db)
            .await?
            .is_some();

        if exists {
            settings::Entity::update_many()
                .col_expr(
                    settings::Column::Value,
                    Expr::value(value.to_string_value()),
                )
                .col_expr(
                    settings::Column::ValueType,
                    Expr::value(value.type_name().to_owned()),
                )
                .col_expr(
                    settings::Column::UpdatedAt,
                    Expr::value(Utc::now().naive_utc()),
                )
                .filter(settings::Column::Key.eq(key))
                .exec(db)
                .await?;
        } else {
            settings::ActiveModel {
                key: Set(key.to_owned()),
                value: Set(value.to_string_value()),
                value_type: Set(value.type_name().to_owned()),
                updated_at: Set(Utc::now().naive_utc()),
            }
            .insert(db)
            .await?;
        }

        self.cache.insert(key.to_owned(), value);
        Ok(())
    }

    /// All rows for the management page, in key order.
    pub async fn all(&self) -> Result<Vec<settings::Model>, DbErr> {
        settings::Entity::find()
            .order_by_asc(settings::Column::Key)
            .all(get_db_pool())
            .await
    }

    /// Whether new account registration is open.
    pub fn registration_enabled(&self) -> bool {
        self.get_bool_or("registration_enabled", true)
    }

    /// Banner text shown with article listings. Empty means no banner.
    pub fn site_notice(&self) -> String {
        self.get_string_or("site_notice", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_each_type_tag() {
        assert_eq!(
            SettingValue::parse("hello", "string"),
            Some(SettingValue::String("hello".to_owned()))
        );
        assert_eq!(SettingValue::parse("42", "int"), Some(SettingValue::Int(42)));
        assert_eq!(
            SettingValue::parse("true", "bool"),
            Some(SettingValue::Bool(true))
        );
        assert_eq!(
            SettingValue::parse(r#"{"a":1}"#, "json"),
            Some(SettingValue::Json(serde_json::json!({ "a": 1 })))
        );
    }

    #[test]
    fn parse_rejects_bad_rows() {
        assert_eq!(SettingValue::parse("42", "float"), None);
        assert_eq!(SettingValue::parse("not a number", "int"), None);
        assert_eq!(SettingValue::parse("yes", "bool"), None);
        assert_eq!(SettingValue::parse("{", "json"), None);
    }

    #[test]
    fn stored_form_round_trips() {
        for value in [
            SettingValue::String("abc".to_owned()),
            SettingValue::Int(-7),
            SettingValue::Bool(false),
            SettingValue::Json(serde_json::json!(["x", "y"])),
        ] {
            let stored = value.to_string_value();
            assert_eq!(SettingValue::parse(&stored, value.type_name()), Some(value));
        }
    }

    #[test]
    fn accessors_match_variants() {
        assert_eq!(SettingValue::Int(3).as_int(), Some(3));
        assert_eq!(SettingValue::Int(3).as_bool(), None);
        assert_eq!(SettingValue::Bool(true).as_bool(), Some(true));
        assert_eq!(SettingValue::String("x".to_owned()).as_string(), Some("x"));
    }

    #[test]
    fn cache_getters_apply_defaults() {
        let store = Settings::default();
        store
            .cache
            .insert("a".to_owned(), SettingValue::Int(5));
        store
            .cache
            .insert("b".to_owned(), SettingValue::Bool(false));

        assert_eq!(store.get_int("a"), Some(5));
        assert_eq!(store.get_int_or("missing", 9), 9);
        assert_eq!(store.get_bool_or("b", true), false);
        assert_eq!(store.get_string_or("missing", "dft"), "dft");
        // Type mismatches fall back to the default too.
        assert_eq!(store.get_string_or("a", "dft"), "dft");
    }
}
