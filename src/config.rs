//! Support for library configuration options

use std::env;
use std::sync::{Arc, Mutex};

use chrono_tz::Tz;
use once_cell::sync::Lazy;

use crate::error::SyncError;

/// Summary given to events whose source record has no usable title.
/// Feel free to override it when initing this library.
pub static DEFAULT_TITLE: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("Untitled Event".to_string())));

/// Text that precedes the source URL in the description of every synced event.
/// Feel free to override it when initing this library.
pub static DESCRIPTION_PREFIX: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("Synced from Notion: ".to_string())));

/// Name of the private extended property that carries the external key on calendar events.
/// Changing it after events have been created makes them invisible to the next runs.
pub static MANAGED_KEY_PROPERTY: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("notion_id".to_string())));

/// Read the current value of one of the overridable statics of this module
pub fn current(value: &Lazy<Arc<Mutex<String>>>) -> String {
    match value.lock() {
        Ok(guard) => guard.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Override one of the statics of this module
pub fn set(value: &Lazy<Arc<Mutex<String>>>, new_value: &str) {
    match value.lock() {
        Ok(mut guard) => *guard = new_value.to_string(),
        Err(poisoned) => *poisoned.into_inner() = new_value.to_string(),
    }
}


/// Credentials and identifiers needed by the command-line harness
#[derive(Clone, Debug)]
pub struct Settings {
    /// Only needed when records are read from Notion
    pub notion_token: Option<String>,
    pub notion_database_id: Option<String>,
    pub google_access_token: String,
    /// Defaults to `primary`
    pub calendar_id: String,
    /// Zone used to read timestamps that carry neither an offset nor their own zone
    pub time_zone: Tz,
    pub delete_orphans: bool,
    pub allow_empty_source: bool,
}

impl Settings {
    /// Load the settings from environment variables
    pub fn from_env() -> Result<Self, SyncError> {
        let time_zone = match env::var("SYNC_TIME_ZONE") {
            Err(_) => Tz::UTC,
            Ok(name) => name.parse::<Tz>()
                .map_err(|_| SyncError::config(format!("SYNC_TIME_ZONE: unknown time zone {:?}", name)))?,
        };

        Ok(Self {
            notion_token: env::var("NOTION_TOKEN").ok(),
            notion_database_id: env::var("NOTION_DB_ID").ok(),
            google_access_token: required_var("GOOGLE_ACCESS_TOKEN")?,
            calendar_id: env::var("CALENDAR_ID").unwrap_or_else(|_| String::from("primary")),
            time_zone,
            delete_orphans: bool_var("SYNC_DELETE_ORPHANS", true)?,
            allow_empty_source: bool_var("SYNC_ALLOW_EMPTY_SOURCE", false)?,
        })
    }

    /// Check the settings can be used to build the adapters.
    /// The Notion settings are only checked when `needs_notion` is set.
    pub fn validate(&self, needs_notion: bool) -> Result<(), SyncError> {
        let fields = [
            ("GOOGLE_ACCESS_TOKEN", &self.google_access_token),
            ("CALENDAR_ID", &self.calendar_id),
        ];
        for (name, value) in fields.iter() {
            if value.trim().is_empty() {
                return Err(SyncError::config(format!("{} must not be empty", name)));
            }
        }
        if needs_notion {
            self.notion()?;
        }
        Ok(())
    }

    /// The Notion token and database id
    pub fn notion(&self) -> Result<(&str, &str), SyncError> {
        Ok((
            non_empty("NOTION_TOKEN", self.notion_token.as_deref())?,
            non_empty("NOTION_DB_ID", self.notion_database_id.as_deref())?,
        ))
    }
}

fn non_empty<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str, SyncError> {
    match value {
        None => Err(SyncError::config(format!("missing environment variable {}", name))),
        Some(value) if value.trim().is_empty() => Err(SyncError::config(format!("{} must not be empty", name))),
        Some(value) => Ok(value),
    }
}

fn required_var(name: &str) -> Result<String, SyncError> {
    env::var(name).map_err(|_| SyncError::config(format!("missing environment variable {}", name)))
}

fn bool_var(name: &str, default: bool) -> Result<bool, SyncError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(value) => parse_bool(&value)
            .ok_or_else(|| SyncError::config(format!("{}: expected a boolean, got {:?}", name, value))),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            notion_token: Some("secret".to_string()),
            notion_database_id: Some("db".to_string()),
            google_access_token: "token".to_string(),
            calendar_id: "primary".to_string(),
            time_zone: Tz::UTC,
            delete_orphans: true,
            allow_empty_source: false,
        }
    }

    #[test]
    fn test_validate() {
        assert!(settings().validate(true).is_ok());

        let mut blank_calendar = settings();
        blank_calendar.calendar_id = "  ".to_string();
        assert!(matches!(blank_calendar.validate(false), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_notion_settings_are_only_needed_for_notion() {
        let mut without_notion = settings();
        without_notion.notion_token = None;
        without_notion.notion_database_id = Some(" ".to_string());
        assert!(without_notion.validate(false).is_ok());
        assert!(matches!(without_notion.validate(true), Err(SyncError::Config(_))));
        assert!(matches!(without_notion.notion(), Err(SyncError::Config(_))));

        assert_eq!(settings().notion().unwrap(), ("secret", "db"));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_override() {
        static GREETING: Lazy<Arc<Mutex<String>>> = Lazy::new(|| Arc::new(Mutex::new("hello".to_string())));
        assert_eq!(current(&GREETING), "hello");
        set(&GREETING, "bonjour");
        assert_eq!(current(&GREETING), "bonjour");
    }
}
