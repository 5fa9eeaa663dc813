// Theme preference resolution

use chrono::Duration;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

use crate::api::ApiClient;
use crate::auth::CredentialStore;
use crate::error::Result;

/// Store key for the saved theme
pub const THEME_KEY: &str = "theme";

/// Saved theme lifetime
const THEME_TTL_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

/// Resolves the active theme: saved choice, then the account preference,
/// then the system default.
pub struct ThemeResolver {
    api: ApiClient,
    system: Theme,
}

impl ThemeResolver {
    pub fn new(api: ApiClient, system: Theme) -> Self {
        Self { api, system }
    }

    fn saved(&self) -> Option<Theme> {
        match self.api.session().store().backend().get(THEME_KEY) {
            Ok(value) => value.and_then(|v| v.parse().ok()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read saved theme");
                None
            }
        }
    }

    fn save(&self, theme: Theme) -> Result<()> {
        self.api
            .session()
            .store()
            .backend()
            .set(THEME_KEY, theme.as_str(), Duration::days(THEME_TTL_DAYS))
    }

    /// Account preference from the profile; only consulted when signed in
    async fn account_preference(&self) -> Option<Theme> {
        if !self.api.session().is_authenticated() {
            return None;
        }

        match self.api.profile().await {
            Ok(profile) => profile
                .pointer("/data/preferences/theme")
                .and_then(|v| v.as_str())
                .and_then(|v| v.parse().ok()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch theme preference");
                None
            }
        }
    }

    /// Determine the active theme, saving it when it did not come from the store
    pub async fn resolve(&self) -> Result<Theme> {
        if let Some(theme) = self.saved() {
            return Ok(theme);
        }

        let theme = match self.account_preference().await {
            Some(theme) => theme,
            None => self.system,
        };
        self.save(theme)?;
        Ok(theme)
    }

    /// Flip the theme and save it; signed-in users also get their account
    /// preference updated (best effort)
    pub async fn toggle(&self, current: Theme) -> Result<Theme> {
        let next = current.toggled();
        self.save(next)?;

        if self.api.session().is_authenticated() {
            if let Err(e) = self
                .api
                .update_preferences(&json!({ "theme": next.as_str() }))
                .await
            {
                tracing::warn!(error = %e, "Failed to update theme preference");
            }
        }

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_theme() {
        assert_eq!("dark".parse::<Theme>(), Ok(Theme::Dark));
        assert_eq!(" Light ".parse::<Theme>(), Ok(Theme::Light));
        assert!("sepia".parse::<Theme>().is_err());
    }

    #[test]
    fn test_toggle_and_display() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled().to_string(), "light");
        assert_eq!(Theme::default(), Theme::Light);
    }
}
