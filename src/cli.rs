use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use serde_json::Value;
use std::sync::Arc;

use habit_tracker_client::config::{CliArgs, Config};
use habit_tracker_client::theme::{Theme, ThemeResolver};
use habit_tracker_client::middleware::ApiRequest;
use habit_tracker_client::{ApiClient, SessionManager};

/// Habit Tracker - command line client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub args: CliArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and store the credential pair
    Login {
        #[arg(short, long)]
        email: Option<String>,
        /// Prompted for when omitted
        #[arg(short, long, env = "HABIT_TRACKER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Sign out and forget stored credentials
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Rotate the stored credential pair now
    Refresh,
    /// List behaviors
    Behaviors {
        /// Only the top-ranked behaviors
        #[arg(long)]
        top: bool,
    },
    /// List todos of a behavior
    Todos { behavior_id: String },
    /// Toggle completion of a todo
    Toggle { todo_id: String },
    /// Overall statistics
    Stats {
        /// Restrict to one behavior
        #[arg(long)]
        behavior: Option<String>,
    },
    /// Current streak
    Streak,
    /// List achievements
    Achievements {
        /// Ask the service to award newly earned achievements first
        #[arg(long)]
        check: bool,
    },
    /// Show or toggle the theme preference
    Theme {
        #[arg(long)]
        toggle: bool,
    },
    /// Authenticated GET of an arbitrary API path
    Get { path: String },
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn prompt(label: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Input::new()
            .with_prompt(label)
            .interact_text()
            .with_context(|| format!("Failed to read {}", label)),
    }
}

fn prompt_password(value: Option<String>, confirm: bool) -> Result<String> {
    if let Some(v) = value {
        return Ok(v);
    }

    let mut password = Password::new().with_prompt("Password");
    if confirm {
        password = password.with_confirmation("Confirm password", "Passwords do not match");
    }
    password.interact().context("Failed to read password")
}

/// Run one subcommand against the service
pub async fn run(command: Command, session: Arc<SessionManager>, config: &Config) -> Result<()> {
    let api = ApiClient::new(session.clone());

    match command {
        Command::Login { email, password } => {
            let email = prompt("Email", email)?;
            let password = prompt_password(password, false)?;
            let user = session.login(&email, &password).await?;
            println!("Logged in as {}", user.name().or(user.email()).unwrap_or(email.as_str()));
        }
        Command::Register { name, email } => {
            let name = prompt("Name", name)?;
            let email = prompt("Email", email)?;
            let password = prompt_password(None, true)?;
            let user = session.register(&name, &email, &password).await?;
            println!("Registered as {}", user.name().unwrap_or(name.as_str()));
        }
        Command::Logout => {
            session.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => match session.restore_session().await {
            Some(user) => print_json(user.as_value())?,
            None => anyhow::bail!("Not logged in"),
        },
        Command::Refresh => {
            session.refresh().await?;
            println!("Session refreshed");
        }
        Command::Behaviors { top } => {
            let behaviors = if top {
                api.top_behaviors().await?
            } else {
                api.behaviors().await?
            };
            print_json(&behaviors)?;
        }
        Command::Todos { behavior_id } => print_json(&api.todos(&behavior_id).await?)?,
        Command::Toggle { todo_id } => print_json(&api.toggle_todo(&todo_id).await?)?,
        Command::Stats { behavior } => {
            let stats = match behavior {
                Some(id) => api.behavior_stats(&id).await?,
                None => api.stats().await?,
            };
            print_json(&stats)?;
        }
        Command::Streak => print_json(&api.streak().await?)?,
        Command::Achievements { check } => {
            if check {
                print_json(&api.check_achievements().await?)?;
            }
            print_json(&api.achievements().await?)?;
        }
        Command::Theme { toggle } => {
            let resolver = ThemeResolver::new(api, config.system_theme);
            let mut theme: Theme = resolver.resolve().await?;
            if toggle {
                theme = resolver.toggle(theme).await?;
            }
            println!("{}", theme);
        }
        Command::Get { path } => {
            let value: Value = session
                .send_json(ApiRequest::get(path))
                .await?;
            print_json(&value)?;
        }
    }

    Ok(())
}
