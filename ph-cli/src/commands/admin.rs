//! User administration from the host shell.

use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, ContentArrangement};
use console::style;

use ph_core::config::ConfigHandle;
use ph_core::constants::roles;
use ph_core::error::{PhError, PhResult};
use ph_models::{Profile, PublicProfile};
use ph_services::ServiceRegistry;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum AdminAction {
    /// Grant the admin role.
    Promote { username: String },
    /// Revoke the admin role.
    Demote { username: String },
    /// Ban a user and revoke their sessions.
    Ban { username: String },
    /// Lift a ban.
    Unban { username: String },
    /// Show a user's account state and recent security events.
    Show {
        username: String,
        /// Number of security events to list.
        #[arg(short = 'n', long, default_value = "20")]
        events: i64,
    },
}

fn find_profile(registry: &ServiceRegistry, username: &str) -> PhResult<Profile> {
    let conn = registry.database.conn()?;
    Profile::find_by_username(&conn, username)?.ok_or_else(|| PhError::not_found(format!("user {username}")))
}

pub async fn run(config: ConfigHandle, action: AdminAction, format: OutputFormat) -> PhResult<()> {
    let registry = super::init_registry(&config).await?;

    let (username, done) = match action {
        AdminAction::Promote { username } => {
            let profile = find_profile(&registry, &username)?;
            registry.moderation.set_role_by_operator(profile.id, roles::ADMIN)?;
            (username, "promoted to admin")
        }
        AdminAction::Demote { username } => {
            let profile = find_profile(&registry, &username)?;
            registry.moderation.set_role_by_operator(profile.id, roles::USER)?;
            (username, "demoted to user")
        }
        AdminAction::Ban { username } => {
            let profile = find_profile(&registry, &username)?;
            registry.moderation.set_banned_by_operator(profile.id, true)?;
            (username, "banned")
        }
        AdminAction::Unban { username } => {
            let profile = find_profile(&registry, &username)?;
            registry.moderation.set_banned_by_operator(profile.id, false)?;
            (username, "unbanned")
        }
        AdminAction::Show { username, events } => {
            let profile = find_profile(&registry, &username)?;
            let history = registry.audit.security_events_for(profile.id, events)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                        "profile": PublicProfile::from(&profile),
                        "role": profile.role,
                        "banned": profile.is_banned,
                        "securityEvents": history,
                    }))?);
                }
                OutputFormat::Text => {
                    println!("{}", style(format!("@{}", profile.username)).bold().underlined());
                    println!("  Id:       {}", profile.id);
                    println!("  Email:    {}", profile.email);
                    println!("  Role:     {}", profile.role);
                    println!(
                        "  Status:   {}",
                        if profile.is_banned {
                            style("banned").red().to_string()
                        } else {
                            style("active").green().to_string()
                        }
                    );
                    println!("  Joined:   {}", profile.created_at);

                    if !history.is_empty() {
                        println!();
                        let mut table = Table::new();
                        table
                            .load_preset(UTF8_FULL)
                            .apply_modifier(UTF8_ROUND_CORNERS)
                            .set_content_arrangement(ContentArrangement::Dynamic);
                        table.set_header(vec!["Time", "Event", "IP"]);
                        for event in &history {
                            table.add_row(vec![
                                event.created_at.clone(),
                                event.event.clone(),
                                event.ip.clone().unwrap_or_default(),
                            ]);
                        }
                        println!("{table}");
                    }
                }
            }
            return Ok(());
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({"username": username, "result": done})),
        OutputFormat::Text => println!("  {} @{username} {done}.", style("OK").green().bold()),
    }
    Ok(())
}
