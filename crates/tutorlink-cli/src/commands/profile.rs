//! Aggregated profile commands.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_engine::{ProfileUpdate, SessionManager};

/// Show the aggregated profile from the user service.
pub async fn show(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    match manager.load_profile().await {
        Ok(Some(profile)) => match format {
            OutputFormat::Text => {
                output::print_heading("Profile");
                output::print_row("ID", &profile.id);
                output::print_row(
                    "Name",
                    &format!("{} {}", profile.first_name, profile.last_name),
                );
                output::print_row("Email", &profile.email);
                if !profile.phone.is_empty() {
                    output::print_row("Phone", &profile.phone);
                }
                output::print_row("Role", &profile.role.to_string());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            }
        },
        Ok(None) => output::print_error("Profile unavailable (are you logged in?)", format),
        Err(e) => output::print_error(&format!("Profile request failed: {}", e), format),
    }

    Ok(())
}

/// Update profile fields via the user service.
pub async fn set(
    manager: &SessionManager,
    first_name: String,
    last_name: String,
    display_name: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    let update = ProfileUpdate {
        first_name,
        last_name,
        display_name,
    };

    match manager.save_profile(update).await {
        Ok(Some(profile)) => output::print_success(
            &format!(
                "Profile updated: {} {}",
                profile.first_name, profile.last_name
            ),
            format,
        ),
        Ok(None) => output::print_error("Profile update rejected", format),
        Err(e) => output::print_error(&format!("Profile update failed: {}", e), format),
    }

    Ok(())
}
