//! Authentication commands.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_engine::{SessionManager, SessionStatus};
use std::io::{self, Write};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

/// Login with email and password.
pub async fn login(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    if let SessionStatus::LoggedIn { user_id, email } = manager.status() {
        let who = email
            .or(user_id)
            .unwrap_or_else(|| "unknown".to_string());
        output::print_success(&format!("Already logged in as {}", who), format);
        return Ok(());
    }

    let email = prompt("Email")?;
    if email.is_empty() {
        output::print_error("Email is required", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    println!("Logging in...");

    if manager.login(&email, &password).await {
        let who = manager.current_user().map(|u| u.email).unwrap_or(email);
        output::print_success(&format!("Logged in as {}", who), format);
    } else {
        output::print_error(
            "Login failed: check your credentials and connection",
            format,
        );
    }

    Ok(())
}

/// Register a new student account.
pub async fn register(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    let first_name = prompt("First name")?;
    let last_name = prompt("Last name")?;
    let email = prompt("Email")?;
    let phone = prompt("Phone")?;

    if first_name.is_empty() || last_name.is_empty() || email.is_empty() {
        output::print_error("First name, last name and email are required", format);
        return Ok(());
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        return Ok(());
    }

    println!("Creating account...");

    if manager
        .register(&first_name, &last_name, &email, &phone, &password)
        .await
    {
        output::print_success(&format!("Account created for {}", email), format);
    } else {
        output::print_error("Registration failed", format);
    }

    Ok(())
}

/// Logout and clear the session.
pub async fn logout(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    manager.logout().await;
    output::print_success("Logged out", format);
    Ok(())
}

/// Check session status without touching the network.
pub fn status(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    match manager.status() {
        SessionStatus::LoggedIn { user_id, email } => match format {
            OutputFormat::Text => {
                println!("Auth:     logged in");
                println!("User ID:  {}", user_id.as_deref().unwrap_or("unknown"));
                println!("Email:    {}", email.as_deref().unwrap_or("unknown"));
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "logged_in": true,
                    "user_id": user_id,
                    "email": email,
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        },
        SessionStatus::Expired => match format {
            OutputFormat::Text => {
                println!("Auth:     session expired");
                println!("The next request will try to refresh it.");
            }
            OutputFormat::Json => {
                println!(r#"{{"logged_in":false,"expired":true}}"#);
            }
        },
        SessionStatus::NotLoggedIn => match format {
            OutputFormat::Text => {
                println!("Auth:     not logged in");
            }
            OutputFormat::Json => {
                println!(r#"{{"logged_in":false,"expired":false}}"#);
            }
        },
    }

    Ok(())
}

/// Show the signed-in user, restoring the session first.
pub async fn whoami(manager: &SessionManager, format: &OutputFormat) -> Result<()> {
    manager.restore_session().await;

    match manager.current_user() {
        Some(user) => match format {
            OutputFormat::Text => {
                println!("{} {}", user.first_name, user.last_name);
                output::print_row("ID", &user.id);
                output::print_row("Email", &user.email);
                if !user.phone.is_empty() {
                    output::print_row("Phone", &user.phone);
                }
                output::print_row("Role", &user.role.to_string());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&user)?);
            }
        },
        None => output::print_error("Not logged in", format),
    }

    Ok(())
}
