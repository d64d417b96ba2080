//! Access Token Refresh Utility
//!
//! The server refreshes an expired access token on its own, but a rotated
//! refresh token only lives in memory until the next restart. Run this to
//! get a fresh token pair and put both values back into the environment.
//!
//! Credentials are read from `xapi_client_id`, `xapi_client_secret` and
//! `xapi_refresh_token` when set, otherwise prompted for.

use std::io::{self, Write};

use xmonitor::oauth::refresh_access_token;

fn env_or_prompt(name: &str, prompt: &str) -> io::Result<String> {
    if let Ok(value) = std::env::var(name) {
        if !value.trim().is_empty() {
            println!("Using {} from environment", name);
            return Ok(value.trim().to_string());
        }
    }

    print!("{}: ", prompt);
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();
    let _ = dotenvy::dotenv();

    println!("🔄 xmonitor Access Token Refresh");
    println!("================================");

    let client_id = env_or_prompt("xapi_client_id", "Enter your X App Client ID")?;
    let client_secret = env_or_prompt("xapi_client_secret", "Enter your X App Client Secret")?;
    let refresh_token = env_or_prompt("xapi_refresh_token", "Enter your refresh token")?;

    println!("\n🔄 Refreshing access token...");
    let client = reqwest::Client::new();
    let (access_token, new_refresh_token) =
        refresh_access_token(&client, &client_id, &client_secret, &refresh_token).await?;

    println!("\n✅ Success! Update your environment:");
    println!("xapi_access_token=\"{}\"", access_token);

    match new_refresh_token {
        Some(rotated) => {
            println!("xapi_refresh_token=\"{}\"", rotated);
            println!("\n⚠️  Your old refresh token is now invalid.");
        }
        None => println!("\nThe refresh token was not rotated; keep the current one."),
    }

    Ok(())
}
