use crate::{read_line, render, Ctx};
use anyhow::Context;
use clap::Subcommand;
use dairy_core::auth::Credentials;
use dairy_core::domain::account::ProfileUpdate;
use dairy_core::validate::{
    is_valid_email, LoginForm, OtpForm, PasswordResetForm, RegistrationForm, ValidationErrors,
};

/// Create a farm account.
#[derive(Debug, clap::Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub email: String,
    #[arg(long, env = "DAIRY_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub confirm: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub farm_name: String,
    #[arg(long)]
    pub address: String,
    #[arg(long)]
    pub farm_size: String,
    #[arg(long, default_value = "Acres")]
    pub farm_size_unit: String,
    /// Number of cattle on the farm.
    #[arg(long)]
    pub cattle: String,
}

#[derive(Debug, Subcommand)]
pub enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        farm_name: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Delete the account and every record it owns.
    Delete {
        #[arg(long)]
        yes: bool,
    },
}

pub async fn login(ctx: &Ctx, email: String, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => read_line("Password: ").await?.unwrap_or_default(),
    };
    let request = LoginForm { email, password }.validate()?;

    let res = ctx.api.login(&request).await?;
    ctx.store.save(&Credentials::bearer(&res.token)).await?;
    tracing::info!(path = %ctx.store.path().display(), "stored session token");

    let who = res
        .user
        .as_ref()
        .map(|u| u.display_name())
        .unwrap_or_else(|| request.email.clone());
    println!("Logged in as {who}");
    Ok(())
}

pub async fn logout(ctx: &Ctx) -> anyhow::Result<()> {
    if ctx.store.clear().await? {
        println!("Logged out.");
    } else {
        println!("No stored session.");
    }
    if ctx.settings.api_token.is_some() {
        println!("DAIRY_API_TOKEN is still set and will be used.");
    }
    Ok(())
}

pub async fn status(ctx: &Ctx) -> anyhow::Result<()> {
    let credentials = ctx.credentials().await?;
    let user = ctx.api.verify(&credentials).await?;
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&user)?);
        return Ok(());
    }
    let email = user
        .get("user")
        .and_then(|u| u.get("email"))
        .or_else(|| user.get("email"))
        .and_then(|e| e.as_str());
    match email {
        Some(email) => println!("Session valid for {email}"),
        None => println!("Session valid."),
    }
    Ok(())
}

pub async fn register(ctx: &Ctx, args: RegisterArgs) -> anyhow::Result<()> {
    let registration = RegistrationForm {
        email: args.email,
        password: args.password,
        confirm_password: args.confirm,
        first_name: args.first_name,
        last_name: args.last_name,
        farm_name: args.farm_name,
        address: args.address,
        farm_size: args.farm_size,
        farm_size_unit: args.farm_size_unit,
        number_of_cattle: args.cattle,
    }
    .validate()?;

    let ack = ctx.api.register(&registration).await?;
    render::print_ack(&ack, "Registration successful. You can now log in.");
    Ok(())
}

pub async fn forgot_password(ctx: &Ctx, email: &str) -> anyhow::Result<()> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationErrors::single("email", "Email is required").into());
    }
    if !is_valid_email(email) {
        return Err(ValidationErrors::single("email", "Please enter a valid email address").into());
    }

    let ack = ctx.api.forgot_password(email).await?;
    render::print_ack(&ack, "A verification code has been sent to your email.");
    Ok(())
}

pub async fn verify_otp(ctx: &Ctx, email: String, otp: String) -> anyhow::Result<()> {
    let request = OtpForm { email, otp }.validate()?;
    let verification = ctx.api.verify_otp(&request).await?;
    let token = verification
        .reset_token
        .context("the server did not return a reset token")?;
    println!("Code verified. Reset your password with:");
    println!("  dairy reset-password --token {token} --password <new> --confirm <new>");
    Ok(())
}

pub async fn reset_password(
    ctx: &Ctx,
    token: String,
    password: String,
    confirm: String,
) -> anyhow::Result<()> {
    let reset = PasswordResetForm {
        token,
        password,
        confirm_password: confirm,
    }
    .validate()?;
    let ack = ctx.api.reset_password(&reset).await?;
    render::print_ack(&ack, "Password reset successful. You can now log in.");
    Ok(())
}

pub async fn profile(ctx: &Ctx, action: Option<ProfileAction>) -> anyhow::Result<()> {
    let credentials = ctx.credentials().await?;
    match action.unwrap_or(ProfileAction::Show) {
        ProfileAction::Show => {
            let profile = ctx.api.profile(&credentials).await?;
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                render::print_profile(&profile);
            }
        }
        ProfileAction::Update {
            first_name,
            last_name,
            farm_name,
            address,
        } => {
            let update = ProfileUpdate {
                first_name,
                last_name,
                farm_name,
                address,
            };
            anyhow::ensure!(
                !update.is_empty(),
                "nothing to update: pass at least one of --first-name, --last-name, --farm-name, --address"
            );
            let ack = ctx.api.update_profile(&credentials, &update).await?;
            render::print_ack(&ack, "Profile updated.");
        }
        ProfileAction::Delete { yes } => {
            anyhow::ensure!(
                yes,
                "deleting the account removes every record; pass --yes to confirm"
            );
            let ack = ctx.api.delete_account(&credentials).await?;
            ctx.store.clear().await?;
            render::print_ack(&ack, "Account deleted.");
        }
    }
    Ok(())
}
