use crate::Ctx;
use anyhow::Context;
use dairy_core::auth::Credentials;
use dairy_core::ingest::FetchError;
use dairy_core::validate::validate_prompt;
use tokio::io::AsyncBufReadExt;

async fn ask(ctx: &Ctx, credentials: &Credentials, prompt: &str) -> anyhow::Result<()> {
    let request = validate_prompt(prompt)?;
    let reply = ctx.api.generate(credentials, &request).await?;
    println!("{}", reply.response.trim());
    Ok(())
}

pub async fn run(ctx: &Ctx, prompt: Option<String>) -> anyhow::Result<()> {
    let credentials = ctx.credentials().await?;
    if let Some(prompt) = prompt {
        return ask(ctx, &credentials, &prompt).await;
    }

    eprintln!("Ask about your farm. Type `exit` to leave.");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await.context("failed to read from stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        // One failed question should not end the session unless the token is gone.
        if let Err(err) = ask(ctx, &credentials, line).await {
            match err.downcast_ref::<FetchError>() {
                Some(FetchError::Auth) | None => return Err(err),
                Some(fetch) => {
                    tracing::warn!(kind = fetch.kind(), error = %fetch, "chat request failed");
                    eprintln!("{}", fetch.user_message());
                }
            }
        }
    }
    Ok(())
}
