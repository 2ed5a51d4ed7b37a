use anyhow::anyhow;
use formwork_client::{Clock, SystemClock};

use crate::cli::{LoginArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{StatusView, format_duration, render_status};

pub(crate) async fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")
            .map_err(|err| CliError::failure(anyhow!("failed to read password: {err}")))?,
    };

    let session = ctx.client.session().login(&args.email, &password).await?;
    let remaining_ms = session
        .expires_at_ms()
        .saturating_sub(SystemClock.now_ms())
        .max(0);
    let remaining = u64::try_from(remaining_ms / 1_000).unwrap_or(0);
    println!("Logged in; session valid for {}.", format_duration(remaining));
    Ok(())
}

pub(crate) async fn handle_logout(ctx: &AppContext) -> CliResult<()> {
    ctx.client.logout().await;
    println!("Logged out.");
    Ok(())
}

pub(crate) fn handle_status(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    render_status(&status_view(ctx), format)
}

fn status_view(ctx: &AppContext) -> StatusView {
    let session = ctx.client.session();
    if !session.check_auth().is_authenticated {
        return StatusView {
            authenticated: false,
            subject: None,
            email: None,
            expires_at: None,
            remaining_seconds: 0,
        };
    }
    let claims = session.decode_claims().unwrap_or_default();
    StatusView {
        authenticated: true,
        subject: claims.subject,
        email: claims.email,
        expires_at: session
            .session()
            .and_then(|current| current.expires_at())
            .map(|at| at.to_rfc3339()),
        remaining_seconds: session.remaining_seconds(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{FAR_FUTURE_TOKEN, context_for, context_in, seed_session};
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn login_persists_session_for_later_commands() {
        let server = MockServer::start_async().await;
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .form_urlencoded_tuple("username", "u@x.com")
                .form_urlencoded_tuple("password", "secret");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"access_token": FAR_FUTURE_TOKEN, "token_type": "bearer"}));
        });
        let (ctx, dir) = context_for(&server);

        handle_login(
            &ctx,
            LoginArgs {
                email: "u@x.com".into(),
                password: Some("secret".into()),
            },
        )
        .await
        .expect("login");
        login.assert();
        assert!(dir.path().join("session.json").exists());

        let reopened = context_in(&server, &dir);
        let view = status_view(&reopened);
        assert!(view.authenticated);
        assert_eq!(view.subject.as_deref(), Some("user-1"));
        assert_eq!(view.email.as_deref(), Some("u@x.com"));
        assert!(view.remaining_seconds > 0);
        handle_status(&reopened, OutputFormat::Json).expect("status renders");
    }

    #[tokio::test]
    async fn bad_password_is_a_validation_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(401)
                .header("content-type", "application/json")
                .json_body(json!({"detail": "Incorrect email or password"}));
        });
        let (ctx, dir) = context_for(&server);

        let err = handle_login(
            &ctx,
            LoginArgs {
                email: "u@x.com".into(),
                password: Some("bad".into()),
            },
        )
        .await
        .expect_err("login should fail");
        assert_eq!(err.exit_code(), 2);
        assert!(!dir.path().join("session.json").exists());
    }

    #[tokio::test]
    async fn logout_removes_session_file_even_if_backend_fails() {
        let server = MockServer::start_async().await;
        let logout = server.mock(|when, then| {
            when.method(POST).path("/api/auth/logout");
            then.status(500);
        });
        let (ctx, dir) = context_for(&server);
        seed_session(&dir);

        handle_logout(&ctx).await.expect("logout never fails");
        logout.assert();
        assert!(!dir.path().join("session.json").exists());
        assert!(!status_view(&ctx).authenticated);
        handle_status(&ctx, OutputFormat::Table).expect("status renders");
    }
}
