//! Subcommand implementations.

use std::sync::Arc;

use anyhow::{bail, Context};
use codedeck_api::ApiClient;
use codedeck_core::{Config, Navigator, Paths};
use codedeck_identity::{CallbackServer, IdentityClient};
use codedeck_session::{SessionManager, SessionStatus};
use codedeck_storage::open_default;
use tracing::info;

use crate::browser::BrowserNavigator;

fn build_identity(config: &Config, paths: &Paths) -> anyhow::Result<IdentityClient> {
    let store = Arc::new(open_default(paths).context("could not open token store")?);
    Ok(IdentityClient::new(
        config.identity_url.clone(),
        config.callback_url(),
        config.app_origin(),
        store,
    ))
}

fn build_session(config: &Config, paths: &Paths) -> anyhow::Result<Arc<SessionManager>> {
    let identity = build_identity(config, paths)?;
    Ok(Arc::new(SessionManager::new(
        identity,
        Arc::new(BrowserNavigator),
    )))
}

pub async fn login(
    config: &Config,
    paths: &Paths,
    signup: bool,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.callback_port);
    let bound = CallbackServer::new(port)
        .bind()
        .await
        .context("could not start the local callback receiver")?;

    // The redirect URI must use the port actually bound, which may differ
    // from the configured one when --port 0 was given.
    let origin = format!("http://localhost:{}", bound.port());
    let store = Arc::new(open_default(paths).context("could not open token store")?);
    let identity = IdentityClient::new(
        config.identity_url.clone(),
        format!("{origin}/auth/callback"),
        origin,
        store,
    );
    let navigator = Arc::new(BrowserNavigator);
    let session = SessionManager::new(identity.clone(), navigator.clone());

    let url = if signup {
        identity.signup_url("/")?
    } else {
        identity.login_url("/")?
    };
    println!("Complete sign-in in your browser:");
    println!("  {url}");
    navigator.navigate(url.as_str());

    let outcome = bound.wait().await?;
    let resolution = session.handle_callback(outcome).await;
    match resolution.status {
        SessionStatus::Authenticated => {
            match session.current_user() {
                Some(user) => println!("Signed in as {} ({})", user.display_name, user.email),
                None => println!("Signed in"),
            }
            Ok(())
        }
        _ => {
            let reason = session
                .last_error()
                .unwrap_or_else(|| "sign-in was not completed".to_string());
            bail!("sign-in failed: {reason}");
        }
    }
}

pub fn logout(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let session = build_session(config, paths)?;
    session.logout()?;
    println!("Signed out");
    Ok(())
}

pub async fn status(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let session = build_session(config, paths)?;
    let status = session.initialize().await;
    match status {
        SessionStatus::Authenticated => match session.current_user() {
            Some(user) => println!("Signed in as {} ({})", user.display_name, user.email),
            None => println!("Signed in"),
        },
        _ => println!("Not signed in"),
    }
    Ok(())
}

pub async fn whoami(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let session = authenticated_session(config, paths).await?;
    let user = session
        .current_user()
        .context("no profile in the current session")?;
    println!("id:     {}", user.id);
    println!("name:   {}", user.display_name);
    println!("email:  {}", user.email);
    println!("role:   {:?}", user.role);
    Ok(())
}

pub async fn projects(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let api = authenticated_api(config, paths).await?;
    let page = api.list_projects(0, 50).await?;
    info!(total = page.total, "fetched projects");
    if page.items.is_empty() {
        println!("No projects yet");
        return Ok(());
    }
    for project in page.items {
        println!("{:>6}  {}", project.id, project.name);
    }
    Ok(())
}

pub async fn snippets(config: &Config, paths: &Paths) -> anyhow::Result<()> {
    let api = authenticated_api(config, paths).await?;
    let page = api.list_snippets(0, 50).await?;
    info!(total = page.total, "fetched snippets");
    if page.items.is_empty() {
        println!("No snippets yet");
        return Ok(());
    }
    for snippet in page.items {
        println!("{:>6}  [{}] {}", snippet.id, snippet.language, snippet.title);
    }
    Ok(())
}

async fn authenticated_session(
    config: &Config,
    paths: &Paths,
) -> anyhow::Result<Arc<SessionManager>> {
    let session = build_session(config, paths)?;
    if !session.initialize().await.is_authenticated() {
        bail!("not signed in, run `codedeck login` first");
    }
    Ok(session)
}

async fn authenticated_api(config: &Config, paths: &Paths) -> anyhow::Result<ApiClient> {
    let session = authenticated_session(config, paths).await?;
    Ok(ApiClient::new(
        config.api_url.clone(),
        session,
        Arc::new(BrowserNavigator),
    ))
}
