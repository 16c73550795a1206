#![allow(dead_code, unreachable_pub)]

use std::sync::Arc;

use anyhow::{Result, anyhow};
use httpmock::MockServer;
use tenantctl_auth::{AccessTokenEntry, SessionContext, TokenCache, resource_for};
use tenantctl_cli::{CommandArgs, ExecutionEngine, Prompter, RequestClient, default_registry};
use tenantctl_config::{MemorySettings, SettingsStore};
use tenantctl_test_support::fixtures::{fresh_expiry, jwt_for};
use url::Url;

pub const SCOPES: &str = "AllSites.Manage User.Read.All";

pub fn server_url(server: &MockServer) -> Result<Url> {
    Url::parse(&server.base_url()).map_err(|_| anyhow!("mock server URL is valid"))
}

/// Token cached for the mock server's origin.
pub fn token_for(server: &MockServer) -> Result<String> {
    let resource = resource_for(&server_url(server)?);
    Ok(jwt_for(&resource, Some(SCOPES), &[]))
}

/// Connected session holding a fresh token for the mock server's origin.
pub fn session_for(server: &MockServer) -> Result<Arc<SessionContext>> {
    let resource = resource_for(&server_url(server)?);
    Ok(Arc::new(SessionContext::connected(TokenCache::new().with_entry(
        resource,
        AccessTokenEntry {
            access_token: token_for(server)?,
            expires_on: fresh_expiry(),
        },
    ))))
}

pub fn engine_with(
    session: Arc<SessionContext>,
    settings: Arc<dyn SettingsStore>,
    prompter: Arc<dyn Prompter>,
    graph_url: Url,
) -> Result<ExecutionEngine> {
    let client = RequestClient::with_http(reqwest::Client::new(), session);
    Ok(ExecutionEngine::new(default_registry()?, client, settings)?
        .with_prompter(prompter)
        .with_graph_url(graph_url))
}

pub fn engine(
    server: &MockServer,
    prompter: Arc<dyn Prompter>,
    prompt: bool,
) -> Result<ExecutionEngine> {
    engine_with(
        session_for(server)?,
        Arc::new(MemorySettings::with_prompt(prompt)),
        prompter,
        server_url(server)?,
    )
}

pub fn args(pairs: &[(&str, &str)]) -> CommandArgs {
    pairs
        .iter()
        .fold(CommandArgs::new(), |args, (name, value)| args.with(*name, *value))
}
