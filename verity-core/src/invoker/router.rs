//! Provider routing with per-call timeout and bounded retry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::parse::parse_assessment;
use super::prompt::build_request;
use super::providers::{clients_from_settings, CompletionRequest, ProviderClient};
use super::{Invocation, InvocationContext, ModelInvoker};
use crate::config::{OrchestratorConfig, ProviderSettings};
use crate::error::InvokeError;
use crate::types::{duration_ms, Assessment, ModelSlot, Provider, Role};

/// [`ModelInvoker`] backed by real provider clients, selected by the slot's
/// provider tag.
pub struct ProviderRouter {
    clients: HashMap<Provider, Arc<dyn ProviderClient>>,
    call_timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl ProviderRouter {
    /// Router with no clients; add them with [`ProviderRouter::with_client`].
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            clients: HashMap::new(),
            call_timeout: config.call_timeout,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.clients.insert(client.provider(), client);
        self
    }

    /// Router with a client for every provider that has a key.
    pub fn from_settings(
        settings: &ProviderSettings,
        config: &OrchestratorConfig,
    ) -> Result<Self, InvokeError> {
        let router = clients_from_settings(settings)?
            .into_iter()
            .fold(Self::new(config), Self::with_client);
        tracing::info!(providers = ?router.providers(), "Provider router ready");
        Ok(router)
    }

    /// Providers this router can reach, sorted.
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.clients.keys().copied().collect();
        providers.sort();
        providers
    }

    async fn call_once(
        &self,
        ctx: &InvocationContext,
        client: &dyn ProviderClient,
        request: &CompletionRequest,
        role: Role,
    ) -> Result<Assessment, InvokeError> {
        let budget = self.call_timeout.min(ctx.remaining());
        let text = match tokio::time::timeout(budget, client.complete(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(InvokeError::Timeout {
                    elapsed_ms: duration_ms(budget),
                })
            }
        };
        parse_assessment(&text, role)
    }

    async fn call_with_retry(
        &self,
        ctx: &InvocationContext,
        client: &dyn ProviderClient,
        request: &CompletionRequest,
        role: Role,
        attempts: &AtomicU32,
    ) -> Result<Assessment, InvokeError> {
        let mut backoff = self.retry_backoff;
        loop {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.call_once(ctx, client, request, role).await {
                Ok(assessment) => return Ok(assessment),
                Err(e)
                    if e.is_transient()
                        && attempt <= self.max_retries
                        && ctx.remaining() > backoff =>
                {
                    warn!(
                        provider = %client.provider(),
                        model = %request.model,
                        attempt,
                        backoff_ms = duration_ms(backoff),
                        "Transient provider error, retrying: {}",
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ModelInvoker for ProviderRouter {
    async fn invoke(&self, ctx: &InvocationContext, claim: &str, slot: &ModelSlot) -> Invocation {
        let Some(client) = self.clients.get(&slot.provider) else {
            let err = InvokeError::NotConfigured {
                provider: slot.provider.to_string(),
                reason: "no API key configured".to_string(),
            };
            return Invocation::failed(err.to_string(), 0);
        };

        debug!(%slot, "Invoking model");
        let request = build_request(claim, slot);
        let attempts = AtomicU32::new(0);

        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => None,
            r = self.call_with_retry(ctx, client.as_ref(), &request, slot.role, &attempts) => Some(r),
        };

        let attempts = attempts.load(Ordering::SeqCst);
        match result {
            None => Invocation::timed_out("cancelled: global deadline reached", attempts),
            Some(Ok(assessment)) => Invocation::success(assessment, attempts),
            Some(Err(e)) if e.is_timeout() => Invocation::timed_out(e.to_string(), attempts),
            Some(Err(e)) => Invocation::failed(e.to_string(), attempts),
        }
    }
}
