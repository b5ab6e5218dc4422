//! The HTTP front door: Telegram posts updates to `/<bot token>`, and a `GET /`
//! (re)registers that URL as the bot's webhook.

use std::sync::Arc;

use anyhow::Error;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use teloxide::prelude::*;
use tokio::net::TcpListener;
use url::Url;

use crate::config::SharedConfig;
use crate::dispatcher::dispatch_update;
use crate::messenger::Messenger;
use crate::types::TeloxideHandler;

#[derive(Clone)]
pub(crate) struct WebhookState {
    inner: Arc<WebhookStateInner>,
}

struct WebhookStateInner {
    handler: TeloxideHandler,
    dep_map: DependencyMap,
    config: SharedConfig,
    messenger: Arc<dyn Messenger>,
}

impl WebhookState {
    pub(crate) fn new(
        handler: TeloxideHandler,
        dep_map: DependencyMap,
        config: SharedConfig,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            inner: Arc::new(WebhookStateInner {
                handler,
                dep_map,
                config,
                messenger,
            }),
        }
    }
}

pub(crate) fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/", get(register_webhook))
        .route("/:token", post(receive_update))
        .with_state(state)
}

pub(crate) async fn serve(listener: TcpListener, state: WebhookState) -> Result<(), Error> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;
    Ok(())
}

async fn receive_update(
    State(state): State<WebhookState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Response {
    let inner = &state.inner;
    if token != inner.config.telegram_bot_token {
        return StatusCode::NOT_FOUND.into_response();
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(err) => {
            error!("Webhook update error: {}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "!").into_response();
        }
    };

    let update_id = update.id;
    match dispatch_update(&inner.handler, &inner.dep_map, update).await {
        Some(Ok(())) => {}
        Some(Err(err)) => error!("Failed to handle update {}: {}", update_id, err),
        None => debug!("Update {} is not handled", update_id),
    }

    (StatusCode::OK, "!").into_response()
}

fn webhook_url(hostname: &str, token: &str) -> Result<Url, Error> {
    Ok(Url::parse(&format!("https://{}/{}", hostname, token))?)
}

async fn register_webhook(State(state): State<WebhookState>) -> (StatusCode, String) {
    let inner = &state.inner;
    let hostname = match inner.config.external_hostname.as_deref() {
        Some(hostname) if !hostname.is_empty() => hostname,
        _ => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error: external hostname not set.".to_owned(),
            )
        }
    };

    let result = match webhook_url(hostname, &inner.config.telegram_bot_token) {
        Ok(url) => inner.messenger.set_webhook(url.clone()).await.map(|_| url),
        Err(err) => Err(err),
    };
    match result {
        Ok(url) => {
            info!("Webhook set to {}", url);
            (StatusCode::OK, format!("Webhook set to {}", url))
        }
        Err(err) => {
            error!("Webhook set error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Webhook error: {}", err),
            )
        }
    }
}
