//! # Watch Loop
//!
//! Watches AzureKeyVaultSecrets and Secrets, keeps the reflector caches the
//! stores read from up to date, and feeds the spec sync queue.
//!
//! - AzureKeyVaultSecret applied: queued for spec sync. Deletes are ignored;
//!   owned Secrets are garbage collected by Kubernetes.
//! - Secret applied or deleted: resolved to its owning AzureKeyVaultSecret,
//!   which is queued for spec sync.

use crate::controller::reconciler::ObjectEvent;
use crate::crd::AzureKeyVaultSecret;
use crate::runtime::controller::Controller;
use crate::runtime::initialization::InitializationResult;
use anyhow::{Context, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::runtime::reflector::store::Writer;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Resource;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Run the controller until SIGINT/SIGTERM
///
/// Starts both watches, waits for their caches to sync, marks the server
/// ready and runs the worker pools. On shutdown the server is marked not
/// ready, the queues stop and in-flight items are allowed to finish.
pub async fn run_watch_loop(init: InitializationResult) -> Result<()> {
    let InitializationResult {
        client,
        controller,
        server_state,
        ref_cache,
        ref_writer,
        secret_cache,
        secret_writer,
        watch_restart_delay,
    } = init;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        let signal = shutdown_signal().await;
        info!("Received {}, initiating graceful shutdown...", signal);
        shutdown_server_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
        if shutdown_tx.send(true).is_err() {
            warn!("Controller already stopped");
        }
    });

    let ref_watch = {
        let controller = Arc::clone(&controller);
        tokio::spawn(run_watch(
            "AzureKeyVaultSecret",
            Api::<AzureKeyVaultSecret>::all(client.clone()),
            ref_writer,
            watch_restart_delay,
            shutdown_rx.clone(),
            move |event| {
                let controller = Arc::clone(&controller);
                async move { dispatch_ref_event(&controller, event) }
            },
        ))
    };

    let secret_watch = {
        let controller = Arc::clone(&controller);
        tokio::spawn(run_watch(
            "Secret",
            Api::<Secret>::all(client),
            secret_writer,
            watch_restart_delay,
            shutdown_rx.clone(),
            move |event| {
                let controller = Arc::clone(&controller);
                async move { dispatch_secret_event(&controller, event).await }
            },
        ))
    };

    info!("Waiting for informer caches to sync...");
    ref_cache
        .wait_until_ready()
        .await
        .context("AzureKeyVaultSecret cache stopped before it was ready")?;
    secret_cache
        .wait_until_ready()
        .await
        .context("Secret cache stopped before it was ready")?;
    info!("✅ Informer caches synced");

    server_state.set_ready(true);
    controller.run(shutdown_rx).await;

    for (kind, handle) in [("AzureKeyVaultSecret", ref_watch), ("Secret", secret_watch)] {
        if let Err(e) = handle.await {
            error!("{} watch task failed: {}", kind, e);
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM with the name of the signal received
///
/// A signal whose handler cannot be installed is logged and never fires.
pub async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    }
}

fn dispatch_ref_event(controller: &Controller, event: watcher::Event<AzureKeyVaultSecret>) {
    match event {
        watcher::Event::Apply(akvs) | watcher::Event::InitApply(akvs) => controller.enqueue(&akvs),
        watcher::Event::Delete(_) | watcher::Event::Init | watcher::Event::InitDone => {}
    }
}

async fn dispatch_secret_event(controller: &Controller, event: watcher::Event<Secret>) {
    match event {
        watcher::Event::Apply(secret) | watcher::Event::InitApply(secret) => {
            controller
                .handle_object_event(ObjectEvent::Live(Arc::new(secret)))
                .await;
        }
        watcher::Event::Delete(secret) => {
            let key = format!(
                "{}/{}",
                secret.metadata.namespace.as_deref().unwrap_or_default(),
                secret.metadata.name.as_deref().unwrap_or_default()
            );
            controller
                .handle_object_event(ObjectEvent::Tombstone {
                    key,
                    object: Some(Arc::new(secret)),
                })
                .await;
        }
        watcher::Event::Init | watcher::Event::InitDone => {}
    }
}

/// Watch `api`, apply every event to `writer`, then hand it to `on_event`
///
/// Watch errors are retried by the watcher's own backoff. If the stream ever
/// ends it is restarted after `restart_delay`, reusing the same cache.
async fn run_watch<K, F, Fut>(
    kind: &'static str,
    api: Api<K>,
    mut writer: Writer<K>,
    restart_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut on_event: F,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
    F: FnMut(watcher::Event<K>) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        info!("Starting {} watch", kind);
        let stream = watcher(api.clone(), watcher::Config::default()).default_backoff();
        let mut stream = std::pin::pin!(stream);

        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = shutdown.changed() => {
                    info!("Shutdown requested, stopping {} watch", kind);
                    return;
                }
            };
            match next {
                Some(Ok(event)) => {
                    writer.apply_watcher_event(&event);
                    on_event(event).await;
                }
                Some(Err(e)) => warn!(error = %e, "{} watch error, retrying with backoff", kind),
                None => break,
            }
        }

        warn!(
            "{} watch stream ended, restarting in {} seconds...",
            kind,
            restart_delay.as_secs()
        );
        tokio::select! {
            () = tokio::time::sleep(restart_delay) => {}
            _ = shutdown.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_triggers_shutdown() {
        let mut signal = Box::pin(shutdown_signal());
        // First poll installs the handlers, so SIGTERM no longer kills the process
        assert!(futures::poll!(&mut signal).is_pending());

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let received = tokio::time::timeout(Duration::from_secs(5), signal)
            .await
            .unwrap();
        assert_eq!(received, "SIGTERM");
    }
}
