//! Background synchronization of [`ChainBackedAllowlist`].

use std::sync::Arc;

use gateway_config::InitialSyncMode;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::{
    chain::AllowlistCache,
    lifecycle::{Lifecycle, StopTransition},
    AllowlistError, ChainBackedAllowlist, StopReceiver,
};

type InitialSyncSender = oneshot::Sender<Result<(), AllowlistError>>;

/// Resources of the running sync task.
#[derive(Debug)]
pub(crate) struct SyncTask {
    stop_sender: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AllowlistCache {
    async fn run(
        self: Arc<Self>,
        mut stop_receiver: watch::Receiver<bool>,
        initial_sync_sender: InitialSyncSender,
    ) {
        let mut timer = tokio::time::interval(self.config().update_interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut initial_sync_sender = Some(initial_sync_sender);

        while !*stop_receiver.borrow_and_update() {
            tokio::select! {
                _ = timer.tick() => { /* continue iterations */ }
                _ = stop_receiver.changed() => break,
            }

            let result = self.update(StopReceiver(stop_receiver.clone())).await;
            match &result {
                Ok(()) => { /* everything went fine */ }
                Err(AllowlistError::Cancelled) => {
                    tracing::debug!("Allowlist refresh was cancelled");
                }
                Err(AllowlistError::ContractCall(err)) if !err.is_retryable() => {
                    tracing::error!("Onchain allowlist contract call failed: {err}");
                }
                Err(err) => {
                    // Sync errors are never fatal; the previous snapshot keeps being served.
                    tracing::warn!("Failed refreshing onchain allowlist: {err}");
                }
            }
            if let Some(sender) = initial_sync_sender.take() {
                sender.send(result).ok();
            }
        }

        tracing::info!("Stop request received, onchain allowlist sync is shutting down");
    }
}

impl ChainBackedAllowlist {
    pub(crate) async fn start_sync(
        &self,
        mut stop_receiver: StopReceiver,
    ) -> Result<(), AllowlistError> {
        let (initial_sync_sender, initial_sync_receiver) = oneshot::channel();
        self.lifecycle.start(|| {
            let (stop_sender, task_stop_receiver) = watch::channel(false);
            let cache = self.cache.clone();
            let handle = tokio::spawn(cache.run(task_stop_receiver, initial_sync_sender));
            SyncTask {
                stop_sender,
                handle,
            }
        })?;

        let config = self.cache.config();
        tracing::info!(
            "Started onchain allowlist sync for router {:?} with update interval {:?}",
            config.contract_address,
            config.update_interval()
        );
        if config.initial_sync == InitialSyncMode::Background {
            return Ok(());
        }

        let timeout = config.initial_sync_timeout();
        tokio::select! {
            biased;
            () = stop_receiver.stopped() => {
                tracing::info!("Allowlist start-up was cancelled, stopping sync");
                self.stop_sync().await?;
                return Err(AllowlistError::Cancelled);
            }
            result = tokio::time::timeout(timeout, initial_sync_receiver) => match result {
                Ok(Ok(Ok(()))) => tracing::info!("Initial allowlist sync completed"),
                Ok(Ok(Err(err))) => tracing::warn!(
                    "Initial allowlist sync failed, the allowlist is empty until the next refresh: {err}"
                ),
                Ok(Err(_)) => tracing::warn!("Allowlist sync stopped before completing initial sync"),
                Err(_) => tracing::warn!(
                    "Initial allowlist sync did not complete in {timeout:?}, continuing in background"
                ),
            },
        }
        Ok(())
    }

    pub(crate) async fn stop_sync(&self) -> Result<(), AllowlistError> {
        let task = match self.lifecycle.begin_stop()? {
            StopTransition::Stop(task) => task,
            StopTransition::Wait(stopped_receiver) => {
                Lifecycle::<SyncTask>::wait_stopped(stopped_receiver).await;
                tracing::debug!("Onchain allowlist is already stopped");
                return Ok(());
            }
        };

        task.stop_sender.send_replace(true);
        let join_result = task.handle.await;
        self.cache.shut_down();
        self.lifecycle.finish_stop();
        join_result.map_err(AllowlistError::TaskFailed)?;
        tracing::info!("Onchain allowlist sync is stopped");
        Ok(())
    }
}
