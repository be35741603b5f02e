use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context as _;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use gateway_config::OnchainAllowlistConfig;
use gateway_eth_client::{contracts_loader, ethabi::Address, ContractCallError, EthInterface};
use gateway_health_check::{Health, HealthStatus, HealthUpdater, ReactiveHealthCheck};
use rand::Rng;
use tokio::sync::{watch, Mutex};

use crate::{
    lifecycle::Lifecycle,
    metrics::{UpdateOutcome, METRICS},
    scheduler::SyncTask,
    AllowlistError, AllowlistSnapshot, LifecycleState, OnchainAllowlist, RefreshState,
    StopReceiver,
};

/// Allowlist cache shared between [`ChainBackedAllowlist`] and its background sync task.
#[derive(Debug)]
pub(crate) struct AllowlistCache {
    config: OnchainAllowlistConfig,
    client: Box<dyn EthInterface>,
    snapshot: ArcSwap<AllowlistSnapshot>,
    refresh_state: watch::Sender<RefreshState>,
    /// Serializes refreshes so that snapshots are published by a single writer at a time.
    update_lock: Mutex<()>,
    health_updater: HealthUpdater,
    shut_down: AtomicBool,
}

impl AllowlistCache {
    pub(crate) fn config(&self) -> &OnchainAllowlistConfig {
        &self.config
    }

    /// Performs a single refresh bounded by the configured timeout and `stop_receiver`, and records its outcome.
    pub(crate) async fn update(
        &self,
        mut stop_receiver: StopReceiver,
    ) -> Result<(), AllowlistError> {
        let timeout = self.config.update_timeout();
        let latency = METRICS.update_latency.start();
        let result = tokio::select! {
            biased;
            () = stop_receiver.stopped() => Err(AllowlistError::Cancelled),
            result = tokio::time::timeout(timeout, self.update_exclusive()) => {
                result.unwrap_or(Err(AllowlistError::Timeout(timeout)))
            }
        };
        latency.observe();
        METRICS.updates[&UpdateOutcome::new(&result)].inc();

        if let Err(err) = &result {
            let message = err.to_string();
            self.refresh_state
                .send_modify(|state| state.record_failure(message));
        }
        let consecutive_failures = self.refresh_state.borrow().consecutive_failures;
        METRICS.consecutive_failures.set(consecutive_failures.into());
        self.update_health();
        result
    }

    async fn update_exclusive(&self) -> Result<(), AllowlistError> {
        let _guard = self.update_lock.lock().await;
        let (addresses, block_number) = self.fetch_allowed_senders().await?;
        self.publish(addresses, block_number);
        Ok(())
    }

    #[tracing::instrument(name = "AllowlistCache::fetch_allowed_senders", skip_all)]
    async fn fetch_allowed_senders(&self) -> Result<(HashSet<Address>, u64), AllowlistError> {
        let client = self.client.as_ref();
        let latest_block = client
            .block_number()
            .await
            .map_err(ContractCallError::from)?;
        if latest_block == 0 {
            return Err(AllowlistError::ZeroBlockHeight);
        }
        let block_number = latest_block.saturating_sub(self.config.block_confirmations);

        let allowlist_address = contracts_loader::get_allowlist_contract_address(
            client,
            self.config.contract_address,
            block_number,
        )
        .await?;
        let count =
            contracts_loader::get_allowed_senders_count(client, allowlist_address, block_number)
                .await?;
        tracing::trace!(
            "Allowlist contract {allowlist_address:?} has {count} allowed senders at block #{block_number}"
        );

        let batch_size = u64::from(self.config.onchain_allowlist_batch_size);
        let mut addresses = HashSet::new();
        let mut start = 0;
        while start < count {
            if start > 0 {
                let delay = self.batch_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            let end = start.saturating_add(batch_size).min(count) - 1;
            let batch = contracts_loader::get_allowed_senders_in_range(
                client,
                allowlist_address,
                start,
                end,
                block_number,
            )
            .await?;
            let expected_len = end - start + 1;
            if batch.len() as u64 != expected_len {
                return Err(AllowlistError::MalformedResponse(format!(
                    "requested {expected_len} senders in range {start}..={end}, got {}",
                    batch.len()
                )));
            }
            addresses.extend(batch);
            start = end + 1;
        }
        Ok((addresses, block_number))
    }

    /// Random delay before the next range call, spreading the load on the RPC node.
    fn batch_delay(&self) -> Duration {
        let max_delay = self.config.fetching_delay_in_range();
        if max_delay.is_zero() {
            return Duration::ZERO;
        }
        rand::thread_rng().gen_range(Duration::ZERO..=max_delay)
    }

    fn publish(&self, addresses: HashSet<Address>, block_number: u64) {
        let size = addresses.len();
        let snapshot = AllowlistSnapshot::new(addresses, Some(block_number));
        self.snapshot.store(Arc::new(snapshot));

        METRICS.size.set(size);
        METRICS.last_synced_block.set(block_number);
        self.refresh_state
            .send_modify(|state| state.record_success(block_number, size));
        tracing::debug!(
            "Published allowlist snapshot with {size} addresses read at block #{block_number}"
        );
    }

    fn update_health(&self) {
        if self.shut_down.load(Ordering::Acquire) {
            return;
        }

        let health = {
            let state = self.refresh_state.borrow();
            let status = if state.last_success.is_none() {
                HealthStatus::NotReady
            } else if state.consecutive_failures > 0 {
                HealthStatus::Affected
            } else {
                HealthStatus::Ready
            };
            Health::from(status).with_details(state.health_details())
        };
        self.health_updater.update(health);
    }

    pub(crate) fn shut_down(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.health_updater.update(HealthStatus::ShutDown.into());
    }
}

/// Allowlist backed by the terms-of-service allowlist contract registered in the functions router.
///
/// The allowlist is empty until the first successful refresh. Afterwards, it serves the last successfully
/// read set of allowed senders; failed refreshes never affect [`OnchainAllowlist::allow()`] results.
#[derive(Debug)]
pub struct ChainBackedAllowlist {
    pub(crate) cache: Arc<AllowlistCache>,
    pub(crate) lifecycle: Lifecycle<SyncTask>,
}

impl ChainBackedAllowlist {
    /// Creates an unstarted allowlist with an empty snapshot.
    pub fn new(
        config: OnchainAllowlistConfig,
        client: Box<dyn EthInterface>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid onchain allowlist config")?;

        let (_, health_updater) = ReactiveHealthCheck::new("onchain_allowlist");
        let cache = AllowlistCache {
            config,
            client,
            snapshot: ArcSwap::from_pointee(AllowlistSnapshot::default()),
            refresh_state: watch::channel(RefreshState::default()).0,
            update_lock: Mutex::new(()),
            health_updater,
            shut_down: AtomicBool::new(false),
        };
        Ok(Self {
            cache: Arc::new(cache),
            lifecycle: Lifecycle::default(),
        })
    }

    /// Returns the currently served snapshot.
    pub fn snapshot(&self) -> Arc<AllowlistSnapshot> {
        self.cache.snapshot.load_full()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.cache.refresh_state.borrow().clone()
    }

    /// Subscribes to refresh state updates.
    pub fn subscribe_refresh_state(&self) -> watch::Receiver<RefreshState> {
        self.cache.refresh_state.subscribe()
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn health_check(&self) -> ReactiveHealthCheck {
        self.cache.health_updater.subscribe()
    }
}

#[async_trait]
impl OnchainAllowlist for ChainBackedAllowlist {
    fn allow(&self, address: &Address) -> bool {
        let allowed = self.cache.snapshot.load().contains(address);
        if allowed {
            METRICS.allowed_senders.inc();
        } else {
            METRICS.denied_senders.inc();
        }
        allowed
    }

    async fn update_from_contract(&self, stop_receiver: StopReceiver) -> Result<(), AllowlistError> {
        self.cache.update(stop_receiver).await
    }

    async fn start(&self, stop_receiver: StopReceiver) -> Result<(), AllowlistError> {
        self.start_sync(stop_receiver).await
    }

    async fn close(&self) -> Result<(), AllowlistError> {
        self.stop_sync().await
    }
}
