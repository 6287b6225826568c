//! Contains the main Supervisor service runner.

use alloy_primitives::ChainId;
use alloy_rpc_client::RpcClient;
use anyhow::{Context, Result, anyhow, bail};
use interop_supervisor_core::{
    ChainProcessor, ChainProcessorConfig, CrossSafetyCheckerJob, L1Watcher, L1WatcherConfig,
    ReorgHandler, Supervisor,
    config::Config,
    event::{ChainEvent, ReorgRequest},
    rpc::{AdminRpc, SupervisorRpc},
    safety_checker::{CrossSafePromoter, CrossUnsafePromoter, SafetyPromoter},
    syncnode::{Client, ClientConfig, ManagedNode, ManagedNodeClient, ResetPolicy},
};
use interop_supervisor_rpc::{SupervisorAdminApiServer, SupervisorApiServer};
use interop_supervisor_storage::{
    ChainDb, ChainDbFactory, DerivationStorageWriter, LogStorageReader, LogStorageWriter,
    StorageError,
};
use interop_supervisor_types::{DerivedRefPair, L2BlockRef};
use jsonrpsee::{RpcModule, client_transport::ws::Url};
use std::{collections::HashMap, future::Future, sync::Arc};
use tokio::{sync::mpsc, task::JoinSet, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::actors::{
    ChainProcessorActor, ManagedNodeActor, MetricWorker, SupervisorActor, SupervisorRpcActor,
};

type ChainNode = ManagedNode<ChainDb, Client>;

const CHAIN_EVENT_CHANNEL_SIZE: usize = 1000;
const NODE_COMMAND_CHANNEL_SIZE: usize = 1000;
const REORG_REQUEST_CHANNEL_SIZE: usize = 16;
const METRIC_REPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of a spawned task: the chain it served, if any, and how it ended.
type TaskOutcome = (Option<ChainId>, Result<()>);

/// The interop supervisor service. Builds every component from the [`Config`] and runs them
/// as actors:
///
/// * per chain: a chain processor, a managed node actor, a reorg handler and one cross-safety
///   checker per promoted level,
/// * shared: the L1 watcher, the RPC server and the metric reporter.
///
/// A failing chain task only takes its own chain down. A failing shared task stops the service.
#[derive(Debug)]
pub struct Service {
    config: Arc<Config>,

    supervisor: Arc<Supervisor<ChainNode>>,
    database_factory: Arc<ChainDbFactory>,
    // chains with a running processor
    chain_event_senders: HashMap<ChainId, mpsc::Sender<ChainEvent>>,

    cancel_token: CancellationToken,
    join_set: JoinSet<TaskOutcome>,
}

impl Service {
    /// Creates a new Supervisor service instance.
    pub fn new(cfg: Config) -> Self {
        let config = Arc::new(cfg);
        let database_factory = Arc::new(ChainDbFactory::new(config.datadir.clone()).with_metrics());
        let supervisor = Arc::new(Supervisor::new(config.clone(), database_factory.clone()));

        Self {
            config,
            supervisor,
            database_factory,
            chain_event_senders: HashMap::new(),
            cancel_token: CancellationToken::new(),
            join_set: JoinSet::new(),
        }
    }

    /// Initialises the Supervisor service.
    pub async fn initialise(&mut self) -> Result<()> {
        if self.config.dependency_set.dependencies.is_empty() {
            bail!("dependency set is empty, nothing to supervise");
        }

        let l1_rpc = self.l1_rpc_client()?;

        self.init_database()?;
        self.init_chains(&l1_rpc).await;
        self.init_l1_watcher(l1_rpc);
        self.init_cross_safety_checkers()?;
        self.init_rpc_server()?;
        self.init_metric_reporter();
        Ok(())
    }

    fn l1_rpc_client(&self) -> Result<RpcClient> {
        let url = Url::parse(&self.config.l1_rpc).map_err(|err| {
            error!(target: "supervisor::service", %err, "Failed to parse L1 RPC URL");
            anyhow!("failed to parse L1 RPC URL: {err}")
        })?;
        Ok(RpcClient::new_http(url))
    }

    /// Opens every chain's database. Chains whose interop activation is at genesis are seeded
    /// with the genesis block the first time.
    fn init_database(&self) -> Result<()> {
        info!(target: "supervisor::service", "Initialising databases for all chains...");

        for chain_id in self.config.dependency_set.chain_ids() {
            let rollup = self
                .config
                .rollup_config_set
                .get(chain_id)
                .ok_or_else(|| anyhow!("no rollup config for chain {chain_id}"))?;
            let db = self.database_factory.get_or_create_db(chain_id)?;

            let genesis = rollup.genesis;
            let uninitialised =
                matches!(db.get_latest_block(), Err(StorageError::DatabaseNotInitialised));
            if uninitialised && rollup.is_interop(genesis.l2.timestamp) {
                info!(
                    target: "supervisor::service",
                    chain_id,
                    genesis = %genesis.l2,
                    "Initialising database at interop genesis"
                );
                db.initialise_log_storage(L2BlockRef::new(genesis.l2, genesis.l1.id(), 0))?;
                db.initialise_derivation_storage(DerivedRefPair::new(genesis.l1, genesis.l2))?;
            }
            info!(target: "supervisor::service", chain_id, "Database initialised successfully");
        }
        Ok(())
    }

    /// Starts every configured chain. A chain that fails to start is left out and reported as
    /// faulted by the health endpoint; the remaining chains run regardless.
    async fn init_chains(&mut self, l1_rpc: &RpcClient) {
        let configs = self.config.managed_nodes.clone();
        for config in &configs {
            if let Err(err) = self.init_chain(config, l1_rpc).await {
                error!(target: "supervisor::service", node = %config.url, %err, "Failed to initialise chain, skipping");
            }
        }

        for chain_id in self.config.dependency_set.chain_ids() {
            if !self.chain_event_senders.contains_key(&chain_id) {
                warn!(target: "supervisor::service", chain_id, "Chain not running");
            }
        }
    }

    /// Connects a managed node and starts everything that serves its chain.
    async fn init_chain(&mut self, config: &ClientConfig, l1_rpc: &RpcClient) -> Result<()> {
        info!(target: "supervisor::service", node = %config.url, "Initialising managed node...");
        let client = Arc::new(Client::new(config.clone()));

        let chain_id = client.chain_id().await.map_err(|err| {
            error!(target: "supervisor::service", node = %config.url, %err, "Failed to get chain ID from client");
            anyhow!("failed to get chain ID from {}: {err}", config.url)
        })?;

        if self.chain_event_senders.contains_key(&chain_id) {
            warn!(target: "supervisor::service", chain_id, "Managed node for chain already exists, skipping initialisation");
            return Ok(());
        }

        let activation_block = self
            .config
            .rollup_config_set
            .get(chain_id)
            .and_then(|rollup| rollup.activation_block_number())
            .ok_or_else(|| anyhow!("interop is not scheduled for chain {chain_id}"))?;
        let lookback = self.config.tuning.reorg_lookback_depth;
        let db = self.database_factory.get_db(chain_id)?;

        let (event_tx, event_rx) = mpsc::channel::<ChainEvent>(CHAIN_EVENT_CHANNEL_SIZE);
        let (command_tx, command_rx) = mpsc::channel(NODE_COMMAND_CHANNEL_SIZE);
        let (reorg_tx, reorg_rx) = mpsc::channel::<ReorgRequest>(REORG_REQUEST_CHANNEL_SIZE);

        let node: Arc<ChainNode> = Arc::new(ManagedNode::new(
            client.clone(),
            db.clone(),
            ResetPolicy::from(&self.config.tuning),
            event_tx.clone(),
        ));
        let processor = ChainProcessor::new(
            chain_id,
            ChainProcessorConfig::new(activation_block, lookback),
            self.config.clone(),
            node.clone(),
            db.clone(),
            command_tx,
            reorg_tx,
        )
        .with_metrics();

        let reorg_handler = ReorgHandler::new(
            chain_id,
            db,
            node.clone(),
            l1_rpc.clone(),
            event_tx.clone(),
            activation_block,
            lookback,
        )
        .with_metrics();
        // queued ahead of any node event, so a stale chain is rewound first
        reorg_handler
            .verify_l1_consistency()
            .await
            .with_context(|| format!("L1 consistency check failed for chain {chain_id}"))?;

        // also checks that the chain is part of the dependency set
        self.supervisor.add_managed_node(chain_id, node.clone()).await?;
        self.supervisor
            .register_processor(chain_id, event_tx.clone(), processor.subscribe_health())
            .await?;

        let cancel_token = self.cancel_token.clone();
        self.spawn_chain_task(chain_id, async move {
            ChainProcessorActor::new(processor, cancel_token, event_rx)
                .start()
                .await
                .map_err(|err| anyhow!(err))
        });

        let actor = ManagedNodeActor::new(
            client,
            node,
            command_rx,
            self.cancel_token.clone(),
            self.config.tuning.transient_retry_budget,
        );
        self.spawn_chain_task(chain_id, async move {
            actor.start().await.map_err(|err| anyhow!(err))
        });

        let cancel_token = self.cancel_token.clone();
        self.spawn_chain_task(chain_id, async move {
            reorg_handler.run(reorg_rx, cancel_token).await;
            Ok(())
        });

        self.chain_event_senders.insert(chain_id, event_tx);
        info!(target: "supervisor::service", chain_id, activation_block, "Chain initialised successfully");
        Ok(())
    }

    fn init_l1_watcher(&mut self, l1_rpc: RpcClient) {
        info!(target: "supervisor::service", "Initialising L1 watcher...");

        let l1_watcher = L1Watcher::new(
            l1_rpc,
            self.database_factory.clone(),
            self.chain_event_senders.clone(),
            self.cancel_token.clone(),
            L1WatcherConfig::from(&self.config.tuning),
        );
        self.spawn_task(async move {
            l1_watcher.run().await;
            Ok(())
        });
    }

    fn init_cross_safety_checkers(&mut self) -> Result<()> {
        info!(target: "supervisor::service", "Initialising cross safety checkers...");

        let chain_ids: Vec<_> = self.chain_event_senders.keys().copied().collect();
        for chain_id in chain_ids {
            self.spawn_cross_safety_checker(chain_id, CrossUnsafePromoter)?;
            self.spawn_cross_safety_checker(chain_id, CrossSafePromoter)?;
        }
        Ok(())
    }

    fn spawn_cross_safety_checker<L>(&mut self, chain_id: ChainId, promoter: L) -> Result<()>
    where
        L: SafetyPromoter + Send + Sync + 'static,
    {
        let event_tx = self
            .chain_event_senders
            .get(&chain_id)
            .ok_or_else(|| anyhow!("no chain event sender found for chain {chain_id}"))?
            .clone();

        let job = CrossSafetyCheckerJob::new(
            chain_id,
            self.database_factory.clone(),
            self.cancel_token.clone(),
            self.config.tuning.safety_check_interval,
            promoter,
            event_tx,
            self.config.clone(),
        )
        .with_metrics();

        self.spawn_chain_task(chain_id, async move {
            job.run().await;
            Ok(())
        });
        Ok(())
    }

    /// The query API, merged with the admin API when enabled.
    fn build_rpc_module(&self) -> Result<RpcModule<()>> {
        let mut rpc_module = RpcModule::new(());
        rpc_module
            .merge(SupervisorRpc::new(self.supervisor.clone()).into_rpc())
            .map_err(|err| anyhow!("failed to merge Supervisor RPC module: {err}"))?;

        if self.config.enable_admin_api {
            info!(target: "supervisor::service", "Enabling Supervisor Admin API");
            let admin_rpc = AdminRpc::new(self.supervisor.clone())
                .with_request_timeout(self.config.tuning.reset_timeout);
            rpc_module
                .merge(admin_rpc.into_rpc())
                .map_err(|err| anyhow!("failed to merge Admin RPC module: {err}"))?;
        }
        Ok(rpc_module)
    }

    fn init_rpc_server(&mut self) -> Result<()> {
        let rpc_module = self.build_rpc_module()?;
        let actor =
            SupervisorRpcActor::new(self.config.rpc_addr, rpc_module, self.cancel_token.clone());
        self.spawn_task(async move { actor.start().await.map_err(|err| anyhow!(err)) });
        Ok(())
    }

    fn init_metric_reporter(&mut self) {
        let worker = MetricWorker::new(
            METRIC_REPORT_INTERVAL,
            vec![self.database_factory.clone()],
            self.cancel_token.clone(),
        );
        self.spawn_task(async move { worker.start().await.map_err(|err| anyhow!("{err}")) });
    }

    fn spawn_task(&mut self, task: impl Future<Output = Result<()>> + Send + 'static) {
        self.join_set.spawn(async move { (None, task.await) });
    }

    fn spawn_chain_task(
        &mut self,
        chain_id: ChainId,
        task: impl Future<Output = Result<()>> + Send + 'static,
    ) {
        self.join_set.spawn(async move { (Some(chain_id), task.await) });
    }

    /// Runs the Supervisor service.
    /// This function will typically run indefinitely until interrupted.
    pub async fn run(&mut self) -> Result<()> {
        self.initialise().await?;
        self.supervise().await
    }

    /// Waits on the spawned tasks until all of them finish or a shared one fails.
    async fn supervise(&mut self) -> Result<()> {
        while let Some(joined) = self.join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {
                    info!(target: "supervisor::service", "Task completed successfully");
                }
                Ok((Some(chain_id), Err(err))) => {
                    error!(target: "supervisor::service", chain_id, %err, "Chain task failed, chain stopped");
                }
                Ok((None, Err(err))) => {
                    error!(target: "supervisor::service", %err, "A service task failed");
                    self.cancel_token.cancel();
                    return Err(anyhow!("a service task failed: {err}"));
                }
                Err(err) => {
                    error!(target: "supervisor::service", %err, "A task panicked or was aborted");
                    self.cancel_token.cancel();
                    return Err(anyhow!("a service task failed: {err}"));
                }
            }
        }
        Ok(())
    }

    /// Signals every task to stop and waits for them to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel_token.cancel();

        while let Some(joined) = self.join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {
                    info!(target: "supervisor::service", "Task completed successfully during shutdown");
                }
                Ok((chain_id, Err(err))) => {
                    error!(target: "supervisor::service", ?chain_id, %err, "A task failed during shutdown");
                }
                Err(err) => {
                    error!(target: "supervisor::service", %err, "A task panicked during shutdown");
                }
            }
        }
        Ok(())
    }
}
