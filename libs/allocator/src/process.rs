//! The allocator's command loop and public handle.
//!
//! All state lives on one task that drains a FIFO mailbox, so mutations
//! never race and no locks exist. Each mutation is acknowledged through a
//! oneshot once applied; a round only runs between commands, never inside
//! one. Mutations that can change the outcome of a round request one —
//! the request is a flag, so any number of mutations collapse into a
//! single pending round — and a periodic tick requests one regardless.
//! Before a pending round runs, whatever is already sitting in the
//! mailbox is drained into it, so a round always sees the full effect of
//! every mutation enqueued before it.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use acre_id::{AgentId, FrameworkId, RoleName};
use acre_resources::{Operation, ResourceVector};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::config::AllocatorConfig;
use crate::engine::AllocatorState;
use crate::error::AllocatorError;
use crate::metrics::AllocatorMetrics;
use crate::types::{
    AgentInfo, FrameworkInfo, InverseOfferCallback, OfferCallback, Unavailability,
};

type Ack = oneshot::Sender<Result<(), AllocatorError>>;

enum Command {
    AddFramework {
        id: FrameworkId,
        info: FrameworkInfo,
        used: HashMap<AgentId, ResourceVector>,
        active: bool,
        ack: Ack,
    },
    RemoveFramework {
        id: FrameworkId,
        ack: Ack,
    },
    ActivateFramework {
        id: FrameworkId,
        ack: Ack,
    },
    DeactivateFramework {
        id: FrameworkId,
        ack: Ack,
    },
    UpdateFramework {
        id: FrameworkId,
        info: FrameworkInfo,
        ack: Ack,
    },
    AddAgent {
        id: AgentId,
        info: AgentInfo,
        unavailability: Option<Unavailability>,
        total: ResourceVector,
        used: HashMap<FrameworkId, ResourceVector>,
        ack: Ack,
    },
    RemoveAgent {
        id: AgentId,
        ack: Ack,
    },
    UpdateAgent {
        id: AgentId,
        oversubscribed: ResourceVector,
        ack: Ack,
    },
    UpdateWhitelist {
        whitelist: Option<HashSet<String>>,
        ack: Ack,
    },
    UpdateUnavailability {
        id: AgentId,
        unavailability: Option<Unavailability>,
        ack: Ack,
    },
    RequestResources {
        id: FrameworkId,
        resources: ResourceVector,
        ack: Ack,
    },
    UpdateAllocation {
        framework: FrameworkId,
        agent: AgentId,
        consumed: ResourceVector,
        operations: Vec<Operation>,
        ack: Ack,
    },
    UpdateAvailable {
        agent: AgentId,
        operations: Vec<Operation>,
        ack: Ack,
    },
    RecoverResources {
        framework: FrameworkId,
        agent: AgentId,
        resources: ResourceVector,
        refuse: Option<Duration>,
        ack: Ack,
    },
    UpdateInverseOffer {
        framework: FrameworkId,
        agent: AgentId,
        refuse: Option<Duration>,
        ack: Ack,
    },
    SuppressOffers {
        id: FrameworkId,
        ack: Ack,
    },
    ReviveOffers {
        id: FrameworkId,
        ack: Ack,
    },
    SetQuota {
        role: RoleName,
        guarantee: ResourceVector,
        ack: Ack,
    },
    RemoveQuota {
        role: RoleName,
        ack: Ack,
    },
    UpdateWeights {
        weights: Vec<(RoleName, f64)>,
        ack: Ack,
    },
    Metrics {
        reply: oneshot::Sender<AllocatorMetrics>,
    },
    /// Barrier: acknowledged only after every earlier command has been
    /// applied and any pending round has run.
    Settle {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running allocator. Every method enqueues a mutation and
/// completes once it has been applied; state is only ever touched by the
/// allocator's own task.
#[derive(Clone)]
pub struct Allocator {
    commands: mpsc::UnboundedSender<Command>,
    shutdown: watch::Sender<bool>,
}

impl Allocator {
    /// Starts the allocator task; the returned handle is the only way to
    /// talk to it. Offers and inverse offers flow out through the two
    /// callbacks as value copies.
    pub fn start(
        config: AllocatorConfig,
        offer_callback: OfferCallback,
        inverse_offer_callback: InverseOfferCallback,
    ) -> Self {
        let (commands, mailbox) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = Worker {
            state: AllocatorState::new(config.clone()),
            offer_callback,
            inverse_offer_callback,
            round_pending: false,
        };
        tokio::spawn(worker.run(config.allocation_interval, mailbox, shutdown_rx));

        Self { commands, shutdown }
    }

    /// Signals the allocator task to stop after the current command.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn execute(&self, command: Command, rx: oneshot::Receiver<Result<(), AllocatorError>>) -> Result<(), AllocatorError> {
        self.commands
            .send(command)
            .map_err(|_| AllocatorError::Shutdown)?;
        rx.await.map_err(|_| AllocatorError::Shutdown)?
    }

    pub async fn add_framework(
        &self,
        id: FrameworkId,
        info: FrameworkInfo,
        used: HashMap<AgentId, ResourceVector>,
        active: bool,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::AddFramework { id, info, used, active, ack }, rx)
            .await
    }

    pub async fn remove_framework(&self, id: FrameworkId) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::RemoveFramework { id, ack }, rx).await
    }

    pub async fn activate_framework(&self, id: FrameworkId) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::ActivateFramework { id, ack }, rx).await
    }

    pub async fn deactivate_framework(&self, id: FrameworkId) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::DeactivateFramework { id, ack }, rx).await
    }

    pub async fn update_framework(
        &self,
        id: FrameworkId,
        info: FrameworkInfo,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::UpdateFramework { id, info, ack }, rx).await
    }

    pub async fn add_agent(
        &self,
        id: AgentId,
        info: AgentInfo,
        unavailability: Option<Unavailability>,
        total: ResourceVector,
        used: HashMap<FrameworkId, ResourceVector>,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(
            Command::AddAgent { id, info, unavailability, total, used, ack },
            rx,
        )
        .await
    }

    pub async fn remove_agent(&self, id: AgentId) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::RemoveAgent { id, ack }, rx).await
    }

    /// Replaces the agent's oversubscribed (revocable) slice.
    pub async fn update_agent(
        &self,
        id: AgentId,
        oversubscribed: ResourceVector,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::UpdateAgent { id, oversubscribed, ack }, rx).await
    }

    pub async fn update_whitelist(
        &self,
        whitelist: Option<HashSet<String>>,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::UpdateWhitelist { whitelist, ack }, rx).await
    }

    pub async fn update_unavailability(
        &self,
        id: AgentId,
        unavailability: Option<Unavailability>,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::UpdateUnavailability { id, unavailability, ack }, rx)
            .await
    }

    /// Advisory hint; the allocator is free to ignore it.
    pub async fn request_resources(
        &self,
        id: FrameworkId,
        resources: ResourceVector,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::RequestResources { id, resources, ack }, rx).await
    }

    /// Applies in-place operations to resources the framework holds.
    pub async fn update_allocation(
        &self,
        framework: FrameworkId,
        agent: AgentId,
        consumed: ResourceVector,
        operations: Vec<Operation>,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(
            Command::UpdateAllocation { framework, agent, consumed, operations, ack },
            rx,
        )
        .await
    }

    /// Applies operator-initiated operations to an agent's free slice.
    pub async fn update_available(
        &self,
        agent: AgentId,
        operations: Vec<Operation>,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::UpdateAvailable { agent, operations, ack }, rx).await
    }

    /// Returns resources to the pool; a refuse timeout installs a decline
    /// filter against re-offering the same resources.
    pub async fn recover_resources(
        &self,
        framework: FrameworkId,
        agent: AgentId,
        resources: ResourceVector,
        refuse: Option<Duration>,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(
            Command::RecoverResources { framework, agent, resources, refuse, ack },
            rx,
        )
        .await
    }

    /// A framework's answer to an inverse offer; a refuse timeout
    /// rate-limits further inverse offers for the agent.
    pub async fn update_inverse_offer(
        &self,
        framework: FrameworkId,
        agent: AgentId,
        refuse: Option<Duration>,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::UpdateInverseOffer { framework, agent, refuse, ack }, rx)
            .await
    }

    pub async fn suppress_offers(&self, id: FrameworkId) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::SuppressOffers { id, ack }, rx).await
    }

    pub async fn revive_offers(&self, id: FrameworkId) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::ReviveOffers { id, ack }, rx).await
    }

    pub async fn set_quota(
        &self,
        role: RoleName,
        guarantee: ResourceVector,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::SetQuota { role, guarantee, ack }, rx).await
    }

    pub async fn remove_quota(&self, role: RoleName) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::RemoveQuota { role, ack }, rx).await
    }

    pub async fn update_weights(
        &self,
        weights: Vec<(RoleName, f64)>,
    ) -> Result<(), AllocatorError> {
        let (ack, rx) = oneshot::channel();
        self.execute(Command::UpdateWeights { weights, ack }, rx).await
    }

    /// A state snapshot, consistent because it is taken on the allocator
    /// task between commands.
    pub async fn metrics(&self) -> Result<AllocatorMetrics, AllocatorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Metrics { reply })
            .map_err(|_| AllocatorError::Shutdown)?;
        rx.await.map_err(|_| AllocatorError::Shutdown)
    }

    /// Completes once every previously enqueued mutation has been applied
    /// and any round they requested has run. The test suites' clock
    /// barrier.
    pub async fn settle(&self) -> Result<(), AllocatorError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Settle { reply })
            .map_err(|_| AllocatorError::Shutdown)?;
        rx.await.map_err(|_| AllocatorError::Shutdown)
    }
}

// =============================================================================
// Worker
// =============================================================================

struct Worker {
    state: AllocatorState,
    offer_callback: OfferCallback,
    inverse_offer_callback: InverseOfferCallback,
    round_pending: bool,
}

impl Worker {
    async fn run(
        mut self,
        interval: Duration,
        mut mailbox: mpsc::UnboundedReceiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(interval_ms = interval.as_millis() as u64, "allocator started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick is immediate; there is nothing to allocate yet.
        ticker.tick().await;

        loop {
            if self.round_pending {
                // Collapse whatever is already queued into this round.
                match mailbox.try_recv() {
                    Ok(command) => {
                        self.handle(command);
                        continue;
                    }
                    Err(mpsc::error::TryRecvError::Empty) => {}
                    Err(mpsc::error::TryRecvError::Disconnected) => break,
                }
                self.run_round();
                continue;
            }

            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("allocator shutting down");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.round_pending = true;
                }

                command = mailbox.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => break,
                    }
                }
            }
        }

        debug!(rounds = self.state.rounds_completed(), "allocator stopped");
    }

    fn run_round(&mut self) {
        self.round_pending = false;
        let outcome = self.state.run_round();
        for (framework, bundle) in outcome.offers {
            (self.offer_callback)(framework, bundle);
        }
        for (framework, bundle) in outcome.inverse_offers {
            (self.inverse_offer_callback)(framework, bundle);
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::AddFramework { id, info, used, active, ack } => {
                let result = self.state.add_framework(id, info, used, active);
                self.finish(result, ack, true);
            }
            Command::RemoveFramework { id, ack } => {
                let result = self.state.remove_framework(id);
                self.finish(result, ack, false);
            }
            Command::ActivateFramework { id, ack } => {
                let result = self.state.activate_framework(id);
                self.finish(result, ack, false);
            }
            Command::DeactivateFramework { id, ack } => {
                let result = self.state.deactivate_framework(id);
                self.finish(result, ack, false);
            }
            Command::UpdateFramework { id, info, ack } => {
                let result = self.state.update_framework(id, info);
                self.finish(result, ack, false);
            }
            Command::AddAgent { id, info, unavailability, total, used, ack } => {
                let result = self.state.add_agent(id, info, unavailability, total, used);
                self.finish(result, ack, true);
            }
            Command::RemoveAgent { id, ack } => {
                let result = self.state.remove_agent(id);
                self.finish(result, ack, false);
            }
            Command::UpdateAgent { id, oversubscribed, ack } => {
                let result = self.state.update_agent(id, oversubscribed);
                self.finish(result, ack, true);
            }
            Command::UpdateWhitelist { whitelist, ack } => {
                self.state.update_whitelist(whitelist);
                self.finish(Ok(()), ack, false);
            }
            Command::UpdateUnavailability { id, unavailability, ack } => {
                let result = self.state.update_unavailability(id, unavailability);
                self.finish(result, ack, true);
            }
            Command::RequestResources { id, resources, ack } => {
                self.state.request_resources(id, resources);
                self.finish(Ok(()), ack, false);
            }
            Command::UpdateAllocation { framework, agent, consumed, operations, ack } => {
                let result = self.state.update_allocation(framework, agent, consumed, operations);
                self.finish(result, ack, false);
            }
            Command::UpdateAvailable { agent, operations, ack } => {
                let result = self.state.update_available(agent, operations);
                self.finish(result, ack, false);
            }
            Command::RecoverResources { framework, agent, resources, refuse, ack } => {
                // Recovery without a filter can be re-offered right away.
                let trigger = refuse.is_none();
                self.state.recover_resources(framework, agent, resources, refuse);
                self.finish(Ok(()), ack, trigger);
            }
            Command::UpdateInverseOffer { framework, agent, refuse, ack } => {
                let result = self.state.update_inverse_offer(framework, agent, refuse);
                self.finish(result, ack, false);
            }
            Command::SuppressOffers { id, ack } => {
                let result = self.state.suppress_offers(id);
                self.finish(result, ack, false);
            }
            Command::ReviveOffers { id, ack } => {
                let result = self.state.revive_offers(id);
                self.finish(result, ack, true);
            }
            Command::SetQuota { role, guarantee, ack } => {
                self.state.set_quota(role, guarantee);
                self.finish(Ok(()), ack, false);
            }
            Command::RemoveQuota { role, ack } => {
                self.state.remove_quota(role);
                self.finish(Ok(()), ack, false);
            }
            Command::UpdateWeights { weights, ack } => {
                let trigger = self.state.update_weights(weights);
                self.finish(Ok(()), ack, trigger);
            }
            Command::Metrics { reply } => {
                let _ = reply.send(self.state.metrics());
            }
            Command::Settle { reply } => {
                if self.round_pending {
                    self.run_round();
                }
                let _ = reply.send(());
            }
        }
    }

    /// Acknowledges a mutation; successful ones may request a round.
    fn finish(&mut self, result: Result<(), AllocatorError>, ack: Ack, trigger: bool) {
        if result.is_ok() && trigger {
            self.round_pending = true;
        }
        let _ = ack.send(result);
    }
}
