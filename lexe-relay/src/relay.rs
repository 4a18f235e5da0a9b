//! The per-payment relay state machine (§4.1): one instance per inbound
//! trampoline payment, driven by a private mailbox and the handles of
//! whichever external collaborator is active in the current state.
//!
//! Mirrors the teacher's actor convention (a struct owning its mailbox
//! receiver plus a `run`/`start` loop built on `tokio::select!`, e.g.
//! `node/src/inactivity_timer.rs`) rather than a full actor-framework
//! runtime, since §9 asks for "a tagged variant for current state plus a
//! single-threaded loop that consumes typed messages from a channel."

use std::time::Instant;

use common::ln::{
    amount::Amount,
    node_id::NodePk,
    payments::{LxPaymentHash, LxPaymentSecret},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    collaborators::{
        AggregatorEvent, AggregatorHandle, AsyncPaymentTriggerer, BlindedPathResolver, ChainTip,
        ExecutorEvent, OutboundExecutorFactory, OutboundExecutorHandle, RelayEventBus,
        TriggerEvent, TriggerHandle, UpstreamRegister,
    },
    config::RelayConfig,
    dispatch::{self, RouterExperimentConfig},
    events::{RelayEvent, TrampolinePaymentRelayed, WaitingToRelayPayment},
    failure::{self, InvariantViolation, UpstreamFailure},
    htlc::{IncomingHtlcRecord, UpstreamSet},
    ids::RelayId,
    instructions::RelayInstructions,
    metrics,
    settlement,
    validation::{self, UpstreamTotals},
};

/// The decrypted onion-layer packet for one inbound HTLC belonging to this
/// relay's MPP set (§6 "Relay(node_relay_packet)").
#[derive(Clone, Debug)]
pub struct NodeRelayPacket {
    pub payment_hash: LxPaymentHash,
    pub payment_secret: LxPaymentSecret,
    pub total_amount: Amount,
    pub htlc: IncomingHtlcRecord,
    pub instructions: RelayInstructions,
}

/// Messages a relay instance's mailbox accepts (§6 "Messages consumed").
#[derive(Debug)]
pub enum RelayMsg {
    Relay(NodeRelayPacket),
    Stop,
}

/// Published to the parent dispatcher exactly once, on entering `Stopping`
/// (§6 "Messages emitted", §9 "Parent/child lifecycle").
#[derive(Copy, Clone, Debug)]
pub struct RelayComplete {
    pub payment_hash: LxPaymentHash,
    pub payment_secret: LxPaymentSecret,
}

/// The relay's internal state (§4.1). Each variant owns the handle of
/// whichever collaborator is active while the relay is in that state; the
/// accumulated upstream HTLC set lives on [`Relay`] itself since it's read
/// from every state, including `Stopping`'s settlement calls.
enum State<Agg, ExecH, TrigH, ResH> {
    Receiving {
        instructions: RelayInstructions,
        aggregator: Agg,
    },
    WaitingForAsyncTrigger {
        instructions: RelayInstructions,
        totals: UpstreamTotals,
        trigger: TrigH,
    },
    ResolvingBlindedPaths {
        instructions: RelayInstructions,
        totals: UpstreamTotals,
        resolver: ResH,
    },
    Sending {
        executor: ExecH,
        /// The declared next hop, for failure-translation privacy (§4.4,
        /// §8 invariant 6): `None` for `ToBlindedPaths`.
        outgoing_node_id: Option<NodePk>,
        offered_fee: Amount,
        min_trampoline_fee: Amount,
        started_at: Instant,
        fulfilled_upstream: bool,
    },
    Stopping,
}

/// One per-payment trampoline relay instance.
///
/// Generic over every external collaborator (§1, §6) so it can be driven
/// against in-memory mocks in tests without a real channel manager, router,
/// or persistence layer, matching the teacher's
/// `PaymentsManager<CM: LexeChannelManager<PS>, PS: LexePersister>` pattern.
pub struct Relay<Agg, Reg, Fac, Trig, Resolver, Bus, Tip, Rng>
where
    Agg: AggregatorHandle,
    Reg: UpstreamRegister,
    Fac: OutboundExecutorFactory,
    Trig: AsyncPaymentTriggerer,
    Resolver: BlindedPathResolver,
    Bus: RelayEventBus,
    Tip: ChainTip,
    Rng: common::rng::Crng,
{
    relay_id: RelayId,
    payment_hash: LxPaymentHash,
    payment_secret: LxPaymentSecret,
    upstream: UpstreamSet,
    state: State<Agg, Fac::Handle, Trig::Handle, Resolver::Handle>,
    mailbox: mpsc::Receiver<RelayMsg>,
    parent_tx: mpsc::Sender<RelayComplete>,
    register: Reg,
    executor_factory: Fac,
    triggerer: Trig,
    resolver: Resolver,
    event_bus: Bus,
    chain_tip: Tip,
    config: RelayConfig,
    experiment: RouterExperimentConfig,
    rng: Rng,
}

impl<Agg, Reg, Fac, Trig, Resolver, Bus, Tip, Rng>
    Relay<Agg, Reg, Fac, Trig, Resolver, Bus, Tip, Rng>
where
    Agg: AggregatorHandle,
    Reg: UpstreamRegister,
    Fac: OutboundExecutorFactory,
    Trig: AsyncPaymentTriggerer,
    Resolver: BlindedPathResolver,
    Bus: RelayEventBus,
    Tip: ChainTip,
    Rng: common::rng::Crng,
{
    /// Constructs a new relay instance from the first inbound HTLC of a
    /// payment (§2 "created by a parent dispatcher when the first HTLC of a
    /// new payment ... arrives").
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        relay_id: RelayId,
        first: NodeRelayPacket,
        mut aggregator: Agg,
        mailbox: mpsc::Receiver<RelayMsg>,
        parent_tx: mpsc::Sender<RelayComplete>,
        register: Reg,
        executor_factory: Fac,
        triggerer: Trig,
        resolver: Resolver,
        event_bus: Bus,
        chain_tip: Tip,
        config: RelayConfig,
        experiment: RouterExperimentConfig,
        rng: Rng,
    ) -> Self {
        let mut upstream = UpstreamSet::new();
        upstream.push(first.htlc.clone());
        aggregator.push(first.htlc);

        Self {
            relay_id,
            payment_hash: first.payment_hash,
            payment_secret: first.payment_secret,
            upstream,
            state: State::Receiving {
                instructions: first.instructions,
                aggregator,
            },
            mailbox,
            parent_tx,
            register,
            executor_factory,
            triggerer,
            resolver,
            event_bus,
            chain_tip,
            config,
            experiment,
            rng,
        }
    }

    pub fn relay_id(&self) -> RelayId {
        self.relay_id
    }

    /// Spawns this relay instance's [`run`](Self::run) loop as a named,
    /// joinable task (§5 "Multiple relay instances run concurrently under
    /// the parent dispatcher"), using the teacher's standard structured-
    /// concurrency wrapper instead of a bare `tokio::spawn`.
    pub fn spawn(self) -> lexe_tokio::task::LxTask<Result<(), InvariantViolation>>
    where
        Agg: 'static,
        Reg: 'static,
        Fac: 'static,
        Trig: 'static,
        Resolver: 'static,
        Bus: 'static,
        Tip: 'static,
        Rng: Send + 'static,
        Fac::Handle: 'static,
        Trig::Handle: 'static,
        Resolver::Handle: 'static,
    {
        let payment_hash = self.payment_hash;
        lexe_tokio::task::LxTask::spawn(
            format!("trampoline-relay-{payment_hash}"),
            self.run(),
        )
    }

    /// Drives the relay to completion: runs the state machine until
    /// `Stopping`, notifies the parent exactly once (§6), then drains any
    /// stray messages until the parent's `Stop` arrives (§9 "the instance
    /// must tolerate stray messages arriving between those two events").
    #[instrument(skip_all, fields(payment_hash = %self.payment_hash), name = "(trampoline-relay)")]
    pub async fn run(mut self) -> Result<(), InvariantViolation> {
        loop {
            let current = std::mem::replace(&mut self.state, State::Stopping);
            self.state = match current {
                State::Receiving {
                    instructions,
                    aggregator,
                } => self.step_receiving(instructions, aggregator).await?,
                State::WaitingForAsyncTrigger {
                    instructions,
                    totals,
                    trigger,
                } => self.step_waiting(instructions, totals, trigger).await?,
                State::ResolvingBlindedPaths {
                    instructions,
                    totals,
                    resolver,
                } => self.step_resolving(instructions, totals, resolver).await?,
                State::Sending {
                    executor,
                    outgoing_node_id,
                    offered_fee,
                    min_trampoline_fee,
                    started_at,
                    fulfilled_upstream,
                } => {
                    self.step_sending(
                        executor,
                        outgoing_node_id,
                        offered_fee,
                        min_trampoline_fee,
                        started_at,
                        fulfilled_upstream,
                    )
                    .await?
                }
                State::Stopping => break,
            };
        }

        let complete = RelayComplete {
            payment_hash: self.payment_hash,
            payment_secret: self.payment_secret,
        };
        if self.parent_tx.send(complete).await.is_err() {
            warn!("Parent dropped before RelayComplete could be delivered");
        }

        self.drain_until_stop().await;
        Ok(())
    }

    async fn drain_until_stop(&mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                RelayMsg::Relay(packet) => self.reject_stray(packet.htlc).await,
                RelayMsg::Stop => break,
            }
        }
    }

    /// Rejects a late-arriving HTLC individually, leaving the rest of the
    /// relay's state untouched (§4.1 "Any state, extra HTLC arrival", §4.5
    /// "Extra HTLC").
    async fn reject_stray(&self, htlc: IncomingHtlcRecord) {
        settlement::fail_stray(&self.register, &htlc, &self.chain_tip).await;
    }

    /// Asserts the programming invariant that every inbound HTLC of this
    /// relay's MPP set carries the identical payment-secret (§3, §8
    /// invariant 3). A mismatch is a parent-dispatcher bug, not something
    /// this instance can recover from.
    fn check_payment_secret(&self, packet: &NodeRelayPacket) -> Result<(), InvariantViolation> {
        if packet.payment_secret != self.payment_secret {
            error!(
                "Payment-secret mismatch on inbound HTLC: parent-dispatcher bug \
                 routed a part of a different MPP set to this relay instance"
            );
            return Err(InvariantViolation::PaymentSecretMismatch);
        }
        Ok(())
    }

    async fn step_receiving(
        &mut self,
        instructions: RelayInstructions,
        mut aggregator: Agg,
    ) -> Result<State<Agg, Fac::Handle, Trig::Handle, Resolver::Handle>, InvariantViolation> {
        loop {
            tokio::select! {
                msg = self.mailbox.recv() => match msg {
                    Some(RelayMsg::Relay(packet)) => {
                        self.check_payment_secret(&packet)?;
                        self.upstream.push(packet.htlc.clone());
                        aggregator.push(packet.htlc);
                    }
                    Some(RelayMsg::Stop) | None => {
                        // A forced stop before the inbound set even
                        // completed; leave any accumulated HTLCs to the
                        // channel-level resolution layer (§9 "Persistence
                        // boundary").
                        return Ok(State::Stopping);
                    }
                },
                event = aggregator.recv() => match event {
                    AggregatorEvent::ExtraPart => {
                        debug!("Aggregator acknowledged another part; still accumulating");
                    }
                    AggregatorEvent::Failed { reason } => {
                        settlement::fail_all(&self.register, &self.upstream, reason.clone()).await;
                        metrics::record_relay_failure(&reason);
                        return Ok(State::Stopping);
                    }
                    AggregatorEvent::Succeeded => {
                        let totals = UpstreamTotals {
                            amount_in: self.upstream.amount_in(),
                            expiry_in: self.upstream
                                .expiry_in()
                                .expect("aggregator reported success on a non-empty set"),
                        };
                        let current_height = self.chain_tip.current_height();
                        match validation::validate(totals, &instructions, &self.config, current_height) {
                            Err(failure) => {
                                settlement::fail_all(&self.register, &self.upstream, failure.clone()).await;
                                metrics::record_relay_failure(&failure);
                                return Ok(State::Stopping);
                            }
                            Ok(()) => return Ok(self.enter_post_validation(instructions, totals).await),
                        }
                    }
                },
            }
        }
    }

    /// Branches on the validated instructions to decide the next state:
    /// an async-payment hold, blinded-path resolution, or immediate
    /// dispatch (§4.1 Receiving's third bullet).
    async fn enter_post_validation(
        &mut self,
        instructions: RelayInstructions,
        totals: UpstreamTotals,
    ) -> State<Agg, Fac::Handle, Trig::Handle, Resolver::Handle> {
        match &instructions {
            RelayInstructions::ToTrampoline {
                outgoing_node_id,
                is_async_payment: true,
                ..
            } if self.config.async_payments_supported => {
                let hold_timeout_from_now =
                    self.chain_tip.current_height() + self.config.async_payment_hold_timeout_blocks;
                let cancel_safety_bound = totals
                    .expiry_in
                    .saturating_sub(self.config.async_payment_cancel_safety_delta);
                let deadline_block = hold_timeout_from_now.min(cancel_safety_bound);

                let trigger = self
                    .triggerer
                    .watch(*outgoing_node_id, self.relay_id, deadline_block)
                    .await;

                self.event_bus
                    .publish(RelayEvent::WaitingToRelayPayment(WaitingToRelayPayment {
                        outgoing_node_id: *outgoing_node_id,
                        payment_hash: self.payment_hash,
                    }));

                State::WaitingForAsyncTrigger {
                    instructions,
                    totals,
                    trigger,
                }
            }
            RelayInstructions::ToBlindedPaths {
                outgoing_blinded_paths,
                ..
            } => {
                let resolver = self.resolver.resolve(outgoing_blinded_paths.clone()).await;
                State::ResolvingBlindedPaths {
                    instructions,
                    totals,
                    resolver,
                }
            }
            _ => self.spawn_sending(instructions, totals, None).await,
        }
    }

    async fn step_waiting(
        &mut self,
        instructions: RelayInstructions,
        totals: UpstreamTotals,
        trigger: Trig::Handle,
    ) -> Result<State<Agg, Fac::Handle, Trig::Handle, Resolver::Handle>, InvariantViolation> {
        let recv_fut = trigger.recv();
        tokio::pin!(recv_fut);
        loop {
            tokio::select! {
                msg = self.mailbox.recv() => match msg {
                    Some(RelayMsg::Relay(packet)) => {
                        self.check_payment_secret(&packet)?;
                        self.reject_stray(packet.htlc).await;
                    }
                    Some(RelayMsg::Stop) | None => return Ok(State::Stopping),
                },
                event = &mut recv_fut => {
                    return Ok(match event {
                        TriggerEvent::Triggered =>
                            self.spawn_sending(instructions, totals, None).await,
                        TriggerEvent::Timeout | TriggerEvent::Canceled => {
                            let failure = UpstreamFailure::async_unavailable();
                            settlement::fail_all(&self.register, &self.upstream, failure.clone()).await;
                            metrics::record_relay_failure(&failure);
                            State::Stopping
                        }
                    });
                }
            }
        }
    }

    async fn step_resolving(
        &mut self,
        instructions: RelayInstructions,
        totals: UpstreamTotals,
        resolver: Resolver::Handle,
    ) -> Result<State<Agg, Fac::Handle, Trig::Handle, Resolver::Handle>, InvariantViolation> {
        let recv_fut = resolver.recv();
        tokio::pin!(recv_fut);
        loop {
            tokio::select! {
                msg = self.mailbox.recv() => match msg {
                    Some(RelayMsg::Relay(packet)) => {
                        self.check_payment_secret(&packet)?;
                        self.reject_stray(packet.htlc).await;
                    }
                    Some(RelayMsg::Stop) | None => return Ok(State::Stopping),
                },
                paths = &mut recv_fut => {
                    return Ok(if paths.is_empty() {
                        let failure = UpstreamFailure::UnknownNextPeer;
                        settlement::fail_all(&self.register, &self.upstream, failure.clone()).await;
                        metrics::record_relay_failure(&failure);
                        State::Stopping
                    } else {
                        self.spawn_sending(instructions, totals, Some(paths)).await
                    });
                }
            }
        }
    }

    async fn spawn_sending(
        &mut self,
        instructions: RelayInstructions,
        totals: UpstreamTotals,
        resolved_paths: Option<Vec<common::ln::route::LxRoute>>,
    ) -> State<Agg, Fac::Handle, Trig::Handle, Resolver::Handle> {
        let outgoing_node_id = match &instructions {
            RelayInstructions::ToTrampoline {
                outgoing_node_id, ..
            } => Some(*outgoing_node_id),
            // Never attribute a remote failure to a blinded relay's next
            // hop (§4.4, §8 invariant 6).
            RelayInstructions::ToBlindedPaths { .. } => None,
        };
        let offered_fee = totals
            .amount_in
            .checked_sub(instructions.amount_to_forward())
            .expect("validation guarantees amount_in > amount_to_forward");
        let min_trampoline_fee = self
            .config
            .min_trampoline_fee
            .min_fee(instructions.amount_to_forward());

        let plan = dispatch::plan_dispatch(
            self.relay_id,
            totals,
            &instructions,
            resolved_paths,
            self.experiment.clone(),
            &self.config,
            &mut self.rng,
        );

        info!(
            multi_part = plan.multi_part,
            "Spawning outbound trampoline relay attempt"
        );

        let executor = self
            .executor_factory
            .spawn(self.relay_id, plan.config, plan.multi_part)
            .await;

        State::Sending {
            executor,
            outgoing_node_id,
            offered_fee,
            min_trampoline_fee,
            started_at: Instant::now(),
            fulfilled_upstream: false,
        }
    }

    async fn step_sending(
        &mut self,
        mut executor: Fac::Handle,
        outgoing_node_id: Option<NodePk>,
        offered_fee: Amount,
        min_trampoline_fee: Amount,
        started_at: Instant,
        mut fulfilled_upstream: bool,
    ) -> Result<State<Agg, Fac::Handle, Trig::Handle, Resolver::Handle>, InvariantViolation> {
        loop {
            tokio::select! {
                msg = self.mailbox.recv() => match msg {
                    Some(RelayMsg::Relay(packet)) => {
                        self.check_payment_secret(&packet)?;
                        self.reject_stray(packet.htlc).await;
                    }
                    Some(RelayMsg::Stop) | None => return Ok(State::Stopping),
                },
                event = executor.recv() => {
                    match event {
                        Some(ExecutorEvent::PreimageReceived(preimage)) => {
                            // §8 invariant 7: idempotent fulfill. A second
                            // `PreimageReceived` (or the preimage re-arriving
                            // on `PaymentSent`) must not re-fulfill.
                            if !fulfilled_upstream {
                                settlement::fulfill_all(&self.register, &self.upstream, preimage).await;
                                fulfilled_upstream = true;
                            }
                        }
                        Some(ExecutorEvent::PaymentSent {
                            preimage,
                            parts,
                            recipient_node_id,
                            recipient_amount,
                        }) => {
                            if !fulfilled_upstream {
                                settlement::fulfill_all(&self.register, &self.upstream, preimage).await;
                                fulfilled_upstream = true;
                            }
                            self.event_bus.publish(RelayEvent::TrampolinePaymentRelayed(
                                TrampolinePaymentRelayed {
                                    payment_hash: self.payment_hash,
                                    incoming_parts: self.upstream.htlcs().iter().map(|h| h.amount).collect(),
                                    outgoing_parts: parts,
                                    recipient_node_id,
                                    recipient_amount,
                                },
                            ));
                            metrics::record_relay_duration(started_at.elapsed(), true);
                            return Ok(State::Stopping);
                        }
                        Some(ExecutorEvent::PaymentFailed { failures }) => {
                            // §8 invariant: once fulfilled upstream, never
                            // fail upstream under any downstream outcome.
                            if !fulfilled_upstream {
                                let failure = failure::translate_downstream_failure(
                                    &failures,
                                    offered_fee,
                                    min_trampoline_fee,
                                    outgoing_node_id,
                                );
                                settlement::fail_all(&self.register, &self.upstream, failure.clone()).await;
                                metrics::record_relay_failure(&failure);
                            }
                            metrics::record_relay_duration(started_at.elapsed(), fulfilled_upstream);
                            return Ok(State::Stopping);
                        }
                        None => {
                            error!("Outbound executor handle closed without a terminal event");
                            metrics::record_relay_duration(started_at.elapsed(), fulfilled_upstream);
                            return Ok(State::Stopping);
                        }
                    }
                }
            }
        }
    }
}
