//! Negotiation state machine for discount proposals
//!
//! | From    | Event         | Actor                  | To                   |
//! |---------|---------------|------------------------|----------------------|
//! | pending | Accept        | counterparty of offer  | accepted             |
//! | pending | Reject        | counterparty of offer  | rejected             |
//! | pending | Modify(x > 0) | counterparty of offer  | modified -> pending  |
//! | accepted / rejected | any | -                    | `InvalidTransition`  |
//!
//! A modify replaces the amount and flips `proposal_type`, so the party that
//! just countered now waits on the other side. Every step is read, validate,
//! write-if-unchanged; a concurrent writer makes the loser fail with
//! `Conflict`.
use super::error::{ScfError, ScfResult};
use super::ledger::LedgerStore;
use super::proposal;
use super::types::{Actor, DiscountProposal, ProposalStatus};
use rust_decimal::Decimal;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationEvent {
    Accept,
    Reject,
    Modify { amount: Decimal },
}

impl NegotiationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NegotiationEvent::Accept => "accept",
            NegotiationEvent::Reject => "reject",
            NegotiationEvent::Modify { .. } => "modify",
        }
    }
}

/// Computes the state that follows `event` by `actor`. Pure: the caller
/// decides whether to persist.
pub fn transition(
    proposal: &DiscountProposal,
    event: &NegotiationEvent,
    actor: &Actor,
) -> ScfResult<DiscountProposal> {
    if proposal.status.is_terminal() {
        return Err(ScfError::invalid_transition(
            &proposal.id,
            format!("cannot {} a proposal that is {}", event.name(), proposal.status),
        ));
    }

    let expected = proposal.counterparty();
    if *actor != expected {
        return Err(ScfError::invalid_transition(
            &proposal.id,
            format!(
                "{actor} may not {} a {} offer, only {expected} may",
                event.name(),
                proposal.proposal_type
            ),
        ));
    }

    let mut next = proposal.clone();
    match event {
        NegotiationEvent::Accept => next.status = ProposalStatus::Accepted,
        NegotiationEvent::Reject => next.status = ProposalStatus::Rejected,
        NegotiationEvent::Modify { amount } => {
            if *amount <= Decimal::ZERO {
                return Err(ScfError::invalid_argument(format!(
                    "counter-offer amount {amount} must be positive"
                )));
            }
            next.amount = *amount;
            next.status = ProposalStatus::Modified;
            reopen(&mut next);
        }
    }
    Ok(next)
}

// modified is never at rest: the counter-offer goes back on the table
// with the countering party as proposer
fn reopen(proposal: &mut DiscountProposal) {
    proposal.proposal_type = proposal.proposal_type.flipped();
    proposal.status = ProposalStatus::Pending;
}

/// Applies one negotiation step and commits it as a single ledger write.
pub fn apply<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
    event: NegotiationEvent,
    actor: &Actor,
) -> ScfResult<DiscountProposal> {
    let (current, version) = proposal::load(ledger, id)?;

    let next = transition(&current, &event, actor).inspect_err(|err| {
        warn!(id, %actor, event = event.name(), %err, "Refused negotiation step");
    })?;
    proposal::save(ledger, &next, version)?;

    info!(
        id,
        %actor,
        event = event.name(),
        from = %current.status,
        to = %next.status,
        amount = %next.amount,
        "Negotiation step committed"
    );
    Ok(next)
}

pub fn accept<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
    actor: &Actor,
) -> ScfResult<DiscountProposal> {
    apply(ledger, id, NegotiationEvent::Accept, actor)
}

pub fn reject<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
    actor: &Actor,
) -> ScfResult<DiscountProposal> {
    apply(ledger, id, NegotiationEvent::Reject, actor)
}

pub fn modify<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
    actor: &Actor,
    amount: Decimal,
) -> ScfResult<DiscountProposal> {
    apply(ledger, id, NegotiationEvent::Modify { amount }, actor)
}

/// Reruns `step` while it loses write races, up to `attempts` times in total.
/// `step` must load the proposal itself, so a rerun that has become illegal
/// fails with its real error instead of `Conflict`.
pub fn retry_conflicts<T>(
    attempts: usize,
    mut step: impl FnMut() -> ScfResult<T>,
) -> ScfResult<T> {
    let mut remaining = attempts.max(1);
    loop {
        match step() {
            Err(err) if err.is_retryable() && remaining > 1 => {
                remaining -= 1;
                warn!(%err, remaining, "Retrying after conflict");
            }
            other => return other,
        }
    }
}
