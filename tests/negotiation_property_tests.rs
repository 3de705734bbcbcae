//! Property-based tests for the discount negotiation state machine
//!
//! Sequences of random events by random actors are driven through
//! `negotiation::transition` and the proposal invariants are checked after
//! every step, whether the step was accepted or refused.

use proptest::prelude::*;
use rust_decimal::Decimal;
use scf_ledger::ScfError;
use scf_ledger::negotiation::{NegotiationEvent, transition};
use scf_ledger::types::{Actor, DiscountProposal, ProposalStatus, ProposalType};

// PROPERTY TEST STRATEGIES

fn proposal_type_strategy() -> impl Strategy<Value = ProposalType> {
    prop::bool::ANY.prop_map(|b| {
        if b {
            ProposalType::AnchorInitiated
        } else {
            ProposalType::ParticipantInitiated
        }
    })
}

/// Amounts in cents, zero and negatives included so the modify guard is hit
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (-10_000i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn event_strategy() -> impl Strategy<Value = NegotiationEvent> {
    prop_oneof![
        Just(NegotiationEvent::Accept),
        Just(NegotiationEvent::Reject),
        amount_strategy().prop_map(|amount| NegotiationEvent::Modify { amount }),
    ]
}

/// The two real parties plus strangers holding a party's id on the wrong side
fn actor_strategy() -> impl Strategy<Value = Actor> {
    prop_oneof![
        Just(Actor::Anchor("A1".into())),
        Just(Actor::Participant("P1".into())),
        Just(Actor::Anchor("P1".into())),
        Just(Actor::Participant("A1".into())),
        Just(Actor::Participant("P2".into())),
    ]
}

fn steps_strategy() -> impl Strategy<Value = Vec<(NegotiationEvent, Actor)>> {
    prop::collection::vec((event_strategy(), actor_strategy()), 1..40)
}

fn opening(amount: Decimal, proposal_type: ProposalType) -> DiscountProposal {
    DiscountProposal::new(
        "D1".into(),
        "A1".into(),
        "P1".into(),
        amount,
        proposal_type,
    )
}

proptest! {
    /// Exactly one status holds at rest and it is never `modified`
    #[test]
    fn status_flags_agree_after_any_sequence(
        cents in 1i64..1_000_000,
        proposal_type in proposal_type_strategy(),
        steps in steps_strategy(),
    ) {
        let mut proposal = opening(Decimal::new(cents, 2), proposal_type);

        for (event, actor) in steps {
            if let Ok(next) = transition(&proposal, &event, &actor) {
                proposal = next;
            }
            let flags = [proposal.accepted(), proposal.rejected(), proposal.modified()];
            prop_assert!(flags.iter().filter(|f| **f).count() <= 1);
            prop_assert!(!proposal.modified());
            prop_assert!(proposal.amount > Decimal::ZERO);
        }
    }

    /// Once accepted or rejected, nothing moves the proposal again
    #[test]
    fn terminal_states_are_final(
        proposal_type in proposal_type_strategy(),
        accept in prop::bool::ANY,
        steps in steps_strategy(),
    ) {
        let proposal = opening(Decimal::from(100), proposal_type);
        let event = if accept { NegotiationEvent::Accept } else { NegotiationEvent::Reject };
        let closed = transition(&proposal, &event, &proposal.counterparty())
            .expect("counterparty may close a pending offer");

        for (event, actor) in steps {
            let err = transition(&closed, &event, &actor).unwrap_err();
            prop_assert!(
                matches!(err, ScfError::InvalidTransition { .. }),
                "expected InvalidTransition, got {}",
                err
            );
        }
    }

    /// Every event either yields a next state or a typed refusal, and a
    /// refusal never depends on anything but the inputs
    #[test]
    fn transition_is_total_and_deterministic(
        proposal_type in proposal_type_strategy(),
        event in event_strategy(),
        actor in actor_strategy(),
    ) {
        let proposal = opening(Decimal::from(100), proposal_type);

        let first = transition(&proposal, &event, &actor);
        let second = transition(&proposal, &event, &actor);
        match (&first, &second) {
            (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            _ => prop_assert!(false, "transition gave different outcomes"),
        }

        if actor != proposal.counterparty() {
            let is_invalid_transition = matches!(first, Err(ScfError::InvalidTransition { .. }));
            prop_assert!(is_invalid_transition);
        }
    }

    /// A valid counter-offer hands the next move to the other side
    #[test]
    fn counter_offer_flips_the_offer(
        proposal_type in proposal_type_strategy(),
        cents in 1i64..1_000_000,
    ) {
        let proposal = opening(Decimal::from(100), proposal_type);
        let amount = Decimal::new(cents, 2);
        let countering = proposal.counterparty();

        let next = transition(&proposal, &NegotiationEvent::Modify { amount }, &countering)
            .expect("counterparty may counter a pending offer");

        prop_assert_eq!(next.status, ProposalStatus::Pending);
        prop_assert_eq!(next.amount, amount);
        prop_assert_eq!(next.proposal_type, proposal_type.flipped());
        prop_assert_eq!(next.proposer(), countering);
        prop_assert_eq!(next.counterparty(), proposal.proposer());
    }

    /// Only a counter-offer moves the amount, and only the counterparty
    /// of the moment ever gets a step through
    #[test]
    fn amount_follows_the_last_counter_offer(
        proposal_type in proposal_type_strategy(),
        steps in steps_strategy(),
    ) {
        let mut proposal = opening(Decimal::from(100), proposal_type);
        let mut expected = proposal.amount;

        for (event, actor) in steps {
            let answering = proposal.counterparty();
            if let Ok(next) = transition(&proposal, &event, &actor) {
                prop_assert_eq!(&actor, &answering);
                if let NegotiationEvent::Modify { amount } = event {
                    expected = amount;
                }
                proposal = next;
            }
            prop_assert_eq!(proposal.amount, expected);
        }
    }
}
