//! Entry point of a discounting negotiation
//!
//! Opening a negotiation only checks that the admin, anchor and participant
//! exist and then writes the first proposal. Every later step (accept,
//! reject, counter-offer) is its own invocation in [`crate::negotiation`],
//! committed separately as the parties act.
use super::error::ScfResult;
use super::ledger::LedgerStore;
use super::proposal;
use super::registry;
use super::types::{DiscountProposal, EntityKind, Identity, ProposalType};
use rust_decimal::Decimal;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountingParties {
    pub admin: Identity,
    pub anchor: Identity,
    pub participant: Identity,
}

/// Terms of the opening offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalTerms {
    pub id: String,
    pub amount: Decimal,
    pub proposal_type: ProposalType,
}

/// Resolves the three parties of a discounting flow. Writes nothing.
pub fn initiate_discounting_flow<L: LedgerStore + ?Sized>(
    ledger: &L,
    admin_id: &str,
    anchor_id: &str,
    participant_id: &str,
) -> ScfResult<DiscountingParties> {
    let parties = DiscountingParties {
        admin: registry::require_identity(ledger, EntityKind::Admin, admin_id)?,
        anchor: registry::require_identity(ledger, EntityKind::Anchor, anchor_id)?,
        participant: registry::require_identity(ledger, EntityKind::Participant, participant_id)?,
    };

    info!(admin_id, anchor_id, participant_id, "Discounting flow authorised");
    Ok(parties)
}

/// Authorises the flow and puts the opening offer on the ledger.
pub fn open_negotiation<L: LedgerStore + ?Sized>(
    ledger: &L,
    admin_id: &str,
    anchor_id: &str,
    participant_id: &str,
    terms: &ProposalTerms,
) -> ScfResult<DiscountProposal> {
    let parties = initiate_discounting_flow(ledger, admin_id, anchor_id, participant_id)?;

    proposal::create_proposal(
        ledger,
        &terms.id,
        &parties.anchor.id,
        &parties.participant.id,
        terms.amount,
        terms.proposal_type,
    )
}
