//! Storage of discount proposals and their audit trail
use super::error::{ScfError, ScfResult};
use super::ledger::{self, LedgerStore, TimeStamp};
use super::registry;
use super::types::{Actor, DiscountProposal, EntityKind, ProposalType};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

/// A committed version of a proposal as read back from the ledger history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalSnapshot {
    pub version: u64,
    pub tx_id: String,
    pub timestamp: TimeStamp<Utc>,
    pub proposal: DiscountProposal,
}

/// Opens a pending proposal between an existing anchor and participant.
pub fn create_proposal<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
    anchor_id: &str,
    participant_id: &str,
    amount: Decimal,
    proposal_type: ProposalType,
) -> ScfResult<DiscountProposal> {
    registry::ensure_id(EntityKind::Proposal, id)?;
    if amount <= Decimal::ZERO {
        return Err(ScfError::invalid_argument(format!(
            "proposal amount {amount} must be positive"
        )));
    }
    registry::require_identity(ledger, EntityKind::Anchor, anchor_id)?;
    registry::require_identity(ledger, EntityKind::Participant, participant_id)?;

    let proposal = DiscountProposal::new(
        id.to_string(),
        anchor_id.to_string(),
        participant_id.to_string(),
        amount,
        proposal_type,
    );
    ledger::insert_record(ledger, EntityKind::Proposal, id, &proposal)?;

    info!(
        id,
        anchor_id,
        participant_id,
        %amount,
        proposal_type = %proposal_type,
        "Opened discount proposal"
    );
    Ok(proposal)
}

pub fn get_proposal<L: LedgerStore + ?Sized>(ledger: &L, id: &str) -> ScfResult<DiscountProposal> {
    let (proposal, _) = load(ledger, id)?;
    Ok(proposal)
}

/// Reads a proposal with the version the next write must be based on.
pub(crate) fn load<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
) -> ScfResult<(DiscountProposal, u64)> {
    ledger::load_record(ledger, EntityKind::Proposal, id)
}

/// Overwrites a proposal read at `expected_version`. Only the negotiation
/// state machine writes through here.
pub(crate) fn save<L: LedgerStore + ?Sized>(
    ledger: &L,
    proposal: &DiscountProposal,
    expected_version: u64,
) -> ScfResult<u64> {
    ledger::replace_record(
        ledger,
        EntityKind::Proposal,
        &proposal.id,
        proposal,
        expected_version,
    )
}

pub fn list_proposals<L: LedgerStore + ?Sized>(ledger: &L) -> ScfResult<Vec<DiscountProposal>> {
    ledger
        .scan_prefix(&EntityKind::Proposal.prefix())?
        .into_iter()
        .map(|(key, found)| ledger::decode_record(&key, &found.value))
        .collect()
}

/// Proposals where `party` is the anchor or the participant.
pub fn list_proposals_for<L: LedgerStore + ?Sized>(
    ledger: &L,
    party: &Actor,
) -> ScfResult<Vec<DiscountProposal>> {
    let mut proposals = list_proposals(ledger)?;
    proposals.retain(|p| match party {
        Actor::Anchor(id) => &p.anchor_id == id,
        Actor::Participant(id) => &p.participant_id == id,
    });
    Ok(proposals)
}

/// Every committed version of a proposal, oldest first. The digest chain is
/// verified before anything is decoded.
pub fn proposal_history<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
) -> ScfResult<Vec<ProposalSnapshot>> {
    let key = EntityKind::Proposal.key(id);
    let entries = ledger.history(&key)?;
    if entries.is_empty() {
        return Err(ScfError::NotFound {
            kind: EntityKind::Proposal,
            id: id.to_string(),
        });
    }
    ledger::verify_history(&key, &entries)?;

    entries
        .into_iter()
        .map(|entry| {
            Ok(ProposalSnapshot {
                proposal: ledger::decode_record(&key, &entry.value)?,
                version: entry.version,
                tx_id: entry.tx_id,
                timestamp: entry.timestamp,
            })
        })
        .collect()
}
