//! Ledger records and the value types shared by every operation
use super::error::ScfError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace of a ledger key. Every record is stored under `kind:id`, so an
/// anchor and a participant may share an ID without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Admin,
    Anchor,
    Participant,
    Invoice,
    Program,
    Proposal,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Admin,
        EntityKind::Anchor,
        EntityKind::Participant,
        EntityKind::Invoice,
        EntityKind::Program,
        EntityKind::Proposal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Admin => "admin",
            EntityKind::Anchor => "anchor",
            EntityKind::Participant => "participant",
            EntityKind::Invoice => "invoice",
            EntityKind::Program => "program",
            EntityKind::Proposal => "proposal",
        }
    }

    /// Prefix shared by every key of this kind, used for range scans.
    pub fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }

    pub fn key(&self, id: &str) -> String {
        format!("{}:{}", self.as_str(), id)
    }

    pub fn is_identity(&self) -> bool {
        matches!(
            self,
            EntityKind::Admin | EntityKind::Anchor | EntityKind::Participant
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ScfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ScfError::invalid_argument(format!("unknown entity kind '{s}'")))
    }
}

/// Shared shape of admins, anchors and participants. The kind lives in the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
    #[serde(rename = "password")]
    pub credential: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(rename = "participant")]
    pub participant_id: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub rate: Decimal,
    pub participants: Vec<String>,
}

/// Which side currently holds the offer. Flips on every counter-offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalType {
    AnchorInitiated,
    ParticipantInitiated,
}

impl ProposalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalType::AnchorInitiated => "anchor-initiated",
            ProposalType::ParticipantInitiated => "participant-initiated",
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            ProposalType::AnchorInitiated => ProposalType::ParticipantInitiated,
            ProposalType::ParticipantInitiated => ProposalType::AnchorInitiated,
        }
    }
}

impl fmt::Display for ProposalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalType {
    type Err = ScfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anchor-initiated" => Ok(ProposalType::AnchorInitiated),
            "participant-initiated" => Ok(ProposalType::ParticipantInitiated),
            other => Err(ScfError::invalid_argument(format!(
                "unknown proposal type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
    // only seen on records written before counter-offers reopened to pending
    Modified,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Accepted | ProposalStatus::Rejected)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Rejected => "rejected",
            ProposalStatus::Modified => "modified",
        };
        f.write_str(s)
    }
}

/// The party performing a negotiation step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    Anchor(String),
    Participant(String),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::Anchor(id) | Actor::Participant(id) => id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Actor::Anchor(_) => EntityKind::Anchor,
            Actor::Participant(_) => EntityKind::Participant,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

impl FromStr for Actor {
    type Err = ScfError;

    /// Parses `anchor:<id>` or `participant:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("anchor", id)) if !id.is_empty() => Ok(Actor::Anchor(id.to_string())),
            Some(("participant", id)) if !id.is_empty() => {
                Ok(Actor::Participant(id.to_string()))
            }
            _ => Err(ScfError::invalid_argument(format!(
                "actor '{s}' must be anchor:<id> or participant:<id>"
            ))),
        }
    }
}

/// A discount offer between one anchor and one participant.
///
/// `status` is the only stored state. The `accepted`/`rejected`/`modified`
/// flags of the persisted record are computed from it on write and checked
/// against it on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ProposalRecord", try_from = "ProposalRecord")]
pub struct DiscountProposal {
    pub id: String,
    pub anchor_id: String,
    pub participant_id: String,
    pub amount: Decimal,
    pub proposal_type: ProposalType,
    pub status: ProposalStatus,
}

impl DiscountProposal {
    pub fn new(
        id: String,
        anchor_id: String,
        participant_id: String,
        amount: Decimal,
        proposal_type: ProposalType,
    ) -> Self {
        Self {
            id,
            anchor_id,
            participant_id,
            amount,
            proposal_type,
            status: ProposalStatus::Pending,
        }
    }

    pub fn accepted(&self) -> bool {
        self.status == ProposalStatus::Accepted
    }

    pub fn rejected(&self) -> bool {
        self.status == ProposalStatus::Rejected
    }

    pub fn modified(&self) -> bool {
        self.status == ProposalStatus::Modified
    }

    /// The party that made the offer currently on the table.
    pub fn proposer(&self) -> Actor {
        match self.proposal_type {
            ProposalType::AnchorInitiated => Actor::Anchor(self.anchor_id.clone()),
            ProposalType::ParticipantInitiated => Actor::Participant(self.participant_id.clone()),
        }
    }

    /// The party entitled to answer the offer currently on the table.
    pub fn counterparty(&self) -> Actor {
        match self.proposal_type {
            ProposalType::AnchorInitiated => Actor::Participant(self.participant_id.clone()),
            ProposalType::ParticipantInitiated => Actor::Anchor(self.anchor_id.clone()),
        }
    }
}

// Wire shape of a proposal, field for field with existing ledger history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProposalRecord {
    id: String,
    anchor: String,
    participant: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    amount: Decimal,
    accepted: bool,
    rejected: bool,
    modified: bool,
    #[serde(rename = "proposalType")]
    proposal_type: ProposalType,
    #[serde(rename = "proposalStatus")]
    proposal_status: ProposalStatus,
}

impl From<DiscountProposal> for ProposalRecord {
    fn from(p: DiscountProposal) -> Self {
        Self {
            accepted: p.accepted(),
            rejected: p.rejected(),
            modified: p.modified(),
            id: p.id,
            anchor: p.anchor_id,
            participant: p.participant_id,
            amount: p.amount,
            proposal_type: p.proposal_type,
            proposal_status: p.status,
        }
    }
}

impl TryFrom<ProposalRecord> for DiscountProposal {
    type Error = String;

    fn try_from(r: ProposalRecord) -> Result<Self, Self::Error> {
        let s = r.proposal_status;
        let expected = (
            s == ProposalStatus::Accepted,
            s == ProposalStatus::Rejected,
            s == ProposalStatus::Modified,
        );
        if (r.accepted, r.rejected, r.modified) != expected {
            return Err(format!(
                "flags accepted={} rejected={} modified={} disagree with status {s}",
                r.accepted, r.rejected, r.modified
            ));
        }

        Ok(Self {
            id: r.id,
            anchor_id: r.anchor,
            participant_id: r.participant,
            amount: r.amount,
            proposal_type: r.proposal_type,
            status: s,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> DiscountProposal {
        DiscountProposal::new(
            "D1".into(),
            "A1".into(),
            "P1".into(),
            Decimal::from(100),
            ProposalType::AnchorInitiated,
        )
    }

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(EntityKind::Anchor.key("X"), "anchor:X");
        assert_eq!(EntityKind::Participant.key("X"), "participant:X");
        assert_ne!(EntityKind::Anchor.key("X"), EntityKind::Participant.key("X"));
    }

    #[test]
    fn proposal_json_uses_ledger_field_names() {
        let json = serde_json::to_value(proposal()).unwrap();

        assert_eq!(json["anchor"], "A1");
        assert_eq!(json["participant"], "P1");
        assert_eq!(json["amount"], 100.0);
        assert_eq!(json["proposalType"], "anchor-initiated");
        assert_eq!(json["proposalStatus"], "pending");
        assert_eq!(json["accepted"], false);
        assert_eq!(json["rejected"], false);
        assert_eq!(json["modified"], false);
    }

    #[test]
    fn flags_follow_status() {
        let mut p = proposal();
        p.status = ProposalStatus::Accepted;
        let json = serde_json::to_value(&p).unwrap();

        assert_eq!(json["accepted"], true);
        assert_eq!(json["rejected"], false);
    }

    #[test]
    fn disagreeing_flags_are_rejected() {
        let raw = r#"{"id":"D1","anchor":"A1","participant":"P1","amount":10,
            "accepted":true,"rejected":false,"modified":false,
            "proposalType":"anchor-initiated","proposalStatus":"pending"}"#;

        assert!(serde_json::from_str::<DiscountProposal>(raw).is_err());
    }

    #[test]
    fn counterparty_follows_direction() {
        let mut p = proposal();
        assert_eq!(p.counterparty(), Actor::Participant("P1".into()));
        assert_eq!(p.proposer(), Actor::Anchor("A1".into()));

        p.proposal_type = p.proposal_type.flipped();
        assert_eq!(p.counterparty(), Actor::Anchor("A1".into()));
    }

    #[test]
    fn actor_parsing() {
        assert_eq!(
            "anchor:A1".parse::<Actor>().unwrap(),
            Actor::Anchor("A1".into())
        );
        assert_eq!(
            "participant:P1".parse::<Actor>().unwrap().to_string(),
            "participant:P1"
        );
        assert!("admin:X".parse::<Actor>().is_err());
        assert!("anchor:".parse::<Actor>().is_err());
        assert!("A1".parse::<Actor>().is_err());
    }

    #[test]
    fn proposal_type_parsing() {
        assert_eq!(
            "participant-initiated".parse::<ProposalType>().unwrap(),
            ProposalType::ParticipantInitiated
        );
        assert!("top-down".parse::<ProposalType>().is_err());
    }
}
