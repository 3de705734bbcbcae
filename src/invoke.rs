//! Named-operation surface: one function name plus string arguments in, a
//! JSON value or a typed error out. Every call is independent; the ledger is
//! passed in each time and nothing is kept between calls.
use super::error::{ScfError, ScfResult};
use super::flow::{self, ProposalTerms};
use super::ledger::LedgerStore;
use super::negotiation;
use super::proposal;
use super::registry;
use super::types::{Actor, EntityKind, ProposalType};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Value, json};
use std::str::FromStr;
use tracing::debug;

/// Function names accepted by [`invoke`].
pub const FUNCTIONS: &[&str] = &[
    "Init",
    "AddAdmin",
    "GetAdmin",
    "AddAnchor",
    "GetAnchor",
    "AddParticipant",
    "GetParticipant",
    "AddInvoice",
    "GetInvoice",
    "PayInvoice",
    "CreateProgram",
    "GetProgram",
    "CreateDiscountProposal",
    "GetDiscountProposal",
    "GetDiscountProposalHistory",
    "ListDiscountProposals",
    "AcceptDiscountProposal",
    "RejectDiscountProposal",
    "ModifyDiscountProposal",
    "InitiateDiscountingFlow",
];

pub fn invoke<L: LedgerStore + ?Sized>(
    ledger: &L,
    function: &str,
    args: &[String],
) -> ScfResult<Value> {
    debug!(function, argc = args.len(), "Invoking");
    let a: Vec<&str> = args.iter().map(String::as_str).collect();

    match function {
        "Init" => {
            arity(function, &a, 0)?;
            Ok(Value::Null)
        }
        "AddAdmin" | "AddAnchor" | "AddParticipant" => {
            arity(function, &a, 3)?;
            let kind = identity_kind(function);
            to_json(&registry::create_identity(ledger, kind, a[0], a[1], a[2])?)
        }
        "GetAdmin" | "GetAnchor" | "GetParticipant" => {
            arity(function, &a, 1)?;
            let kind = identity_kind(function);
            to_json(&registry::get_identity(ledger, kind, a[0])?)
        }
        "AddInvoice" => {
            arity(function, &a, 3)?;
            let amount = parse_decimal("amount", a[2])?;
            to_json(&registry::create_invoice(ledger, a[0], a[1], amount)?)
        }
        "GetInvoice" => {
            arity(function, &a, 1)?;
            to_json(&registry::get_invoice(ledger, a[0])?)
        }
        "PayInvoice" => {
            arity(function, &a, 1)?;
            to_json(&registry::pay_invoice(ledger, a[0])?)
        }
        "CreateProgram" => {
            arity(function, &a, 5)?;
            let rate = parse_decimal("rate", a[3])?;
            let participants: Vec<String> = serde_json::from_str(a[4]).map_err(|e| {
                ScfError::invalid_argument(format!("participants must be a JSON array: {e}"))
            })?;
            to_json(&registry::create_program(
                ledger,
                a[0],
                a[1],
                a[2],
                rate,
                participants,
            )?)
        }
        "GetProgram" => {
            arity(function, &a, 1)?;
            to_json(&registry::get_program(ledger, a[0])?)
        }
        "CreateDiscountProposal" => {
            arity(function, &a, 5)?;
            let amount = parse_decimal("amount", a[3])?;
            let proposal_type = ProposalType::from_str(a[4])?;
            to_json(&proposal::create_proposal(
                ledger,
                a[0],
                a[1],
                a[2],
                amount,
                proposal_type,
            )?)
        }
        "GetDiscountProposal" => {
            arity(function, &a, 1)?;
            to_json(&proposal::get_proposal(ledger, a[0])?)
        }
        "GetDiscountProposalHistory" => {
            arity(function, &a, 1)?;
            let snapshots = proposal::proposal_history(ledger, a[0])?
                .into_iter()
                .map(|s| {
                    json!({
                        "version": s.version,
                        "txId": s.tx_id,
                        "timestamp": s.timestamp.to_datetime_utc().to_rfc3339(),
                        "proposal": s.proposal,
                    })
                })
                .collect();
            Ok(Value::Array(snapshots))
        }
        "ListDiscountProposals" => match a.as_slice() {
            [] => to_json(&proposal::list_proposals(ledger)?),
            [party] => {
                let party = Actor::from_str(party)?;
                to_json(&proposal::list_proposals_for(ledger, &party)?)
            }
            _ => Err(wrong_arity(function, "0 or 1", a.len())),
        },
        "AcceptDiscountProposal" => {
            arity(function, &a, 2)?;
            let actor = Actor::from_str(a[1])?;
            to_json(&negotiation::accept(ledger, a[0], &actor)?)
        }
        "RejectDiscountProposal" => {
            arity(function, &a, 2)?;
            let actor = Actor::from_str(a[1])?;
            to_json(&negotiation::reject(ledger, a[0], &actor)?)
        }
        "ModifyDiscountProposal" => {
            arity(function, &a, 3)?;
            let actor = Actor::from_str(a[1])?;
            let amount = parse_decimal("amount", a[2])?;
            to_json(&negotiation::modify(ledger, a[0], &actor, amount)?)
        }
        "InitiateDiscountingFlow" => match a.as_slice() {
            [admin, anchor, participant] => {
                flow::initiate_discounting_flow(ledger, admin, anchor, participant)?;
                Ok(Value::Null)
            }
            [admin, anchor, participant, id, amount, proposal_type] => {
                let terms = ProposalTerms {
                    id: id.to_string(),
                    amount: parse_decimal("amount", amount)?,
                    proposal_type: ProposalType::from_str(proposal_type)?,
                };
                to_json(&flow::open_negotiation(
                    ledger,
                    admin,
                    anchor,
                    participant,
                    &terms,
                )?)
            }
            _ => Err(wrong_arity(function, "3 or 6", a.len())),
        },
        other => Err(ScfError::invalid_argument(format!(
            "unknown function '{other}'"
        ))),
    }
}

fn identity_kind(function: &str) -> EntityKind {
    if function.ends_with("Admin") {
        EntityKind::Admin
    } else if function.ends_with("Anchor") {
        EntityKind::Anchor
    } else {
        EntityKind::Participant
    }
}

fn arity(function: &str, args: &[&str], expected: usize) -> ScfResult<()> {
    if args.len() != expected {
        return Err(wrong_arity(function, &expected.to_string(), args.len()));
    }
    Ok(())
}

fn wrong_arity(function: &str, expected: &str, got: usize) -> ScfError {
    ScfError::invalid_argument(format!(
        "{function} takes {expected} arguments, got {got}"
    ))
}

fn parse_decimal(field: &str, raw: &str) -> ScfResult<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|e| ScfError::invalid_argument(format!("{field} '{raw}' is not a decimal: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> ScfResult<Value> {
    serde_json::to_value(value).map_err(|e| ScfError::Storage(e.to_string()))
}
