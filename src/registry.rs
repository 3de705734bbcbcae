//! Write-once records: identities, invoices and programs
use super::error::{ScfError, ScfResult};
use super::ledger::{self, LedgerStore};
use super::types::{EntityKind, Identity, Invoice, InvoiceStatus, Program};
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::info;

pub(crate) fn ensure_id(kind: EntityKind, id: &str) -> ScfResult<()> {
    if id.trim().is_empty() {
        return Err(ScfError::invalid_argument(format!("{kind} ID is empty")));
    }
    // history keys are `key\0version`, a NUL in an ID would reach into
    // another record's audit log
    if id.chars().any(char::is_control) {
        return Err(ScfError::invalid_argument(format!(
            "{kind} ID {id:?} contains a control character"
        )));
    }
    Ok(())
}

fn ensure_identity_kind(kind: EntityKind) -> ScfResult<()> {
    if !kind.is_identity() {
        return Err(ScfError::invalid_argument(format!(
            "{kind} is not an identity kind"
        )));
    }
    Ok(())
}

/// Registers an admin, anchor or participant under its own namespace.
pub fn create_identity<L: LedgerStore + ?Sized>(
    ledger: &L,
    kind: EntityKind,
    id: &str,
    username: &str,
    credential: &str,
) -> ScfResult<Identity> {
    ensure_identity_kind(kind)?;
    ensure_id(kind, id)?;

    let identity = Identity {
        id: id.to_string(),
        username: username.to_string(),
        credential: credential.to_string(),
    };
    ledger::insert_record(ledger, kind, id, &identity)?;

    info!(%kind, id, "Registered identity");
    Ok(identity)
}

pub fn get_identity<L: LedgerStore + ?Sized>(
    ledger: &L,
    kind: EntityKind,
    id: &str,
) -> ScfResult<Identity> {
    ensure_identity_kind(kind)?;
    let (identity, _) = ledger::load_record(ledger, kind, id)?;
    Ok(identity)
}

/// Resolves an identity referenced by another record; absence is `InvalidReference`.
pub fn require_identity<L: LedgerStore + ?Sized>(
    ledger: &L,
    kind: EntityKind,
    id: &str,
) -> ScfResult<Identity> {
    match get_identity(ledger, kind, id) {
        Err(ScfError::NotFound { kind, id }) => Err(ScfError::InvalidReference { kind, id }),
        other => other,
    }
}

/// Books a new unpaid invoice against an existing participant.
pub fn create_invoice<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
    participant_id: &str,
    amount: Decimal,
) -> ScfResult<Invoice> {
    ensure_id(EntityKind::Invoice, id)?;
    if amount < Decimal::ZERO {
        return Err(ScfError::invalid_argument(format!(
            "invoice amount {amount} is negative"
        )));
    }
    require_identity(ledger, EntityKind::Participant, participant_id)?;

    let invoice = Invoice {
        id: id.to_string(),
        participant_id: participant_id.to_string(),
        amount,
        status: InvoiceStatus::Unpaid,
    };
    ledger::insert_record(ledger, EntityKind::Invoice, id, &invoice)?;

    info!(id, participant_id, %amount, "Booked invoice");
    Ok(invoice)
}

pub fn get_invoice<L: LedgerStore + ?Sized>(ledger: &L, id: &str) -> ScfResult<Invoice> {
    let (invoice, _) = ledger::load_record(ledger, EntityKind::Invoice, id)?;
    Ok(invoice)
}

/// Settles an unpaid invoice. A second payment is an `InvalidTransition`.
pub fn pay_invoice<L: LedgerStore + ?Sized>(ledger: &L, id: &str) -> ScfResult<Invoice> {
    let (mut invoice, version): (Invoice, u64) =
        ledger::load_record(ledger, EntityKind::Invoice, id)?;

    if invoice.status == InvoiceStatus::Paid {
        return Err(ScfError::InvalidTransition {
            id: id.to_string(),
            reason: "invoice is already paid".into(),
        });
    }

    invoice.status = InvoiceStatus::Paid;
    ledger::replace_record(ledger, EntityKind::Invoice, id, &invoice, version)?;

    info!(id, "Invoice paid");
    Ok(invoice)
}

/// Defines a financing program. Membership is fixed at creation.
pub fn create_program<L: LedgerStore + ?Sized>(
    ledger: &L,
    id: &str,
    name: &str,
    description: &str,
    rate: Decimal,
    participants: Vec<String>,
) -> ScfResult<Program> {
    ensure_id(EntityKind::Program, id)?;
    if rate < Decimal::ZERO {
        return Err(ScfError::invalid_argument(format!(
            "program rate {rate} is negative"
        )));
    }

    let mut seen = HashSet::new();
    for participant in &participants {
        if !seen.insert(participant.as_str()) {
            return Err(ScfError::invalid_argument(format!(
                "participant {participant} listed twice"
            )));
        }
    }
    // first unresolved member is reported
    for participant in &participants {
        require_identity(ledger, EntityKind::Participant, participant)?;
    }

    let program = Program {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        rate,
        participants,
    };
    ledger::insert_record(ledger, EntityKind::Program, id, &program)?;

    info!(id, members = program.participants.len(), "Created program");
    Ok(program)
}

pub fn get_program<L: LedgerStore + ?Sized>(ledger: &L, id: &str) -> ScfResult<Program> {
    let (program, _) = ledger::load_record(ledger, EntityKind::Program, id)?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SledLedger;
    use tempfile::tempdir;

    #[test]
    fn identity_kinds_do_not_collide() {
        let dir = tempdir().unwrap();
        let ledger = SledLedger::open(dir.path().join("ledger.db")).unwrap();

        create_identity(&ledger, EntityKind::Anchor, "X", "buyer", "pw").unwrap();
        create_identity(&ledger, EntityKind::Participant, "X", "supplier", "pw").unwrap();

        assert_eq!(
            get_identity(&ledger, EntityKind::Anchor, "X").unwrap().username,
            "buyer"
        );
        assert_eq!(
            get_identity(&ledger, EntityKind::Participant, "X")
                .unwrap()
                .username,
            "supplier"
        );
        assert!(matches!(
            get_identity(&ledger, EntityKind::Admin, "X"),
            Err(ScfError::NotFound { .. })
        ));
    }

    #[test]
    fn non_identity_kinds_are_refused() {
        let dir = tempdir().unwrap();
        let ledger = SledLedger::open(dir.path().join("ledger.db")).unwrap();

        let err = create_identity(&ledger, EntityKind::Invoice, "I1", "u", "p").unwrap_err();
        assert!(matches!(err, ScfError::InvalidArgument(_)));
    }

    #[test]
    fn empty_ids_are_refused() {
        let dir = tempdir().unwrap();
        let ledger = SledLedger::open(dir.path().join("ledger.db")).unwrap();

        let err = create_identity(&ledger, EntityKind::Admin, " ", "u", "p").unwrap_err();
        assert!(matches!(err, ScfError::InvalidArgument(_)));
    }

    #[test]
    fn control_characters_in_ids_are_refused() {
        let dir = tempdir().unwrap();
        let ledger = SledLedger::open(dir.path().join("ledger.db")).unwrap();

        for id in ["A1\0x", "A1\n", "\tA1"] {
            let err = create_identity(&ledger, EntityKind::Anchor, id, "u", "p").unwrap_err();
            assert!(matches!(err, ScfError::InvalidArgument(_)), "{id:?}");
        }
        assert!(ledger.scan_prefix(&EntityKind::Anchor.prefix()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_program_members_are_refused() {
        let dir = tempdir().unwrap();
        let ledger = SledLedger::open(dir.path().join("ledger.db")).unwrap();
        create_identity(&ledger, EntityKind::Participant, "P1", "s", "p").unwrap();

        let err = create_program(
            &ledger,
            "PG1",
            "early pay",
            "",
            Decimal::new(2, 2),
            vec!["P1".into(), "P1".into()],
        )
        .unwrap_err();
        assert!(matches!(err, ScfError::InvalidArgument(_)));
    }
}
