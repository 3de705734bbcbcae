//! Utility functions for identifiers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique time-ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Id stamped on every committed ledger write.
pub fn new_tx_id() -> String {
    // "tx_" is a valid hrp, so this only falls back on an encoder bug
    new_uuid_to_bech32("tx_").unwrap_or_else(|_| uuid7().to_string())
}
