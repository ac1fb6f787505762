/// Solana address helpers used by the ingest and display layers

/// Convert string address to bytes if valid
pub fn parse_solana_address(address: &str) -> Option<[u8; 32]> {
    match bs58::decode(address).into_vec() {
        Ok(bytes) if bytes.len() == 32 => {
            let mut addr = [0u8; 32];
            addr.copy_from_slice(&bytes);
            Some(addr)
        }
        _ => None,
    }
}

pub fn is_valid_address(address: &str) -> bool {
    parse_solana_address(address).is_some()
}

/// Convert pubkey to shortened display format
pub fn shorten_pubkey(pubkey: &str) -> String {
    if pubkey.len() >= 16 {
        format!("{}...{}", &pubkey[..8], &pubkey[pubkey.len() - 8..])
    } else {
        pubkey.to_string()
    }
}
