/// Bonding-curve account decoding
///
/// Layout (little endian, offsets from the start of the account data):
/// 8-byte discriminator, virtual token reserves, virtual SOL reserves,
/// real token reserves, real SOL reserves, total supply.

use thiserror::Error;

use crate::core::constants::*;
use crate::core::CurveState;

/// Reasons an account cannot be read as a bonding curve yet.
/// Callers treat every variant as "no state available this tick".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Account data truncated: {actual} bytes, need {expected}")]
    Truncated { expected: usize, actual: usize },

    #[error("Account discriminator does not match bonding curve layout")]
    SignatureMismatch,

    #[error("Virtual token reserves are zero")]
    ZeroVirtualTokenReserves,
}

fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Bonding progress in percent from raw real token reserves
pub fn bonding_progress(real_token_reserves: u64) -> f64 {
    if real_token_reserves >= INITIAL_REAL_TOKEN_RESERVES {
        return 0.0;
    }
    let sold = 1.0 - real_token_reserves as f64 / INITIAL_REAL_TOKEN_RESERVES as f64;
    (sold * 100.0).clamp(0.0, 100.0)
}

/// Decode raw bonding-curve account bytes into a scaled curve state
pub fn decode_curve_state(data: &[u8]) -> Result<CurveState, DecodeError> {
    if data.len() < BONDING_CURVE_MIN_LEN {
        return Err(DecodeError::Truncated {
            expected: BONDING_CURVE_MIN_LEN,
            actual: data.len(),
        });
    }

    if data[..8] != BONDING_CURVE_SIGNATURE {
        return Err(DecodeError::SignatureMismatch);
    }

    let virtual_token_raw = read_u64_le(data, VIRTUAL_TOKEN_RESERVES_OFFSET);
    let virtual_sol_raw = read_u64_le(data, VIRTUAL_SOL_RESERVES_OFFSET);
    let real_token_raw = read_u64_le(data, REAL_TOKEN_RESERVES_OFFSET);
    let real_sol_raw = read_u64_le(data, REAL_SOL_RESERVES_OFFSET);
    let total_supply_raw = read_u64_le(data, TOTAL_SUPPLY_OFFSET);

    if virtual_token_raw == 0 {
        return Err(DecodeError::ZeroVirtualTokenReserves);
    }

    let virtual_token_reserves = tokens_from_raw(virtual_token_raw);
    let virtual_sol_reserves = lamports_to_sol(virtual_sol_raw);
    let total_supply = tokens_from_raw(total_supply_raw);

    let price_in_sol = virtual_sol_reserves / virtual_token_reserves;

    Ok(CurveState {
        virtual_token_reserves,
        virtual_sol_reserves,
        real_token_reserves: tokens_from_raw(real_token_raw),
        real_sol_reserves: lamports_to_sol(real_sol_raw),
        total_supply,
        price_in_sol,
        market_cap_sol: price_in_sol * total_supply,
        bonding_progress: bonding_progress(real_token_raw),
    })
}
