/// Pump.fun program and bonding-curve account constants

pub const PUMP_FUN_PROGRAM: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

/// Anchor discriminator at the start of every bonding-curve account
pub const BONDING_CURVE_SIGNATURE: [u8; 8] = [0x17, 0xb7, 0xf8, 0x37, 0x60, 0xd8, 0xac, 0x60];

// Field offsets inside the bonding-curve account
pub const VIRTUAL_TOKEN_RESERVES_OFFSET: usize = 0x08;
pub const VIRTUAL_SOL_RESERVES_OFFSET: usize = 0x10;
pub const REAL_TOKEN_RESERVES_OFFSET: usize = 0x18;
pub const REAL_SOL_RESERVES_OFFSET: usize = 0x20;
pub const TOTAL_SUPPLY_OFFSET: usize = 0x28;
pub const BONDING_CURVE_MIN_LEN: usize = 0x30;

pub const TOKEN_DECIMALS: u32 = 6;
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Real token reserves a fresh curve starts with (raw units, 6 decimals)
pub const INITIAL_REAL_TOKEN_RESERVES: u64 = 793_100_000_000_000;

// Log lines that identify a create instruction
pub const INSTRUCTION_CREATE_LOG: &str = "Program log: Instruction: Create";

/// Convert raw token units to whole tokens
pub fn tokens_from_raw(raw: u64) -> f64 {
    raw as f64 / 10f64.powi(TOKEN_DECIMALS as i32)
}

/// Convert lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL
}
