/**
 * Fixed-point helpers for the Emission Engine
 *
 * 256-bit mul-div, share index encoding (2^160 scale) and the
 * segmented emission curve shared by every vesting schedule.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;
use ethnum::U256;

use crate::{
    EngineError,
    FRACTION_ONE,
    SEGMENT_DECAY_DENOMINATOR,
    SEGMENT_DECAY_NUMERATOR,
    SHARE_INDEX_SCALE_BITS,
    VESTING_SEGMENTS,
};

// =============================================================================
// MUL-DIV
// =============================================================================

/// `x * y / denominator`, rounded down, without intermediate overflow.
pub fn mul_div_down(x: u128, y: u128, denominator: u128) -> Result<u128> {
    require!(denominator != 0, EngineError::DivisionByZero);

    if x == 0 || y == 0 {
        return Ok(0);
    }

    let product = U256::from(x) * U256::from(y);
    let quotient = product / U256::from(denominator);

    u128::try_from(quotient).map_err(|_| error!(EngineError::MathOverflow))
}

/// Same as [`mul_div_down`] for token amounts that must fit in a `u64`.
pub fn mul_div_amount(amount: u64, numerator: u128, denominator: u128) -> Result<u64> {
    let value = mul_div_down(amount as u128, numerator, denominator)?;
    u64::try_from(value).map_err(|_| error!(EngineError::MathOverflow))
}

// =============================================================================
// SHARE INDEX
// =============================================================================

/// Index value representing one token per share unit.
pub fn index_one() -> U256 {
    U256::ONE << SHARE_INDEX_SCALE_BITS
}

/// Accounts store indices as `[hi, lo]` words.
pub fn unpack_index(words: [u128; 2]) -> U256 {
    U256::from_words(words[0], words[1])
}

pub fn pack_index(index: U256) -> [u128; 2] {
    let (hi, lo) = index.into_words();
    [hi, lo]
}

/// Index growth produced by spreading `amount` over `total_weight` units.
pub fn index_increment(amount: u64, total_weight: u128) -> Result<U256> {
    require!(total_weight != 0, EngineError::DivisionByZero);

    let scaled = U256::from(amount)
        .checked_shl(SHARE_INDEX_SCALE_BITS)
        .ok_or(EngineError::MathOverflow)?;

    Ok(scaled / U256::from(total_weight))
}

/// Tokens owed to `weight` units for an index movement of `delta`, truncated.
pub fn accrued_amount(weight: u128, delta: U256) -> Result<u64> {
    if weight == 0 || delta == U256::ZERO {
        return Ok(0);
    }

    let product = delta
        .checked_mul(U256::from(weight))
        .ok_or(EngineError::MathOverflow)?;
    let amount = product >> SHARE_INDEX_SCALE_BITS;

    u64::try_from(amount).map_err(|_| error!(EngineError::MathOverflow))
}

// =============================================================================
// EMISSION CURVE
// =============================================================================

/// Piecewise-linear emission curve over `VESTING_SEGMENTS` equal segments.
///
/// `x` is normalized elapsed time in `[0, FRACTION_ONE]`. Segment `i` has
/// slope `0.976^i`, so early segments release more than late ones. The
/// returned point is not normalized; divide by `emission_curve(FRACTION_ONE)`.
pub fn emission_curve(x: u128) -> u128 {
    let x = x.min(FRACTION_ONE);
    let width = FRACTION_ONE / VESTING_SEGMENTS as u128;

    let mut point: u128 = 0;
    let mut speed: u128 = FRACTION_ONE;

    for segment in 0..VESTING_SEGMENTS as u128 {
        let start = segment * width;
        if x < start + width {
            return point + speed * (x - start) / width;
        }
        point += speed;
        speed = speed * SEGMENT_DECAY_NUMERATOR / SEGMENT_DECAY_DENOMINATOR;
    }

    point
}

/// Final point of the emission curve (normalizer).
pub fn emission_curve_end() -> u128 {
    emission_curve(FRACTION_ONE)
}

/// Normalized elapsed time `elapsed / duration` scaled by `FRACTION_ONE`.
pub fn elapsed_fraction(elapsed: i64, duration: i64) -> Result<u128> {
    require!(duration > 0, EngineError::InvalidSchedule);

    let elapsed = elapsed.clamp(0, duration) as u128;
    mul_div_down(elapsed, FRACTION_ONE, duration as u128)
}
