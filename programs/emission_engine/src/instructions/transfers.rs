/**
 * Signed vault transfers
 *
 * Every component owns its vault through its own PDA; these helpers
 * rebuild the signer seeds from the stored account.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;
use anchor_spl::token::{transfer, Token, TokenAccount, Transfer};

use crate::{
    state::{Distributor, FarmingPool, LiquidityGenerator, Vester},
    DISTRIBUTOR_SEED,
    FARMING_POOL_SEED,
    LIQUIDITY_GENERATOR_SEED,
    VESTER_SEED,
};

fn signed_transfer<'info>(
    token_program: &Program<'info, Token>,
    from: &Account<'info, TokenAccount>,
    to: AccountInfo<'info>,
    authority: AccountInfo<'info>,
    seeds: &[&[u8]],
    amount: u64,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }

    transfer(
        CpiContext::new_with_signer(
            token_program.to_account_info(),
            Transfer {
                from: from.to_account_info(),
                to,
                authority,
            },
            &[seeds],
        ),
        amount,
    )
}

/// Vester vault -> `to`, signed by the vester
pub fn release_from_vester<'info>(
    vester: &Account<'info, Vester>,
    vester_vault: &Account<'info, TokenAccount>,
    to: AccountInfo<'info>,
    token_program: &Program<'info, Token>,
    amount: u64,
) -> Result<()> {
    let id = vester.id.to_le_bytes();
    let seeds = &[
        VESTER_SEED,
        vester.creator.as_ref(),
        vester.mint.as_ref(),
        id.as_ref(),
        &[vester.bump],
    ];

    signed_transfer(
        token_program,
        vester_vault,
        to,
        vester.to_account_info(),
        seeds,
        amount,
    )
}

/// Distributor vault -> `to`, signed by the distributor
pub fn pay_from_distributor<'info>(
    distributor: &Account<'info, Distributor>,
    distributor_vault: &Account<'info, TokenAccount>,
    to: AccountInfo<'info>,
    token_program: &Program<'info, Token>,
    amount: u64,
) -> Result<()> {
    let id = distributor.id.to_le_bytes();
    let seeds = &[
        DISTRIBUTOR_SEED,
        distributor.vester.as_ref(),
        id.as_ref(),
        &[distributor.bump],
    ];

    signed_transfer(
        token_program,
        distributor_vault,
        to,
        distributor.to_account_info(),
        seeds,
        amount,
    )
}

/// Farming vault -> `to`, signed by the farming pool
pub fn pay_from_farming_pool<'info>(
    farming_pool: &Account<'info, FarmingPool>,
    farming_vault: &Account<'info, TokenAccount>,
    to: AccountInfo<'info>,
    token_program: &Program<'info, Token>,
    amount: u64,
) -> Result<()> {
    let id = farming_pool.id.to_le_bytes();
    let seeds = &[
        FARMING_POOL_SEED,
        farming_pool.distributor.as_ref(),
        id.as_ref(),
        &[farming_pool.bump],
    ];

    signed_transfer(
        token_program,
        farming_vault,
        to,
        farming_pool.to_account_info(),
        seeds,
        amount,
    )
}

/// Generator vault -> `to`, signed by the liquidity generator
pub fn pay_from_generator<'info>(
    generator: &Account<'info, LiquidityGenerator>,
    vault: &Account<'info, TokenAccount>,
    to: AccountInfo<'info>,
    token_program: &Program<'info, Token>,
    amount: u64,
) -> Result<()> {
    let id = generator.id.to_le_bytes();
    let seeds = &[
        LIQUIDITY_GENERATOR_SEED,
        generator.base_mint.as_ref(),
        generator.token_mint.as_ref(),
        id.as_ref(),
        &[generator.bump],
    ];

    signed_transfer(
        token_program,
        vault,
        to,
        generator.to_account_info(),
        seeds,
        amount,
    )
}
