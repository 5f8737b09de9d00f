/**
 * Liquidity generator instructions on the runtime
 *
 * Deposits open reward positions, finalize calls the routers through CPI
 * and delivery sweeps every vault to the reserves manager.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

mod common;

use anchor_lang::prelude::Pubkey;
use anchor_lang::solana_program::system_program;
use anchor_lang::{InstructionData, ToAccountMetas};
use anchor_spl::token;
use common::{assert_engine_error, lp_authority, pda, Emission, Env, ROUTER_ID};
use emission_engine::state::{LiquidityGenerator, LiquidityGeneratorParams, RecipientPosition};
use emission_engine::{
    accounts, instruction, EngineError, BASE_VAULT_SEED, DEFAULT_ROUTER0_BPS,
    LIQUIDITY_GENERATOR_SEED, LP_VAULT_SEED, TOKEN_VAULT_SEED,
};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::signature::{Keypair, Signer};

const DAY: i64 = 24 * 60 * 60;
const PERIOD_BEGIN: i64 = 1_800_000_000;
const PERIOD_DURATION: i64 = 7 * DAY;
const BONUS_DURATION: i64 = 2 * DAY;
const PERIOD_END: i64 = PERIOD_BEGIN + PERIOD_DURATION;
const UNLOCK: i64 = PERIOD_END + 180 * DAY;
const LIQUIDITY_TOKENS: u64 = 1_000_000;
const REWARDS: u64 = 10_000;

/// Generator with both reward distributors, two LP mints owned by the
/// router and reserves on both sides
struct Sale {
    env: Env,
    governance: Keypair,
    reserves_manager: Pubkey,
    base_mint: Pubkey,
    token_mint: Pubkey,
    lp_mints: [Pubkey; 2],
    generator: Pubkey,
    base_vault: Pubkey,
    token_vault: Pubkey,
    lp_vaults: [Pubkey; 2],
    ordinary: Emission,
    bonus: Emission,
    router_base_reserve: Pubkey,
    router_token_reserve: Pubkey,
}

impl Sale {
    async fn new() -> Option<Self> {
        let mut env = Env::start().await?;
        env.set_time(PERIOD_BEGIN - DAY).await;

        let creator = env.payer();
        let base_mint = env.create_mint(&creator).await;
        let token_mint = env.create_mint(&creator).await;
        let reward_mint = env.create_mint(&creator).await;
        let lp_mints = [
            env.create_mint(&lp_authority()).await,
            env.create_mint(&lp_authority()).await,
        ];

        let generator = pda(&[
            LIQUIDITY_GENERATOR_SEED,
            base_mint.as_ref(),
            token_mint.as_ref(),
            &0u64.to_le_bytes(),
        ]);
        let base_vault = pda(&[BASE_VAULT_SEED, generator.as_ref()]);
        let token_vault = pda(&[TOKEN_VAULT_SEED, generator.as_ref()]);
        let lp_vaults = [
            pda(&[LP_VAULT_SEED, generator.as_ref(), &[0]]),
            pda(&[LP_VAULT_SEED, generator.as_ref(), &[1]]),
        ];

        // rewards vest after the window, deposits only move shares
        let ordinary = env
            .create_emission(reward_mint, 0, REWARDS, PERIOD_END, PERIOD_END + 100 * DAY, generator)
            .await;
        let bonus = env
            .create_emission(reward_mint, 1, REWARDS, PERIOD_END, PERIOD_END + 100 * DAY, generator)
            .await;

        let governance = Keypair::new();
        let reserves_manager = Pubkey::new_unique();
        let source = env.create_token_account(&token_mint, &creator).await;
        env.mint_to(&token_mint, &source, LIQUIDITY_TOKENS).await;

        let init = Instruction {
            program_id: emission_engine::ID,
            accounts: accounts::InitLiquidityGenerator {
                creator,
                base_mint,
                token_mint,
                lp_mint0: lp_mints[0],
                lp_mint1: lp_mints[1],
                liquidity_generator: generator,
                base_vault,
                token_vault,
                lp_vault0: lp_vaults[0],
                lp_vault1: lp_vaults[1],
                distributor: ordinary.distributor,
                bonus_distributor: bonus.distributor,
                source_token_account: source,
                token_program: token::ID,
                system_program: system_program::ID,
            }
            .to_account_metas(None),
            data: instruction::InitLiquidityGenerator {
                id: 0,
                params: LiquidityGeneratorParams {
                    governance: governance.pubkey(),
                    reserves_manager,
                    period_begin: PERIOD_BEGIN,
                    period_duration: PERIOD_DURATION,
                    bonus_duration: BONUS_DURATION,
                    per_tx_min: 1,
                    per_tx_max: 0,
                    router0_bps: DEFAULT_ROUTER0_BPS,
                    router0: ROUTER_ID,
                    router1: ROUTER_ID,
                    unlock_timestamp: UNLOCK,
                    liquidity_token_amount: LIQUIDITY_TOKENS,
                },
            }
            .data(),
        };
        env.send(&[init], &[]).await.unwrap();

        let router_base_reserve = env.create_token_account(&base_mint, &lp_authority()).await;
        let router_token_reserve = env.create_token_account(&token_mint, &lp_authority()).await;

        Some(Self {
            env,
            governance,
            reserves_manager,
            base_mint,
            token_mint,
            lp_mints,
            generator,
            base_vault,
            token_vault,
            lp_vaults,
            ordinary,
            bonus,
            router_base_reserve,
            router_token_reserve,
        })
    }

    /// A funded participant holding `amount` base
    async fn participant(&mut self, amount: u64) -> (Keypair, Pubkey) {
        let participant = Keypair::new();
        self.env.fund(&participant.pubkey(), LAMPORTS_PER_SOL).await;
        let base_mint = self.base_mint;
        let account = self.env.create_token_account(&base_mint, &participant.pubkey()).await;
        self.env.mint_to(&base_mint, &account, amount).await;
        (participant, account)
    }

    async fn deposit(&mut self, participant: &Keypair, base_account: Pubkey, amount: u64) {
        let key = participant.pubkey();
        let mut metas = vec![
            AccountMeta::new(key, true),
            AccountMeta::new(self.generator, false),
            AccountMeta::new(self.base_vault, false),
            AccountMeta::new(base_account, false),
        ];
        metas.extend(self.ordinary.upstream_metas());
        metas.push(AccountMeta::new(self.ordinary.position(&key), false));
        metas.extend(self.bonus.upstream_metas());
        metas.push(AccountMeta::new(self.bonus.position(&key), false));
        metas.push(AccountMeta::new_readonly(token::ID, false));
        metas.push(AccountMeta::new_readonly(system_program::ID, false));

        let ix = Instruction {
            program_id: emission_engine::ID,
            accounts: metas,
            data: instruction::Deposit { amount }.data(),
        };
        self.env.send(&[ix], &[participant]).await.unwrap();
    }

    /// Accounts the router reads for one leg
    fn router_leg(&self, leg: usize) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new_readonly(self.generator, false),
            AccountMeta::new(self.base_vault, false),
            AccountMeta::new(self.token_vault, false),
            AccountMeta::new(self.router_base_reserve, false),
            AccountMeta::new(self.router_token_reserve, false),
            AccountMeta::new(self.lp_mints[leg], false),
            AccountMeta::new(self.lp_vaults[leg], false),
            AccountMeta::new_readonly(lp_authority(), false),
            AccountMeta::new_readonly(token::ID, false),
        ]
    }

    fn finalize_ix(&self) -> Instruction {
        let leg0 = self.router_leg(0);
        let mut metas = accounts::Finalize {
            governance: self.governance.pubkey(),
            liquidity_generator: self.generator,
            base_vault: self.base_vault,
            token_vault: self.token_vault,
            lp_vault0: self.lp_vaults[0],
            lp_vault1: self.lp_vaults[1],
            router0_program: ROUTER_ID,
            router1_program: ROUTER_ID,
        }
        .to_account_metas(None);
        let router0_accounts_len = leg0.len() as u8;
        metas.extend(leg0);
        metas.extend(self.router_leg(1));

        Instruction {
            program_id: emission_engine::ID,
            accounts: metas,
            data: instruction::Finalize { router0_accounts_len }.data(),
        }
    }

    fn postpone_ix(&self, new_unlock_timestamp: i64) -> Instruction {
        Instruction {
            program_id: emission_engine::ID,
            accounts: accounts::PostponeUnlockTimestamp {
                governance: self.governance.pubkey(),
                liquidity_generator: self.generator,
            }
            .to_account_metas(None),
            data: instruction::PostponeUnlockTimestamp { new_unlock_timestamp }.data(),
        }
    }

    fn deliver_ix(&self, reserves: &Reserves) -> Instruction {
        Instruction {
            program_id: emission_engine::ID,
            accounts: accounts::DeliverLiquidity {
                governance: self.governance.pubkey(),
                liquidity_generator: self.generator,
                base_vault: self.base_vault,
                token_vault: self.token_vault,
                lp_vault0: self.lp_vaults[0],
                lp_vault1: self.lp_vaults[1],
                reserves_lp_account0: reserves.lp[0],
                reserves_lp_account1: reserves.lp[1],
                reserves_base_account: reserves.base,
                reserves_token_account: reserves.token,
                token_program: token::ID,
            }
            .to_account_metas(None),
            data: instruction::DeliverLiquidityToReservesManager.data(),
        }
    }

    async fn reserves(&mut self) -> Reserves {
        let owner = self.reserves_manager;
        let (lp0, lp1, base_mint, token_mint) =
            (self.lp_mints[0], self.lp_mints[1], self.base_mint, self.token_mint);
        Reserves {
            lp: [
                self.env.create_token_account(&lp0, &owner).await,
                self.env.create_token_account(&lp1, &owner).await,
            ],
            base: self.env.create_token_account(&base_mint, &owner).await,
            token: self.env.create_token_account(&token_mint, &owner).await,
        }
    }
}

/// Token accounts of the reserves manager
struct Reserves {
    lp: [Pubkey; 2],
    base: Pubkey,
    token: Pubkey,
}

#[tokio::test]
async fn deposits_open_reward_positions() {
    let Some(mut sale) = Sale::new().await else { return };
    let (alice, alice_base) = sale.participant(1_000).await;
    let (bob, bob_base) = sale.participant(1_000).await;

    sale.env.set_time(PERIOD_BEGIN + DAY).await;
    sale.deposit(&alice, alice_base, 600).await;
    sale.env.set_time(PERIOD_BEGIN + 3 * DAY).await;
    sale.deposit(&bob, bob_base, 400).await;

    assert_eq!(sale.env.balance(&sale.base_vault).await, 1_000);
    assert_eq!(sale.env.balance(&alice_base).await, 400);

    let ordinary = sale.ordinary.position(&alice.pubkey());
    let position: RecipientPosition = sale.env.fetch(&ordinary).await;
    assert_eq!(position.shares, 600);
    let bonus = sale.bonus.position(&alice.pubkey());
    let position: RecipientPosition = sale.env.fetch(&bonus).await;
    assert_eq!(position.shares, 600);

    // outside the bonus window the bonus position exists but stays empty
    let ordinary = sale.ordinary.position(&bob.pubkey());
    let position: RecipientPosition = sale.env.fetch(&ordinary).await;
    assert_eq!(position.shares, 400);
    let bonus = sale.bonus.position(&bob.pubkey());
    let position: RecipientPosition = sale.env.fetch(&bonus).await;
    assert_eq!(position.shares, 0);

    let generator: LiquidityGenerator = sale.env.fetch(&sale.generator).await;
    assert_eq!(generator.total_contributed, 1_000);
}

#[tokio::test]
async fn finalize_and_deliver_to_reserves_manager() {
    let Some(mut sale) = Sale::new().await else { return };
    let (alice, alice_base) = sale.participant(1_000).await;
    let (bob, bob_base) = sale.participant(1_000).await;

    sale.env.set_time(PERIOD_BEGIN + DAY).await;
    sale.deposit(&alice, alice_base, 600).await;
    sale.env.set_time(PERIOD_BEGIN + 3 * DAY).await;
    sale.deposit(&bob, bob_base, 400).await;

    let ix = sale.finalize_ix();
    assert_engine_error(
        sale.env.send(&[ix], &[&sale.governance]).await,
        EngineError::TooSoon,
    );

    sale.env.set_time(PERIOD_END).await;
    let ix = sale.finalize_ix();
    sale.env.send(&[ix], &[&sale.governance]).await.unwrap();

    // 65% / 35% split; the router keeps 90% of the paired token it is offered
    assert_eq!(sale.env.balance(&sale.base_vault).await, 0);
    assert_eq!(sale.env.balance(&sale.lp_vaults[0]).await, 650);
    assert_eq!(sale.env.balance(&sale.lp_vaults[1]).await, 350);
    assert_eq!(sale.env.balance(&sale.token_vault).await, 100_000);
    assert_eq!(sale.env.balance(&sale.router_token_reserve).await, 900_000);

    let generator: LiquidityGenerator = sale.env.fetch(&sale.generator).await;
    assert!(generator.finalized);
    assert_eq!((generator.lp_minted0, generator.lp_minted1), (650, 350));

    let ix = sale.finalize_ix();
    assert_engine_error(
        sale.env.send(&[ix], &[&sale.governance]).await,
        EngineError::AlreadyFinalized,
    );

    let reserves = sale.reserves().await;
    let ix = sale.deliver_ix(&reserves);
    assert_engine_error(
        sale.env.send(&[ix], &[&sale.governance]).await,
        EngineError::StillLocked,
    );

    let ix = sale.postpone_ix(UNLOCK - DAY);
    assert_engine_error(
        sale.env.send(&[ix], &[&sale.governance]).await,
        EngineError::InvalidUnlockTimestamp,
    );
    let ix = sale.postpone_ix(UNLOCK + DAY);
    sale.env.send(&[ix], &[&sale.governance]).await.unwrap();

    sale.env.set_time(UNLOCK).await;
    let ix = sale.deliver_ix(&reserves);
    assert_engine_error(
        sale.env.send(&[ix], &[&sale.governance]).await,
        EngineError::StillLocked,
    );

    sale.env.set_time(UNLOCK + DAY).await;
    let ix = sale.deliver_ix(&reserves);
    sale.env.send(&[ix], &[&sale.governance]).await.unwrap();

    assert_eq!(sale.env.balance(&reserves.lp[0]).await, 650);
    assert_eq!(sale.env.balance(&reserves.lp[1]).await, 350);
    assert_eq!(sale.env.balance(&reserves.base).await, 0);
    assert_eq!(sale.env.balance(&reserves.token).await, 100_000);
    for vault in [sale.base_vault, sale.token_vault, sale.lp_vaults[0], sale.lp_vaults[1]] {
        assert_eq!(sale.env.balance(&vault).await, 0);
    }

    let ix = sale.deliver_ix(&reserves);
    assert_engine_error(
        sale.env.send(&[ix], &[&sale.governance]).await,
        EngineError::AlreadyDelivered,
    );
}
