/*!
 * Runtime harness
 *
 * Runs the engine's SBF build inside solana-program-test next to a native
 * stand-in for the AMM routers, plus the token plumbing every scenario needs.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

#![allow(dead_code)]

use std::path::PathBuf;

use anchor_lang::error::ERROR_CODE_OFFSET;
use anchor_lang::prelude::Pubkey;
use anchor_lang::solana_program::{system_instruction, system_program};
use anchor_lang::{AccountDeserialize, AnchorDeserialize, InstructionData, ToAccountMetas};
use anchor_spl::token::{self, spl_token, Mint, TokenAccount};
use emission_engine::instructions::liquidity::AddLiquidityArgs;
use emission_engine::state::VestingCurve;
use emission_engine::{
    accounts, instruction, EngineError, ADD_LIQUIDITY_DISCRIMINATOR, DISTRIBUTOR_SEED,
    DISTRIBUTOR_VAULT_SEED, VESTER_SEED, VESTER_VAULT_SEED,
};
use solana_program_test::{processor, BanksClientError, ProgramTest, ProgramTestContext};
use solana_sdk::{
    account_info::AccountInfo,
    clock::Clock,
    compute_budget::ComputeBudgetInstruction,
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction, InstructionError},
    program::{invoke, invoke_signed},
    program_error::ProgramError,
    signature::{Keypair, Signer},
    transaction::{Transaction, TransactionError},
};

// =============================================================================
// STAND-IN ROUTER
// =============================================================================

/// Serves both router slots of a generator
pub const ROUTER_ID: Pubkey = Pubkey::new_from_array([7; 32]);

/// Mint authority of the router's LP tokens
pub const LP_AUTHORITY_SEED: &[u8] = b"lp_authority";

/// Share of the offered paired token the router keeps, in bps
pub const ROUTER_TOKEN_TAKE_BPS: u64 = 9_000;

pub fn lp_authority() -> Pubkey {
    Pubkey::find_program_address(&[LP_AUTHORITY_SEED], &ROUTER_ID).0
}

/// `add_liquidity`: takes all the base and 90% of the paired token from the
/// generator's vaults and mints one LP token per base unit.
///
/// Accounts: generator, base vault, token vault, base reserve, token reserve,
/// LP mint, LP vault, LP authority, token program
fn process_router(program_id: &Pubkey, accounts: &[AccountInfo], data: &[u8]) -> ProgramResult {
    if data.len() < 8 || data[..8] != ADD_LIQUIDITY_DISCRIMINATOR {
        return Err(ProgramError::InvalidInstructionData);
    }
    let args = AddLiquidityArgs::try_from_slice(&data[8..])
        .map_err(|_| ProgramError::InvalidInstructionData)?;

    let [generator, base_vault, token_vault, base_reserve, token_reserve, lp_mint, lp_vault, lp_authority, token_program] =
        accounts
    else {
        return Err(ProgramError::NotEnoughAccountKeys);
    };
    if !generator.is_signer {
        return Err(ProgramError::MissingRequiredSignature);
    }

    invoke(
        &spl_token::instruction::transfer(
            token_program.key,
            base_vault.key,
            base_reserve.key,
            generator.key,
            &[],
            args.base_amount,
        )?,
        &[base_vault.clone(), base_reserve.clone(), generator.clone(), token_program.clone()],
    )?;

    let token_taken = args.token_amount * ROUTER_TOKEN_TAKE_BPS / 10_000;
    invoke(
        &spl_token::instruction::transfer(
            token_program.key,
            token_vault.key,
            token_reserve.key,
            generator.key,
            &[],
            token_taken,
        )?,
        &[token_vault.clone(), token_reserve.clone(), generator.clone(), token_program.clone()],
    )?;

    let (authority, bump) = Pubkey::find_program_address(&[LP_AUTHORITY_SEED], program_id);
    if authority != *lp_authority.key {
        return Err(ProgramError::InvalidSeeds);
    }
    invoke_signed(
        &spl_token::instruction::mint_to(
            token_program.key,
            lp_mint.key,
            lp_vault.key,
            lp_authority.key,
            &[],
            args.base_amount,
        )?,
        &[lp_mint.clone(), lp_vault.clone(), lp_authority.clone(), token_program.clone()],
        &[&[LP_AUTHORITY_SEED, &[bump]]],
    )
}

// =============================================================================
// ENVIRONMENT
// =============================================================================

pub fn pda(seeds: &[&[u8]]) -> Pubkey {
    Pubkey::find_program_address(seeds, &emission_engine::ID).0
}

/// The engine is loaded from `emission_engine.so` (`cargo test-sbf` / `anchor test`)
fn engine_build_available() -> bool {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if std::env::var_os("SBF_OUT_DIR").is_none() && std::env::var_os("BPF_OUT_DIR").is_none() {
        std::env::set_var("SBF_OUT_DIR", manifest.join("../../target/deploy"));
    }

    let mut dirs = vec![manifest.join("tests/fixtures")];
    for var in ["BPF_OUT_DIR", "SBF_OUT_DIR"] {
        if let Some(dir) = std::env::var_os(var) {
            dirs.push(PathBuf::from(dir));
        }
    }
    dirs.iter().any(|dir| dir.join("emission_engine.so").exists())
}

pub struct Env {
    pub ctx: ProgramTestContext,
}

impl Env {
    /// `None` when the SBF build is missing
    pub async fn start() -> Option<Self> {
        if !engine_build_available() {
            eprintln!("skipping: emission_engine.so not built, run `cargo test-sbf`");
            return None;
        }

        let mut program_test = ProgramTest::new("emission_engine", emission_engine::ID, None);
        program_test.add_program("amm_router", ROUTER_ID, processor!(process_router));
        Some(Self {
            ctx: program_test.start_with_context().await,
        })
    }

    pub fn payer(&self) -> Pubkey {
        self.ctx.payer.pubkey()
    }

    pub async fn set_time(&mut self, unix_timestamp: i64) {
        let mut clock: Clock = self.ctx.banks_client.get_sysvar().await.unwrap();
        clock.unix_timestamp = unix_timestamp;
        self.ctx.set_sysvar(&clock);
    }

    /// Fee payer signs every transaction; `signers` adds the rest
    pub async fn send(
        &mut self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<(), BanksClientError> {
        let blockhash = self.ctx.get_new_latest_blockhash().await.unwrap();

        let mut all = vec![ComputeBudgetInstruction::set_compute_unit_limit(1_000_000)];
        all.extend_from_slice(instructions);

        let payer = self.ctx.payer.pubkey();
        let mut keypairs: Vec<&Keypair> = vec![&self.ctx.payer];
        keypairs.extend(signers.iter().copied().filter(|k| k.pubkey() != payer));

        let tx = Transaction::new_signed_with_payer(&all, Some(&payer), &keypairs, blockhash);
        self.ctx.banks_client.process_transaction(tx).await
    }

    pub async fn fetch<T: AccountDeserialize>(&mut self, address: &Pubkey) -> T {
        let account = self
            .ctx
            .banks_client
            .get_account(*address)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("missing account {address}"));
        T::try_deserialize(&mut account.data.as_slice()).unwrap()
    }

    pub async fn exists(&mut self, address: &Pubkey) -> bool {
        self.ctx.banks_client.get_account(*address).await.unwrap().is_some()
    }

    pub async fn fund(&mut self, to: &Pubkey, lamports: u64) {
        let payer = self.payer();
        self.send(&[system_instruction::transfer(&payer, to, lamports)], &[])
            .await
            .unwrap();
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    pub async fn create_mint(&mut self, authority: &Pubkey) -> Pubkey {
        let mint = Keypair::new();
        let payer = self.payer();
        let rent = self.ctx.banks_client.get_rent().await.unwrap();

        self.send(
            &[
                system_instruction::create_account(
                    &payer,
                    &mint.pubkey(),
                    rent.minimum_balance(Mint::LEN),
                    Mint::LEN as u64,
                    &token::ID,
                ),
                spl_token::instruction::initialize_mint(&token::ID, &mint.pubkey(), authority, None, 9)
                    .unwrap(),
            ],
            &[&mint],
        )
        .await
        .unwrap();
        mint.pubkey()
    }

    pub async fn create_token_account(&mut self, mint: &Pubkey, owner: &Pubkey) -> Pubkey {
        let account = Keypair::new();
        let payer = self.payer();
        let rent = self.ctx.banks_client.get_rent().await.unwrap();

        self.send(
            &[
                system_instruction::create_account(
                    &payer,
                    &account.pubkey(),
                    rent.minimum_balance(TokenAccount::LEN),
                    TokenAccount::LEN as u64,
                    &token::ID,
                ),
                spl_token::instruction::initialize_account3(&token::ID, &account.pubkey(), mint, owner)
                    .unwrap(),
            ],
            &[&account],
        )
        .await
        .unwrap();
        account.pubkey()
    }

    /// Mint authority is the fee payer
    pub async fn mint_to(&mut self, mint: &Pubkey, account: &Pubkey, amount: u64) {
        let payer = self.payer();
        self.send(
            &[spl_token::instruction::mint_to(&token::ID, mint, account, &payer, &[], amount).unwrap()],
            &[],
        )
        .await
        .unwrap();
    }

    pub async fn balance(&mut self, account: &Pubkey) -> u64 {
        self.fetch::<TokenAccount>(account).await.amount
    }

    // =========================================================================
    // EMISSION
    // =========================================================================

    /// Linear vester paying an owned distributor, funded by the fee payer
    pub async fn create_emission(
        &mut self,
        mint: Pubkey,
        vester_id: u64,
        total_amount: u64,
        vesting_begin: i64,
        vesting_end: i64,
        admin: Pubkey,
    ) -> Emission {
        let creator = self.payer();
        let vester = pda(&[VESTER_SEED, creator.as_ref(), mint.as_ref(), &vester_id.to_le_bytes()]);
        let distributor = pda(&[DISTRIBUTOR_SEED, vester.as_ref(), &0u64.to_le_bytes()]);
        let emission = Emission {
            mint,
            vester,
            vester_vault: pda(&[VESTER_VAULT_SEED, vester.as_ref()]),
            distributor,
            distributor_vault: pda(&[DISTRIBUTOR_VAULT_SEED, distributor.as_ref()]),
        };

        let source = self.create_token_account(&mint, &creator).await;
        self.mint_to(&mint, &source, total_amount).await;

        let init_vester = Instruction {
            program_id: emission_engine::ID,
            accounts: accounts::InitVester {
                creator,
                mint,
                vester,
                vester_vault: emission.vester_vault,
                source_token_account: source,
                token_program: token::ID,
                system_program: system_program::ID,
            }
            .to_account_metas(None),
            data: instruction::InitVester {
                id: vester_id,
                curve: VestingCurve::Linear,
                recipient: distributor,
                total_amount,
                vesting_begin,
                vesting_end,
            }
            .data(),
        };
        let init_distributor = Instruction {
            program_id: emission_engine::ID,
            accounts: accounts::InitDistributor {
                payer: creator,
                vester,
                mint,
                distributor,
                distributor_vault: emission.distributor_vault,
                token_program: token::ID,
                system_program: system_program::ID,
            }
            .to_account_metas(None),
            data: instruction::InitOwnedDistributor { id: 0, admin }.data(),
        };

        self.send(&[init_vester, init_distributor], &[]).await.unwrap();
        emission
    }
}

/// A vester and the owned distributor it pays
pub struct Emission {
    pub mint: Pubkey,
    pub vester: Pubkey,
    pub vester_vault: Pubkey,
    pub distributor: Pubkey,
    pub distributor_vault: Pubkey,
}

impl Emission {
    pub fn position(&self, account: &Pubkey) -> Pubkey {
        pda(&[emission_engine::POSITION_SEED, self.distributor.as_ref(), account.as_ref()])
    }

    /// Accounts of the distributor-with-upstream group, in declaration order
    pub fn upstream_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(self.distributor, false),
            AccountMeta::new(self.distributor_vault, false),
            AccountMeta::new(self.vester, false),
            AccountMeta::new(self.vester_vault, false),
        ]
    }
}

// =============================================================================
// ASSERTIONS
// =============================================================================

pub fn assert_engine_error(result: Result<(), BanksClientError>, expected: EngineError) {
    let code = expected as u32 + ERROR_CODE_OFFSET;
    match result.expect_err("transaction should fail").unwrap() {
        TransactionError::InstructionError(_, InstructionError::Custom(actual)) => {
            assert_eq!(actual, code, "expected engine error {code}, got {actual}")
        }
        other => panic!("expected engine error {code}, got {other:?}"),
    }
}
