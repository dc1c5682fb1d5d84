//! Concurrent transfer stress tool
//!
//! Run with: cargo run --bin transfer_stress --release -- --transfers 1000 --amount 7
//!
//! Two in-memory accounts send money back and forth from many tasks at once.
//! At the end no balance may be negative and the total must be unchanged.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use rust_decimal::Decimal;

use bank_backoffice::domain::{AccountType, Balance, ErrorKind, OperationContext, Principal, User};
use bank_backoffice::handlers::{TransferCommand, TransferHandler};
use bank_backoffice::identifiers::IdentifierGenerator;
use bank_backoffice::{BankStore, MemoryBankStore};

fn arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let transfer_count: u64 = arg(&args, "--transfers", 1000);
    let amount: Decimal = arg(&args, "--amount", Decimal::new(7, 0));
    let opening: Decimal = arg(&args, "--balance", Decimal::new(1000, 0));

    println!("Transfer stress - {transfer_count} transfers of {amount}, opening balance {opening}");

    let memory = MemoryBankStore::new();
    let ids = IdentifierGenerator::random();
    let alice = memory.insert_user(User::customer("alice", None)).await?;
    let bob = memory.insert_user(User::customer("bob", None)).await?;

    let a = memory.create_account(alice.id, AccountType::Savings, &ids).await?;
    let b = memory.create_account(bob.id, AccountType::Savings, &ids).await?;
    for account in [&a, &b] {
        memory
            .set_balances(account.id, Balance::new(opening)?, Balance::zero())
            .await?;
    }

    let store: Arc<dyn BankStore> = Arc::new(memory);
    let alice_ctx = OperationContext::new(Principal::from(&alice));
    let bob_ctx = OperationContext::new(Principal::from(&bob));

    let start = Instant::now();
    let mut tasks = Vec::with_capacity(transfer_count as usize);

    for i in 0..transfer_count {
        let handler = TransferHandler::new(store.clone());
        let (context, recipient) = if i % 2 == 0 {
            (alice_ctx.clone(), b.number.clone())
        } else {
            (bob_ctx.clone(), a.number.clone())
        };
        tasks.push(tokio::spawn(async move {
            handler
                .execute(TransferCommand::new(recipient, amount), &context)
                .await
        }));
    }

    let mut succeeded = 0u64;
    let mut insufficient = 0u64;
    for task in tasks {
        match task.await? {
            Ok(_) => succeeded += 1,
            Err(err) if err.kind() == Some(ErrorKind::InsufficientFunds) => insufficient += 1,
            Err(err) => return Err(err).context("unexpected transfer failure"),
        }
    }

    let duration = start.elapsed();

    let balance_of = |id| {
        let store = store.clone();
        async move {
            store
                .find_account(id)
                .await?
                .map(|account| account.balance_pesos.value())
                .context("account vanished")
        }
    };
    let final_a = balance_of(a.id).await?;
    let final_b = balance_of(b.id).await?;

    println!();
    println!("Results:");
    println!("  Succeeded:    {succeeded}");
    println!("  Insufficient: {insufficient}");
    println!("  Duration:     {:.2?}", duration);
    println!(
        "  Throughput:   {:.0} transfers/sec",
        transfer_count as f64 / duration.as_secs_f64()
    );
    println!("  Balance A:    {final_a}");
    println!("  Balance B:    {final_b}");

    if final_a < Decimal::ZERO || final_b < Decimal::ZERO {
        bail!("a balance went negative");
    }
    if final_a + final_b != opening * Decimal::from(2) {
        bail!("money was not conserved: {} != {}", final_a + final_b, opening * Decimal::from(2));
    }

    println!("  Invariants:   OK");
    Ok(())
}
