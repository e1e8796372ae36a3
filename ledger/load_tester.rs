use ledger::casino::Casino;
use ledger::rates::ConversionTable;
use ledger::repository::InMemoryAccounts;
use ledger::settlement::{Bet, SettlementConfig};
use ledger::types::{Currency, GameType};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Load testing tool for sustained settlement throughput
fn main() {
    println!("=== Ledger Load Testing ===\n");

    test_sustained_bets();
    test_shared_account_contention();
    test_many_accounts();
}

fn new_casino() -> Arc<Casino> {
    match Casino::new(
        Arc::new(InMemoryAccounts::new()),
        SettlementConfig::default(),
        ConversionTable::default(),
    ) {
        Ok(casino) => Arc::new(casino),
        Err(e) => panic!("default settlement config rejected: {e}"),
    }
}

fn bet(game: GameType) -> Bet {
    Bet {
        game,
        currency: Currency::DOGE,
        amount: Decimal::from(5),
        client_seed: None,
    }
}

fn fund(casino: &Casino, address: &str) {
    casino.open_account(address);
    let _ = casino.deposit(address, Currency::DOGE, Decimal::from(100_000_000));
}

fn test_sustained_bets() {
    println!("📈 Testing sustained bets on one account...");

    let casino = new_casino();
    fund(&casino, "solo");

    let duration = Duration::from_secs(10);
    let start = Instant::now();
    let mut operations: u64 = 0;
    let mut sessions = 0;

    while start.elapsed() < duration {
        let game = GameType::ALL[(operations % 6) as usize];
        let _ = casino.place_bet("solo", &bet(game));
        operations += 1;

        // Cash out every 100 bets
        if operations % 100 == 0 {
            if let Ok(report) = casino.end_session("solo") {
                sessions += report.sessions.len();
            }
        }
    }

    let elapsed = start.elapsed();
    let ops_per_second = operations as f64 / elapsed.as_secs_f64();

    println!("   Bets: {}", operations);
    println!("   Sessions closed: {}", sessions);
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!("   Throughput: {:.0} bets/sec", ops_per_second);
    println!("   Pool: {:?}\n", casino.pool().balances);
}

fn test_shared_account_contention() {
    println!("⚡ Testing contention on a shared account...");

    let casino = new_casino();
    fund(&casino, "shared");
    let operations = Arc::new(AtomicU64::new(0));
    let duration = Duration::from_secs(5);

    let num_threads = 4;
    let mut handles = vec![];

    for _ in 0..num_threads {
        let casino = Arc::clone(&casino);
        let ops = Arc::clone(&operations);

        handles.push(thread::spawn(move || {
            let start = Instant::now();
            let mut local_ops = 0;
            while start.elapsed() < duration {
                let _ = casino.place_bet("shared", &bet(GameType::Dice));
                local_ops += 1;
            }
            ops.fetch_add(local_ops, Ordering::Relaxed);
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }

    let total_ops = operations.load(Ordering::Relaxed);
    let ops_per_second = total_ops as f64 / duration.as_secs_f64();

    println!("   Threads: {}", num_threads);
    println!("   Total bets: {}", total_ops);
    println!("   Throughput: {:.0} bets/sec", ops_per_second);
    if let Ok(history) = casino.game_history("shared", usize::MAX) {
        println!("   Recorded games: {}\n", history.len());
    }
}

fn test_many_accounts() {
    println!("👥 Testing independent accounts in parallel...");

    let casino = new_casino();
    let operations = Arc::new(AtomicU64::new(0));
    let duration = Duration::from_secs(5);

    let num_threads = 8;
    let mut handles = vec![];

    for thread_id in 0..num_threads {
        let casino = Arc::clone(&casino);
        let ops = Arc::clone(&operations);
        let address = format!("wallet-{thread_id}");
        fund(&casino, &address);

        handles.push(thread::spawn(move || {
            let start = Instant::now();
            let mut local_ops = 0;
            while start.elapsed() < duration {
                let _ = casino.place_bet(&address, &bet(GameType::Roulette));
                local_ops += 1;
            }
            ops.fetch_add(local_ops, Ordering::Relaxed);
        }));
    }

    for handle in handles {
        let _ = handle.join();
    }

    let total_ops = operations.load(Ordering::Relaxed);
    let ops_per_second = total_ops as f64 / duration.as_secs_f64();

    println!("   Threads: {}", num_threads);
    println!("   Total bets: {}", total_ops);
    println!("   Throughput: {:.0} bets/sec\n", ops_per_second);
}
