//! Concurrent access to a single account through the casino service.

use ledger::casino::Casino;
use ledger::games::{GameModel, PayoutTable};
use ledger::rates::ConversionTable;
use ledger::repository::InMemoryAccounts;
use ledger::settlement::{Bet, SettlementConfig};
use ledger::types::{BalanceKind, Currency, GameType};
use ledger::LedgerError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;

fn losing_casino() -> Arc<Casino> {
    let mut config = SettlementConfig::default();
    config.games.insert(
        GameType::Roulette,
        GameModel {
            win_rate_bps: 0,
            payout: PayoutTable::Choice {
                multipliers: vec![dec!(2)],
            },
        },
    );
    Arc::new(
        Casino::new(
            Arc::new(InMemoryAccounts::new()),
            config,
            ConversionTable::default(),
        )
        .unwrap(),
    )
}

fn roulette(amount: Decimal) -> Bet {
    Bet {
        game: GameType::Roulette,
        currency: Currency::TRX,
        amount,
        client_seed: None,
    }
}

#[test]
fn concurrent_bets_apply_every_debit() {
    let casino = losing_casino();
    casino.open_account("shared");
    casino.deposit("shared", Currency::TRX, dec!(1000)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let casino = Arc::clone(&casino);
            thread::spawn(move || {
                for _ in 0..10 {
                    casino.place_bet("shared", &roulette(dec!(5))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let wallet = casino.wallet("shared").unwrap();
    // 80 bets of 5 TRX, none lost to a race
    assert_eq!(wallet.deposit_balance[&Currency::TRX], dec!(600));
    assert_eq!(casino.game_history("shared", 1_000).unwrap().len(), 80);
}

#[test]
fn concurrent_overdraw_never_goes_negative() {
    let casino = losing_casino();
    casino.open_account("shared");
    casino.deposit("shared", Currency::TRX, dec!(50)).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let casino = Arc::clone(&casino);
            thread::spawn(move || casino.place_bet("shared", &roulette(dec!(10))))
        })
        .collect();

    let mut settled = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => settled += 1,
            Err(LedgerError::InsufficientFunds { .. }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(settled, 5);
    assert_eq!(rejected, 11);
    let wallet = casino.wallet("shared").unwrap();
    assert_eq!(wallet.deposit_balance[&Currency::TRX], dec!(0));
}

#[test]
fn accounts_do_not_interfere() {
    let casino = losing_casino();
    let addresses: Vec<String> = (0..4).map(|i| format!("wallet-{i}")).collect();
    for address in &addresses {
        casino.open_account(address);
        casino.deposit(address, Currency::TRX, dec!(100)).unwrap();
    }

    let handles: Vec<_> = addresses
        .iter()
        .cloned()
        .map(|address| {
            let casino = Arc::clone(&casino);
            thread::spawn(move || {
                for _ in 0..4 {
                    casino.place_bet(&address, &roulette(dec!(5))).unwrap();
                }
                casino.end_session(&address).unwrap()
            })
        })
        .collect();
    for handle in handles {
        let report = handle.join().unwrap();
        assert_eq!(report.wallet.deposit_balance[&Currency::TRX], dec!(80));
        assert_eq!(report.wallet.savings_balance[&Currency::TRX], dec!(18));
    }

    assert_eq!(casino.pool().balances[&Currency::TRX], dec!(8));
}

#[test]
fn books_stay_non_negative_under_mixed_load() {
    let casino = losing_casino();
    casino.open_account("mixed");
    casino.deposit("mixed", Currency::TRX, dec!(200)).unwrap();

    let bettor = {
        let casino = Arc::clone(&casino);
        thread::spawn(move || {
            for _ in 0..20 {
                let _ = casino.place_bet("mixed", &roulette(dec!(3)));
            }
        })
    };
    let mover = {
        let casino = Arc::clone(&casino);
        thread::spawn(move || {
            for _ in 0..20 {
                let _ = casino.transfer(
                    "mixed",
                    BalanceKind::Deposit,
                    BalanceKind::Winnings,
                    Currency::TRX,
                    dec!(4),
                );
                let _ = casino.end_session("mixed");
            }
        })
    };
    bettor.join().unwrap();
    mover.join().unwrap();

    let wallet = casino.wallet("mixed").unwrap();
    for book in [
        &wallet.deposit_balance,
        &wallet.winnings_balance,
        &wallet.savings_balance,
    ] {
        assert!(book.values().all(|v| *v >= Decimal::ZERO));
    }
}
