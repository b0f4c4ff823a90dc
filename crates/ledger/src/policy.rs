//! Execution policy: applies one oracle decision to the account.
//!
//! | state | action  | guard             | effect                         |
//! |-------|---------|-------------------|--------------------------------|
//! | FLAT  | BUY     | balance >= price  | debit price, go LONG           |
//! | FLAT  | BUY     | balance < price   | none                           |
//! | LONG  | SELL    |                   | credit price, go FLAT, PnL     |
//! | any   | other   |                   | none                           |
//!
//! Every call yields exactly one [`LogEntry`], whether or not the account
//! changed.

use std::fmt;

use tb_core::types::{Action, MarketTick, Price};

use crate::account::{AccountError, TradingAccount};

/// Asset label written into trade log lines.
pub const ASSET: &str = "BTC";

/// What the policy did with a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The account transitioned.
    Executed,
    /// HOLD or an unrecognized code; nothing to do.
    NoOp,
    /// A BUY or SELL the account refused.
    Blocked(AccountError),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Executed => "executed",
            Self::NoOp => "no_op",
            Self::Blocked(err) => err.kind(),
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One trade log record: the decision, the tick it was made on, and the
/// account state after it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub time: String,
    pub action: Action,
    pub price: Price,
    pub volume: String,
    pub balance: Price,
    pub position: u8,
    /// Realized balance change, present only when a long was closed.
    pub pnl: Option<Price>,
    pub outcome: Outcome,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Time: {}, Action: {}, Price: ${:.2}, Volume: {}, Balance: ${:.2}, Position: {} {}",
            self.time, self.action, self.price, self.volume, self.balance, self.position, ASSET
        )?;
        if let Some(pnl) = self.pnl {
            write!(f, ", PnL: ${pnl:.2}")?;
        }
        Ok(())
    }
}

/// Apply `action` to `account` at the tick's price.
pub fn execute(account: &mut TradingAccount, action: Action, tick: &MarketTick) -> LogEntry {
    let balance_before = account.balance();
    let units_before = account.position_units();

    let result = match action {
        Action::Buy => account.open_long(tick.price),
        Action::Sell => account.close_long(tick.price).map(|_| ()),
        Action::Hold | Action::Unknown(_) => Ok(()),
    };

    let outcome = match result {
        Ok(()) if matches!(action, Action::Buy | Action::Sell) => Outcome::Executed,
        Ok(()) => Outcome::NoOp,
        Err(err) => {
            tracing::debug!(
                action = %action,
                price = %tick.price,
                reason = %err,
                "decision blocked by account"
            );
            Outcome::Blocked(err)
        }
    };

    // PnL is realized on close only; the opening BUY logs no PnL field.
    let pnl = if units_before == 1 && account.position_units() == 0 {
        account.balance().checked_sub(balance_before)
    } else {
        None
    };

    LogEntry {
        time: tick.time.clone(),
        action,
        price: tick.price,
        volume: tick.volume.clone(),
        balance: account.balance(),
        position: account.position_units(),
        pnl,
        outcome,
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::account::Position;
    use proptest::prelude::*;

    /// Mostly valid codes, with arbitrary integers mixed in.
    fn arb_code() -> impl Strategy<Value = i64> {
        prop_oneof![4 => 0i64..3, 1 => any::<i64>()]
    }

    fn arb_price() -> impl Strategy<Value = Price> {
        (1i64..1_000_000_000_000i64).prop_map(Price::from_mantissa)
    }

    fn arb_balance() -> impl Strategy<Value = Price> {
        (0i64..1_000_000_000_000_000i64).prop_map(Price::from_mantissa)
    }

    fn tick(price: Price) -> MarketTick {
        MarketTick {
            time: "t".into(),
            price,
            volume: "1".into(),
        }
    }

    // Every step keeps the ledger consistent and follows the transition table.
    proptest! {
        #[test]
        fn invariants_hold_for_any_decision_sequence(
            initial in arb_balance(),
            steps in proptest::collection::vec((arb_code(), arb_price()), 0..64),
        ) {
            let mut account = TradingAccount::new(initial);

            for (code, price) in steps {
                let before = account.clone();
                let action = Action::from_code(code);
                let entry = execute(&mut account, action, &tick(price));

                prop_assert!(account.position_units() <= 1);
                prop_assert_eq!(entry.position, account.position_units());
                prop_assert_eq!(entry.balance, account.balance());
                prop_assert!(account.balance() >= Price::ZERO);
                if account.position_units() == 0 {
                    prop_assert_eq!(account.entry_price(), Price::ZERO);
                } else {
                    prop_assert!(account.entry_price().is_positive());
                }

                match (action, before.position()) {
                    (Action::Buy, Position::Flat) if before.balance() >= price => {
                        prop_assert!(entry.outcome.is_executed());
                        prop_assert_eq!(account.balance(), before.balance() - price);
                        prop_assert_eq!(account.entry_price(), price);
                        prop_assert_eq!(entry.pnl, None);
                    }
                    (Action::Sell, Position::Long { .. }) => {
                        prop_assert!(entry.outcome.is_executed());
                        prop_assert_eq!(account.balance(), before.balance() + price);
                        prop_assert_eq!(account.position(), Position::Flat);
                        prop_assert_eq!(entry.pnl, Some(price));
                    }
                    _ => {
                        prop_assert_eq!(&account, &before);
                        prop_assert!(!entry.outcome.is_executed());
                        prop_assert_eq!(entry.pnl, None);
                    }
                }
            }
        }
    }

    // A BUY the balance cannot cover never changes the account.
    proptest! {
        #[test]
        fn buy_never_executes_above_balance(
            price in arb_price(),
            shortfall in 1i64..1_000_000_000i64,
        ) {
            let balance = Price::from_mantissa((price.mantissa() - shortfall).max(0));
            let mut account = TradingAccount::new(balance);
            let entry = execute(&mut account, Action::Buy, &tick(price));

            prop_assert_eq!(entry.outcome.as_str(), "insufficient_balance");
            prop_assert_eq!(account.balance(), balance);
            prop_assert_eq!(account.position(), Position::Flat);
        }
    }

    // A round trip moves the balance by the price difference and logs the
    // sell price as PnL.
    proptest! {
        #[test]
        fn round_trip_pnl_equals_sell_price(
            initial in arb_balance(),
            buy in arb_price(),
            sell in arb_price(),
        ) {
            prop_assume!(initial >= buy);
            let mut account = TradingAccount::new(initial);

            let opened = execute(&mut account, Action::Buy, &tick(buy));
            prop_assert!(opened.outcome.is_executed());
            let closed = execute(&mut account, Action::Sell, &tick(sell));

            prop_assert_eq!(closed.pnl, Some(sell));
            prop_assert_eq!(account.balance(), initial - buy + sell);
            prop_assert_eq!(account.entry_price(), Price::ZERO);
        }
    }

    // HOLD and unknown codes are idempotent in any state.
    proptest! {
        #[test]
        fn no_op_decisions_leave_state_intact(
            initial in arb_balance(),
            open_at in proptest::option::of(arb_price()),
            code in any::<i64>().prop_filter("not BUY or SELL", |c| *c != 1 && *c != 2),
            repeats in 1usize..8,
        ) {
            let mut account = TradingAccount::new(initial);
            if let Some(price) = open_at {
                execute(&mut account, Action::Buy, &tick(price));
            }
            let before = account.clone();

            for _ in 0..repeats {
                let entry = execute(&mut account, Action::from_code(code), &tick(Price::from_mantissa(1)));
                prop_assert_eq!(&entry.outcome, &Outcome::NoOp);
                prop_assert_eq!(entry.pnl, None);
            }
            prop_assert_eq!(account, before);
        }
    }
}
