//! Single-unit trading account.
//!
//! The account holds a cash balance and at most one unit of the asset. All
//! mutation goes through [`TradingAccount::open_long`] and
//! [`TradingAccount::close_long`], which either apply the whole transition
//! or leave the account untouched.

use thiserror::Error;

use tb_core::types::Price;

/// Errors that can occur during account transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("insufficient balance {balance:.2} to buy at {price:.2}")]
    InsufficientBalance { balance: Price, price: Price },

    #[error("already long at {entry_price:.2}")]
    AlreadyLong { entry_price: Price },

    #[error("no open position to close")]
    NotLong,

    #[error("balance overflow applying trade at {price:.2}")]
    Overflow { price: Price },
}

impl AccountError {
    /// Short machine-readable tag used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::AlreadyLong { .. } => "already_long",
            Self::NotLong => "not_long",
            Self::Overflow { .. } => "overflow",
        }
    }
}

/// Current holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Flat,
    Long { entry_price: Price },
}

impl Position {
    /// Units held: 0 when flat, 1 when long.
    pub const fn units(&self) -> u8 {
        match self {
            Self::Flat => 0,
            Self::Long { .. } => 1,
        }
    }

    pub const fn is_long(&self) -> bool {
        matches!(self, Self::Long { .. })
    }

    /// Price paid for the held unit, or zero when flat.
    pub const fn entry_price(&self) -> Price {
        match self {
            Self::Flat => Price::ZERO,
            Self::Long { entry_price } => *entry_price,
        }
    }
}

/// Cash balance plus a single-unit position.
///
/// Invariants held between calls:
/// - the balance never goes negative,
/// - the entry price is zero exactly when the account is flat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingAccount {
    balance: Price,
    position: Position,
}

impl TradingAccount {
    /// A flat account holding `initial_balance` in cash.
    pub fn new(initial_balance: Price) -> Self {
        Self {
            balance: initial_balance,
            position: Position::Flat,
        }
    }

    pub fn balance(&self) -> Price {
        self.balance
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn position_units(&self) -> u8 {
        self.position.units()
    }

    pub fn entry_price(&self) -> Price {
        self.position.entry_price()
    }

    /// Buy one unit at `price`.
    ///
    /// Requires a flat account with at least `price` in cash. The full
    /// price is debited; there are no fees or slippage.
    pub fn open_long(&mut self, price: Price) -> Result<(), AccountError> {
        if let Position::Long { entry_price } = self.position {
            return Err(AccountError::AlreadyLong { entry_price });
        }
        if self.balance < price {
            return Err(AccountError::InsufficientBalance {
                balance: self.balance,
                price,
            });
        }
        let balance = self
            .balance
            .checked_sub(price)
            .ok_or(AccountError::Overflow { price })?;

        self.balance = balance;
        self.position = Position::Long { entry_price: price };
        Ok(())
    }

    /// Sell the held unit at `price` and return its entry price.
    pub fn close_long(&mut self, price: Price) -> Result<Price, AccountError> {
        let Position::Long { entry_price } = self.position else {
            return Err(AccountError::NotLong);
        };
        let balance = self
            .balance
            .checked_add(price)
            .ok_or(AccountError::Overflow { price })?;

        self.balance = balance;
        self.position = Position::Flat;
        Ok(entry_price)
    }
}
