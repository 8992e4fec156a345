//! Value-transfer collaborator.
//!
//! A pool holds two of these: one for the stake resource and one for the
//! reward resource. The ledger only needs to move value between an
//! account and pool custody, and to read what custody holds. Balance
//! bookkeeping and allowances belong to the implementation.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use accrue_types::Amount;

use crate::TransferError;

/// Moves one resource in and out of a pool's custody.
///
/// Each call either moves the full amount or fails without moving anything.
pub trait ValueTransfer<A> {
    /// Move `amount` from `from` into pool custody.
    fn transfer_into(&mut self, from: &A, amount: Amount) -> Result<(), TransferError>;

    /// Move `amount` from pool custody to `to`.
    fn transfer_out_of(&mut self, to: &A, amount: Amount) -> Result<(), TransferError>;

    /// Amount currently held in pool custody.
    fn custody_balance(&self) -> Amount;
}

#[derive(Debug)]
struct TokenBook<A> {
    balances: HashMap<A, Amount>,
    denied: HashSet<A>,
}

/// In-memory fungible token with a pool custody holder.
///
/// Cloning shares the balance book, and [`InMemoryToken::with_custody`]
/// gives another pool its own custody holder on the same token.
#[derive(Clone, Debug)]
pub struct InMemoryToken<A> {
    book: Rc<RefCell<TokenBook<A>>>,
    custody: A,
}

impl<A> InMemoryToken<A>
where
    A: Clone + Eq + Hash + Debug,
{
    /// Create a token with an empty balance book.
    pub fn new(custody: A) -> Self {
        Self {
            book: Rc::new(RefCell::new(TokenBook {
                balances: HashMap::new(),
                denied: HashSet::new(),
            })),
            custody,
        }
    }

    /// Handle on the same token with a different custody holder.
    pub fn with_custody(&self, custody: A) -> Self {
        Self {
            book: Rc::clone(&self.book),
            custody,
        }
    }

    pub fn custody(&self) -> &A {
        &self.custody
    }

    /// Credit `amount` to `holder` out of thin air.
    pub fn mint(&self, holder: &A, amount: Amount) {
        let mut book = self.book.borrow_mut();
        let balance = book.balances.entry(holder.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, holder: &A) -> Amount {
        self.book
            .borrow()
            .balances
            .get(holder)
            .copied()
            .unwrap_or(0)
    }

    /// Sum of every holder's balance.
    pub fn total_supply(&self) -> Amount {
        self.book
            .borrow()
            .balances
            .values()
            .fold(0, |sum, v| sum.saturating_add(*v))
    }

    /// Refuse every transfer touching `holder`.
    pub fn deny(&self, holder: &A) {
        self.book.borrow_mut().denied.insert(holder.clone());
    }

    /// Lift a previous [`InMemoryToken::deny`].
    pub fn allow(&self, holder: &A) {
        self.book.borrow_mut().denied.remove(holder);
    }

    fn move_value(&self, from: &A, to: &A, amount: Amount) -> Result<(), TransferError> {
        let mut book = self.book.borrow_mut();
        if book.denied.contains(from) || book.denied.contains(to) {
            return Err(TransferError::Rejected(format!(
                "transfer between {from:?} and {to:?} not authorized"
            )));
        }
        if amount == 0 || from == to {
            return Ok(());
        }

        let available = book.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let receiver = book.balances.get(to).copied().unwrap_or(0);
        let credited = receiver
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("receiver balance overflow".to_string()))?;

        book.balances.insert(from.clone(), available - amount);
        book.balances.insert(to.clone(), credited);
        Ok(())
    }
}

impl<A> ValueTransfer<A> for InMemoryToken<A>
where
    A: Clone + Eq + Hash + Debug,
{
    fn transfer_into(&mut self, from: &A, amount: Amount) -> Result<(), TransferError> {
        let custody = self.custody.clone();
        self.move_value(from, &custody, amount)
    }

    fn transfer_out_of(&mut self, to: &A, amount: Amount) -> Result<(), TransferError> {
        let custody = self.custody.clone();
        self.move_value(&custody, to, amount)
    }

    fn custody_balance(&self) -> Amount {
        self.balance_of(&self.custody)
    }
}
