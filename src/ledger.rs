//! Ledger state: per-member dues accounts, the house rate table, and the
//! aggregate cash account.
//!
//! All state here is exclusively owned and mutated by the replay engine for
//! the duration of a run.

use crate::dsv;
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

/// One entry in a member's dues history.
///
/// Immutable once created. Wire form (nested `,` sub-record inside a
/// snapshot field): `date,transaction_amount,dues_balance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuesHistoryRecord {
    pub date: NaiveDate,

    /// Dues balance after the transaction was applied.
    pub dues_balance: Decimal,

    pub transaction_amount: Decimal,
}

impl DuesHistoryRecord {
    /// Encodes the entry as a `,`-delimited sub-record.
    pub fn to_record(&self) -> String {
        dsv::encode_record(
            [
                self.date.to_string(),
                self.transaction_amount.normalize().to_string(),
                self.dues_balance.normalize().to_string(),
            ],
            dsv::HISTORY_DELIMITER,
        )
    }

    /// Decodes a `,`-delimited sub-record back into an entry.
    pub fn from_record(sub_record: &str) -> Result<DuesHistoryRecord> {
        let fields = dsv::decode_record(sub_record, dsv::HISTORY_DELIMITER);
        let [date, amount, balance] = fields.as_slice() else {
            return Err(LedgerError::EventParse {
                line: sub_record.to_string(),
                reason: "expected 3 history fields".to_string(),
            });
        };
        let parse_err = |what: &str, value: &str| LedgerError::EventParse {
            line: sub_record.to_string(),
            reason: format!("unparseable history {what} `{value}`"),
        };
        Ok(DuesHistoryRecord {
            date: date
                .parse::<NaiveDate>()
                .map_err(|_| parse_err("date", date))?,
            transaction_amount: Decimal::from_str(amount)
                .map_err(|_| parse_err("amount", amount))?,
            dues_balance: Decimal::from_str(balance)
                .map_err(|_| parse_err("balance", balance))?,
        })
    }
}

/// A member's dues account.
///
/// Created exactly once by a `newMember` event and never deleted within a
/// replay run. The balance counts months of dues prepaid; negative means
/// owing.
#[derive(Debug, Clone)]
pub struct MemberAccount {
    /// When membership began; drives monthly decrement eligibility.
    pub entry_date: NaiveDate,

    /// Unique key.
    pub email: String,

    /// Months of dues prepaid.
    pub balance: Decimal,

    /// Append-only, in event-log order.
    pub dues_history: Vec<DuesHistoryRecord>,
}

impl MemberAccount {
    /// Creates a new account with zero balance.
    pub fn new(entry_date: NaiveDate, email: String) -> Self {
        MemberAccount {
            entry_date,
            email,
            balance: Decimal::ZERO,
            dues_history: Vec::new(),
        }
    }

    /// Whether a `nextMonth` event on the given date decrements this
    /// account. Members newer than 30 days are left alone.
    pub fn owes_for_month(&self, on: NaiveDate) -> bool {
        on.signed_duration_since(self.entry_date).num_days() > 30
    }

    /// Applies a matched dues payment: credits `amount / rate` months,
    /// capped at `cap`, and appends a history entry.
    ///
    /// Returns `false` without touching the account when the balance is
    /// already at or above the cap. The caller has validated `rate > 0`.
    pub fn credit_payment(
        &mut self,
        date: NaiveDate,
        amount: Decimal,
        rate: Decimal,
        cap: Option<Decimal>,
    ) -> bool {
        if let Some(cap) = cap {
            if self.balance >= cap {
                return false;
            }
        }

        let mut new_balance = self.balance + amount / rate;
        if let Some(cap) = cap {
            if new_balance > cap {
                new_balance = cap;
            }
        }
        self.balance = new_balance;
        self.dues_history.push(DuesHistoryRecord {
            date,
            dues_balance: new_balance,
            transaction_amount: amount,
        });
        true
    }

    /// Encodes the account as one snapshot line:
    /// `email;balance;history_1;history_2;...`.
    ///
    /// Each history entry is first encoded as a `,` sub-record and then
    /// escaped as an ordinary field of the outer `;` record.
    pub fn to_snapshot_record(&self) -> String {
        let mut fields = vec![self.email.clone(), self.balance.normalize().to_string()];
        fields.extend(self.dues_history.iter().map(|h| h.to_record()));
        dsv::encode_record(fields, dsv::RECORD_DELIMITER)
    }
}

/// A parsed snapshot line, for downstream consumers of persisted snapshots.
///
/// The entry date is not persisted, so this is deliberately not a full
/// `MemberAccount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSnapshot {
    pub email: String,
    pub balance: Decimal,
    pub dues_history: Vec<DuesHistoryRecord>,
}

impl MemberSnapshot {
    /// Decodes one snapshot line.
    pub fn parse(line: &str) -> Result<MemberSnapshot> {
        let fields = dsv::decode_record(line, dsv::RECORD_DELIMITER);
        let [email, balance, history @ ..] = fields.as_slice() else {
            return Err(LedgerError::EventParse {
                line: line.trim().to_string(),
                reason: "expected at least email and balance".to_string(),
            });
        };
        Ok(MemberSnapshot {
            email: email.clone(),
            balance: Decimal::from_str(balance).map_err(|_| LedgerError::EventParse {
                line: line.trim().to_string(),
                reason: format!("unparseable balance `{balance}`"),
            })?,
            dues_history: history
                .iter()
                .map(|h| DuesHistoryRecord::from_record(h))
                .collect::<Result<_>>()?,
        })
    }
}

/// House-wide dues configuration, owned by the replay engine and threaded
/// through every handler call.
///
/// At most one default rate and one prepay cap are live at any point in a
/// replay; later `set*` events override earlier ones without retroactive
/// effect.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Unit price of one month of dues unless overridden per member.
    pub default_rate: Decimal,

    /// Per-member override rates.
    rates: HashMap<String, Decimal>,

    /// Ceiling on a member's balance; `None` means unbounded.
    pub max_prepaid_dues_count: Option<Decimal>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            default_rate: Decimal::ONE_HUNDRED,
            rates: HashMap::new(),
            max_prepaid_dues_count: None,
        }
    }
}

impl LedgerConfig {
    /// Effective rate for a member: the override if one exists, otherwise
    /// the default.
    pub fn rate_for(&self, email: &str) -> Decimal {
        self.rates.get(email).copied().unwrap_or(self.default_rate)
    }

    /// Sets a per-member override rate.
    pub fn set_rate(&mut self, email: String, rate: Decimal) {
        self.rates.insert(email, rate);
    }
}

/// A `transaction` event registered into the cash account.
#[derive(Debug, Clone)]
pub struct RegisteredTransaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub subject: String,
}

/// Aggregate cash-account state: every `transaction` event lands here,
/// member-matched or not.
#[derive(Debug, Clone, Default)]
pub struct CashAccount {
    base_balance: Decimal,
    transactions: Vec<RegisteredTransaction>,
}

impl CashAccount {
    /// Appends a transaction. The sequence is append-only.
    pub fn register(&mut self, transaction: RegisteredTransaction) {
        self.transactions.push(transaction);
    }

    /// Current balance, recomputed as a fold over every registered
    /// transaction plus the base balance. Never cached, so repeated calls
    /// always agree.
    pub fn balance(&self) -> Decimal {
        self.transactions
            .iter()
            .fold(self.base_balance, |balance, t| balance + t.amount)
    }

    /// Number of registered transactions.
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
