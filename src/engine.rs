//! Core replay engine.
//!
//! Replays a chronological event log into ledger state in a single forward
//! pass and serializes the result as a DSV snapshot. The log is trusted to
//! be pre-sorted by timestamp; the engine performs no resorting and no
//! buffering. Replay is all-or-nothing: the first error aborts the run with
//! the failing event's original encoded form attached.

use crate::error::{LedgerError, Result};
use crate::event::{Event, EventKind};
use crate::ledger::{CashAccount, LedgerConfig, MemberAccount, RegisteredTransaction};
use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::str::FromStr;

/// The dues replay engine.
///
/// Owns all ledger state for the duration of a run: the member map, the
/// house configuration, and the aggregate cash account.
///
/// # Output Ordering
///
/// Snapshot lines are written in member insertion order (first registered
/// first), which the roster vector preserves alongside the member map.
pub struct ReplayEngine {
    /// House-wide rates and the prepay cap.
    config: LedgerConfig,

    /// Member accounts keyed by email.
    members: HashMap<String, MemberAccount>,

    /// Emails in registration order, for deterministic snapshots.
    roster: Vec<String>,

    /// Aggregate cash account fed by every `transaction` event.
    cash: CashAccount,
}

impl ReplayEngine {
    /// Creates a new engine with empty state and default house rules.
    pub fn new() -> Self {
        ReplayEngine {
            config: LedgerConfig::default(),
            members: HashMap::new(),
            roster: Vec::new(),
            cash: CashAccount::default(),
        }
    }

    /// Replays an event log read line by line.
    ///
    /// Blank lines are skipped before parsing. Any parse or dispatch failure
    /// aborts the run immediately; dispatch failures are wrapped with the
    /// offending line so the operator can find the event in the log.
    pub fn replay<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let event = Event::parse(&line)?;
            self.apply(&event)
                .map_err(|e| e.in_event(line.trim().to_string()))?;
        }

        info!(
            "replay complete: {} members, {} cash transactions, cash balance {}",
            self.roster.len(),
            self.cash.len(),
            self.cash.balance().normalize()
        );
        Ok(())
    }

    /// Applies a single event to the ledger state.
    pub fn apply(&mut self, event: &Event) -> Result<()> {
        let kind = EventKind::from_name(&event.kind)
            .ok_or_else(|| LedgerError::UnknownEventKind(event.kind.clone()))?;

        match kind {
            EventKind::NewMember => self.handle_new_member(event),
            EventKind::DueSet => self.handle_due_set(event),
            EventKind::DueAdd => self.handle_due_add(event),
            EventKind::Transaction => self.handle_transaction(event),
            EventKind::NextMonth => self.handle_next_month(event),
            EventKind::SetDefaultDue => self.handle_set_default_due(event),
            EventKind::SetHackerDue => self.handle_set_hacker_due(event),
            EventKind::SetMaxPrepaidDuesCount => self.handle_set_max_prepaid(event),
            EventKind::AssertHackersExist => self.handle_assert_members_exist(event),
            EventKind::AssertDefaultDueRateEquals => self.handle_assert_default_rate(event),
            EventKind::AssertHackerDueBalanceEquals => self.handle_assert_balance(event),
            EventKind::AssertHackerDueRateEquals => self.handle_assert_rate(event),
        }
    }

    /// Registers a new member with zero balance.
    ///
    /// Duplicate registration is an error; silently overwriting an existing
    /// account would lose its history.
    fn handle_new_member(&mut self, event: &Event) -> Result<()> {
        let [email] = expect_args(event)?;
        if self.members.contains_key(email) {
            return Err(LedgerError::DuplicateMember(email.clone()));
        }

        self.members.insert(
            email.clone(),
            MemberAccount::new(event.timestamp, email.clone()),
        );
        self.roster.push(email.clone());
        debug!("{}: registered member {}", event.timestamp, email);
        Ok(())
    }

    /// Overwrites a member's balance unconditionally.
    fn handle_due_set(&mut self, event: &Event) -> Result<()> {
        let [email, balance] = expect_args(event)?;
        let balance = parse_decimal(event, balance, "balance")?;
        let account = member_mut(&mut self.members, email)?;
        account.balance = balance;
        debug!("{}: set balance of {} to {}", event.timestamp, email, balance);
        Ok(())
    }

    /// Adds a delta to a member's balance.
    fn handle_due_add(&mut self, event: &Event) -> Result<()> {
        let [email, delta] = expect_args(event)?;
        let delta = parse_decimal(event, delta, "delta")?;
        let account = member_mut(&mut self.members, email)?;
        account.balance += delta;
        debug!(
            "{}: added {} to {}, balance now {}",
            event.timestamp, delta, email, account.balance
        );
        Ok(())
    }

    /// Registers a bank transaction.
    ///
    /// When the subject is a known member email the payment is converted to
    /// months at the member's effective rate and credited up to the prepay
    /// cap. The raw transaction lands in the cash account either way.
    fn handle_transaction(&mut self, event: &Event) -> Result<()> {
        let [amount, subject] = expect_args(event)?;
        let amount = parse_decimal(event, amount, "amount")?;

        if let Some(account) = self.members.get_mut(subject) {
            let rate = self.config.rate_for(subject);
            if rate <= Decimal::ZERO {
                return Err(LedgerError::InvalidRate {
                    email: subject.clone(),
                    rate: rate.normalize().to_string(),
                });
            }

            let cap = self.config.max_prepaid_dues_count;
            if account.credit_payment(event.timestamp, amount, rate, cap) {
                debug!(
                    "{}: credited {} at rate {} to {}, balance now {}",
                    event.timestamp, amount, rate, subject, account.balance
                );
            } else {
                debug!(
                    "{}: {} already at prepay cap, payment of {} not credited",
                    event.timestamp, subject, amount
                );
            }
        }

        self.cash.register(RegisteredTransaction {
            date: event.timestamp,
            amount,
            subject: subject.clone(),
        });
        Ok(())
    }

    /// Decrements the balance of every member whose entry date is more than
    /// 30 days before the event. Newer members are left alone.
    fn handle_next_month(&mut self, event: &Event) -> Result<()> {
        expect_args::<0>(event)?;
        for email in &self.roster {
            // Roster entries always have a backing account.
            let account = self.members.get_mut(email).expect("rostered member exists");
            if account.owes_for_month(event.timestamp) {
                account.balance -= Decimal::ONE;
            }
        }
        debug!("{}: monthly dues charged", event.timestamp);
        Ok(())
    }

    fn handle_set_default_due(&mut self, event: &Event) -> Result<()> {
        let [rate] = expect_args(event)?;
        self.config.default_rate = parse_decimal(event, rate, "rate")?;
        debug!(
            "{}: default rate set to {}",
            event.timestamp, self.config.default_rate
        );
        Ok(())
    }

    fn handle_set_hacker_due(&mut self, event: &Event) -> Result<()> {
        let [rate, email] = expect_args(event)?;
        let rate = parse_decimal(event, rate, "rate")?;
        self.config.set_rate(email.clone(), rate);
        debug!("{}: rate for {} set to {}", event.timestamp, email, rate);
        Ok(())
    }

    fn handle_set_max_prepaid(&mut self, event: &Event) -> Result<()> {
        let [count] = expect_args(event)?;
        let count = parse_decimal(event, count, "count")?;
        self.config.max_prepaid_dues_count = Some(count);
        debug!("{}: prepay cap set to {}", event.timestamp, count);
        Ok(())
    }

    /// Checkpoint: every listed email must be a registered member.
    fn handle_assert_members_exist(&self, event: &Event) -> Result<()> {
        for email in &event.args {
            if !self.members.contains_key(email) {
                return Err(LedgerError::AssertionFailed {
                    message: format!("member `{email}` is not registered"),
                    comment: event.comment.clone(),
                });
            }
        }
        Ok(())
    }

    /// Checkpoint: the default rate must equal the expected value.
    fn handle_assert_default_rate(&self, event: &Event) -> Result<()> {
        let [expected] = expect_args(event)?;
        let expected = parse_decimal(event, expected, "rate")?;
        if self.config.default_rate != expected {
            return Err(LedgerError::AssertionFailed {
                message: format!(
                    "expected default rate {}, actual {}",
                    expected.normalize(),
                    self.config.default_rate.normalize()
                ),
                comment: event.comment.clone(),
            });
        }
        Ok(())
    }

    /// Checkpoint: a member's balance must equal the expected value.
    fn handle_assert_balance(&self, event: &Event) -> Result<()> {
        let [email, expected] = expect_args(event)?;
        let expected = parse_decimal(event, expected, "balance")?;
        let account = self
            .members
            .get(email)
            .ok_or_else(|| LedgerError::MemberNotFound(email.clone()))?;
        if account.balance != expected {
            return Err(LedgerError::AssertionFailed {
                message: format!(
                    "expected balance {} for `{}`, actual {}",
                    expected.normalize(),
                    email,
                    account.balance.normalize()
                ),
                comment: event.comment.clone(),
            });
        }
        Ok(())
    }

    /// Checkpoint: a member's effective rate must equal the expected value.
    fn handle_assert_rate(&self, event: &Event) -> Result<()> {
        let [email, expected] = expect_args(event)?;
        let expected = parse_decimal(event, expected, "rate")?;
        if !self.members.contains_key(email.as_str()) {
            return Err(LedgerError::MemberNotFound(email.clone()));
        }
        let actual = self.config.rate_for(email);
        if actual != expected {
            return Err(LedgerError::AssertionFailed {
                message: format!(
                    "expected rate {} for `{}`, actual {}",
                    expected.normalize(),
                    email,
                    actual.normalize()
                ),
                comment: event.comment.clone(),
            });
        }
        Ok(())
    }

    /// Writes the ledger snapshot, one member per line in registration
    /// order. Nothing is written if replay aborted earlier; callers only
    /// reach this on a fully successful run.
    pub fn write_snapshot<W: Write>(&self, mut writer: W) -> Result<()> {
        for email in &self.roster {
            let account = self.members.get(email).expect("rostered member exists");
            writeln!(writer, "{}", account.to_snapshot_record())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Returns a member account by email.
    pub fn member(&self, email: &str) -> Option<&MemberAccount> {
        self.members.get(email)
    }

    /// Iterates member accounts in registration order.
    pub fn members(&self) -> impl Iterator<Item = &MemberAccount> {
        self.roster
            .iter()
            .map(|email| self.members.get(email).expect("rostered member exists"))
    }

    /// Current house configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Aggregate cash account.
    pub fn cash_account(&self) -> &CashAccount {
        &self.cash
    }
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates an event's argument arity and returns the arguments as a
/// fixed-size array for destructuring.
fn expect_args<const N: usize>(event: &Event) -> Result<&[String; N]> {
    <&[String; N]>::try_from(event.args.as_slice()).map_err(|_| LedgerError::InvalidArgs {
        kind: event.kind.clone(),
        message: format!("expected {} argument(s), got {}", N, event.args.len()),
    })
}

/// Parses a decimal argument, failing with the handler's kind for context.
fn parse_decimal(event: &Event, value: &str, what: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim()).map_err(|_| LedgerError::InvalidArgs {
        kind: event.kind.clone(),
        message: format!("unparseable {what} `{value}`"),
    })
}

fn member_mut<'a>(
    members: &'a mut HashMap<String, MemberAccount>,
    email: &str,
) -> Result<&'a mut MemberAccount> {
    members
        .get_mut(email)
        .ok_or_else(|| LedgerError::MemberNotFound(email.to_string()))
}
