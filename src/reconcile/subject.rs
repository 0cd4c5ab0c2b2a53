use std::fmt;
use std::marker::PhantomData;

use rusqlite::{Connection, TransactionBehavior};

use super::{reconcile, record_intent, GatewayFacts, PaymentIntent, PaymentState};
use crate::db::queries;
use crate::error::Result;
use crate::models::{PurchaseKind, RecordPayment};

/// A table whose rows carry a paid/unpaid payment state keyed by natural key.
///
/// Implementors only describe how to load and upsert the state; the transition
/// rules live in [`reconcile`] and are shared.
pub trait PaymentSubject {
    type Key: fmt::Debug;

    const KIND: PurchaseKind;

    fn load(conn: &Connection, key: &Self::Key) -> Result<Option<PaymentState>>;

    /// Insert-or-update keyed on the natural key.
    fn store(conn: &Connection, key: &Self::Key, state: &PaymentState) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentKey {
    pub user_id: String,
    pub course_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EbookPurchaseKey {
    pub user_id: String,
    pub ebook_id: String,
}

/// `enrollments`, paid discriminator is the `paid` flag.
pub struct CourseSubject;

/// `ebook_purchases`, paid discriminator is `status = 'paid'`.
pub struct EbookSubject;

impl PaymentSubject for CourseSubject {
    type Key = EnrollmentKey;

    const KIND: PurchaseKind = PurchaseKind::Course;

    fn load(conn: &Connection, key: &EnrollmentKey) -> Result<Option<PaymentState>> {
        Ok(queries::get_enrollment(conn, &key.user_id, &key.course_id)?
            .map(|e| e.payment_state()))
    }

    fn store(conn: &Connection, key: &EnrollmentKey, state: &PaymentState) -> Result<()> {
        queries::upsert_enrollment(conn, &key.user_id, &key.course_id, state)
    }
}

impl PaymentSubject for EbookSubject {
    type Key = EbookPurchaseKey;

    const KIND: PurchaseKind = PurchaseKind::Ebook;

    fn load(conn: &Connection, key: &EbookPurchaseKey) -> Result<Option<PaymentState>> {
        Ok(queries::get_ebook_purchase(conn, &key.user_id, &key.ebook_id)?
            .map(|p| p.payment_state()))
    }

    fn store(conn: &Connection, key: &EbookPurchaseKey, state: &PaymentState) -> Result<()> {
        queries::upsert_ebook_purchase(conn, &key.user_id, &key.ebook_id, state)
    }
}

/// How a write moved the subject through the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    IntentRecorded,
    BecamePaid,
    /// Already paid; only timestamps refreshed
    AlreadyPaid,
    /// Non-success report; bookkeeping refreshed, still unpaid
    StillUnpaid,
    /// Non-success report for a subject with no intent; nothing written
    Untracked,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub transition: Transition,
    pub state: Option<PaymentState>,
}

impl Outcome {
    pub fn is_paid(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.paid)
    }
}

/// Applies intents and gateway facts to one subject type.
///
/// Each call runs read-reconcile-upsert inside one IMMEDIATE transaction, so a
/// callback and a webhook racing on the same row serialize on the write lock.
pub struct PaymentReconciler<S>(PhantomData<S>);

impl<S: PaymentSubject> PaymentReconciler<S> {
    pub fn record_intent(
        conn: &mut Connection,
        key: &S::Key,
        intent: &PaymentIntent,
    ) -> Result<Outcome> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = S::load(&tx, key)?;
        if current.as_ref().is_some_and(|s| s.paid) {
            tracing::info!(
                "{} checkout started for already paid {:?} (reference {})",
                S::KIND.as_ref(),
                key,
                intent.reference
            );
            return Ok(Outcome {
                transition: Transition::AlreadyPaid,
                state: current,
            });
        }

        let next = record_intent(current.as_ref(), intent);
        S::store(&tx, key, &next)?;
        tx.commit()?;

        tracing::debug!(
            "{} intent recorded: {:?}, reference={}, amount={} {}",
            S::KIND.as_ref(),
            key,
            intent.reference,
            intent.amount_minor,
            intent.currency
        );

        Ok(Outcome {
            transition: Transition::IntentRecorded,
            state: Some(next),
        })
    }

    pub fn apply(conn: &mut Connection, key: &S::Key, facts: &GatewayFacts) -> Result<Outcome> {
        Self::apply_inner(conn, key, facts, None)
    }

    /// Like [`apply`](Self::apply), with the ledger row upserted in the same
    /// transaction. Either both writes land or neither does.
    pub fn apply_recorded(
        conn: &mut Connection,
        key: &S::Key,
        facts: &GatewayFacts,
        ledger: &RecordPayment,
    ) -> Result<Outcome> {
        Self::apply_inner(conn, key, facts, Some(ledger))
    }

    fn apply_inner(
        conn: &mut Connection,
        key: &S::Key,
        facts: &GatewayFacts,
        ledger: Option<&RecordPayment>,
    ) -> Result<Outcome> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = S::load(&tx, key)?;
        let was_paid = current.as_ref().is_some_and(|s| s.paid);

        let Some(next) = reconcile(current.as_ref(), facts) else {
            if let Some(ledger) = ledger {
                queries::upsert_payment(&tx, ledger)?;
                tx.commit()?;
            }
            tracing::info!(
                "{} report for untracked {:?}: reference={}, status={}",
                S::KIND.as_ref(),
                key,
                facts.reference,
                facts.status
            );
            return Ok(Outcome {
                transition: Transition::Untracked,
                state: None,
            });
        };

        S::store(&tx, key, &next)?;
        if let Some(ledger) = ledger {
            queries::upsert_payment(&tx, ledger)?;
        }
        tx.commit()?;

        let transition = if was_paid {
            Transition::AlreadyPaid
        } else if next.paid {
            Transition::BecamePaid
        } else {
            Transition::StillUnpaid
        };

        match transition {
            Transition::BecamePaid => tracing::info!(
                "{} paid: {:?}, reference={}, amount={} {}, via {:?}",
                S::KIND.as_ref(),
                key,
                facts.reference,
                next.amount_minor,
                next.currency,
                facts.source
            ),
            Transition::AlreadyPaid => tracing::debug!(
                "{} already paid: {:?}, reference={}, via {:?}",
                S::KIND.as_ref(),
                key,
                facts.reference,
                facts.source
            ),
            _ => tracing::info!(
                "{} not paid: {:?}, reference={}, status={}",
                S::KIND.as_ref(),
                key,
                facts.reference,
                facts.status
            ),
        }

        Ok(Outcome {
            transition,
            state: Some(next),
        })
    }
}
