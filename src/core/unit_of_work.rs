//! Unit of work - one database transaction plus the set of invoices it dirtied.
//!
//! Line item, payment and adjustment writes mark their invoice dirty instead of
//! recalculating immediately. [`UnitOfWork::commit`] recalculates every dirty invoice
//! exactly once and then commits, so callers only ever observe consistent totals.
//! Dropping a unit of work without committing rolls all of its writes back.

use crate::{core::ledger, entities::invoice, errors::Result};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::collections::BTreeSet;
use tracing::debug;

/// An open database transaction with deferred invoice recalculation.
pub struct UnitOfWork {
    txn: DatabaseTransaction,
    dirty: BTreeSet<i64>,
}

impl UnitOfWork {
    /// Begins a new unit of work.
    pub async fn begin(db: &DatabaseConnection) -> Result<Self> {
        Ok(Self {
            txn: db.begin().await?,
            dirty: BTreeSet::new(),
        })
    }

    /// Connection all reads and writes of this unit must go through.
    #[must_use]
    pub const fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// Queues `invoice_id` for recalculation at commit.
    pub fn mark_dirty(&mut self, invoice_id: i64) {
        self.dirty.insert(invoice_id);
    }

    /// Invoices queued for recalculation, in id order.
    #[must_use]
    pub fn dirty_invoices(&self) -> Vec<i64> {
        self.dirty.iter().copied().collect()
    }

    /// Recalculates every dirty invoice once and empties the dirty set.
    async fn flush(&mut self) -> Result<Vec<invoice::Model>> {
        let ids = std::mem::take(&mut self.dirty);
        let mut recalculated = Vec::with_capacity(ids.len());
        for invoice_id in ids {
            recalculated.push(ledger::recalculate_invoice(&self.txn, invoice_id).await?);
        }
        debug!("Recalculated {} invoice(s) at commit", recalculated.len());
        Ok(recalculated)
    }

    /// Flushes pending recalculations and commits. Returns the recalculated invoices.
    pub async fn commit(mut self) -> Result<Vec<invoice::Model>> {
        let recalculated = self.flush().await?;
        self.txn.commit().await?;
        Ok(recalculated)
    }

    /// Discards every write of this unit.
    pub async fn rollback(self) -> Result<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger::{NewLineItem, insert_line_item};
    use crate::entities::{Invoice, LineItemCategory};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::EntityTrait;

    #[tokio::test]
    async fn test_commit_recalculates_each_dirty_invoice_once() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_test_invoice(&fixture.db, &fixture.lease, dec!(0)).await?;

        let mut uow = UnitOfWork::begin(&fixture.db).await?;
        for amount in [dec!(100), dec!(250.50), dec!(49.50)] {
            insert_line_item(
                &mut uow,
                &invoice,
                NewLineItem::single("Charge", LineItemCategory::Other, amount),
            )
            .await?;
        }
        assert_eq!(uow.dirty_invoices(), vec![invoice.id]);

        let recalculated = uow.commit().await?;
        assert_eq!(recalculated.len(), 1);
        assert_eq!(recalculated[0].total, dec!(400.00));

        let stored = Invoice::find_by_id(invoice.id).one(&fixture.db).await?.unwrap();
        assert_eq!(stored.subtotal, dec!(400.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_drop_without_commit_rolls_back() -> Result<()> {
        let fixture = setup_with_lease().await?;
        let invoice = create_test_invoice(&fixture.db, &fixture.lease, dec!(0)).await?;

        {
            let mut uow = UnitOfWork::begin(&fixture.db).await?;
            insert_line_item(
                &mut uow,
                &invoice,
                NewLineItem::single("Never kept", LineItemCategory::Other, dec!(75)),
            )
            .await?;
            uow.rollback().await?;
        }

        let lines = crate::core::invoice::get_line_items(&fixture.db, invoice.id).await?;
        assert!(lines.is_empty());
        let stored = Invoice::find_by_id(invoice.id).one(&fixture.db).await?.unwrap();
        assert_eq!(stored.total, dec!(0));
        Ok(())
    }
}
