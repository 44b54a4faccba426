use crate::{
    db::DbPool,
    entities::order_sequence::{self, Entity as OrderSequenceEntity},
    errors::ServiceError,
};
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr, TransactionTrait,
};
use std::sync::Arc;
use tracing::{instrument, warn};

const MAX_ALLOCATION_ATTEMPTS: u8 = 3;

/// Allocates human-readable order numbers of the form `ORD-YYYYMMDD-NNN`,
/// where NNN restarts at 001 each calendar day.
///
/// Numbers come from a per-day counter row advanced by a transactional
/// increment and read back inside the same transaction, so two orders
/// created in the same instant can never be handed the same number. The
/// day's first allocation inserts the row; losing that insert race to a
/// concurrent request surfaces as a unique violation and is retried.
#[derive(Clone)]
pub struct OrderSequenceService {
    db_pool: Arc<DbPool>,
}

impl OrderSequenceService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Returns the next order number for `for_date`.
    #[instrument(skip(self), fields(for_date = %for_date))]
    pub async fn next_order_number(&self, for_date: NaiveDate) -> Result<String, ServiceError> {
        let db = &*self.db_pool;

        for attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

            let updated = OrderSequenceEntity::update_many()
                .col_expr(
                    order_sequence::Column::Counter,
                    Expr::col(order_sequence::Column::Counter).add(1),
                )
                .col_expr(order_sequence::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(order_sequence::Column::SeqDate.eq(for_date))
                .exec(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            if updated.rows_affected > 0 {
                // The row lock taken by the UPDATE holds until commit, so the
                // read-back observes exactly the value this increment produced.
                let row = OrderSequenceEntity::find_by_id(for_date)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?
                    .ok_or_else(|| {
                        ServiceError::InternalError(
                            "order sequence row vanished mid-transaction".to_string(),
                        )
                    })?;
                txn.commit().await.map_err(ServiceError::DatabaseError)?;
                return Ok(format_order_number(for_date, row.counter));
            }

            // First allocation of the day.
            let insert = order_sequence::ActiveModel {
                seq_date: Set(for_date),
                counter: Set(1),
                updated_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await;

            match insert {
                Ok(_) => {
                    txn.commit().await.map_err(ServiceError::DatabaseError)?;
                    return Ok(format_order_number(for_date, 1));
                }
                Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    warn!(
                        attempt = attempt,
                        "Lost the first-of-day sequence insert race; retrying"
                    );
                    txn.rollback().await.map_err(ServiceError::DatabaseError)?;
                    continue;
                }
                Err(e) => return Err(ServiceError::DatabaseError(e)),
            }
        }

        Err(ServiceError::InternalError(
            "order number allocation kept racing".to_string(),
        ))
    }
}

fn format_order_number(date: NaiveDate, counter: i64) -> String {
    format!("ORD-{}-{:03}", date.format("%Y%m%d"), counter)
}
