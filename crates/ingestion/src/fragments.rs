//! Fragment operations
//!
//! Adding or removing a fragment re-merges and re-validates every
//! version of the article in the same transaction; a result that no
//! longer validates rolls the whole change back.

use articleforge_common::db::repository;
use articleforge_common::errors::{AppError, Result};
use articleforge_common::events::{EventSink, Outbox};
use articleforge_common::ids::Msid;
use articleforge_common::{DbPool, SchemaRegistry, XML2JSON_KEY};
use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde_json::Value;
use tracing::info;

/// Default merge priority for fragments added through the API; they
/// override the primordial fragment.
pub const API_FRAGMENT_POSITION: i32 = 1;

/// Reject reserved or malformed fragment keys.
pub fn check_fragment_key(key: &str) -> Result<()> {
    if key == XML2JSON_KEY {
        return Err(AppError::BadRequest {
            message: format!("fragment key {:?} is reserved", key),
        });
    }
    let well_formed = !key.is_empty()
        && key.len() <= 128
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !well_formed {
        return Err(AppError::BadRequest {
            message: format!("malformed fragment key: {:?}", key),
        });
    }
    Ok(())
}

/// Store a fragment and re-render every version of the article.
///
/// Loud validation: a version left invalid by the new fragment
/// rejects the whole change, and the transaction rolls back.
pub async fn add_fragment(
    db: &DbPool,
    registry: &SchemaRegistry,
    sink: &EventSink,
    msid: Msid,
    key: &str,
    body: Value,
) -> Result<Value> {
    check_fragment_key(key)?;
    if !body.is_object() {
        return Err(AppError::BadRequest {
            message: "fragment body must be a JSON object".to_string(),
        });
    }

    let txn = db.write().begin().await?;

    repository::find_article(&txn, msid)
        .await?
        .ok_or_else(|| AppError::no_record("article", msid))?;

    let stored = repository::upsert_fragment(
        &txn,
        msid,
        key,
        None,
        body,
        API_FRAGMENT_POSITION,
    )
    .await?;

    revalidate_all_versions(&txn, registry, msid).await?;

    txn.commit().await?;
    notify(sink, msid).await;
    info!(msid, key, "fragment stored");

    Ok(stored.fragment)
}

/// Delete a fragment and re-render every version of the article.
///
/// The primordial fragment can never be deleted, regardless of who
/// asks. A deletion that leaves any version invalid rolls back.
pub async fn delete_fragment(
    db: &DbPool,
    registry: &SchemaRegistry,
    sink: &EventSink,
    msid: Msid,
    key: &str,
) -> Result<()> {
    check_fragment_key(key)?;

    let txn = db.write().begin().await?;

    repository::find_article(&txn, msid)
        .await?
        .ok_or_else(|| AppError::no_record("article", msid))?;

    if !repository::delete_fragment(&txn, msid, key).await? {
        return Err(AppError::no_record("article fragment", key));
    }

    revalidate_all_versions(&txn, registry, msid).await?;

    txn.commit().await?;
    notify(sink, msid).await;
    info!(msid, key, "fragment deleted");

    Ok(())
}

async fn revalidate_all_versions(
    txn: &DatabaseTransaction,
    registry: &SchemaRegistry,
    msid: Msid,
) -> Result<()> {
    for av in repository::list_versions(txn, msid, false).await? {
        crate::merge::set_article_json(txn, registry, &av, false, false).await?;
    }
    Ok(())
}

async fn notify(sink: &EventSink, msid: Msid) {
    let mut outbox = Outbox::new();
    outbox.push(msid);
    outbox.drain(sink).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_key_always_rejected() {
        let err = check_fragment_key(XML2JSON_KEY).unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
    }

    #[test]
    fn test_well_formed_keys() {
        assert!(check_fragment_key("correction-figure-3").is_ok());
        assert!(check_fragment_key("press_package").is_ok());
        assert!(check_fragment_key("v2.errata").is_ok());
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for key in ["", "has space", "semi;colon", "a/b"] {
            assert!(
                check_fragment_key(key).is_err(),
                "expected rejection for {:?}",
                key
            );
        }
    }
}
