//! [`MappingRegistry`]: the in-memory field mapping cache and its durable
//! `mappings` table.

use nosqlite_core::mapping::{Mapping, Mappings, Plan};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
  Error, Result,
  encode::RawMapping,
  evolve,
  schema::DATA_TABLE,
};

/// Field → mapping cache, replayed from the `mappings` table on open.
///
/// Every mutation goes through [`evolve`](Self::evolve) or
/// [`set_indexed`](Self::set_indexed), which hold the cache lock across
/// planning, DDL and the cache update. That lock is the single flight for
/// all field paths. The cache is only written after the transaction
/// carrying the matching rows and DDL commits.
pub(crate) struct MappingRegistry {
  conn:  tokio_rusqlite::Connection,
  cache: Mutex<Mappings>,
}

impl MappingRegistry {
  /// Load every persisted mapping. The result is trusted as-is.
  pub async fn load(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let raws: Vec<RawMapping> = conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT field, jsType, sqlType, indexed FROM mappings")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawMapping {
              field:    row.get(0)?,
              js_type:  row.get(1)?,
              sql_type: row.get(2)?,
              indexed:  row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mappings = raws
      .into_iter()
      .map(RawMapping::into_mapping)
      .collect::<Result<Mappings>>()?;

    Ok(Self { conn, cache: Mutex::new(mappings) })
  }

  pub async fn get(&self, field: &str) -> Option<Mapping> { self.cache.lock().await.get(field).copied() }

  pub async fn snapshot(&self) -> Mappings { self.cache.lock().await.clone() }

  /// Bring the schema up to date for `doc`. Returns the number of mapping
  /// changes made; a schema conflict leaves registry and schema untouched.
  pub async fn evolve(&self, doc: &Map<String, Value>, indexed: Option<bool>) -> Result<usize> {
    let mut cache = self.cache.lock().await;
    let plans = evolve::plan(&cache, doc, indexed)?;
    if plans.is_empty() {
      return Ok(0);
    }

    self.persist(plans.clone()).await?;
    Ok(commit(&mut cache, plans))
  }

  /// Toggle the secondary index of a mapped field.
  pub async fn set_indexed(&self, field: &str, indexed: bool) -> Result<Mapping> {
    let mut cache = self.cache.lock().await;
    let before = cache
      .get(field)
      .copied()
      .ok_or_else(|| Error::NotFound(format!("field {field:?} is not mapped")))?;

    let after = Mapping { indexed, ..before };
    if after != before {
      let plan = Plan { field: field.to_owned(), before: Some(before), after };
      self.persist(vec![plan.clone()]).await?;
      commit(&mut cache, vec![plan]);
    }
    Ok(after)
  }

  async fn persist(&self, plans: Vec<Plan>) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        evolve::apply(&tx, DATA_TABLE, &plans)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn commit(cache: &mut Mappings, plans: Vec<Plan>) -> usize {
  let n = plans.len();
  for plan in plans {
    let after = plan.after;
    match plan.before {
      None => info!(
        field = %plan.field,
        js_type = %after.js_type,
        sql_type = %after.sql_type,
        indexed = after.indexed,
        "promoted field"
      ),
      Some(before) => {
        if before.sql_type != after.sql_type {
          info!(field = %plan.field, from = %before.sql_type, to = %after.sql_type, "widened field");
        }
        if before.indexed != after.indexed {
          info!(field = %plan.field, indexed = after.indexed, "changed field index");
        }
      }
    }
    cache.insert(plan.field, after);
  }
  n
}
