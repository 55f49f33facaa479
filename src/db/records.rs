use rusqlite::params_from_iter;

use super::*;
use crate::util::is_identifier;

impl Store {
    // =========================================================================
    // Schema
    // =========================================================================

    /// Declare a collection. No-op if it already exists.
    ///
    /// `columns` pairs a column name with its SQLite type and constraints,
    /// e.g. `("status", "TEXT NOT NULL DEFAULT 'new'")`.
    pub fn create_collection(&self, name: &str, columns: &[(&str, &str)]) -> Result<(), DbError> {
        check_identifier(name)?;
        if columns.is_empty() {
            return Err(DbError::NoColumns {
                collection: name.to_string(),
            });
        }
        let mut defs = Vec::with_capacity(columns.len());
        for (column, spec) in columns {
            check_identifier(column)?;
            defs.push(format!("{column} {spec}"));
        }
        let sql = format!("CREATE TABLE IF NOT EXISTS {name} ({})", defs.join(", "));
        log::debug!("{sql}");
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    /// Add a column to an existing collection.
    ///
    /// Returns `false` and leaves the table alone when the column is already there.
    pub fn add_column(&self, collection: &str, column: &str, type_spec: &str) -> Result<bool, DbError> {
        check_identifier(collection)?;
        check_identifier(column)?;
        if self.columns(collection)?.iter().any(|c| c == column) {
            return Ok(false);
        }
        let sql = format!("ALTER TABLE {collection} ADD COLUMN {column} {type_spec}");
        log::debug!("{sql}");
        self.conn.execute_batch(&sql)?;
        log::info!("Added column {collection}.{column}");
        Ok(true)
    }

    pub fn collection_exists(&self, name: &str) -> Result<bool, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        Ok(stmt.exists([name])?)
    }

    /// Column names of a collection in declaration order. Empty if it doesn't exist.
    pub fn columns(&self, collection: &str) -> Result<Vec<String>, DbError> {
        check_identifier(collection)?;
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({collection})"))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(row?);
        }
        Ok(columns)
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Insert a record and return its rowid.
    pub fn insert(&self, collection: &str, record: &Record) -> Result<i64, DbError> {
        check_identifier(collection)?;
        if record.is_empty() {
            return Err(DbError::EmptyRecord {
                collection: collection.to_string(),
            });
        }

        let mut columns = Vec::with_capacity(record.len());
        let mut values = Vec::with_capacity(record.len());
        for (column, value) in record.iter() {
            check_identifier(column)?;
            columns.push(column);
            values.push(value);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {collection} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );
        log::debug!("{sql} -- {values:?}");

        self.conn
            .execute(&sql, params_from_iter(values))
            .map_err(|e| DbError::from_write(collection, e))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetch every record matching all `filters`.
    pub fn get<C: Column>(
        &self,
        collection: &str,
        filters: &[Filter<C>],
        order_by: Option<OrderBy<C>>,
    ) -> Result<Vec<Record>, DbError> {
        check_identifier(collection)?;
        let (where_sql, params) = where_clause(filters)?;
        let mut sql = format!("SELECT * FROM {collection}{where_sql}");
        if let Some(order) = order_by {
            let column = order.column.name();
            check_identifier(column)?;
            let direction = if order.descending { "DESC" } else { "ASC" };
            sql.push_str(&format!(" ORDER BY {column} {direction}"));
        }
        log::debug!("{sql} -- {params:?}");

        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt.query_map(params_from_iter(params), |row| {
            let mut record = Record::new();
            for (idx, name) in names.iter().enumerate() {
                record.set(name.clone(), row.get::<_, Value>(idx)?);
            }
            Ok(record)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Full scan, optionally ordered.
    pub fn scan(&self, collection: &str, order_by: Option<OrderBy>) -> Result<Vec<Record>, DbError> {
        self.get::<&'static str>(collection, &[], order_by)
    }

    /// Apply `changes` to every record matching `filters`. Returns rows touched.
    pub fn update<C: Column>(
        &self,
        collection: &str,
        changes: &Record,
        filters: &[Filter<C>],
    ) -> Result<usize, DbError> {
        check_identifier(collection)?;
        if filters.is_empty() {
            return Err(DbError::MissingFilter {
                collection: collection.to_string(),
                operation: "update",
            });
        }
        if changes.is_empty() {
            return Ok(0);
        }

        let mut sets = Vec::with_capacity(changes.len());
        let mut params: Vec<&Value> = Vec::with_capacity(changes.len() + filters.len());
        for (column, value) in changes.iter() {
            check_identifier(column)?;
            sets.push(format!("{column} = ?"));
            params.push(value);
        }
        let (where_sql, where_params) = where_clause(filters)?;
        params.extend(where_params);

        let sql = format!("UPDATE {collection} SET {}{where_sql}", sets.join(", "));
        log::debug!("{sql} -- {params:?}");

        self.conn
            .execute(&sql, params_from_iter(params))
            .map_err(|e| DbError::from_write(collection, e))
    }

    /// Remove every record matching `filters`. Returns rows removed.
    pub fn delete<C: Column>(&self, collection: &str, filters: &[Filter<C>]) -> Result<usize, DbError> {
        check_identifier(collection)?;
        if filters.is_empty() {
            return Err(DbError::MissingFilter {
                collection: collection.to_string(),
                operation: "delete",
            });
        }
        let (where_sql, params) = where_clause(filters)?;
        let sql = format!("DELETE FROM {collection}{where_sql}");
        log::debug!("{sql} -- {params:?}");

        self.conn
            .execute(&sql, params_from_iter(params))
            .map_err(|e| DbError::from_write(collection, e))
    }
}

fn check_identifier(name: &str) -> Result<(), DbError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Render ` WHERE a = ? AND b IS NULL ...` plus the values to bind, in order.
/// Equality against NULL becomes `IS NULL` (and `!=` becomes `IS NOT NULL`),
/// since `= NULL` never matches in SQL.
fn where_clause<C: Column>(filters: &[Filter<C>]) -> Result<(String, Vec<&Value>), DbError> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }
    let mut conditions = Vec::with_capacity(filters.len());
    let mut params = Vec::with_capacity(filters.len());
    for filter in filters {
        let column = filter.column.name();
        check_identifier(column)?;
        match (filter.op, &filter.value) {
            (CmpOp::Eq, Value::Null) => conditions.push(format!("{column} IS NULL")),
            (CmpOp::Ne, Value::Null) => conditions.push(format!("{column} IS NOT NULL")),
            (op, value) => {
                conditions.push(format!("{column} {} ?", op.as_sql()));
                params.push(value);
            }
        }
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_store;
    use super::*;

    fn leads_store() -> Store {
        let store = test_store();
        store
            .create_collection(
                "leads",
                &[
                    ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
                    ("email", "TEXT NOT NULL"),
                    ("name", "TEXT"),
                    ("status", "TEXT DEFAULT 'new'"),
                    ("score", "INTEGER"),
                ],
            )
            .expect("create leads");
        store
    }

    fn lead(email: &str, name: &str, score: i64) -> Record {
        Record::new()
            .with("email", email)
            .with("name", name)
            .with("score", score)
    }

    #[test]
    fn test_create_collection_is_idempotent() {
        let store = leads_store();
        store
            .insert("leads", &lead("a@x.com", "A", 1))
            .expect("insert");

        // Second declaration with a different shape must not touch the table
        store
            .create_collection("leads", &[("id", "INTEGER PRIMARY KEY")])
            .expect("re-create");

        assert!(store.collection_exists("leads").unwrap());
        assert_eq!(store.scan("leads", None).unwrap().len(), 1);
        assert_eq!(
            store.columns("leads").unwrap(),
            vec!["id", "email", "name", "status", "score"]
        );
    }

    #[test]
    fn test_create_collection_rejects_bad_names() {
        let store = test_store();
        let err = store
            .create_collection("leads; DROP TABLE x", &[("id", "INTEGER")])
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));

        let err = store
            .create_collection("leads", &[("bad name", "TEXT")])
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));

        let err = store.create_collection("empty", &[]).unwrap_err();
        assert!(matches!(err, DbError::NoColumns { .. }));
        assert!(!store.collection_exists("empty").unwrap());
    }

    #[test]
    fn test_insert_and_get() {
        let store = leads_store();
        let id = store
            .insert("leads", &lead("test@example.com", "Test User", 10))
            .expect("insert");

        let results = store
            .get("leads", &[Filter::eq("email", "test@example.com")], None)
            .expect("get");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].integer("id").unwrap(), id);
        assert_eq!(results[0].text("name").unwrap(), "Test User");
        // Column default applied by the engine
        assert_eq!(results[0].text("status").unwrap(), "new");
    }

    #[test]
    fn test_insert_returns_increasing_ids() {
        let store = leads_store();
        let first = store.insert("leads", &lead("a@x.com", "A", 1)).unwrap();
        let second = store.insert("leads", &lead("b@x.com", "B", 2)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_insert_empty_record_rejected() {
        let store = leads_store();
        let err = store.insert("leads", &Record::new()).unwrap_err();
        assert!(matches!(err, DbError::EmptyRecord { .. }));
    }

    #[test]
    fn test_insert_null_into_not_null_is_constraint_violation() {
        let store = leads_store();
        let err = store
            .insert("leads", &Record::new().with("email", Value::Null).with("name", "X"))
            .unwrap_err();
        match err {
            DbError::ConstraintViolation { collection, message } => {
                assert_eq!(collection, "leads");
                assert!(message.contains("NOT NULL"), "message was {message}");
            }
            other => panic!("expected constraint violation, got {other:?}"),
        }
        assert!(store.scan("leads", None).unwrap().is_empty());
    }

    #[test]
    fn test_values_are_bound_not_spliced() {
        let store = leads_store();
        let hostile = "x'); DROP TABLE leads; --";
        store.insert("leads", &lead(hostile, "Bobby", 0)).expect("insert");

        let found = store
            .get("leads", &[Filter::eq("email", hostile)], None)
            .expect("get");
        assert_eq!(found.len(), 1);
        assert!(store.collection_exists("leads").unwrap());
    }

    #[test]
    fn test_get_with_comparison_operators() {
        let store = leads_store();
        for (i, email) in ["a@x.com", "b@x.com", "c@x.com", "d@x.com"].iter().enumerate() {
            store
                .insert("leads", &lead(email, "N", i as i64 * 10))
                .unwrap();
        }
        let scores = |filters: &[Filter]| -> Vec<i64> {
            store
                .get("leads", filters, Some(OrderBy::asc("score")))
                .unwrap()
                .iter()
                .map(|r| r.integer("score").unwrap())
                .collect()
        };

        assert_eq!(scores(&[Filter::eq("score", 10)]), vec![10]);
        assert_eq!(scores(&[Filter::ne("score", 10)]), vec![0, 20, 30]);
        assert_eq!(scores(&[Filter::lt("score", 20)]), vec![0, 10]);
        assert_eq!(scores(&[Filter::le("score", 20)]), vec![0, 10, 20]);
        assert_eq!(scores(&[Filter::gt("score", 20)]), vec![30]);
        assert_eq!(scores(&[Filter::ge("score", 20)]), vec![20, 30]);
        // AND of two predicates
        assert_eq!(
            scores(&[Filter::gt("score", 0), Filter::lt("score", 30)]),
            vec![10, 20]
        );
    }

    #[test]
    fn test_get_order_and_default_order() {
        let store = leads_store();
        store.insert("leads", &lead("b@x.com", "B", 2)).unwrap();
        store.insert("leads", &lead("a@x.com", "A", 3)).unwrap();
        store.insert("leads", &lead("c@x.com", "C", 1)).unwrap();

        let names = |records: Vec<Record>| -> Vec<String> {
            records.iter().map(|r| r.text("name").unwrap()).collect()
        };

        assert_eq!(names(store.scan("leads", None).unwrap()), vec!["B", "A", "C"]);
        assert_eq!(
            names(store.scan("leads", Some(OrderBy::asc("name"))).unwrap()),
            vec!["A", "B", "C"]
        );
        assert_eq!(
            names(store.scan("leads", Some(OrderBy::desc("score"))).unwrap()),
            vec!["A", "B", "C"]
        );
    }

    #[test]
    fn test_get_null_filters() {
        let store = leads_store();
        store.insert("leads", &lead("a@x.com", "A", 1)).unwrap();
        store
            .insert("leads", &Record::new().with("email", "b@x.com"))
            .unwrap();

        let unnamed = store
            .get("leads", &[Filter::eq("name", Value::Null)], None)
            .unwrap();
        assert_eq!(unnamed.len(), 1);
        assert_eq!(unnamed[0].text("email").unwrap(), "b@x.com");

        let named = store
            .get("leads", &[Filter::ne("name", Value::Null)], None)
            .unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].text("email").unwrap(), "a@x.com");
    }

    #[test]
    fn test_get_no_match_is_empty() {
        let store = leads_store();
        let results = store
            .get("leads", &[Filter::eq("email", "nobody@x.com")], None)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_get_rejects_bad_filter_column() {
        let store = leads_store();
        let err = store
            .get("leads", &[Filter::eq("email = email OR 1", 1)], None)
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_update() {
        let store = leads_store();
        store.insert("leads", &lead("test@example.com", "Test User", 1)).unwrap();
        store.insert("leads", &lead("other@example.com", "Other", 1)).unwrap();

        let touched = store
            .update(
                "leads",
                &Record::new().with("name", "Updated Name"),
                &[Filter::eq("email", "test@example.com")],
            )
            .expect("update");
        assert_eq!(touched, 1);

        let result = store
            .get("leads", &[Filter::eq("email", "test@example.com")], None)
            .unwrap();
        assert_eq!(result[0].text("name").unwrap(), "Updated Name");
        let other = store
            .get("leads", &[Filter::eq("email", "other@example.com")], None)
            .unwrap();
        assert_eq!(other[0].text("name").unwrap(), "Other");
    }

    #[test]
    fn test_update_without_filters_rejected() {
        let store = leads_store();
        store.insert("leads", &lead("a@x.com", "A", 1)).unwrap();
        let err = store
            .update::<&'static str>("leads", &Record::new().with("name", "Z"), &[])
            .unwrap_err();
        assert!(matches!(err, DbError::MissingFilter { operation: "update", .. }));
        assert_eq!(store.scan("leads", None).unwrap()[0].text("name").unwrap(), "A");
    }

    #[test]
    fn test_update_with_no_changes_is_noop() {
        let store = leads_store();
        store.insert("leads", &lead("a@x.com", "A", 1)).unwrap();
        let touched = store
            .update("leads", &Record::new(), &[Filter::eq("email", "a@x.com")])
            .unwrap();
        assert_eq!(touched, 0);
    }

    #[test]
    fn test_update_to_null_violates_constraint() {
        let store = leads_store();
        store.insert("leads", &lead("a@x.com", "A", 1)).unwrap();
        let err = store
            .update(
                "leads",
                &Record::new().with("email", Value::Null),
                &[Filter::eq("email", "a@x.com")],
            )
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));
    }

    #[test]
    fn test_delete() {
        let store = leads_store();
        store.insert("leads", &lead("test@example.com", "Test User", 1)).unwrap();

        let removed = store
            .delete("leads", &[Filter::eq("email", "test@example.com")])
            .expect("delete");
        assert_eq!(removed, 1);
        assert!(store
            .get("leads", &[Filter::eq("email", "test@example.com")], None)
            .unwrap()
            .is_empty());

        // Nothing left to match: not an error
        let removed = store
            .delete("leads", &[Filter::eq("email", "test@example.com")])
            .expect("delete again");
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_delete_without_filters_rejected() {
        let store = leads_store();
        store.insert("leads", &lead("a@x.com", "A", 1)).unwrap();
        let err = store.delete::<&'static str>("leads", &[]).unwrap_err();
        assert!(matches!(err, DbError::MissingFilter { operation: "delete", .. }));
        assert_eq!(store.scan("leads", None).unwrap().len(), 1);
    }

    #[test]
    fn test_add_column() {
        let store = test_store();
        store
            .create_collection(
                "leads",
                &[("id", "INTEGER PRIMARY KEY"), ("email", "TEXT NOT NULL")],
            )
            .unwrap();
        store
            .insert("leads", &Record::new().with("email", "a@x.com"))
            .unwrap();

        assert!(store.add_column("leads", "phone", "TEXT DEFAULT 'unknown'").unwrap());
        assert_eq!(store.columns("leads").unwrap(), vec!["id", "email", "phone"]);

        // Existing rows pick up the default
        let rows = store.scan("leads", None).unwrap();
        assert_eq!(rows[0].text("phone").unwrap(), "unknown");
        assert_eq!(rows[0].text("email").unwrap(), "a@x.com");

        // New column is writable
        store
            .insert(
                "leads",
                &Record::new().with("email", "b@x.com").with("phone", "555-1234"),
            )
            .unwrap();
        let found = store
            .get("leads", &[Filter::eq("phone", "555-1234")], None)
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_add_column_twice_is_noop() {
        let store = leads_store();
        store.insert("leads", &lead("a@x.com", "A", 1)).unwrap();
        assert!(store.add_column("leads", "phone", "TEXT").unwrap());
        assert!(!store.add_column("leads", "phone", "TEXT").unwrap());
        assert_eq!(store.scan("leads", None).unwrap().len(), 1);
        assert_eq!(
            store
                .columns("leads")
                .unwrap()
                .iter()
                .filter(|c| *c == "phone")
                .count(),
            1
        );
    }

    #[test]
    fn test_columns_of_missing_collection_is_empty() {
        let store = test_store();
        assert!(store.columns("nope").unwrap().is_empty());
        assert!(!store.collection_exists("nope").unwrap());
    }

    #[test]
    fn test_real_values_round_trip() {
        let store = test_store();
        store
            .create_collection("metrics", &[("id", "INTEGER PRIMARY KEY"), ("ratio", "REAL")])
            .unwrap();
        store
            .insert("metrics", &Record::new().with("ratio", 0.25))
            .unwrap();
        let rows = store
            .get("metrics", &[Filter::ge("ratio", 0.2)], None)
            .unwrap();
        assert_eq!(rows[0].get("ratio"), Some(&Value::Real(0.25)));
    }
}
