// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Typed operations for the `transact` RPC.

use serde_json::{json, Value};

/// A database row: a mapping from column name to value.
pub type Row = serde_json::Map<String, Value>;

/// A conditional expression evaluated by the server, wired as the
/// three-element array `[column, function, value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cond {
    /// Column the condition applies to.
    pub column: String,
    /// Comparison function: `==`, `!=`, `<=`, `<`, `>=`, `>`, `includes`,
    /// `excludes`.
    pub function: String,
    /// Right-hand operand.
    pub value: String,
}

impl Cond {
    /// A condition which requires `column == value`.
    #[must_use]
    pub fn equal(column: impl Into<String>, value: impl Into<String>) -> Cond {
        Cond {
            column: column.into(),
            function: "==".to_string(),
            value: value.into(),
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        json!([self.column, self.function, self.value])
    }
}

/// A select operation: fetch rows from `table` matching every condition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Select {
    /// The table to select from.
    pub table: String,
    /// Zero or more conditions; an empty list selects every row.
    pub r#where: Vec<Cond>,
}

/// An operation which can be applied with [`crate::Client::transact`].
///
/// The set is open for extension; each variant knows its own wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Fetch rows from a table.
    Select(Select),
}

impl Op {
    /// The operation's JSON wire form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Op::Select(s) => {
                // The server refuses a null where clause; always send an
                // array.
                let conds: Vec<Value> = s.r#where.iter().map(Cond::to_value).collect();
                json!({
                    "op": "select",
                    "table": s.table,
                    "where": conds,
                })
            }
        }
    }
}
