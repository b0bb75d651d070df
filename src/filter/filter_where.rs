use serde_json::Value;

use super::error::FilterError;
use super::types::{is_identifier, FilterOp, FilterWhereInfo};

/// Compiles a JSON WHERE document into a SQL predicate with `$n` placeholders.
///
/// Placeholders are numbered across nested `$and` / `$or` / `$not` groups, so
/// the returned params line up with the SQL regardless of nesting depth.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(starting_param_index);
        let clause = filter_where.build_group(where_data)?;
        Ok((clause.unwrap_or_default(), filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// All conditions of one object joined with AND; None when it is empty
    fn build_group(&mut self, where_data: &Value) -> Result<Option<String>, FilterError> {
        let obj = match where_data {
            Value::Null => return Ok(None),
            Value::Object(obj) => obj,
            _ => return Err(FilterError::InvalidWhereClause("Unsupported WHERE format".to_string())),
        };

        let mut parts = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                if let Some(sql) = self.build_logical(key, value)? {
                    parts.push(sql);
                }
            } else {
                for condition in Self::parse_field_condition(key, value)? {
                    parts.push(self.build_sql_condition(&condition)?);
                }
            }
        }

        Ok(match parts.len() {
            0 => None,
            _ => Some(parts.join(" AND ")),
        })
    }

    fn build_logical(&mut self, op: &str, value: &Value) -> Result<Option<String>, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut sql_parts = Vec::new();
                for v in arr {
                    if let Some(sql) = self.build_group(v)? {
                        sql_parts.push(format!("({})", sql));
                    }
                }
                if sql_parts.is_empty() {
                    return Ok(None);
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(Some(format!("({})", sql_parts.join(joiner))))
            }
            "$not" => Ok(self.build_group(value)?.map(|sql| format!("NOT ({})", sql))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterWhereInfo>, FilterError> {
        if !is_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        let mut out = Vec::new();
        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                for (op_key, op_val) in obj {
                    out.push(FilterWhereInfo {
                        column: field.to_string(),
                        operator: Self::map_operator(op_key)?,
                        data: op_val.clone(),
                    });
                }
            }
            // Implicit equality: { field: value }
            _ => out.push(FilterWhereInfo {
                column: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            }),
        }
        Ok(out)
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$like" => FilterOp::Like,
            "$ilike" => FilterOp::ILike,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$between" => FilterOp::Between,
            "$null" => FilterOp::Null,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", condition.column);
        let data = &condition.data;
        Ok(match condition.operator {
            FilterOp::Eq if data.is_null() => format!("{} IS NULL", quoted_column),
            FilterOp::Eq => format!("{} = {}", quoted_column, self.param(data.clone())),
            FilterOp::Ne if data.is_null() => format!("{} IS NOT NULL", quoted_column),
            FilterOp::Ne => format!("{} <> {}", quoted_column, self.param(data.clone())),
            FilterOp::Gt => format!("{} > {}", quoted_column, self.param(data.clone())),
            FilterOp::Gte => format!("{} >= {}", quoted_column, self.param(data.clone())),
            FilterOp::Lt => format!("{} < {}", quoted_column, self.param(data.clone())),
            FilterOp::Lte => format!("{} <= {}", quoted_column, self.param(data.clone())),
            FilterOp::Like => format!("{} LIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::ILike => format!("{} ILIKE {}", quoted_column, self.param(data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let negate = condition.operator == FilterOp::NIn;
                let values = match data {
                    Value::Array(values) => values.clone(),
                    other => vec![other.clone()],
                };
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                let keyword = if negate { "NOT IN" } else { "IN" };
                format!("{} {} ({})", quoted_column, keyword, params.join(", "))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => {
                    let low = self.param(values[0].clone());
                    let high = self.param(values[1].clone());
                    format!("{} BETWEEN {} AND {}", quoted_column, low, high)
                }
                _ => {
                    return Err(FilterError::InvalidOperatorData(
                        "$between requires array with 2 values".to_string(),
                    ))
                }
            },
            FilterOp::Null => match data.as_bool() {
                Some(true) => format!("{} IS NULL", quoted_column),
                Some(false) => format!("{} IS NOT NULL", quoted_column),
                None => return Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        })
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_and_operators() {
        let (sql, params) = FilterWhere::generate(
            &json!({"status": "en_attente", "montant_total": {"$gte": 100, "$lte": 500}}),
            0,
        )
        .unwrap();
        assert_eq!(sql, "\"montant_total\" >= $1 AND \"montant_total\" <= $2 AND \"status\" = $3");
        assert_eq!(params, vec![json!(100), json!(500), json!("en_attente")]);
    }

    #[test]
    fn nested_groups_keep_numbering() {
        let (sql, params) = FilterWhere::generate(
            &json!({
                "$or": [{"nom": {"$ilike": "%a%"}}, {"email": {"$ilike": "%a%"}}],
                "status": "valide"
            }),
            0,
        )
        .unwrap();
        assert_eq!(sql, "((\"nom\" ILIKE $1) OR (\"email\" ILIKE $2)) AND \"status\" = $3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn starting_index_is_respected() {
        let (sql, _) = FilterWhere::generate(&json!({"user_id": 4}), 2).unwrap();
        assert_eq!(sql, "\"user_id\" = $3");
    }

    #[test]
    fn in_nin_null_and_not() {
        let (sql, params) = FilterWhere::generate(
            &json!({
                "id": {"$in": [1, 2]},
                "status": {"$nin": []},
                "end_date": {"$null": false},
                "$not": {"kind": "out"}
            }),
            0,
        )
        .unwrap();
        assert_eq!(
            sql,
            "NOT (\"kind\" = $1) AND \"end_date\" IS NOT NULL AND \"id\" IN ($2, $3) AND 1=1"
        );
        assert_eq!(params, vec![json!("out"), json!(1), json!(2)]);
    }

    #[test]
    fn null_equality_does_not_bind() {
        let (sql, params) = FilterWhere::generate(&json!({"assigned_to": null}), 0).unwrap();
        assert_eq!(sql, "\"assigned_to\" IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn rejects_unsafe_columns_and_unknown_operators() {
        assert!(matches!(
            FilterWhere::generate(&json!({"id; DROP TABLE users": 1}), 0),
            Err(FilterError::InvalidColumn(_))
        ));
        assert!(matches!(
            FilterWhere::generate(&json!({"id": {"$regex": "x"}}), 0),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(FilterWhere::validate(&json!("1=1")).is_err());
    }

    #[test]
    fn between_requires_pair() {
        let (sql, _) = FilterWhere::generate(&json!({"date_commande": {"$between": ["2024-01-01", "2024-12-31"]}}), 0)
            .unwrap();
        assert_eq!(sql, "\"date_commande\" BETWEEN $1 AND $2");
        assert!(FilterWhere::generate(&json!({"date_commande": {"$between": ["2024-01-01"]}}), 0).is_err());
    }
}
