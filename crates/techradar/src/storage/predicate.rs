//! Filter predicates over the `technologies` table.
//!
//! A [`Predicate`] is a conjunction of SQL clauses with positional
//! parameters. Clauses refer to the table through the alias `t`, so every
//! query built from a predicate must select `FROM technologies AS t`.

use rusqlite::types::Value;

/// Name of the scalar function registered on every connection for
/// case-insensitive substring matching.
pub const CONTAINS_CI: &str = "contains_ci";

/// A field the catalog aggregates distinct values over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    /// The `category` column.
    Category,
    /// The `stage` column.
    Stage,
    /// Individual elements of the `tags` array.
    Tag,
}

/// A conjunction of filter clauses.
///
/// The empty predicate matches every technology.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Predicate {
    /// A predicate that matches everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether this predicate places no constraint at all.
    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Require `needle` to appear, ignoring case, in the name, the category,
    /// or any tag.
    #[must_use]
    pub fn text_contains(mut self, needle: &str) -> Self {
        self.clauses.push(format!(
            "({CONTAINS_CI}(t.name, ?) OR {CONTAINS_CI}(t.category, ?) OR EXISTS \
             (SELECT 1 FROM json_each(t.tags) AS tag WHERE {CONTAINS_CI}(tag.value, ?)))"
        ));
        for _ in 0..3 {
            self.params.push(Value::Text(needle.to_string()));
        }
        self
    }

    /// Require the category to be one of `values`. No-op when empty.
    #[must_use]
    pub fn category_in(self, values: &[String]) -> Self {
        self.column_in("t.category", values)
    }

    /// Require the stage to be one of `values`. No-op when empty.
    #[must_use]
    pub fn stage_in(self, values: &[String]) -> Self {
        self.column_in("t.stage", values)
    }

    /// Require at least one tag to be one of `values`. No-op when empty.
    #[must_use]
    pub fn any_tag_in(mut self, values: &[String]) -> Self {
        if values.is_empty() {
            return self;
        }
        self.clauses.push(format!(
            "EXISTS (SELECT 1 FROM json_each(t.tags) AS tag WHERE tag.value IN ({}))",
            placeholders(values.len())
        ));
        self.push_texts(values);
        self
    }

    fn column_in(mut self, column: &str, values: &[String]) -> Self {
        if values.is_empty() {
            return self;
        }
        self.clauses
            .push(format!("{column} IN ({})", placeholders(values.len())));
        self.push_texts(values);
        self
    }

    fn push_texts(&mut self, values: &[String]) {
        self.params
            .extend(values.iter().map(|v| Value::Text(v.clone())));
    }

    /// The `WHERE` clause for this predicate, or an empty string.
    pub(crate) fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Positional parameters, in clause order.
    pub(crate) fn params(&self) -> &[Value] {
        &self.params
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_all_has_no_where_clause() {
        let predicate = Predicate::all();
        assert!(predicate.is_unconstrained());
        assert_eq!(predicate.where_clause(), "");
        assert!(predicate.params().is_empty());
    }

    #[test]
    fn test_empty_sets_are_ignored() {
        let predicate = Predicate::all()
            .category_in(&[])
            .stage_in(&[])
            .any_tag_in(&[]);
        assert!(predicate.is_unconstrained());
    }

    #[test]
    fn test_clauses_are_anded_with_params_in_order() {
        let predicate = Predicate::all()
            .category_in(&strings(&["Tools", "Platforms"]))
            .stage_in(&strings(&["Adopt"]));

        assert_eq!(
            predicate.where_clause(),
            " WHERE t.category IN (?, ?) AND t.stage IN (?)"
        );
        assert_eq!(
            predicate.params(),
            &[
                Value::Text("Tools".to_string()),
                Value::Text("Platforms".to_string()),
                Value::Text("Adopt".to_string()),
            ]
        );
    }

    #[test]
    fn test_text_contains_binds_needle_per_field() {
        let predicate = Predicate::all().text_contains("dev");
        assert_eq!(predicate.params().len(), 3);
        assert!(predicate.where_clause().contains("json_each(t.tags)"));
        assert!(predicate.where_clause().contains(CONTAINS_CI));
    }

    #[test]
    fn test_any_tag_in_uses_json_each() {
        let predicate = Predicate::all().any_tag_in(&strings(&["devops", "cloud"]));
        assert!(predicate
            .where_clause()
            .contains("tag.value IN (?, ?)"));
    }
}
