//! Equality-filtered, single-field-ordered queries.

use serde_json::Value;
use std::cmp::Ordering;

use super::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Value this query requires for `field`, if it filters on it.
    pub fn required_value(&self, field: &str) -> Option<&Value> {
        self.filters.iter().find_map(|filter| match filter {
            Filter::Eq(name, value) if name == field => Some(value),
            _ => None,
        })
    }

    /// Whether a document passes every filter.
    ///
    /// Documents lacking the order-by field never match.
    pub fn matches(&self, doc: &Document) -> bool {
        let filtered = self.filters.iter().all(|filter| match filter {
            Filter::Eq(field, value) => doc.get(field).as_ref() == Some(value),
        });
        let ordered = match &self.order_by {
            Some(order) => doc.get(&order.field).is_some(),
            None => true,
        };
        filtered && ordered
    }

    /// Filter and sort. The sort is stable, so ties keep the input order.
    pub fn apply<'a>(&self, docs: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut result: Vec<Document> =
            docs.into_iter().filter(|d| self.matches(d)).cloned().collect();
        if let Some(order) = &self.order_by {
            result.sort_by(|a, b| {
                let ord =
                    compare_values(a.get(&order.field).as_ref(), b.get(&order.field).as_ref());
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        result
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
