//! Translation of an `AttributeFilter` into backend filter predicates.
//!
//! ## Rules
//! - A numeric range field becomes one inclusive range condition; a missing
//!   bound leaves that side unconstrained.
//! - `required_*` lists become "must intersect" conditions, `excluded_*`
//!   lists become "must not intersect" conditions. Empty lists add nothing.
//! - All conditions are conjoined. No conditions means an unconstrained
//!   search.
//!
//! The tree renders to the backend's document-filter dialect:
//! `{"$and": [{"year": {"$gte": 1990, "$lte": 1999}}, {"genres": {"$in": ["Sci-Fi"]}}]}`.

use domain::AttributeFilter;
use serde_json::{json, Map, Value};

/// Movie attribute a predicate applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Year,
    Rating,
    Duration,
    Genres,
    Languages,
}

impl Field {
    /// Field name in the backend's movie records
    pub fn key(&self) -> &'static str {
        match self {
            Field::Year => "year",
            Field::Rating => "rating",
            Field::Duration => "duration",
            Field::Genres => "genres",
            Field::Languages => "languages",
        }
    }
}

/// One backend filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Inclusive bounds; at least one side is present
    Range {
        field: Field,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// The record's list shares at least one value with `values`
    Intersects { field: Field, values: Vec<String> },
    /// The record's list shares no value with `values`
    Disjoint { field: Field, values: Vec<String> },
}

impl Predicate {
    pub fn field(&self) -> Field {
        match self {
            Predicate::Range { field, .. }
            | Predicate::Intersects { field, .. }
            | Predicate::Disjoint { field, .. } => *field,
        }
    }

    fn to_json(&self) -> Value {
        let condition = match self {
            Predicate::Range { min, max, .. } => {
                let mut bounds = Map::new();
                if let Some(min) = min {
                    bounds.insert("$gte".to_string(), number(*min));
                }
                if let Some(max) = max {
                    bounds.insert("$lte".to_string(), number(*max));
                }
                Value::Object(bounds)
            }
            Predicate::Intersects { values, .. } => json!({ "$in": values }),
            Predicate::Disjoint { values, .. } => json!({ "$nin": values }),
        };

        let mut wrapper = Map::new();
        wrapper.insert(self.field().key().to_string(), condition);
        Value::Object(wrapper)
    }
}

/// Conjunction of predicates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterTree {
    conditions: Vec<Predicate>,
}

impl FilterTree {
    /// Build the conjunction for a filter
    pub fn from_filter(filter: &AttributeFilter) -> Self {
        let mut conditions = Vec::new();

        push_range(
            &mut conditions,
            Field::Year,
            filter.min_year.map(f64::from),
            filter.max_year.map(f64::from),
        );
        push_range(&mut conditions, Field::Rating, filter.min_rating, filter.max_rating);
        push_range(
            &mut conditions,
            Field::Duration,
            filter.min_duration.map(f64::from),
            filter.max_duration.map(f64::from),
        );

        push_set(&mut conditions, Field::Genres, &filter.required_genres, true);
        push_set(&mut conditions, Field::Genres, &filter.excluded_genres, false);
        push_set(&mut conditions, Field::Languages, &filter.required_languages, true);
        push_set(&mut conditions, Field::Languages, &filter.excluded_languages, false);

        Self { conditions }
    }

    pub fn conditions(&self) -> &[Predicate] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// `{"$and": [...]}`, or `{}` when unconstrained
    pub fn to_json(&self) -> Value {
        if self.conditions.is_empty() {
            return json!({});
        }
        let clauses: Vec<Value> = self.conditions.iter().map(Predicate::to_json).collect();
        json!({ "$and": clauses })
    }
}

fn push_range(conditions: &mut Vec<Predicate>, field: Field, min: Option<f64>, max: Option<f64>) {
    if min.is_some() || max.is_some() {
        conditions.push(Predicate::Range { field, min, max });
    }
}

fn push_set(conditions: &mut Vec<Predicate>, field: Field, values: &[String], required: bool) {
    if values.is_empty() {
        return;
    }
    let values = values.to_vec();
    conditions.push(if required {
        Predicate::Intersects { field, values }
    } else {
        Predicate::Disjoint { field, values }
    });
}

/// Whole numbers render as JSON integers so year bounds stay `1990`, not `1990.0`
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}
