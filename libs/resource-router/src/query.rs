//! Query parameters to a validated filter + sort + pagination plan.

use std::sync::Arc;

use resource_security::Actor;
use serde_json::{Map, Value};

use crate::error::RouterError;

pub type QueryParams = Map<String, Value>;
pub type Filter = Map<String, Value>;

pub const LIMIT_PARAM: &str = "limit";
pub const PAGE_PARAM: &str = "page";
pub const DEFAULT_LIMIT: u64 = 100;
pub const DEFAULT_MAX_LIMIT: u64 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Ordered list of sort keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortSpec(Vec<(String, SortOrder)>);

impl SortSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), SortOrder::Ascending));
        self
    }

    #[must_use]
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), SortOrder::Descending));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = (&str, SortOrder)> {
        self.0.iter().map(|(f, o)| (f.as_str(), *o))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Per-actor mandatory filter supplied by the resource owner.
#[derive(Clone, Debug, PartialEq)]
pub enum Baseline {
    /// Merged over the client filter; its keys win.
    Filter(Filter),
    /// The actor can see nothing: skip the store entirely.
    NoResults,
}

pub type BaselineFilter = Arc<dyn Fn(Option<&Actor>) -> Baseline + Send + Sync>;

/// The query half of a resource definition.
#[derive(Clone, Debug)]
pub struct QuerySettings {
    pub query_fields: Vec<String>,
    pub default_query_params: Filter,
    pub sort: SortSpec,
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            query_fields: Vec::new(),
            default_query_params: Filter::new(),
            sort: SortSpec::default(),
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

impl QuerySettings {
    /// True when `key` or one of its dotted prefixes is allow-listed:
    /// `source.meta` admits `source.meta.name`.
    #[must_use]
    pub fn allows(&self, key: &str) -> bool {
        self.query_fields.iter().any(|field| {
            key.strip_prefix(field.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }
}

/// Validated, per-request query.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    pub filter: Filter,
    pub sort: SortSpec,
    pub limit: u64,
    pub skip: u64,
    pub page: u64,
    /// Baseline said "nothing"; the store must not be queried.
    pub no_results: bool,
}

/// What the store executes: the plan with `limit + 1` to detect a next page.
#[derive(Clone, Debug, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: SortSpec,
    pub skip: u64,
    pub limit: u64,
}

impl QueryPlan {
    #[must_use]
    pub fn over_fetch(&self) -> FindQuery {
        FindQuery {
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit.saturating_add(1),
        }
    }
}

/// Build a [`QueryPlan`] from raw request parameters.
///
/// # Errors
/// [`RouterError::Validation`] for a parameter outside the allow-list, an
/// unparsable limit, or a page that is not an integer >= 1.
pub fn build_query(
    params: &QueryParams,
    settings: &QuerySettings,
    baseline: Baseline,
) -> Result<QueryPlan, RouterError> {
    let mut filter = settings.default_query_params.clone();

    for (key, value) in params {
        if key == LIMIT_PARAM || key == PAGE_PARAM {
            continue;
        }
        if !settings.allows(key) {
            return Err(RouterError::validation(format!(
                "{key} is not allowed as a query param."
            )));
        }
        filter.insert(key.clone(), coerce(value));
    }

    let no_results = match baseline {
        Baseline::Filter(extra) => {
            filter.extend(extra);
            false
        }
        Baseline::NoResults => true,
    };

    let limit = resolve_limit(params.get(LIMIT_PARAM), settings)?;
    let page = resolve_page(params.get(PAGE_PARAM))?;
    let skip = (page - 1).saturating_mul(limit);

    Ok(QueryPlan {
        filter,
        sort: settings.sort.clone(),
        limit,
        skip,
        page,
        no_results,
    })
}

fn coerce(value: &Value) -> Value {
    match value.as_str() {
        Some("true") => Value::Bool(true),
        Some("false") => Value::Bool(false),
        _ => value.clone(),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Any numeric limit is accepted and clamped into `1..=max_limit`; only
/// non-numeric values are rejected.
fn resolve_limit(raw: Option<&Value>, settings: &QuerySettings) -> Result<u64, RouterError> {
    let ceiling = settings.max_limit.max(1);
    let Some(raw) = raw else {
        return Ok(settings.default_limit.clamp(1, ceiling));
    };
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let requested = parsed
        .filter(|n| !n.is_nan())
        .ok_or_else(|| RouterError::validation(format!("Invalid limit: {}", display(raw))))?;
    Ok(saturating_whole(requested).clamp(1, ceiling))
}

/// Whole part of `value`; float-to-int `as` truncates and saturates at both
/// ends of the `u64` range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn saturating_whole(value: f64) -> u64 {
    value as u64
}

fn resolve_page(raw: Option<&Value>) -> Result<u64, RouterError> {
    let Some(raw) = raw else {
        return Ok(1);
    };
    let parsed = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(page) if page >= 1 => Ok(page),
        _ => Err(RouterError::validation(format!("Invalid page: {}", display(raw)))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn settings() -> QuerySettings {
        QuerySettings {
            query_fields: vec![
                "name".to_owned(),
                "hidden".to_owned(),
                "source".to_owned(),
                "created".to_owned(),
                "origin.meta".to_owned(),
            ],
            sort: SortSpec::new().desc("created"),
            ..QuerySettings::default()
        }
    }

    fn params(v: &Value) -> QueryParams {
        v.as_object().cloned().unwrap_or_default()
    }

    fn no_baseline() -> Baseline {
        Baseline::Filter(Filter::new())
    }

    #[test]
    fn rejects_unlisted_param_regardless_of_value() {
        for value in [json!("x"), json!(""), json!({"$gte": 1})] {
            let err = build_query(
                &params(&json!({"calories": value})),
                &settings(),
                no_baseline(),
            )
            .unwrap_err();
            assert_eq!(err.to_string(), "calories is not allowed as a query param.");
        }
    }

    #[test]
    fn dotted_paths_allowed_by_root() {
        let plan = build_query(
            &params(&json!({"source.name": "Brand"})),
            &settings(),
            no_baseline(),
        )
        .unwrap();
        assert_eq!(plan.filter.get("source.name"), Some(&json!("Brand")));
    }

    #[test]
    fn dotted_paths_allowed_by_any_listed_prefix() {
        let plan = build_query(
            &params(&json!({"origin.meta.name": "Farm", "origin.meta": {"$ne": null}})),
            &settings(),
            no_baseline(),
        )
        .unwrap();
        assert_eq!(plan.filter.get("origin.meta.name"), Some(&json!("Farm")));

        for key in ["origin", "origin.other", "origin.metadata"] {
            let err = build_query(&params(&json!({key: "x"})), &settings(), no_baseline())
                .unwrap_err();
            assert_eq!(err.to_string(), format!("{key} is not allowed as a query param."));
        }
    }

    #[test]
    fn coerces_booleans_and_passes_ranges_through() {
        let plan = build_query(
            &params(&json!({"hidden": "false", "created": {"$gte": "2024-01-01"}})),
            &settings(),
            no_baseline(),
        )
        .unwrap();
        assert_eq!(plan.filter.get("hidden"), Some(&json!(false)));
        assert_eq!(plan.filter.get("created"), Some(&json!({"$gte": "2024-01-01"})));
    }

    #[test]
    fn seeds_defaults_and_baseline_wins() {
        let mut settings = settings();
        settings.default_query_params.insert("hidden".to_owned(), json!(false));
        let baseline = Baseline::Filter(params(&json!({"name": "forced"})));

        let plan = build_query(&params(&json!({"name": "client"})), &settings, baseline).unwrap();
        assert_eq!(plan.filter.get("hidden"), Some(&json!(false)));
        assert_eq!(plan.filter.get("name"), Some(&json!("forced")));
        assert!(!plan.no_results);
    }

    #[test]
    fn no_results_baseline_marks_plan() {
        let plan = build_query(&QueryParams::new(), &settings(), Baseline::NoResults).unwrap();
        assert!(plan.no_results);
    }

    #[test]
    fn limit_defaults_and_clamps() {
        let plan = build_query(&QueryParams::new(), &settings(), no_baseline()).unwrap();
        assert_eq!(plan.limit, 100);
        assert_eq!(plan.skip, 0);
        assert_eq!(plan.page, 1);

        for (raw, expected) in [
            (json!("10000"), 500),
            (json!("100000000000000000000"), 500),
            (json!(u64::MAX), 500),
            (json!("5.5"), 5),
            (json!(7), 7),
            (json!("0"), 1),
            (json!("-3"), 1),
        ] {
            let plan = build_query(&params(&json!({"limit": raw})), &settings(), no_baseline())
                .unwrap();
            assert_eq!(plan.limit, expected, "limit {raw}");
        }

        for raw in ["lots", "NaN", ""] {
            let err = build_query(&params(&json!({"limit": raw})), &settings(), no_baseline())
                .unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid limit: {raw}"));
        }
    }

    #[test]
    fn page_converts_to_skip() {
        let plan = build_query(
            &params(&json!({"limit": "5", "page": "3"})),
            &settings(),
            no_baseline(),
        )
        .unwrap();
        assert_eq!(plan.skip, 10);
        assert_eq!(plan.page, 3);
        assert_eq!(plan.over_fetch().limit, 6);
    }

    #[test]
    fn invalid_pages_fail() {
        for (raw, msg) in [
            (json!("0"), "Invalid page: 0"),
            (json!("abc"), "Invalid page: abc"),
            (json!("-2"), "Invalid page: -2"),
            (json!(0), "Invalid page: 0"),
        ] {
            let err = build_query(&params(&json!({"page": raw})), &settings(), no_baseline())
                .unwrap_err();
            assert_eq!(err.to_string(), msg);
        }
    }

    #[test]
    fn attaches_sort() {
        let plan = build_query(&QueryParams::new(), &settings(), no_baseline()).unwrap();
        assert_eq!(plan.sort, SortSpec::new().desc("created"));
    }
}
