use sea_orm::sea_query::Query;
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use serde_with::{NoneAsEmptyString, serde_as};
use utoipa::{IntoParams, ToSchema};

use crate::entities::{car, case, series};

/// Dashboard filters. Blank values impose no restriction.
///
/// Criteria combine with AND; each one is an exact match:
/// - `case`: case code, e.g. `A`
/// - `series`: series slug, e.g. `hw-j-imports`
/// - `th`: treasure-hunt value, one of `NONE`, `TH`, `STH`, `CHASE`
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CarFilter {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub case: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub series: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub th: Option<String>,
}

impl CarFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.case.is_none() && self.series.is_none() && self.th.is_none()
    }

    /// Condition over `cars` selecting exactly the cars matching every criterion
    #[must_use]
    pub fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(code) = &self.case {
            condition = condition.add(
                car::Column::CaseId.in_subquery(
                    Query::select()
                        .column(case::Column::Id)
                        .from(case::Entity)
                        .and_where(case::Column::Code.eq(code.as_str()))
                        .to_owned(),
                ),
            );
        }

        if let Some(slug) = &self.series {
            condition = condition.add(
                car::Column::SeriesId.in_subquery(
                    Query::select()
                        .column(series::Column::Id)
                        .from(series::Entity)
                        .and_where(series::Column::Slug.eq(slug.as_str()))
                        .to_owned(),
                ),
            );
        }

        if let Some(th) = &self.th {
            condition = condition.add(car::Column::TreasureHunt.eq(th.as_str()));
        }

        condition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query as QueryParams;
    use axum::http::Uri;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};

    fn parse(query: &str) -> CarFilter {
        let uri: Uri = format!("/dashboard/?{query}").parse().unwrap();
        QueryParams::<CarFilter>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_blank_parameters_are_ignored() {
        let filter = parse("case=&series=&th=");
        assert!(filter.is_empty());
        assert_eq!(filter, CarFilter::default());
    }

    #[test]
    fn test_missing_parameters_are_ignored() {
        assert!(parse("").is_empty());
        let filter = parse("th=STH");
        assert_eq!(filter.th.as_deref(), Some("STH"));
        assert!(filter.case.is_none());
    }

    #[test]
    fn test_condition_combines_with_and() {
        let filter = parse("case=A&series=hw-metro&th=TH");
        let sql = car::Entity::find()
            .filter(filter.condition())
            .build(DbBackend::Sqlite)
            .to_string();
        assert!(sql.contains(r#""cars"."case_id" IN (SELECT "id" FROM "cases""#));
        assert!(sql.contains(r#""cases"."code" = 'A'"#));
        assert!(sql.contains(r#""cars"."series_id" IN (SELECT "id" FROM "series""#));
        assert!(sql.contains(r#""series"."slug" = 'hw-metro'"#));
        assert!(sql.contains(r#""cars"."treasure_hunt" = 'TH'"#));
        assert_eq!(sql.matches(" AND ").count(), 2);
    }

    #[test]
    fn test_empty_filter_selects_every_car() {
        let sql = car::Entity::find()
            .filter(CarFilter::default().condition())
            .build(DbBackend::Sqlite)
            .to_string();
        assert!(sql.ends_with(r#"FROM "cars" WHERE TRUE"#), "{sql}");
        assert!(!sql.contains(r#""case_id" IN"#));
        assert!(!sql.contains(r#""series_id" IN"#));
        assert!(!sql.contains(r#""treasure_hunt" ="#));
    }
}
