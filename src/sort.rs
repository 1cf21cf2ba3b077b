use sea_orm::{QueryOrder, sea_query::Order};

use crate::entities::{car, case, series};

/// Orderings used by the car listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CarOrdering {
    /// Most recently created first; id breaks ties between same-instant inserts
    #[default]
    NewestFirst,
    /// Collector number, then casting name; used on case and series pages
    Catalogue,
}

impl CarOrdering {
    pub fn apply<Q: QueryOrder>(self, query: Q) -> Q {
        match self {
            Self::NewestFirst => query
                .order_by(car::Column::CreatedAt, Order::Desc)
                .order_by(car::Column::Id, Order::Desc),
            Self::Catalogue => query
                .order_by(car::Column::Number, Order::Asc)
                .order_by(car::Column::CastingName, Order::Asc),
        }
    }
}

/// Cases by year, then code
pub fn cases_in_order<Q: QueryOrder>(query: Q) -> Q {
    query
        .order_by(case::Column::Year, Order::Asc)
        .order_by(case::Column::Code, Order::Asc)
}

/// Series by name
pub fn series_in_order<Q: QueryOrder>(query: Q) -> Q {
    query.order_by(series::Column::Name, Order::Asc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, EntityTrait, QueryTrait};

    #[test]
    fn test_newest_first_sql() {
        let sql = CarOrdering::NewestFirst
            .apply(car::Entity::find())
            .build(DbBackend::Sqlite)
            .to_string();
        assert!(sql.ends_with(r#"ORDER BY "cars"."created_at" DESC, "cars"."id" DESC"#));
    }

    #[test]
    fn test_catalogue_sql() {
        let sql = CarOrdering::Catalogue
            .apply(car::Entity::find())
            .build(DbBackend::Sqlite)
            .to_string();
        assert!(sql.ends_with(r#"ORDER BY "cars"."number" ASC, "cars"."casting_name" ASC"#));
    }
}
