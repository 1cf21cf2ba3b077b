//! Read-only views over the store: annotated listings, filtered cars and statistics.
//!
//! Every count is computed from the current rows on each call.

use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::car::{self, TreasureHunt};
use crate::entities::{case, series};
use crate::filter::CarFilter;
use crate::sort::{self, CarOrdering};

/// Most cars shown in the homepage highlights
pub const HIGHLIGHT_LIMIT: u64 = 12;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CaseWithCount {
    #[serde(flatten)]
    pub case: case::Model,
    pub car_count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SeriesWithCount {
    #[serde(flatten)]
    pub series: series::Model,
    pub car_count: u64,
}

/// Aggregate figures for the homepage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CollectionStats {
    /// Number of car records, not the sum of their quantities
    pub total_cars: u64,
    pub total_cases: u64,
    /// Active series only
    pub total_series: u64,
    pub total_regular: u64,
    pub total_th: u64,
    pub total_sth: u64,
    pub total_chase: u64,
    /// Sum of `quantity` over every car
    pub total_quantity: i64,
}

/// Number of cars per value of a nullable foreign key
async fn car_counts_by(
    db: &DatabaseConnection,
    column: car::Column,
) -> Result<HashMap<i32, u64>, DbErr> {
    let rows: Vec<(Option<i32>, i64)> = car::Entity::find()
        .select_only()
        .column(column)
        .column_as(car::Column::Id.count(), "car_count")
        .group_by(column)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, count)| Some((id?, u64::try_from(count).unwrap_or_default())))
        .collect())
}

/// Cases with their car counts, ordered by (year, code)
pub async fn cases_with_counts(db: &DatabaseConnection) -> Result<Vec<CaseWithCount>, DbErr> {
    let cases = sort::cases_in_order(case::Entity::find()).all(db).await?;
    let counts = car_counts_by(db, car::Column::CaseId).await?;

    Ok(cases
        .into_iter()
        .map(|case| CaseWithCount {
            car_count: counts.get(&case.id).copied().unwrap_or(0),
            case,
        })
        .collect())
}

/// Series with their car counts, ordered by name
pub async fn series_with_counts(
    db: &DatabaseConnection,
    active_only: bool,
) -> Result<Vec<SeriesWithCount>, DbErr> {
    let mut query = series::Entity::find();
    if active_only {
        query = query.filter(series::Column::IsActive.eq(true));
    }
    let series = sort::series_in_order(query).all(db).await?;
    let counts = car_counts_by(db, car::Column::SeriesId).await?;

    Ok(series
        .into_iter()
        .map(|series| SeriesWithCount {
            car_count: counts.get(&series.id).copied().unwrap_or(0),
            series,
        })
        .collect())
}

/// Series offered on the car form
pub async fn active_series(db: &DatabaseConnection) -> Result<Vec<series::Model>, DbErr> {
    sort::series_in_order(series::Entity::find().filter(series::Column::IsActive.eq(true)))
        .all(db)
        .await
}

/// Every series, for the favorite-series choice on the profile form
pub async fn all_series(db: &DatabaseConnection) -> Result<Vec<series::Model>, DbErr> {
    sort::series_in_order(series::Entity::find()).all(db).await
}

/// Cases offered on the car form
pub async fn all_cases(db: &DatabaseConnection) -> Result<Vec<case::Model>, DbErr> {
    sort::cases_in_order(case::Entity::find()).all(db).await
}

/// Cars matching `filter`, newest first
pub async fn list_cars(
    db: &DatabaseConnection,
    filter: &CarFilter,
) -> Result<Vec<car::Model>, DbErr> {
    CarOrdering::NewestFirst
        .apply(car::Entity::find().filter(filter.condition()))
        .all(db)
        .await
}

/// Cars of one case, in catalogue order
pub async fn cars_in_case(db: &DatabaseConnection, case_id: i32) -> Result<Vec<car::Model>, DbErr> {
    CarOrdering::Catalogue
        .apply(car::Entity::find().filter(car::Column::CaseId.eq(case_id)))
        .all(db)
        .await
}

/// Cars of one series, in catalogue order
pub async fn cars_in_series(
    db: &DatabaseConnection,
    series_id: i32,
) -> Result<Vec<car::Model>, DbErr> {
    CarOrdering::Catalogue
        .apply(car::Entity::find().filter(car::Column::SeriesId.eq(series_id)))
        .all(db)
        .await
}

/// The most recent non-regular cars
pub async fn highlights(db: &DatabaseConnection) -> Result<Vec<car::Model>, DbErr> {
    CarOrdering::NewestFirst
        .apply(car::Entity::find().filter(car::Column::TreasureHunt.is_in(TreasureHunt::HIGHLIGHTED)))
        .limit(HIGHLIGHT_LIMIT)
        .all(db)
        .await
}

/// Number of cars per treasure-hunt tier
pub async fn treasure_hunt_counts(
    db: &DatabaseConnection,
) -> Result<HashMap<TreasureHunt, u64>, DbErr> {
    let rows: Vec<(TreasureHunt, i64)> = car::Entity::find()
        .select_only()
        .column(car::Column::TreasureHunt)
        .column_as(car::Column::Id.count(), "car_count")
        .group_by(car::Column::TreasureHunt)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(tier, count)| (tier, u64::try_from(count).unwrap_or_default()))
        .collect())
}

/// Sum of quantities over all cars
pub async fn total_quantity(db: &DatabaseConnection) -> Result<i64, DbErr> {
    // Summed here: SUM() over an integer column decodes to different types per backend.
    let quantities: Vec<i32> = car::Entity::find()
        .select_only()
        .column(car::Column::Quantity)
        .into_tuple()
        .all(db)
        .await?;
    Ok(quantities.into_iter().map(i64::from).sum())
}

pub async fn collection_stats(db: &DatabaseConnection) -> Result<CollectionStats, DbErr> {
    let by_tier = treasure_hunt_counts(db).await?;
    let tier = |t: TreasureHunt| by_tier.get(&t).copied().unwrap_or(0);

    Ok(CollectionStats {
        total_cars: car::Entity::find().count(db).await?,
        total_cases: case::Entity::find().count(db).await?,
        total_series: series::Entity::find()
            .filter(series::Column::IsActive.eq(true))
            .count(db)
            .await?,
        total_regular: tier(TreasureHunt::Regular),
        total_th: tier(TreasureHunt::TreasureHunt),
        total_sth: tier(TreasureHunt::SuperTreasureHunt),
        total_chase: tier(TreasureHunt::Chase),
        total_quantity: total_quantity(db).await?,
    })
}
