use diecast_vault::entities::{case, collector_profile, series};
use diecast_vault::seed::{self, DEFAULT_SERIES, SeedSummary};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

mod common;
use common::{create_series, setup_test_db};

#[tokio::test]
async fn test_seed_populates_empty_database() {
    let db = setup_test_db().await.expect("Failed to setup test database");

    let summary = seed::run(&db).await.unwrap();
    assert_eq!(
        summary,
        SeedSummary {
            cases: 15,
            series: DEFAULT_SERIES.len(),
            profile: true,
        }
    );

    let case_q = case::Entity::find()
        .filter(case::Column::Code.eq("Q"))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(case_q.year, 2025);
    assert_eq!(case_q.description, "2025 Hot Wheels Mainline Case Q assortment");

    let ev = series::Entity::find()
        .filter(series::Column::Slug.eq("hw-ev"))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ev.color_theme, "#27ae60");
    assert!(ev.is_active);

    let profile = collector_profile::get(&db).await.unwrap().unwrap();
    assert_eq!(profile.name, "Jake Mitchell");
    assert_eq!(profile.years_collecting, 30);
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    create_series(&db, "HW Metro").await;

    let first = seed::run(&db).await.unwrap();
    assert_eq!(first.series, DEFAULT_SERIES.len() - 1);

    let second = seed::run(&db).await.unwrap();
    assert_eq!(second, SeedSummary::default());

    assert_eq!(case::Entity::find().count(&db).await.unwrap(), 15);
    assert_eq!(
        series::Entity::find().count(&db).await.unwrap(),
        DEFAULT_SERIES.len() as u64
    );
    assert_eq!(collector_profile::Entity::find().count(&db).await.unwrap(), 1);
}
