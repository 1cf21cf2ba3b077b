use sea_orm::DbErr;
use sea_orm_migration::prelude::*;

use crate::entities::{car, case, collector_profile, series};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateCollectionTables)]
    }
}

pub struct CreateCollectionTables;

impl MigrationName for CreateCollectionTables {
    fn name(&self) -> &'static str {
        "m20250101_000001_create_collection_tables"
    }
}

fn id_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn timestamp_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for CreateCollectionTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(case::Entity)
                    .if_not_exists()
                    .col(id_column(case::Column::Id))
                    .col(
                        ColumnDef::new(case::Column::Code)
                            .string_len(1)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(case::Column::Year).integer().not_null())
                    .col(ColumnDef::new(case::Column::Description).text().not_null())
                    .col(ColumnDef::new(case::Column::ReleaseDate).date().null())
                    .col(timestamp_column(case::Column::CreatedAt))
                    .col(timestamp_column(case::Column::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(series::Entity)
                    .if_not_exists()
                    .col(id_column(series::Column::Id))
                    .col(
                        ColumnDef::new(series::Column::Name)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(series::Column::Slug)
                            .string_len(100)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(series::Column::Description).text().not_null())
                    .col(
                        ColumnDef::new(series::Column::ColorTheme)
                            .string_len(7)
                            .not_null()
                            .default(series::DEFAULT_COLOR_THEME),
                    )
                    .col(
                        ColumnDef::new(series::Column::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(timestamp_column(series::Column::CreatedAt))
                    .col(timestamp_column(series::Column::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(car::Entity)
                    .if_not_exists()
                    .col(id_column(car::Column::Id))
                    .col(ColumnDef::new(car::Column::CastingName).string_len(200).not_null())
                    .col(ColumnDef::new(car::Column::Number).string_len(20).not_null())
                    .col(ColumnDef::new(car::Column::Year).integer().not_null())
                    .col(ColumnDef::new(car::Column::CaseId).integer().null())
                    .col(ColumnDef::new(car::Column::SeriesId).integer().null())
                    .col(ColumnDef::new(car::Column::Color).string_len(100).not_null())
                    .col(
                        ColumnDef::new(car::Column::TreasureHunt)
                            .string_len(10)
                            .not_null()
                            .default("NONE"),
                    )
                    .col(
                        ColumnDef::new(car::Column::Manufacturer)
                            .string_len(100)
                            .not_null()
                            .default(car::DEFAULT_MANUFACTURER),
                    )
                    .col(
                        ColumnDef::new(car::Column::Scale)
                            .string_len(20)
                            .not_null()
                            .default(car::DEFAULT_SCALE),
                    )
                    .col(
                        ColumnDef::new(car::Column::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(car::Column::Condition)
                            .string_len(20)
                            .not_null()
                            .default("MINT"),
                    )
                    .col(ColumnDef::new(car::Column::PurchaseDate).date().null())
                    .col(ColumnDef::new(car::Column::PurchasePrice).decimal_len(10, 2).null())
                    .col(ColumnDef::new(car::Column::EstimatedValue).decimal_len(10, 2).null())
                    .col(ColumnDef::new(car::Column::Image).string_len(100).null())
                    .col(ColumnDef::new(car::Column::Notes).text().not_null())
                    .col(
                        ColumnDef::new(car::Column::IsFavorite)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(car::Column::IsForTrade)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(car::Column::Slug)
                            .string_len(250)
                            .not_null()
                            .unique_key(),
                    )
                    .col(timestamp_column(car::Column::CreatedAt))
                    .col(timestamp_column(car::Column::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cars_case_id")
                            .from(car::Entity, car::Column::CaseId)
                            .to(case::Entity, case::Column::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cars_series_id")
                            .from(car::Entity, car::Column::SeriesId)
                            .to(series::Entity, series::Column::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cars_created_at")
                    .table(car::Entity)
                    .col(car::Column::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(collector_profile::Entity)
                    .if_not_exists()
                    .col(id_column(collector_profile::Column::Id))
                    .col(
                        ColumnDef::new(collector_profile::Column::Name)
                            .string_len(200)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(collector_profile::Column::Email)
                            .string_len(254)
                            .not_null(),
                    )
                    .col(ColumnDef::new(collector_profile::Column::Bio).text().not_null())
                    .col(
                        ColumnDef::new(collector_profile::Column::YearsCollecting)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(collector_profile::Column::FavoriteSeriesId)
                            .integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(collector_profile::Column::TotalValue)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(timestamp_column(collector_profile::Column::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_collector_profiles_favorite_series_id")
                            .from(
                                collector_profile::Entity,
                                collector_profile::Column::FavoriteSeriesId,
                            )
                            .to(series::Entity, series::Column::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(collector_profile::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(car::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(series::Entity).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(case::Entity).to_owned())
            .await?;
        Ok(())
    }
}
