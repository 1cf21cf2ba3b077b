//! Start-up population of the fixed cases, the default series and the collector profile.
//!
//! Running it again only creates what is missing.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, Iterable,
    PaginatorTrait, QueryFilter,
};

use crate::entities::case::{self, CaseCode};
use crate::entities::collector_profile::{self, ProfileForm};
use crate::entities::series;
use crate::errors::ApiError;
use crate::slug;

/// Assortment year of the seeded cases
pub const SEED_YEAR: i32 = 2025;

/// Default series and their colour themes
pub const DEFAULT_SERIES: [(&str, &str); 14] = [
    ("HW J-Imports", "#ff3d3d"),
    ("HW First Response", "#3d3dff"),
    ("Factory Fresh", "#ffef00"),
    ("Rod Squad", "#ff6b6b"),
    ("HW Hot Trucks", "#4ecdc4"),
    ("HW Screen Time", "#9b59b6"),
    ("HW Art Cars", "#f39c12"),
    ("HW Dream Garage", "#e74c3c"),
    ("X-Raycers", "#1abc9c"),
    ("HW Ride-Ons", "#34495e"),
    ("HW Metro", "#95a5a6"),
    ("HW Dirt", "#d35400"),
    ("HW 70s vs 90s", "#8e44ad"),
    ("HW EV", "#27ae60"),
];

/// What a seeding run created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub cases: usize,
    pub series: usize,
    pub profile: bool,
}

fn default_profile() -> ProfileForm {
    ProfileForm {
        name: "Jake Mitchell".to_string(),
        email: "collector@hotwheels.com".to_string(),
        bio: "Passionate Hot Wheels collector for 30 years".to_string(),
        years_collecting: "30".to_string(),
        favorite_series: String::new(),
        total_value: Decimal::ZERO.to_string(),
    }
}

async fn seed_cases(db: &DatabaseConnection) -> Result<usize, ApiError> {
    let mut created = 0;
    for code in CaseCode::iter() {
        let exists = case::Entity::find()
            .filter(case::Column::Code.eq(code))
            .count(db)
            .await?
            > 0;
        if exists {
            continue;
        }
        case::ActiveModel {
            code: Set(code),
            year: Set(SEED_YEAR),
            description: Set(format!(
                "{SEED_YEAR} Hot Wheels Mainline Case {} assortment",
                code.as_str()
            )),
            release_date: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;
        created += 1;
    }
    Ok(created)
}

async fn seed_series(db: &DatabaseConnection) -> Result<usize, ApiError> {
    let mut created = 0;
    for (name, color) in DEFAULT_SERIES {
        let exists = series::Entity::find()
            .filter(series::Column::Name.eq(name))
            .count(db)
            .await?
            > 0;
        if exists {
            continue;
        }
        series::ActiveModel {
            name: Set(name.to_string()),
            slug: Set(slug::series_slug(name)?),
            description: Set(String::new()),
            color_theme: Set(color.to_string()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;
        created += 1;
    }
    Ok(created)
}

/// Create whatever part of the default data is missing
pub async fn run(db: &DatabaseConnection) -> Result<SeedSummary, ApiError> {
    let cases = seed_cases(db).await?;
    let series = seed_series(db).await?;
    let profile = if collector_profile::get(db).await?.is_none() {
        collector_profile::upsert(db, &default_profile()).await?;
        true
    } else {
        false
    };

    let summary = SeedSummary {
        cases,
        series,
        profile,
    };
    tracing::info!(
        cases = summary.cases,
        series = summary.series,
        profile = summary.profile,
        "Seed data applied"
    );
    Ok(summary)
}
