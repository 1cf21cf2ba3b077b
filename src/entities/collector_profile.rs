//! The collection owner's profile.
//!
//! There is at most one row: it always lives under [`PROFILE_ID`], so a second insert
//! is rejected by the primary key rather than creating a rival profile.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::StringLen;
use sea_orm::{
    ActiveValue::Set, ConnectionTrait, IntoActiveModel, TransactionTrait, entity::prelude::*,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ApiError;
use crate::validation::{Validatable, ValidationErrors, validators};

pub const PROFILE_ID: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "collector_profiles")]
#[schema(as = CollectorProfile)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "String(StringLen::N(200))")]
    pub name: String,
    #[sea_orm(column_type = "String(StringLen::N(254))")]
    pub email: String,
    #[sea_orm(column_type = "Text")]
    pub bio: String,
    pub years_collecting: i32,
    pub favorite_series_id: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_value: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::series::Entity",
        from = "Column::FavoriteSeriesId",
        to = "super::series::Column::Id",
        on_delete = "SetNull"
    )]
    FavoriteSeries,
}

impl Related<super::series::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FavoriteSeries.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert {
            self.created_at = Set(Utc::now());
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    pub bio: String,
    pub years_collecting: String,
    /// Series id; empty for none
    pub favorite_series: String,
    pub total_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInput {
    pub name: String,
    pub email: String,
    pub bio: String,
    pub years_collecting: i32,
    pub favorite_series_id: Option<i32>,
    pub total_value: Decimal,
}

impl Validatable for ProfileForm {
    type Output = ProfileInput;

    fn validate(&self) -> Result<ProfileInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.capture(validators::validate_required("name", &self.name).and_then(
            |name| {
                validators::validate_length("name", name, None, Some(200))?;
                Ok(name.to_string())
            },
        ));
        let email = errors.capture(validators::validate_required("email", &self.email).and_then(
            |email| {
                validators::validate_email("email", email)?;
                Ok(email.to_string())
            },
        ));
        let years_collecting = errors.capture(
            validators::parse_integer("years_collecting", &self.years_collecting)
                .and_then(|years| validators::validate_range("years_collecting", years, Some(0), None)),
        );
        let favorite_series_id =
            errors.capture(validators::parse_optional_id("favorite_series", &self.favorite_series));
        let total_value =
            errors.capture(validators::parse_amount("total_value", &self.total_value, 12, 2));

        match (name, email, years_collecting, favorite_series_id, total_value) {
            (
                Some(name),
                Some(email),
                Some(years_collecting),
                Some(favorite_series_id),
                Some(total_value),
            ) if errors.is_empty() => Ok(ProfileInput {
                name,
                email,
                bio: self.bio.trim().to_string(),
                years_collecting,
                favorite_series_id,
                total_value,
            }),
            _ => Err(errors),
        }
    }
}

impl ProfileInput {
    fn apply(self, profile: &mut ActiveModel) {
        profile.name = Set(self.name);
        profile.email = Set(self.email);
        profile.bio = Set(self.bio);
        profile.years_collecting = Set(self.years_collecting);
        profile.favorite_series_id = Set(self.favorite_series_id);
        profile.total_value = Set(self.total_value);
    }
}

impl ProfileForm {
    /// Values offered when no profile exists yet
    #[must_use]
    pub fn initial() -> Self {
        Self {
            years_collecting: "0".to_string(),
            total_value: "0.00".to_string(),
            ..Default::default()
        }
    }
}

impl From<&Model> for ProfileForm {
    fn from(profile: &Model) -> Self {
        Self {
            name: profile.name.clone(),
            email: profile.email.clone(),
            bio: profile.bio.clone(),
            years_collecting: profile.years_collecting.to_string(),
            favorite_series: profile
                .favorite_series_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            total_value: profile.total_value.to_string(),
        }
    }
}

/// The canonical profile, if one has been created
pub async fn get(db: &DatabaseConnection) -> Result<Option<Model>, DbErr> {
    Entity::find_by_id(PROFILE_ID).one(db).await
}

/// Validate `form` and write it to the single profile row, creating it if needed.
///
/// # Errors
///
/// Field errors when the form is invalid or the favorite series does not exist.
pub async fn upsert(db: &DatabaseConnection, form: &ProfileForm) -> Result<Model, ApiError> {
    let input = form.validate()?;

    let txn = db.begin().await?;

    if let Some(series_id) = input.favorite_series_id
        && super::series::Entity::find_by_id(series_id)
            .one(&txn)
            .await?
            .is_none()
    {
        return Err(ValidationErrors::from(validators::invalid_reference("favorite_series")).into());
    }

    let model = match Entity::find_by_id(PROFILE_ID).one(&txn).await? {
        Some(existing) => {
            let mut profile = existing.into_active_model();
            input.apply(&mut profile);
            profile.update(&txn).await?
        }
        None => {
            let mut profile = ActiveModel {
                id: Set(PROFILE_ID),
                ..Default::default()
            };
            input.apply(&mut profile);
            profile.insert(&txn).await?
        }
    };
    txn.commit().await?;
    Ok(model)
}
