use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, StringLen};
use sea_orm::{
    ActiveValue::Set, Condition, ConnectionTrait, IntoActiveModel, TransactionTrait,
    entity::prelude::*,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{ApiError, is_unique_violation};
use crate::slug;
use crate::traits::CollectionResource;
use crate::validation::{Validatable, ValidationErrors, validators};

pub const DEFAULT_COLOR_THEME: &str = "#ff3d3d";
pub const NAME_MAX_LENGTH: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "series")]
#[schema(as = Series)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique, column_type = "String(StringLen::N(100))")]
    pub name: String,
    /// Assigned once from the name; renaming a series keeps its slug
    #[sea_orm(unique, column_type = "String(StringLen::N(100))")]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "String(StringLen::N(7))")]
    pub color_theme: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::car::Entity")]
    Cars,
    #[sea_orm(has_many = "super::collector_profile::Entity")]
    CollectorProfiles,
}

impl Related<super::car::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cars.def()
    }
}

impl Related<super::collector_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectorProfiles.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        if insert {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

/// Series add / edit submission. `is_active` follows checkbox semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SeriesForm {
    pub name: String,
    pub description: String,
    pub color_theme: String,
    pub is_active: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesInput {
    pub name: String,
    pub description: String,
    pub color_theme: String,
    pub is_active: bool,
}

impl Validatable for SeriesForm {
    type Output = SeriesInput;

    fn validate(&self) -> Result<SeriesInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors.capture(validators::validate_required("name", &self.name).and_then(
            |name| {
                validators::validate_length("name", name, None, Some(NAME_MAX_LENGTH))?;
                Ok(name.to_string())
            },
        ));
        // Any text up to seven characters; no hex format check. Blank falls back to
        // the column default.
        let color = match self.color_theme.trim() {
            "" => DEFAULT_COLOR_THEME,
            color => color,
        };
        let color_theme = errors.capture(
            validators::validate_length("color_theme", color, None, Some(7))
                .map(|()| color.to_string()),
        );

        match (name, color_theme) {
            (Some(name), Some(color_theme)) if errors.is_empty() => Ok(SeriesInput {
                name,
                description: self.description.trim().to_string(),
                color_theme,
                is_active: validators::checkbox(self.is_active.as_deref()),
            }),
            _ => Err(errors),
        }
    }
}

const DUPLICATE_NAME: &str = "Series with this Name already exists.";
const DUPLICATE_SLUG: &str = "Series with this Slug already exists.";

/// Map an insert failure onto the field that caused it
async fn duplicate_error(db: &DatabaseConnection, err: DbErr, name: &str) -> ApiError {
    if !is_unique_violation(&err) {
        return ApiError::database(err);
    }
    match Entity::find().filter(Column::Name.eq(name)).one(db).await {
        Ok(Some(_)) => ApiError::invalid_field("name", DUPLICATE_NAME),
        Ok(None) => ApiError::invalid_field("name", DUPLICATE_SLUG),
        Err(lookup_err) => ApiError::database(lookup_err),
    }
}

#[async_trait]
impl CollectionResource for Model {
    type EntityType = Entity;
    type Form = SeriesForm;

    const RESOURCE_NAME_SINGULAR: &'static str = "series";

    fn lookup_condition(key: &str) -> Condition {
        Condition::all().add(Column::Slug.eq(key))
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn initial_form() -> SeriesForm {
        SeriesForm {
            color_theme: DEFAULT_COLOR_THEME.to_string(),
            is_active: Some("on".to_string()),
            ..Default::default()
        }
    }

    fn to_form(&self) -> SeriesForm {
        SeriesForm {
            name: self.name.clone(),
            description: self.description.clone(),
            color_theme: self.color_theme.clone(),
            is_active: self.is_active.then(|| "on".to_string()),
        }
    }

    /// Two names that normalize to the same slug are a hard failure, never suffixed.
    async fn create(db: &DatabaseConnection, form: SeriesForm) -> Result<Self, ApiError> {
        let input = form.validate()?;
        let slug = slug::series_slug(&input.name).map_err(ValidationErrors::from)?;

        let series = ActiveModel {
            name: Set(input.name.clone()),
            slug: Set(slug),
            description: Set(input.description),
            color_theme: Set(input.color_theme),
            is_active: Set(input.is_active),
            ..Default::default()
        };
        match series.insert(db).await {
            Ok(series) => Ok(series),
            Err(err) => Err(duplicate_error(db, err, &input.name).await),
        }
    }

    async fn update(self, db: &DatabaseConnection, form: SeriesForm) -> Result<Self, ApiError> {
        let input = form.validate()?;
        let mut series = self.into_active_model();
        series.name = Set(input.name);
        series.description = Set(input.description);
        series.color_theme = Set(input.color_theme);
        series.is_active = Set(input.is_active);
        series
            .update(db)
            .await
            .map_err(|err| ApiError::from_unique_violation(err, "name", DUPLICATE_NAME))
    }

    async fn delete(self, db: &DatabaseConnection) -> Result<(), ApiError> {
        let txn = db.begin().await?;

        super::car::Entity::update_many()
            .col_expr(super::car::Column::SeriesId, Expr::value(Option::<i32>::None))
            .filter(super::car::Column::SeriesId.eq(self.id))
            .exec(&txn)
            .await?;
        super::collector_profile::Entity::update_many()
            .col_expr(
                super::collector_profile::Column::FavoriteSeriesId,
                Expr::value(Option::<i32>::None),
            )
            .filter(super::collector_profile::Column::FavoriteSeriesId.eq(self.id))
            .exec(&txn)
            .await?;
        Entity::delete_by_id(self.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, color: &str) -> SeriesForm {
        SeriesForm {
            name: name.to_string(),
            color_theme: color.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_color_theme_accepts_any_short_text() {
        let input = form("HW Metro", "teal").validate().unwrap();
        assert_eq!(input.color_theme, "teal");
        assert!(!input.is_active);
    }

    #[test]
    fn test_color_theme_too_long_is_rejected() {
        let errors = form("HW Metro", "#ff3d3d00").validate().unwrap_err();
        assert_eq!(errors.messages_for("color_theme").len(), 1);
    }

    #[test]
    fn test_blank_color_theme_uses_default() {
        let input = form("HW Metro", "").validate().unwrap();
        assert_eq!(input.color_theme, DEFAULT_COLOR_THEME);

        let input = form("HW Metro", "   ").validate().unwrap();
        assert_eq!(input.color_theme, "#ff3d3d");
    }

    #[test]
    fn test_name_required_and_bounded() {
        let errors = form("   ", "#ffffff").validate().unwrap_err();
        assert_eq!(errors.messages_for("name"), vec!["This field is required."]);

        let long_name = "x".repeat(NAME_MAX_LENGTH + 1);
        let errors = form(&long_name, "#ffffff").validate().unwrap_err();
        assert_eq!(errors.messages_for("name").len(), 1);
    }

    #[test]
    fn test_checkbox_marks_active() {
        let input = SeriesForm {
            is_active: Some("on".to_string()),
            ..form("HW EV", "#27ae60")
        }
        .validate()
        .unwrap();
        assert!(input.is_active);
    }
}
