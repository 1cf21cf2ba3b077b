use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, StringLen};
use sea_orm::{
    ActiveValue::Set, Condition, ConnectionTrait, IntoActiveModel, TransactionTrait,
    entity::prelude::*,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ApiError;
use crate::models::FormChoices;
use crate::traits::CollectionResource;
use crate::validation::{LATEST_MODEL_YEAR, Validatable, ValidationErrors, validators};

/// Oldest assortment year accepted for a case
pub const MIN_CASE_YEAR: i32 = 2000;

/// Assortment letter. `I` and `O` are never used.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(1))")]
pub enum CaseCode {
    #[sea_orm(string_value = "A")]
    A,
    #[sea_orm(string_value = "B")]
    B,
    #[sea_orm(string_value = "C")]
    C,
    #[sea_orm(string_value = "D")]
    D,
    #[sea_orm(string_value = "E")]
    E,
    #[sea_orm(string_value = "F")]
    F,
    #[sea_orm(string_value = "G")]
    G,
    #[sea_orm(string_value = "H")]
    H,
    #[sea_orm(string_value = "J")]
    J,
    #[sea_orm(string_value = "K")]
    K,
    #[sea_orm(string_value = "L")]
    L,
    #[sea_orm(string_value = "M")]
    M,
    #[sea_orm(string_value = "N")]
    N,
    #[sea_orm(string_value = "P")]
    P,
    #[sea_orm(string_value = "Q")]
    Q,
}

impl CaseCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::F => "F",
            Self::G => "G",
            Self::H => "H",
            Self::J => "J",
            Self::K => "K",
            Self::L => "L",
            Self::M => "M",
            Self::N => "N",
            Self::P => "P",
            Self::Q => "Q",
        }
    }

    #[must_use]
    pub fn label(self) -> String {
        format!("Case {}", self.as_str())
    }
}

impl std::fmt::Display for CaseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "cases")]
#[schema(as = Case)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub code: CaseCode,
    pub year: i32,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub release_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::car::Entity")]
    Cars,
}

impl Related<super::car::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cars.def()
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

/// Case add / edit submission
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CaseForm {
    pub code: String,
    pub year: String,
    pub description: String,
    pub release_date: String,
}

/// A validated [`CaseForm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseInput {
    pub code: CaseCode,
    pub year: i32,
    pub description: String,
    pub release_date: Option<NaiveDate>,
}

impl Validatable for CaseForm {
    type Output = CaseInput;

    fn validate(&self) -> Result<CaseInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let code = errors.capture(validators::parse_choice::<CaseCode>("code", &self.code));
        let year = errors.capture(
            validators::parse_integer("year", &self.year).and_then(|year| {
                validators::validate_range("year", year, Some(MIN_CASE_YEAR), Some(LATEST_MODEL_YEAR))
            }),
        );
        let release_date =
            errors.capture(validators::parse_optional_date("release_date", &self.release_date));

        match (code, year, release_date) {
            (Some(code), Some(year), Some(release_date)) if errors.is_empty() => Ok(CaseInput {
                code,
                year,
                description: self.description.trim().to_string(),
                release_date,
            }),
            _ => Err(errors),
        }
    }
}

const DUPLICATE_CODE: &str = "Case Mix with this Code already exists.";

#[async_trait]
impl CollectionResource for Model {
    type EntityType = Entity;
    type Form = CaseForm;

    const RESOURCE_NAME_SINGULAR: &'static str = "case";

    fn lookup_condition(key: &str) -> Condition {
        Condition::all().add(Column::Code.eq(key))
    }

    fn display_name(&self) -> String {
        self.code.label()
    }

    fn initial_form() -> CaseForm {
        CaseForm {
            year: LATEST_MODEL_YEAR.to_string(),
            ..Default::default()
        }
    }

    fn to_form(&self) -> CaseForm {
        CaseForm {
            code: self.code.to_string(),
            year: self.year.to_string(),
            description: self.description.clone(),
            release_date: self
                .release_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    async fn form_choices(_db: &DatabaseConnection) -> Result<FormChoices, DbErr> {
        Ok(FormChoices {
            code: FormChoices::case_codes(),
            ..Default::default()
        })
    }

    async fn create(db: &DatabaseConnection, form: CaseForm) -> Result<Self, ApiError> {
        let input = form.validate()?;
        let case = ActiveModel {
            code: Set(input.code),
            year: Set(input.year),
            description: Set(input.description),
            release_date: Set(input.release_date),
            ..Default::default()
        };
        case.insert(db)
            .await
            .map_err(|err| ApiError::from_unique_violation(err, "code", DUPLICATE_CODE))
    }

    async fn update(self, db: &DatabaseConnection, form: CaseForm) -> Result<Self, ApiError> {
        let input = form.validate()?;
        let mut case = self.into_active_model();
        case.code = Set(input.code);
        case.year = Set(input.year);
        case.description = Set(input.description);
        case.release_date = Set(input.release_date);
        case.update(db)
            .await
            .map_err(|err| ApiError::from_unique_violation(err, "code", DUPLICATE_CODE))
    }

    async fn delete(self, db: &DatabaseConnection) -> Result<(), ApiError> {
        let txn = db.begin().await?;

        super::car::Entity::update_many()
            .col_expr(super::car::Column::CaseId, Expr::value(Option::<i32>::None))
            .filter(super::car::Column::CaseId.eq(self.id))
            .exec(&txn)
            .await?;
        Entity::delete_by_id(self.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(())
    }
}
