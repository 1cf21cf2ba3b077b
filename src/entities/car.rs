use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::StringLen;
use sea_orm::{
    ActiveValue::Set, Condition, ConnectionTrait, IntoActiveModel, PaginatorTrait,
    entity::prelude::*,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ApiError;
use crate::models::FormChoices;
use crate::queries;
use crate::slug;
use crate::traits::CollectionResource;
use crate::validation::{
    LATEST_MODEL_YEAR, Validatable, ValidationError, ValidationErrors, validators,
};

/// First model year of the line
pub const MIN_CAR_YEAR: i32 = 1968;
pub const DEFAULT_MANUFACTURER: &str = "Mattel";
pub const DEFAULT_SCALE: &str = "1:64";

/// Rarity tier
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum TreasureHunt {
    #[sea_orm(string_value = "NONE")]
    #[serde(rename = "NONE")]
    Regular,
    #[sea_orm(string_value = "TH")]
    #[serde(rename = "TH")]
    TreasureHunt,
    #[sea_orm(string_value = "STH")]
    #[serde(rename = "STH")]
    SuperTreasureHunt,
    #[sea_orm(string_value = "CHASE")]
    #[serde(rename = "CHASE")]
    Chase,
}

impl TreasureHunt {
    /// Tiers shown in the homepage highlights
    pub const HIGHLIGHTED: [Self; 3] = [Self::TreasureHunt, Self::SuperTreasureHunt, Self::Chase];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::TreasureHunt => "Treasure Hunt",
            Self::SuperTreasureHunt => "Super Treasure Hunt",
            Self::Chase => "Chase Edition",
        }
    }
}

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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum CarCondition {
    #[sea_orm(string_value = "MINT")]
    #[serde(rename = "MINT")]
    Mint,
    #[sea_orm(string_value = "OPENED")]
    #[serde(rename = "OPENED")]
    Opened,
    #[sea_orm(string_value = "DAMAGED")]
    #[serde(rename = "DAMAGED")]
    Damaged,
}

impl CarCondition {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Mint => "Mint in Package",
            Self::Opened => "Opened/Loose",
            Self::Damaged => "Package Damaged",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "cars")]
#[schema(as = Car)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(column_type = "String(StringLen::N(200))")]
    pub casting_name: String,
    /// Collector number such as `1/250`
    #[sea_orm(column_type = "String(StringLen::N(20))")]
    pub number: String,
    pub year: i32,
    pub case_id: Option<i32>,
    pub series_id: Option<i32>,
    #[sea_orm(column_type = "String(StringLen::N(100))")]
    pub color: String,
    pub treasure_hunt: TreasureHunt,
    #[sea_orm(column_type = "String(StringLen::N(100))")]
    pub manufacturer: String,
    #[sea_orm(column_type = "String(StringLen::N(20))")]
    pub scale: String,
    pub quantity: i32,
    pub condition: CarCondition,
    pub purchase_date: Option<NaiveDate>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub purchase_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub estimated_value: Option<Decimal>,
    #[sea_orm(column_type = "String(StringLen::N(100))", nullable)]
    pub image: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub notes: String,
    pub is_favorite: bool,
    pub is_for_trade: bool,
    /// Assigned once at creation; edits never change it
    #[sea_orm(unique, column_type = "String(StringLen::N(250))")]
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::case::Entity",
        from = "Column::CaseId",
        to = "super::case::Column::Id",
        on_delete = "SetNull"
    )]
    Case,
    #[sea_orm(
        belongs_to = "super::series::Entity",
        from = "Column::SeriesId",
        to = "super::series::Column::Id",
        on_delete = "SetNull"
    )]
    Series,
}

impl Related<super::case::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Case.def()
    }
}

impl Related<super::series::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Series.def()
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

/// Car add / edit submission.
///
/// `case` and `series` carry record ids; an empty value leaves the car unassigned.
/// `image` is never read from the submitted fields: it is the media path of an
/// uploaded file, filled in once the upload has been stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CarForm {
    pub casting_name: String,
    pub number: String,
    pub year: String,
    pub color: String,
    pub case: String,
    pub series: String,
    pub treasure_hunt: String,
    pub manufacturer: String,
    pub scale: String,
    pub condition: String,
    pub quantity: String,
    pub purchase_date: String,
    pub purchase_price: String,
    pub estimated_value: String,
    #[serde(skip_deserializing)]
    pub image: Option<String>,
    pub notes: String,
    pub is_favorite: Option<String>,
    pub is_for_trade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarInput {
    pub casting_name: String,
    pub number: String,
    pub year: i32,
    pub color: String,
    pub case_id: Option<i32>,
    pub series_id: Option<i32>,
    pub treasure_hunt: TreasureHunt,
    pub manufacturer: String,
    pub scale: String,
    pub condition: CarCondition,
    pub quantity: i32,
    pub purchase_date: Option<NaiveDate>,
    pub purchase_price: Option<Decimal>,
    pub estimated_value: Option<Decimal>,
    pub image: Option<String>,
    pub notes: String,
    pub is_favorite: bool,
    pub is_for_trade: bool,
}

fn bounded_text(field: &str, raw: &str, max: usize) -> Result<String, ValidationError> {
    let value = validators::validate_required(field, raw)?;
    validators::validate_length(field, value, None, Some(max))?;
    Ok(value.to_string())
}

impl Validatable for CarForm {
    type Output = CarInput;

    fn validate(&self) -> Result<CarInput, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let casting_name = errors.capture(bounded_text("casting_name", &self.casting_name, 200));
        let number = errors.capture(bounded_text("number", &self.number, 20));
        let year = errors.capture(validators::parse_integer("year", &self.year).and_then(|year| {
            validators::validate_range("year", year, Some(MIN_CAR_YEAR), Some(LATEST_MODEL_YEAR))
        }));
        let color = errors.capture(bounded_text("color", &self.color, 100));
        let case_id = errors.capture(validators::parse_optional_id("case", &self.case));
        let series_id = errors.capture(validators::parse_optional_id("series", &self.series));
        let treasure_hunt = errors.capture(validators::parse_choice::<TreasureHunt>(
            "treasure_hunt",
            &self.treasure_hunt,
        ));
        let manufacturer = errors.capture(bounded_text("manufacturer", &self.manufacturer, 100));
        let scale = errors.capture(bounded_text("scale", &self.scale, 20));
        let condition =
            errors.capture(validators::parse_choice::<CarCondition>("condition", &self.condition));
        let quantity = errors.capture(
            validators::parse_integer("quantity", &self.quantity)
                .and_then(|quantity| validators::validate_range("quantity", quantity, Some(0), None)),
        );
        let purchase_date =
            errors.capture(validators::parse_optional_date("purchase_date", &self.purchase_date));
        let purchase_price = errors.capture(validators::parse_optional_amount(
            "purchase_price",
            &self.purchase_price,
            10,
            2,
        ));
        let estimated_value = errors.capture(validators::parse_optional_amount(
            "estimated_value",
            &self.estimated_value,
            10,
            2,
        ));
        if !errors.is_empty() {
            return Err(errors);
        }

        match (
            casting_name,
            number,
            year,
            color,
            case_id,
            series_id,
            treasure_hunt,
            manufacturer,
            scale,
            condition,
            quantity,
            purchase_date,
            purchase_price,
            estimated_value,
        ) {
            (
                Some(casting_name),
                Some(number),
                Some(year),
                Some(color),
                Some(case_id),
                Some(series_id),
                Some(treasure_hunt),
                Some(manufacturer),
                Some(scale),
                Some(condition),
                Some(quantity),
                Some(purchase_date),
                Some(purchase_price),
                Some(estimated_value),
            ) => Ok(CarInput {
                casting_name,
                number,
                year,
                color,
                case_id,
                series_id,
                treasure_hunt,
                manufacturer,
                scale,
                condition,
                quantity,
                purchase_date,
                purchase_price,
                estimated_value,
                image: self.image.clone(),
                notes: self.notes.trim().to_string(),
                is_favorite: validators::checkbox(self.is_favorite.as_deref()),
                is_for_trade: validators::checkbox(self.is_for_trade.as_deref()),
            }),
            _ => Err(errors),
        }
    }
}

impl CarInput {
    /// Referenced case and series must exist. The series is not re-checked for being
    /// active; the choice list offered on the form is the only place that filters.
    async fn check_references(&self, db: &DatabaseConnection) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();

        if let Some(case_id) = self.case_id
            && super::case::Entity::find_by_id(case_id).count(db).await? == 0
        {
            errors.add(validators::invalid_reference("case"));
        }
        if let Some(series_id) = self.series_id
            && super::series::Entity::find_by_id(series_id).count(db).await? == 0
        {
            errors.add(validators::invalid_reference("series"));
        }

        errors.result().map_err(ApiError::from)
    }

    fn apply(self, car: &mut ActiveModel) {
        car.casting_name = Set(self.casting_name);
        car.number = Set(self.number);
        car.year = Set(self.year);
        car.color = Set(self.color);
        car.case_id = Set(self.case_id);
        car.series_id = Set(self.series_id);
        car.treasure_hunt = Set(self.treasure_hunt);
        car.manufacturer = Set(self.manufacturer);
        car.scale = Set(self.scale);
        car.condition = Set(self.condition);
        car.quantity = Set(self.quantity);
        car.purchase_date = Set(self.purchase_date);
        car.purchase_price = Set(self.purchase_price);
        car.estimated_value = Set(self.estimated_value);
        // Without a new upload the stored image stays
        if let Some(image) = self.image {
            car.image = Set(Some(image));
        }
        car.notes = Set(self.notes);
        car.is_favorite = Set(self.is_favorite);
        car.is_for_trade = Set(self.is_for_trade);
    }
}

fn format_optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[async_trait]
impl CollectionResource for Model {
    type EntityType = Entity;
    type Form = CarForm;

    const RESOURCE_NAME_SINGULAR: &'static str = "car";
    const CREATED_VERB: &'static str = "added";

    fn lookup_condition(key: &str) -> Condition {
        Condition::all().add(Column::Slug.eq(key))
    }

    fn display_name(&self) -> String {
        self.casting_name.clone()
    }

    fn initial_form() -> CarForm {
        CarForm {
            year: LATEST_MODEL_YEAR.to_string(),
            treasure_hunt: TreasureHunt::Regular.to_value(),
            manufacturer: DEFAULT_MANUFACTURER.to_string(),
            scale: DEFAULT_SCALE.to_string(),
            condition: CarCondition::Mint.to_value(),
            quantity: "1".to_string(),
            ..Default::default()
        }
    }

    fn to_form(&self) -> CarForm {
        CarForm {
            casting_name: self.casting_name.clone(),
            number: self.number.clone(),
            year: self.year.to_string(),
            color: self.color.clone(),
            case: format_optional(self.case_id),
            series: format_optional(self.series_id),
            treasure_hunt: self.treasure_hunt.to_value(),
            manufacturer: self.manufacturer.clone(),
            scale: self.scale.clone(),
            condition: self.condition.to_value(),
            quantity: self.quantity.to_string(),
            purchase_date: format_optional(self.purchase_date),
            purchase_price: format_optional(self.purchase_price),
            estimated_value: format_optional(self.estimated_value),
            image: self.image.clone(),
            notes: self.notes.clone(),
            is_favorite: self.is_favorite.then(|| "on".to_string()),
            is_for_trade: self.is_for_trade.then(|| "on".to_string()),
        }
    }

    fn updated_redirect(&self) -> String {
        format!("/car/{}/", self.slug)
    }

    /// Every case, but only the series that are currently active
    async fn form_choices(db: &DatabaseConnection) -> Result<FormChoices, DbErr> {
        let cases = queries::all_cases(db).await?;
        let series = queries::active_series(db).await?;
        Ok(FormChoices {
            case: FormChoices::cases(&cases),
            series: FormChoices::series(&series),
            treasure_hunt: FormChoices::treasure_hunts(),
            condition: FormChoices::conditions(),
            ..Default::default()
        })
    }

    async fn create(db: &DatabaseConnection, form: CarForm) -> Result<Self, ApiError> {
        let input = form.validate()?;
        input.check_references(db).await?;

        let base = slug::car_slug_base(input.year, &input.casting_name, &input.color);
        let mut car = ActiveModel {
            ..Default::default()
        };
        input.apply(&mut car);
        slug::insert_car_with_unique_slug(db, &base, car).await
    }

    async fn update(self, db: &DatabaseConnection, form: CarForm) -> Result<Self, ApiError> {
        let input = form.validate()?;
        input.check_references(db).await?;

        let mut car = self.into_active_model();
        input.apply(&mut car);
        Ok(car.update(db).await?)
    }

    async fn delete(self, db: &DatabaseConnection) -> Result<(), ApiError> {
        Entity::delete_by_id(self.id).exec(db).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> CarForm {
        CarForm {
            casting_name: "Skyline GT-R".to_string(),
            number: "1/250".to_string(),
            color: "Blue".to_string(),
            ..Model::initial_form()
        }
    }

    #[test]
    fn test_initial_form_is_valid_once_required_text_is_filled() {
        let input = valid_form().validate().unwrap();
        assert_eq!(input.year, 2025);
        assert_eq!(input.manufacturer, "Mattel");
        assert_eq!(input.scale, "1:64");
        assert_eq!(input.quantity, 1);
        assert_eq!(input.condition, CarCondition::Mint);
        assert_eq!(input.treasure_hunt, TreasureHunt::Regular);
        assert_eq!(input.case_id, None);
        assert!(!input.is_favorite);
    }

    #[test]
    fn test_year_before_1968_is_rejected() {
        let errors = CarForm {
            year: "1950".to_string(),
            ..valid_form()
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            errors.messages_for("year"),
            vec!["Ensure this value is greater than or equal to 1968."]
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_negative_quantity_and_bad_price_are_rejected() {
        let errors = CarForm {
            quantity: "-1".to_string(),
            purchase_price: "1.005".to_string(),
            estimated_value: "-3".to_string(),
            ..valid_form()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.messages_for("quantity").len(), 1);
        assert_eq!(
            errors.messages_for("purchase_price"),
            vec!["Ensure that there are no more than 2 decimal places."]
        );
        assert_eq!(errors.messages_for("estimated_value").len(), 1);
    }

    #[test]
    fn test_unknown_treasure_hunt_value() {
        let errors = CarForm {
            treasure_hunt: "GOLD".to_string(),
            ..valid_form()
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            errors.messages_for("treasure_hunt"),
            vec!["Select a valid choice. GOLD is not one of the available choices."]
        );
    }

    #[test]
    fn test_submitted_image_path_is_ignored() {
        let form: CarForm =
            serde_json::from_str(r#"{"casting_name": "Civic", "image": "../../etc/passwd"}"#)
                .unwrap();
        assert_eq!(form.casting_name, "Civic");
        assert_eq!(form.image, None);

        let input = CarForm {
            image: Some("cars/2025/0f3a.png".to_string()),
            ..valid_form()
        }
        .validate()
        .unwrap();
        assert_eq!(input.image.as_deref(), Some("cars/2025/0f3a.png"));
    }

    #[test]
    fn test_checkboxes_and_optional_fields() {
        let input = CarForm {
            case: "3".to_string(),
            purchase_price: "4.99".to_string(),
            is_for_trade: Some("on".to_string()),
            ..valid_form()
        }
        .validate()
        .unwrap();
        assert_eq!(input.case_id, Some(3));
        assert_eq!(input.purchase_price, Some(Decimal::new(499, 2)));
        assert!(input.is_for_trade);
        assert!(!input.is_favorite);
    }

    #[test]
    fn test_treasure_hunt_wire_values() {
        assert_eq!(TreasureHunt::SuperTreasureHunt.to_value(), "STH");
        assert_eq!(
            serde_json::to_string(&TreasureHunt::Regular).unwrap(),
            "\"NONE\""
        );
        assert_eq!(CarCondition::Opened.label(), "Opened/Loose");
    }
}
