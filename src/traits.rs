use async_trait::async_trait;
use sea_orm::{Condition, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, QueryFilter};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::ApiError;
use crate::models::FormChoices;
use crate::validation::Validatable;

/// A record type managed through the add / edit / delete screens.
///
/// Implemented directly on the sea-orm `Model` of Case, Series and Car. The generic
/// handlers in [`crate::routes`] only talk to this trait; record specific rules (slug
/// assignment, nulling dependents on delete, uniqueness messages) live in the
/// implementations.
#[async_trait]
pub trait CollectionResource: FromQueryResult + Sized + Send + Sync + 'static
where
    Self::EntityType: EntityTrait<Model = Self> + Sync,
{
    type EntityType: EntityTrait<Model = Self> + Sync;
    /// Raw form submitted by the add and edit screens
    type Form: Validatable + DeserializeOwned + Serialize + Default + Send + Sync + 'static;

    const RESOURCE_NAME_SINGULAR: &'static str;
    /// Verb used in the flash message after a successful create
    const CREATED_VERB: &'static str = "created";

    /// Condition selecting the record addressed by a URL key (code or slug)
    fn lookup_condition(key: &str) -> Condition;

    /// Name shown in flash messages
    fn display_name(&self) -> String;

    /// Values pre-filled on the add screen
    fn initial_form() -> Self::Form {
        Self::Form::default()
    }

    /// Current values for the edit screen
    fn to_form(&self) -> Self::Form;

    /// Where to send the user after a successful edit
    fn updated_redirect(&self) -> String {
        "/dashboard/".to_string()
    }

    async fn get_by_key(db: &DatabaseConnection, key: &str) -> Result<Self, ApiError> {
        Self::EntityType::find()
            .filter(Self::lookup_condition(key))
            .one(db)
            .await?
            .ok_or_else(|| ApiError::not_found(Self::RESOURCE_NAME_SINGULAR, Some(key.to_string())))
    }

    /// Select options for the add and edit screens
    async fn form_choices(_db: &DatabaseConnection) -> Result<FormChoices, DbErr> {
        Ok(FormChoices::default())
    }

    /// Validate `form` and insert a new record; nothing is written on failure
    async fn create(db: &DatabaseConnection, form: Self::Form) -> Result<Self, ApiError>;

    /// Validate `form` and apply it to this record
    async fn update(self, db: &DatabaseConnection, form: Self::Form) -> Result<Self, ApiError>;

    /// Remove the record, detaching anything that referenced it
    async fn delete(self, db: &DatabaseConnection) -> Result<(), ApiError>;
}
