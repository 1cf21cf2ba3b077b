//! URL slugs for series and cars.
//!
//! Series slugs come straight from the name and rely on the unique index to reject
//! duplicates. Car slugs are derived from `(year, casting name, color)` and get a
//! numeric suffix (`-1`, `-2`, ...) when the base is already in use. The suffix is
//! chosen by reading the taken slugs and then attempting the insert; a unique
//! violation from a concurrent writer sends us round the loop again with the next
//! candidate.

use std::collections::HashSet;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QuerySelect,
};

use crate::entities::car;
use crate::errors::{ApiError, is_unique_violation};
use crate::validation::ValidationError;

/// Upper bound on insert attempts before slug assignment gives up
pub const MAX_SLUG_ATTEMPTS: usize = 32;

/// Slugs that would shadow a fixed route segment
pub const RESERVED_SLUGS: &[&str] = &["add"];

/// Width of the `cars.slug` column
pub const CAR_SLUG_MAX_LENGTH: usize = 250;
/// Width of the `series.slug` column
pub const SERIES_SLUG_MAX_LENGTH: usize = 100;
/// Room left after a car base slug for a `-N` suffix
const SUFFIX_RESERVE: usize = 10;

/// Lowercase ASCII slug: accents folded, runs of anything else collapse to one `-`.
#[must_use]
pub fn slugify(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut last_was_separator = false;

    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if let Some(folded) = fold_accent(c) {
            result.push_str(folded);
            last_was_separator = false;
        } else if !last_was_separator && !result.is_empty() {
            result.push('-');
            last_was_separator = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }

    result
}

/// Cut an ASCII slug to at most `max` bytes without leaving a trailing `-`
fn truncate(mut slug: String, max: usize) -> String {
    if slug.len() > max {
        slug.truncate(max);
        while slug.ends_with('-') {
            slug.pop();
        }
    }
    slug
}

fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'æ' | 'Æ' => "ae",
        'ç' | 'Ç' => "c",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ñ' | 'Ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ß' => "ss",
        _ => return None,
    };
    Some(folded)
}

/// Slug for a new series.
///
/// # Errors
///
/// Fails on the `name` field when the name has no sluggable characters or
/// normalizes to a reserved route segment.
pub fn series_slug(name: &str) -> Result<String, ValidationError> {
    let slug = truncate(slugify(name), SERIES_SLUG_MAX_LENGTH);
    if slug.is_empty() {
        return Err(ValidationError::new(
            "name",
            "Name must contain at least one letter or digit.",
        ));
    }
    if RESERVED_SLUGS.contains(&slug.as_str()) {
        return Err(ValidationError::new(
            "name",
            format!("\"{slug}\" is reserved and cannot be used as a series name."),
        ));
    }
    Ok(slug)
}

/// Base slug of a car before any collision suffix.
///
/// Capped so that the base plus a suffix still fits [`CAR_SLUG_MAX_LENGTH`].
#[must_use]
pub fn car_slug_base(year: i32, casting_name: &str, color: &str) -> String {
    truncate(
        slugify(&format!("{year}-{casting_name}-{color}")),
        CAR_SLUG_MAX_LENGTH - SUFFIX_RESERVE,
    )
}

/// The `n`th candidate for `base`; zero is the base itself
#[must_use]
pub fn candidate(base: &str, n: usize) -> String {
    if n == 0 {
        base.to_string()
    } else {
        format!("{base}-{n}")
    }
}

/// First candidate for `base` not contained in `taken`
#[must_use]
pub fn first_free(base: &str, taken: &HashSet<String>) -> String {
    (0..)
        .map(|n| candidate(base, n))
        .find(|slug| !taken.contains(slug))
        .unwrap_or_else(|| base.to_string())
}

/// Where the insert loop learns which candidates are already used
#[async_trait]
trait SlugSource: Sync {
    async fn taken(&self, db: &DatabaseConnection, base: &str) -> Result<HashSet<String>, DbErr>;
}

/// Reads the `cars` table
struct StoredSlugs;

#[async_trait]
impl SlugSource for StoredSlugs {
    /// Every stored car slug equal to `base` or starting with `base-`
    async fn taken(&self, db: &DatabaseConnection, base: &str) -> Result<HashSet<String>, DbErr> {
        let slugs: Vec<String> = car::Entity::find()
            .select_only()
            .column(car::Column::Slug)
            .filter(
                Condition::any()
                    .add(car::Column::Slug.eq(base))
                    .add(car::Column::Slug.like(format!("{base}-%"))),
            )
            .into_tuple()
            .all(db)
            .await?;
        Ok(slugs.into_iter().collect())
    }
}

/// Insert `car` under the first free slug derived from `base`.
///
/// Each attempt is a single insert, so a failure leaves nothing behind. A unique
/// violation means another writer took the candidate between our read and our
/// insert; that candidate is remembered and the next one tried.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] after [`MAX_SLUG_ATTEMPTS`] collisions and
/// [`ApiError::Database`] for any other database failure.
pub async fn insert_car_with_unique_slug(
    db: &DatabaseConnection,
    base: &str,
    car: car::ActiveModel,
) -> Result<car::Model, ApiError> {
    insert_with_slug_source(db, base, car, &StoredSlugs).await
}

async fn insert_with_slug_source<S: SlugSource>(
    db: &DatabaseConnection,
    base: &str,
    car: car::ActiveModel,
    source: &S,
) -> Result<car::Model, ApiError> {
    let mut rejected: HashSet<String> = HashSet::new();

    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let mut taken = source.taken(db, base).await?;
        taken.extend(rejected.iter().cloned());
        let slug = first_free(base, &taken);

        let mut pending = car.clone();
        pending.slug = Set(slug.clone());

        match pending.insert(db).await {
            Ok(model) => return Ok(model),
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(slug = %slug, attempt, "Car slug already taken, retrying");
                rejected.insert(slug);
            }
            Err(err) => return Err(ApiError::database(err)),
        }
    }

    Err(ApiError::internal(
        "Could not assign a unique slug",
        Some(format!(
            "gave up on base slug '{base}' after {MAX_SLUG_ATTEMPTS} attempts"
        )),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::Migrator;
    use sea_orm::{ConnectOptions, Database, PaginatorTrait};
    use sea_orm_migration::MigratorTrait;

    /// Answers from a snapshot taken before other writers got in
    struct StaleRead(HashSet<String>);

    #[async_trait]
    impl SlugSource for StaleRead {
        async fn taken(
            &self,
            _db: &DatabaseConnection,
            _base: &str,
        ) -> Result<HashSet<String>, DbErr> {
            Ok(self.0.clone())
        }
    }

    async fn memory_db() -> DatabaseConnection {
        let mut opt = ConnectOptions::new("sqlite::memory:");
        opt.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opt).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn civic() -> car::ActiveModel {
        car::ActiveModel {
            casting_name: Set("Civic".to_string()),
            number: Set("1/250".to_string()),
            year: Set(2025),
            color: Set("Red".to_string()),
            treasure_hunt: Set(car::TreasureHunt::Regular),
            manufacturer: Set(car::DEFAULT_MANUFACTURER.to_string()),
            scale: Set(car::DEFAULT_SCALE.to_string()),
            quantity: Set(1),
            condition: Set(car::CarCondition::Mint),
            notes: Set(String::new()),
            is_favorite: Set(false),
            is_for_trade: Set(false),
            ..Default::default()
        }
    }

    async fn store(db: &DatabaseConnection, slug: &str) {
        let mut car = civic();
        car.slug = Set(slug.to_string());
        car.insert(db).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_moves_to_next_suffix_when_candidate_was_taken() {
        let db = memory_db().await;
        // Written after the snapshot below was taken
        store(&db, "2025-civic-red").await;

        let stale = StaleRead(HashSet::new());
        let car = insert_with_slug_source(&db, "2025-civic-red", civic(), &stale)
            .await
            .unwrap();

        assert_eq!(car.slug, "2025-civic-red-1");
        assert_eq!(car::Entity::find().count(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_gives_up_after_max_attempts() {
        let db = memory_db().await;
        for n in 0..MAX_SLUG_ATTEMPTS {
            store(&db, &candidate("2025-civic-red", n)).await;
        }

        let stale = StaleRead(HashSet::new());
        let err = insert_with_slug_source(&db, "2025-civic-red", civic(), &stale)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Internal { .. }), "{err:?}");
        assert_eq!(
            car::Entity::find().count(&db).await.unwrap(),
            MAX_SLUG_ATTEMPTS as u64
        );
    }

    #[tokio::test]
    async fn test_stored_slugs_sees_base_and_suffixes_only() {
        let db = memory_db().await;
        store(&db, "2025-civic-red").await;
        store(&db, "2025-civic-red-4").await;
        store(&db, "2025-civic-redline").await;

        let taken = StoredSlugs.taken(&db, "2025-civic-red").await.unwrap();
        let mut taken: Vec<_> = taken.into_iter().collect();
        taken.sort();
        assert_eq!(taken, vec!["2025-civic-red", "2025-civic-red-4"]);
    }

    #[test]
    fn test_long_car_names_leave_room_for_suffix() {
        let base = car_slug_base(2025, &"Bone Shaker ".repeat(17)[..200], &"m".repeat(100));
        assert!(base.len() <= CAR_SLUG_MAX_LENGTH - SUFFIX_RESERVE);
        assert!(!base.ends_with('-'));
        assert!(base.starts_with("2025-bone-shaker-"));
        assert!(candidate(&base, 999_999).len() <= CAR_SLUG_MAX_LENGTH);
    }

    #[test]
    fn test_folded_series_name_fits_column() {
        let slug = series_slug(&"ß".repeat(100)).unwrap();
        assert_eq!(slug.len(), SERIES_SLUG_MAX_LENGTH);

        let slug = series_slug(&format!("{} Æ", "a".repeat(99))).unwrap();
        assert_eq!(slug, "a".repeat(99));
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("HW J-Imports"), "hw-j-imports");
        assert_eq!(slugify("  Skyline   GT-R!! "), "skyline-gt-r");
        assert_eq!(slugify("'71 Datsun 510 Wagon"), "71-datsun-510-wagon");
    }

    #[test]
    fn test_slugify_folds_accents() {
        assert_eq!(slugify("Citroën DS"), "citroen-ds");
        assert_eq!(slugify("Porsche 911 Straßenwagen"), "porsche-911-strassenwagen");
    }

    #[test]
    fn test_slugify_symbols_only_is_empty() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("★★"), "");
    }

    #[test]
    fn test_car_slug_base() {
        assert_eq!(
            car_slug_base(2025, "Skyline GT-R", "Blue"),
            "2025-skyline-gt-r-blue"
        );
        assert_eq!(car_slug_base(2025, "Civic", "Red"), "2025-civic-red");
    }

    #[test]
    fn test_first_free_walks_suffixes() {
        let mut taken = HashSet::new();
        assert_eq!(first_free("2025-civic-red", &taken), "2025-civic-red");

        taken.insert("2025-civic-red".to_string());
        assert_eq!(first_free("2025-civic-red", &taken), "2025-civic-red-1");

        taken.insert("2025-civic-red-1".to_string());
        taken.insert("2025-civic-red-3".to_string());
        assert_eq!(first_free("2025-civic-red", &taken), "2025-civic-red-2");
    }

    #[test]
    fn test_first_free_uses_base_when_only_suffixes_taken() {
        let taken: HashSet<String> = ["2025-civic-red-1".to_string()].into_iter().collect();
        assert_eq!(first_free("2025-civic-red", &taken), "2025-civic-red");
    }

    #[test]
    fn test_series_slug_rejects_empty_and_reserved() {
        assert_eq!(series_slug("HW Metro").unwrap(), "hw-metro");
        assert_eq!(series_slug("%%%").unwrap_err().field, "name");
        assert_eq!(series_slug("Add").unwrap_err().field, "name");
    }
}
