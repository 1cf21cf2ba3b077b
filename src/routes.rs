use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use sea_orm::{DatabaseConnection, ModelTrait};
use serde::Serialize;
use tower_cookies::CookieManagerLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::auth::{self, Credentials, FlashMessage, MessageLevel, RequireUser, Session};
use crate::entities::collector_profile::{self, ProfileForm};
use crate::entities::{car, case, series};
use crate::errors::ApiError;
use crate::filter::CarFilter;
use crate::models::{
    CarDetailPage, CaseDetailPage, DashboardPage, DeletePage, FormChoices, FormPage, HomePage,
    LoginForm, LoginPage, ManagePage, NextParam, SeriesDetailPage,
};
use crate::openapi;
use crate::queries;
use crate::traits::CollectionResource;
use crate::uploads::{CarSubmission, MAX_UPLOAD_BYTES, MediaStore};

const INVALID_LOGIN: &str = "Invalid username or password";

/// Every page of the application, with cookie handling and request tracing.
pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(state.media.root());
    Router::new()
        .route("/", get(home))
        .route("/login/", get(login_page).post(login_submit))
        .route("/logout/", get(logout).post(logout))
        .route("/dashboard/", get(dashboard))
        .route("/manage/", get(manage))
        .route("/profile/edit/", get(profile_form).post(profile_submit))
        .route("/car/add/", get(add_form::<car::Model>).post(car_create_submit))
        .route("/car/{slug}/", get(car_detail))
        .route(
            "/car/{slug}/edit/",
            get(edit_form::<car::Model>).post(car_update_submit),
        )
        .route(
            "/car/{slug}/delete/",
            get(delete_confirm::<car::Model>).post(delete_submit::<car::Model>),
        )
        .route(
            "/case/add/",
            get(add_form::<case::Model>).post(create_submit::<case::Model>),
        )
        .route("/case/{code}/", get(case_detail))
        .route(
            "/case/{code}/edit/",
            get(edit_form::<case::Model>).post(update_submit::<case::Model>),
        )
        .route(
            "/case/{code}/delete/",
            get(delete_confirm::<case::Model>).post(delete_submit::<case::Model>),
        )
        .route(
            "/series/add/",
            get(add_form::<series::Model>).post(create_submit::<series::Model>),
        )
        .route("/series/{slug}/", get(series_detail))
        .route(
            "/series/{slug}/edit/",
            get(edit_form::<series::Model>).post(update_submit::<series::Model>),
        )
        .route(
            "/series/{slug}/delete/",
            get(delete_confirm::<series::Model>).post(delete_submit::<series::Model>),
        )
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest_service("/media", media)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/",
    tag = "collection",
    responses((status = 200, description = "Homepage statistics and highlights", body = HomePage))
)]
pub async fn home(
    State(db): State<DatabaseConnection>,
    session: Session,
) -> Result<Json<HomePage>, ApiError> {
    Ok(Json(HomePage {
        messages: session.take_messages().await,
        cases: queries::cases_with_counts(&db).await?,
        series: queries::series_with_counts(&db, true).await?,
        treasure_hunts: queries::highlights(&db).await?,
        recent_cars: queries::list_cars(&db, &CarFilter::default()).await?,
        collector: collector_profile::get(&db).await?,
        stats: queries::collection_stats(&db).await?,
    }))
}

pub async fn login_page(session: Session, Query(params): Query<NextParam>) -> Response {
    if session.user().await.is_some() {
        return Redirect::to("/dashboard/").into_response();
    }
    Json(LoginPage {
        messages: session.take_messages().await,
        next: params.next,
    })
    .into_response()
}

pub async fn login_submit(
    State(credentials): State<Arc<Credentials>>,
    mut session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim();
    if !credentials.verify(username, &form.password) {
        tracing::warn!(username = %username, "Failed login attempt");
        // Shown on the re-rendered form, not stored in the session
        let page = LoginPage {
            messages: vec![FlashMessage {
                level: MessageLevel::Error,
                text: INVALID_LOGIN.to_string(),
            }],
            next: form.next,
        };
        return (StatusCode::UNAUTHORIZED, Json(page)).into_response();
    }

    session.login(username).await;
    session.success(format!("Welcome back, {username}!")).await;
    tracing::info!(username = %username, "User logged in");

    let target = auth::safe_next(form.next.as_deref()).unwrap_or("/dashboard/");
    Redirect::to(target).into_response()
}

pub async fn logout(mut session: Session) -> Redirect {
    if let Some(user) = session.user().await {
        tracing::info!(username = %user, "User logged out");
    }
    if session.logout().await {
        session
            .success("You have been logged out successfully")
            .await;
    }
    Redirect::to("/")
}

#[utoipa::path(
    get,
    path = "/dashboard/",
    tag = "collection",
    params(CarFilter),
    responses(
        (status = 200, description = "Filtered car listing", body = DashboardPage),
        (status = 303, description = "Not logged in; redirect to the login page")
    )
)]
pub async fn dashboard(
    RequireUser(user): RequireUser,
    State(db): State<DatabaseConnection>,
    session: Session,
    Query(filters): Query<CarFilter>,
) -> Result<Json<DashboardPage>, ApiError> {
    Ok(Json(DashboardPage {
        messages: session.take_messages().await,
        user,
        collector: collector_profile::get(&db).await?,
        cases: queries::cases_with_counts(&db).await?,
        series: queries::series_with_counts(&db, false).await?,
        cars: queries::list_cars(&db, &filters).await?,
        filters,
    }))
}

#[utoipa::path(
    get,
    path = "/manage/",
    tag = "collection",
    responses(
        (status = 200, description = "Cases and series with car counts", body = ManagePage),
        (status = 303, description = "Not logged in; redirect to the login page")
    )
)]
pub async fn manage(
    RequireUser(_): RequireUser,
    State(db): State<DatabaseConnection>,
    session: Session,
) -> Result<Json<ManagePage>, ApiError> {
    Ok(Json(ManagePage {
        messages: session.take_messages().await,
        cases: queries::cases_with_counts(&db).await?,
        series: queries::series_with_counts(&db, false).await?,
    }))
}

#[utoipa::path(
    get,
    path = "/car/{slug}/",
    tag = "collection",
    params(("slug" = String, Path, description = "Car slug")),
    responses(
        (status = 200, description = "One car with its case and series", body = CarDetailPage),
        (status = 404, description = "No car has this slug")
    )
)]
pub async fn car_detail(
    State(db): State<DatabaseConnection>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<Json<CarDetailPage>, ApiError> {
    let car = car::Model::get_by_key(&db, &slug).await?;
    let case = car.find_related(case::Entity).one(&db).await?;
    let series = car.find_related(series::Entity).one(&db).await?;
    Ok(Json(CarDetailPage {
        messages: session.take_messages().await,
        car,
        case,
        series,
    }))
}

#[utoipa::path(
    get,
    path = "/case/{code}/",
    tag = "collection",
    params(("code" = String, Path, description = "Case letter")),
    responses(
        (status = 200, description = "A case and its cars in catalogue order", body = CaseDetailPage),
        (status = 404, description = "No case has this code")
    )
)]
pub async fn case_detail(
    State(db): State<DatabaseConnection>,
    session: Session,
    Path(code): Path<String>,
) -> Result<Json<CaseDetailPage>, ApiError> {
    let case = case::Model::get_by_key(&db, &code).await?;
    let cars = queries::cars_in_case(&db, case.id).await?;
    Ok(Json(CaseDetailPage {
        messages: session.take_messages().await,
        case,
        cars,
    }))
}

#[utoipa::path(
    get,
    path = "/series/{slug}/",
    tag = "collection",
    params(("slug" = String, Path, description = "Series slug")),
    responses(
        (status = 200, description = "A series and its cars in catalogue order", body = SeriesDetailPage),
        (status = 404, description = "No series has this slug")
    )
)]
pub async fn series_detail(
    State(db): State<DatabaseConnection>,
    session: Session,
    Path(slug): Path<String>,
) -> Result<Json<SeriesDetailPage>, ApiError> {
    let series = series::Model::get_by_key(&db, &slug).await?;
    let cars = queries::cars_in_series(&db, series.id).await?;
    Ok(Json(SeriesDetailPage {
        messages: session.take_messages().await,
        series,
        cars,
    }))
}

pub async fn add_form<T: CollectionResource>(
    RequireUser(_): RequireUser,
    State(db): State<DatabaseConnection>,
    session: Session,
) -> Result<Json<FormPage<T::Form>>, ApiError> {
    Ok(Json(FormPage {
        messages: session.take_messages().await,
        form: T::initial_form(),
        choices: T::form_choices(&db).await?,
    }))
}

async fn created<T: CollectionResource>(session: &mut Session, user: &str, record: &T) -> Redirect {
    let name = record.display_name();
    tracing::info!(
        user = %user,
        resource = T::RESOURCE_NAME_SINGULAR,
        name = %name,
        "Record created"
    );
    session
        .success(format!("Successfully {} {name}!", T::CREATED_VERB))
        .await;
    Redirect::to("/dashboard/")
}

async fn updated<T: CollectionResource>(session: &mut Session, user: &str, record: &T) -> Redirect {
    let name = record.display_name();
    tracing::info!(
        user = %user,
        resource = T::RESOURCE_NAME_SINGULAR,
        name = %name,
        "Record updated"
    );
    session.success(format!("Successfully updated {name}!")).await;
    Redirect::to(&record.updated_redirect())
}

pub async fn create_submit<T: CollectionResource>(
    RequireUser(user): RequireUser,
    State(db): State<DatabaseConnection>,
    mut session: Session,
    Form(form): Form<T::Form>,
) -> Result<Redirect, ApiError> {
    let record = T::create(&db, form).await?;
    Ok(created(&mut session, &user, &record).await)
}

/// Drop a just-stored photo when the save it belonged to failed
async fn discard_on_error<T>(
    media: &MediaStore,
    stored: Option<String>,
    result: Result<T, ApiError>,
) -> Result<T, ApiError> {
    if result.is_err()
        && let Some(path) = stored
    {
        media.remove(&path).await;
    }
    result
}

pub async fn car_create_submit(
    RequireUser(user): RequireUser,
    State(db): State<DatabaseConnection>,
    State(media): State<MediaStore>,
    mut session: Session,
    submission: CarSubmission,
) -> Result<Redirect, ApiError> {
    let form = submission.into_form(&media).await?;
    let stored = form.image.clone();
    let car = discard_on_error(&media, stored, car::Model::create(&db, form).await).await?;
    Ok(created(&mut session, &user, &car).await)
}

pub async fn car_update_submit(
    RequireUser(user): RequireUser,
    State(db): State<DatabaseConnection>,
    State(media): State<MediaStore>,
    mut session: Session,
    Path(slug): Path<String>,
    submission: CarSubmission,
) -> Result<Redirect, ApiError> {
    let existing = car::Model::get_by_key(&db, &slug).await?;
    let form = submission.into_form(&media).await?;
    let stored = form.image.clone();
    let car = discard_on_error(&media, stored, existing.update(&db, form).await).await?;
    Ok(updated(&mut session, &user, &car).await)
}

pub async fn edit_form<T: CollectionResource>(
    RequireUser(_): RequireUser,
    State(db): State<DatabaseConnection>,
    session: Session,
    Path(key): Path<String>,
) -> Result<Json<FormPage<T::Form>>, ApiError> {
    let record = T::get_by_key(&db, &key).await?;
    Ok(Json(FormPage {
        messages: session.take_messages().await,
        form: record.to_form(),
        choices: T::form_choices(&db).await?,
    }))
}

pub async fn update_submit<T: CollectionResource>(
    RequireUser(user): RequireUser,
    State(db): State<DatabaseConnection>,
    mut session: Session,
    Path(key): Path<String>,
    Form(form): Form<T::Form>,
) -> Result<Redirect, ApiError> {
    let record = T::get_by_key(&db, &key).await?.update(&db, form).await?;
    Ok(updated(&mut session, &user, &record).await)
}

pub async fn delete_confirm<T: CollectionResource + Serialize>(
    RequireUser(_): RequireUser,
    State(db): State<DatabaseConnection>,
    session: Session,
    Path(key): Path<String>,
) -> Result<Json<DeletePage<T>>, ApiError> {
    let record = T::get_by_key(&db, &key).await?;
    Ok(Json(DeletePage {
        messages: session.take_messages().await,
        name: record.display_name(),
        object: record,
    }))
}

pub async fn delete_submit<T: CollectionResource>(
    RequireUser(user): RequireUser,
    State(db): State<DatabaseConnection>,
    mut session: Session,
    Path(key): Path<String>,
) -> Result<Redirect, ApiError> {
    let record = T::get_by_key(&db, &key).await?;
    let name = record.display_name();
    record.delete(&db).await?;
    tracing::info!(
        user = %user,
        resource = T::RESOURCE_NAME_SINGULAR,
        name = %name,
        "Record deleted"
    );
    session.success(format!("Successfully deleted {name}!")).await;
    Ok(Redirect::to("/dashboard/"))
}

pub async fn profile_form(
    RequireUser(_): RequireUser,
    State(db): State<DatabaseConnection>,
    session: Session,
) -> Result<Json<FormPage<ProfileForm>>, ApiError> {
    let form = collector_profile::get(&db)
        .await?
        .map_or_else(ProfileForm::initial, |profile| ProfileForm::from(&profile));
    let series = queries::all_series(&db).await?;
    Ok(Json(FormPage {
        messages: session.take_messages().await,
        form,
        choices: FormChoices {
            series: FormChoices::series(&series),
            ..Default::default()
        },
    }))
}

pub async fn profile_submit(
    RequireUser(user): RequireUser,
    State(db): State<DatabaseConnection>,
    mut session: Session,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, ApiError> {
    let profile = collector_profile::upsert(&db, &form).await?;
    tracing::info!(user = %user, name = %profile.name, "Collector profile saved");
    session
        .success(format!("Successfully updated {}!", profile.name))
        .await;
    Ok(Redirect::to("/dashboard/"))
}
