use axum::Json;
use utoipa::OpenApi;

use crate::entities::car;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Diecast Vault",
        description = "Read endpoints of a die-cast car collection: cases, series, cars, the collector profile and collection statistics.",
        version = "0.1.0"
    ),
    paths(
        routes::home,
        routes::dashboard,
        routes::manage,
        routes::car_detail,
        routes::case_detail,
        routes::series_detail,
    ),
    components(schemas(car::Model)),
    tags(
        (name = "collection", description = "Browsing the collection")
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
