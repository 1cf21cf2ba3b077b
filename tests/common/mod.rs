#![allow(dead_code)]

use std::ops::Deref;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use diecast_vault::entities::car::{self, CarForm};
use diecast_vault::entities::case::{self, CaseForm};
use diecast_vault::entities::series::{self, SeriesForm};
use diecast_vault::{
    AppState, CollectionResource, Credentials, MediaStore, Migrator, SessionStore, build_router,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_USERNAME: &str = "admin";
pub const TEST_PASSWORD: &str = "diecast-test";

/// In-memory database with the schema applied.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opt).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Router plus handles on the state it was built from.
///
/// Derefs to the [`Router`], so it can be passed wherever a router is expected. The
/// media directory lives as long as the app.
pub struct TestApp {
    router: Router,
    pub sessions: SessionStore,
    pub media: MediaStore,
    _media_dir: TempDir,
}

impl Deref for TestApp {
    type Target = Router;

    fn deref(&self) -> &Router {
        &self.router
    }
}

pub fn setup_test_app(db: DatabaseConnection) -> TestApp {
    let media_dir = tempfile::tempdir().unwrap();
    let credentials = Credentials::new(TEST_USERNAME, Some(TEST_PASSWORD)).unwrap();
    let state = AppState::new(db, credentials, MediaStore::new(media_dir.path()));
    TestApp {
        sessions: state.sessions.clone(),
        media: state.media.clone(),
        router: build_router(state),
        _media_dir: media_dir,
    }
}

/// Encode any flat form struct as `application/x-www-form-urlencoded`.
///
/// `None` fields are left out, matching an unchecked checkbox.
pub fn encode_form<T: Serialize>(form: &T) -> String {
    let value = serde_json::to_value(form).unwrap();
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in value.as_object().unwrap() {
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::String(s) => {
                serializer.append_pair(key, s);
            }
            other => {
                serializer.append_pair(key, &other.to_string());
            }
        }
    }
    serializer.finish()
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_form(
    app: &Router,
    uri: &str,
    body: String,
    cookie: Option<&str>,
) -> Response<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// A `multipart/form-data` body: every text field of `form`, plus an optional file part
/// named `image`. Returns the content type and the body.
pub fn multipart_form<T: Serialize>(
    form: &T,
    image: Option<(&str, &str, &[u8])>,
) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "diecast-test-boundary";
    let mut body = Vec::new();
    let value = serde_json::to_value(form).unwrap();
    for (key, value) in value.as_object().unwrap() {
        let text = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{key}\"\r\n\r\n{text}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

pub async fn post_multipart(
    app: &Router,
    uri: &str,
    (content_type, body): (String, Vec<u8>),
    cookie: Option<&str>,
) -> Response<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// A small valid PNG
pub fn png_bytes() -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::RgbImage::new(4, 4)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// `sessionid=<uuid>` from a `Set-Cookie` header, if the response set one
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("sessionid="))
        .and_then(|value| value.split(';').next())
        .map(ToString::to_string)
}

/// Log in with the test account and return the session cookie
pub async fn login(app: &Router) -> String {
    let body = format!("username={TEST_USERNAME}&password={TEST_PASSWORD}");
    let response = post_form(app, "/login/", body, None).await;
    assert_eq!(response.status(), 303);
    session_cookie(&response).expect("login sets a session cookie")
}

pub fn car_form(year: i32, casting_name: &str, color: &str) -> CarForm {
    CarForm {
        casting_name: casting_name.to_string(),
        number: "1/250".to_string(),
        year: year.to_string(),
        color: color.to_string(),
        ..car::Model::initial_form()
    }
}

pub fn case_form(code: &str) -> CaseForm {
    CaseForm {
        code: code.to_string(),
        description: format!("Case {code} assortment"),
        ..case::Model::initial_form()
    }
}

pub fn series_form(name: &str) -> SeriesForm {
    SeriesForm {
        name: name.to_string(),
        ..series::Model::initial_form()
    }
}

pub async fn create_case(db: &DatabaseConnection, code: &str) -> case::Model {
    case::Model::create(db, case_form(code)).await.unwrap()
}

pub async fn create_series(db: &DatabaseConnection, name: &str) -> series::Model {
    series::Model::create(db, series_form(name)).await.unwrap()
}
