use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

pub struct TestApp {
    pub router: Router,
    pub db: SqlitePool,
}

pub const TEST_PASSWORD: &str = "correct horse battery";

impl TestApp {
    pub async fn new() -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("Failed to create in-memory SQLite pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        let router = quill::build_app(pool.clone(), false).await;

        Self { router, db: pool }
    }

    /// Send a request through the app and return the response.
    pub async fn request(&self, req: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.router.clone(), req)
            .await
            .unwrap()
    }

    /// Register a user through the web form and return the session cookie.
    pub async fn register(&self, username: &str) -> String {
        let body = form_body(&[
            ("username", username),
            ("password", TEST_PASSWORD),
            ("confirm_password", TEST_PASSWORD),
        ]);
        let resp = self.post_form("/register", &body, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        session_cookie(&resp)
    }

    /// Log in as an existing user and return the session cookie.
    pub async fn login(&self, username: &str) -> String {
        let body = form_body(&[("username", username), ("password", TEST_PASSWORD)]);
        let resp = self.post_form("/login", &body, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        session_cookie(&resp)
    }

    /// Flip the god flag for a user (only grantable out-of-band).
    pub async fn make_god(&self, username: &str) {
        sqlx::query("UPDATE users SET god = 1 WHERE username = ?")
            .bind(username)
            .execute(&self.db)
            .await
            .expect("Failed to grant god");
    }

    /// Create an entry through the web form and return its id.
    pub async fn create_entry(
        &self,
        cookie: &str,
        title: &str,
        date: &str,
        tags: &str,
        private: bool,
        hidden: bool,
    ) -> String {
        let mut pairs = vec![
            ("title", title),
            ("date", date),
            ("time_spent", "30"),
            ("learned", "Things worth writing down."),
            ("resources", "A book."),
            ("tags", tags),
        ];
        if private {
            pairs.push(("private", "on"));
        }
        if hidden {
            pairs.push(("hidden", "on"));
        }
        let resp = self.post_form("/entries", &form_body(&pairs), Some(cookie)).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let (id,): (String,) = sqlx::query_as(
            "SELECT id FROM entries WHERE title = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(title)
        .fetch_one(&self.db)
        .await
        .expect("Created entry not found");
        id
    }

    /// Send a GET request with an optional session cookie.
    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::empty()).unwrap();
        self.request(req).await
    }

    /// Send a POST form request with an optional session cookie.
    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        let req = builder.body(Body::from(body.to_string())).unwrap();
        self.request(req).await
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(sql).fetch_one(&self.db).await.unwrap();
        n
    }
}

/// URL-encode form fields into a request body.
pub fn form_body(pairs: &[(&str, &str)]) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        ser.append_pair(key, value);
    }
    ser.finish()
}

fn session_cookie(resp: &Response) -> String {
    resp.headers()
        .get("set-cookie")
        .expect("Expected a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

/// Read the full response body as a String.
pub async fn body_string(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Assert that a response is a redirect to the given location.
pub fn assert_redirect(resp: &Response, expected_location: &str) {
    assert!(
        resp.status().is_redirection(),
        "Expected redirect, got {}",
        resp.status()
    );
    let location = resp
        .headers()
        .get("location")
        .expect("Redirect should have location header")
        .to_str()
        .unwrap();
    assert_eq!(location, expected_location);
}
