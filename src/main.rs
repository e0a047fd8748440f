use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/quill.db".to_string());

    let pool = quill::db::init_pool(&database_url).await;

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("create-user") => {
            let username = args.get(2).expect("usage: quill create-user <username> <password> [--god]");
            let password = args.get(3).expect("usage: quill create-user <username> <password> [--god]");
            let god = args.get(4).map(String::as_str) == Some("--god");
            quill::cli::create_user(&pool, username, password, god)
                .await
                .expect("Failed to create user");
        }
        Some("grant-god") => {
            let username = args.get(2).expect("usage: quill grant-god <username>");
            quill::cli::grant_god(&pool, username)
                .await
                .expect("Failed to grant god");
        }
        Some(other) => {
            eprintln!("Unknown command: {other}");
            std::process::exit(1);
        }
        None => {
            let secure_cookies = std::env::var("SECURE_COOKIES")
                .map(|v| v == "1")
                .unwrap_or(false);
            let app = quill::build_app(pool, secure_cookies).await;

            let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
            let listener = TcpListener::bind(addr).await.unwrap();

            tracing::info!("listening on {}", addr);
            axum::serve(listener, app).await.unwrap();
        }
    }
}
