use sqlx::SqlitePool;
use uuid::Uuid;

/// Create a user account from the command line. The god flag is only
/// grantable here; registration through the web always creates regular
/// users.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    god: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = Uuid::new_v4().to_string();
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, username, password_hash, god, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(username)
    .bind(&password_hash)
    .bind(god)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    println!("Created user:");
    println!("  ID: {}", id);
    println!("  Username: {}", username);
    println!("  God: {}", god);

    Ok(())
}

/// Grant the god flag to an existing user.
pub async fn grant_god(pool: &SqlitePool, username: &str) -> Result<(), Box<dyn std::error::Error>> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE users SET god = 1, updated_at = ? WHERE username = ?")
        .bind(&now)
        .bind(username)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(format!("User '{}' not found", username).into());
    }

    println!("Granted god to {}", username);
    Ok(())
}
