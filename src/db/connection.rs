use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("SURREALDB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("SURREALDB_NAMESPACE").unwrap_or_else(|_| "rpm".to_string()),
            database: env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "users".to_string()),
            username: env::var("SURREALDB_USERNAME").ok(),
            password: env::var("SURREALDB_PASSWORD").ok(),
        }
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        "DEFINE TABLE IF NOT EXISTS app_user SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS user_id ON TABLE app_user TYPE string;
         DEFINE FIELD IF NOT EXISTS first_name ON TABLE app_user TYPE string;
         DEFINE FIELD IF NOT EXISTS last_name ON TABLE app_user TYPE string;
         DEFINE FIELD IF NOT EXISTS email ON TABLE app_user TYPE string;
         DEFINE FIELD IF NOT EXISTS username ON TABLE app_user TYPE string;
         DEFINE FIELD IF NOT EXISTS password ON TABLE app_user TYPE string;
         DEFINE FIELD IF NOT EXISTS role ON TABLE app_user TYPE string;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE app_user TYPE option<datetime> DEFAULT time::now();
         DEFINE FIELD IF NOT EXISTS updated_at ON TABLE app_user TYPE option<datetime> DEFAULT time::now();",
        // Uniqueness of the identity fields
        "DEFINE INDEX IF NOT EXISTS app_user_user_id ON TABLE app_user COLUMNS user_id UNIQUE;
         DEFINE INDEX IF NOT EXISTS app_user_username ON TABLE app_user COLUMNS username UNIQUE;
         DEFINE INDEX IF NOT EXISTS app_user_email ON TABLE app_user COLUMNS email UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        ensure_schema(&db).await.unwrap();
    }
}
