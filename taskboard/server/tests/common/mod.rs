#![allow(dead_code)]

use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use taskboard_core::Registration;
use taskboard_server::entities::user;
use taskboard_server::user::UserService;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::{postgres, testcontainers};

pub async fn setup_container() -> anyhow::Result<testcontainers::ContainerAsync<postgres::Postgres>>
{
    let container = postgres::Postgres::default().start().await?;
    Ok(container)
}

pub async fn setup_db(
    container: &testcontainers::ContainerAsync<postgres::Postgres>,
) -> anyhow::Result<DatabaseConnection> {
    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(5432).await?;
    let db_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);
    let db = Database::connect(&db_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

/// Test context backed by a fresh PostgreSQL container.
pub struct TestContext {
    // Kept so the container is not dropped while the test runs
    pub container: testcontainers::ContainerAsync<postgres::Postgres>,
    pub db: DatabaseConnection,
}

pub async fn setup() -> anyhow::Result<TestContext> {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt().try_init();
    let container = setup_container().await?;
    let db = setup_db(&container).await?;
    Ok(TestContext { container, db })
}

/// Registers an email/password account.
pub async fn create_user(db: &DatabaseConnection, name: &str, email: &str) -> user::Model {
    UserService::new(db)
        .register(Registration {
            name: name.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
        })
        .await
        .expect("Failed to register user")
}
