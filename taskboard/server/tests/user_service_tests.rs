use taskboard_core::Registration;
use taskboard_server::auth::GoogleProfile;
use taskboard_server::user::{UserService, UserServiceError};

mod common;

fn google_profile(subject: &str, email: &str) -> GoogleProfile {
    GoogleProfile {
        subject: subject.to_string(),
        email: email.to_string(),
        name: "Ada Lovelace".to_string(),
        picture: "https://example.com/ada.png".to_string(),
    }
}

#[tokio::test]
async fn can_register_and_authenticate() {
    let ctx = common::setup().await.expect("Failed to setup test context");
    let service = UserService::new(&ctx.db);

    let created = service
        .register(Registration {
            name: " Ada ".to_string(),
            email: "Ada@Example.com".to_string(),
            password: "password123".to_string(),
        })
        .await
        .expect("Failed to register");

    assert_eq!(created.name, "Ada");
    assert_eq!(created.email, "ada@example.com");
    assert_ne!(created.password_hash.as_deref(), Some("password123"));

    let authenticated = service
        .authenticate("ADA@example.com", "password123")
        .await
        .expect("Failed to authenticate");
    assert_eq!(authenticated.id, created.id);
}

#[tokio::test]
async fn rejects_duplicate_email() {
    let ctx = common::setup().await.expect("Failed to setup test context");
    common::create_user(&ctx.db, "Ada", "ada@example.com").await;

    let result = UserService::new(&ctx.db)
        .register(Registration {
            name: "Impostor".to_string(),
            email: "ada@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await;

    assert!(matches!(result, Err(UserServiceError::DuplicateEmail(_))));
}

#[tokio::test]
async fn rejects_wrong_password_and_unknown_email() {
    let ctx = common::setup().await.expect("Failed to setup test context");
    common::create_user(&ctx.db, "Ada", "ada@example.com").await;
    let service = UserService::new(&ctx.db);

    assert!(matches!(
        service.authenticate("ada@example.com", "wrong-password").await,
        Err(UserServiceError::InvalidCredentials)
    ));
    assert!(matches!(
        service.authenticate("nobody@example.com", "password123").await,
        Err(UserServiceError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn google_login_creates_account_once() {
    let ctx = common::setup().await.expect("Failed to setup test context");
    let service = UserService::new(&ctx.db);

    let first = service
        .find_or_create_google_user(google_profile("google-1", "ada@example.com"))
        .await
        .unwrap();
    let second = service
        .find_or_create_google_user(google_profile("google-1", "ada@example.com"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.google_id.as_deref(), Some("google-1"));
    assert_eq!(first.password_hash, None);

    // Google-only accounts cannot sign in with a password
    assert!(matches!(
        service.authenticate("ada@example.com", "").await,
        Err(UserServiceError::InvalidCredentials)
    ));
}

#[tokio::test]
async fn google_login_links_existing_email_account() {
    let ctx = common::setup().await.expect("Failed to setup test context");
    let existing = common::create_user(&ctx.db, "Ada", "ada@example.com").await;

    let linked = UserService::new(&ctx.db)
        .find_or_create_google_user(google_profile("google-1", "ada@example.com"))
        .await
        .unwrap();

    assert_eq!(linked.id, existing.id);
    assert_eq!(linked.name, "Ada");
    assert_eq!(linked.picture, "https://example.com/ada.png");
    assert_eq!(linked.google_id.as_deref(), Some("google-1"));
}

#[tokio::test]
async fn can_update_name() {
    let ctx = common::setup().await.expect("Failed to setup test context");
    let existing = common::create_user(&ctx.db, "Ada", "ada@example.com").await;
    let service = UserService::new(&ctx.db);

    let updated = service.update_name(existing.id, "Countess").await.unwrap();
    assert_eq!(updated.name, "Countess");

    assert!(matches!(
        service.update_name(existing.id, "  ").await,
        Err(UserServiceError::InvalidProfile(_))
    ));
    assert!(matches!(
        service.update_name(uuid::Uuid::new_v4(), "Ghost").await,
        Err(UserServiceError::UserNotFound(_))
    ));
}
