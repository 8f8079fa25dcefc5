use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use axum::{Json, extract::State};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar, SameSite},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand_core::OsRng;
use tracing::{debug, info};
use uuid::Uuid;

use blogcraft_types::api::{Claims, Credentials, LoginResponse, MessageResponse, SignupResponse};
use blogcraft_types::models::User;

use crate::config::Config;
use crate::error::ApiError;
use crate::{AppState, run_blocking};

/// Lifetime of a session token and of the cookie carrying it.
pub const TOKEN_TTL_DAYS: i64 = 3;

// -- Passwords --

fn hasher(config: &Config) -> Result<Argon2<'static>, ApiError> {
    let params = config
        .hash_params()
        .map_err(|e| ApiError::Server(format!("Argon2 params: {}", e)))?;
    Ok(Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params))
}

/// Argon2id with a random salt. Slow on purpose; call from a blocking task.
pub fn hash_password(config: &Config, password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher(config)?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Server(format!("Argon2 hash error: {}", e)))?
        .to_string();
    Ok(hash)
}

/// Cost parameters come from the stored hash, not from the config.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ApiError::Server(format!("Hash parse error: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ApiError::Server(format!("Argon2 verify error: {}", e))),
    }
}

// -- Tokens --

pub fn issue_token(config: &Config, user_id: &str, email: &str) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        id: user_id.to_string(),
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Server(format!("Token signing failed: {}", e)))
}

/// Checks signature and expiry, with no clock leeway. Any failure is
/// `InvalidToken`.
pub fn verify_token(config: &Config, token: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Token rejected: {}", e);
        ApiError::InvalidToken
    })
}

// -- Cookies --

pub fn session_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token))
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::days(TOKEN_TTL_DAYS))
        .path("/")
        .build()
}

/// Empty, already-expired cookie with the same attributes as the session
/// cookie, so browsers drop it.
pub fn clearing_cookie(config: &Config) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.cookie_name.clone(), ""))
        .http_only(true)
        .secure(config.is_production())
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}

// -- Operations --

fn require_credentials(creds: Credentials) -> Result<(String, String), ApiError> {
    match (creds.email, creds.password) {
        (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
            Ok((email, password))
        }
        _ => Err(ApiError::Validation(
            "Email and password are required".to_string(),
        )),
    }
}

/// Create a user. A taken email is `DuplicateEmail`.
pub async fn register(state: &AppState, creds: Credentials) -> Result<User, ApiError> {
    let (email, password) = require_credentials(creds)?;

    let state = state.clone();
    run_blocking(move || {
        let password_hash = hash_password(&state.config, &password)?;
        let user_id = Uuid::new_v4();
        state
            .db
            .create_user(&user_id.to_string(), &email, &password_hash)?;
        Ok(User { id: user_id, email })
    })
    .await
}

/// Unknown email and wrong password fail identically.
pub async fn authenticate(state: &AppState, creds: Credentials) -> Result<User, ApiError> {
    let (email, password) = require_credentials(creds)?;

    let state = state.clone();
    run_blocking(move || {
        let Some(user) = state.db.get_user_by_email(&email)? else {
            debug!("Login attempt for unknown email");
            return Err(ApiError::InvalidCredentials);
        };

        if !verify_password(&password, &user.password)? {
            debug!(user_id = %user.id, "Login attempt with wrong password");
            return Err(ApiError::InvalidCredentials);
        }

        let id: Uuid = user
            .id
            .parse()
            .map_err(|e| ApiError::Server(format!("Corrupt user id '{}': {}", user.id, e)))?;
        Ok(User {
            id,
            email: user.email,
        })
    })
    .await
}

// -- Handlers --

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(creds), _): WithRejection<Json<Credentials>, ApiError>,
) -> Result<(CookieJar, Json<SignupResponse>), ApiError> {
    let user = register(&state, creds).await?;
    let token = issue_token(&state.config, &user.id.to_string(), &user.email)?;

    info!(user_id = %user.id, "User signed up");

    Ok((
        jar.add(session_cookie(&state.config, token.clone())),
        Json(SignupResponse {
            message: "User created successfully".to_string(),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(creds), _): WithRejection<Json<Credentials>, ApiError>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let user = authenticate(&state, creds).await?;
    let token = issue_token(&state.config, &user.id.to_string(), &user.email)?;

    info!(user_id = %user.id, "User logged in");

    Ok((
        jar.add(session_cookie(&state.config, token.clone())),
        Json(LoginResponse {
            success: true,
            message: "Logged in successfully".to_string(),
            token,
            user,
        }),
    ))
}

/// Only clears the cookie. A token the client kept elsewhere stays valid
/// until it expires.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.add(clearing_cookie(&state.config)),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppStateInner;
    use blogcraft_db::Database;

    fn test_config() -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.jwt_secret = "test-secret".into();
        config.hash_memory_kib = 1024;
        config.hash_iterations = 1;
        config
    }

    fn test_state() -> AppState {
        AppStateInner::new(Database::open_in_memory().unwrap(), test_config())
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn password_hash_is_salted_argon2id() {
        let config = test_config();
        let a = hash_password(&config, "pw123456").unwrap();
        let b = hash_password(&config, "pw123456").unwrap();

        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(verify_password("pw123456", &a).unwrap());
        assert!(!verify_password("pw1234567", &a).unwrap());
    }

    #[test]
    fn token_carries_identity_and_three_day_expiry() {
        let config = test_config();
        let token = issue_token(&config, "user-1", "a@x.com").unwrap();
        let claims = verify_token(&config, &token).unwrap();

        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_DAYS * 24 * 60 * 60);
    }

    #[test]
    fn foreign_expired_and_garbage_tokens_are_rejected() {
        let config = test_config();

        let mut other = test_config();
        other.jwt_secret = "some-other-secret".into();
        let foreign = issue_token(&other, "user-1", "a@x.com").unwrap();
        assert!(matches!(verify_token(&config, &foreign), Err(ApiError::InvalidToken)));

        let long_ago = Utc::now() - Duration::days(4);
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &Claims {
                id: "user-1".into(),
                email: "a@x.com".into(),
                iat: long_ago.timestamp(),
                exp: (long_ago + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
            },
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(matches!(verify_token(&config, &expired), Err(ApiError::InvalidToken)));

        assert!(matches!(verify_token(&config, "not.a.jwt"), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn token_is_rejected_as_soon_as_it_expires() {
        let config = test_config();
        let now = Utc::now();
        let sign = |exp: chrono::DateTime<Utc>| {
            encode(
                &Header::new(Algorithm::HS256),
                &Claims {
                    id: "user-1".into(),
                    email: "a@x.com".into(),
                    iat: (exp - Duration::days(TOKEN_TTL_DAYS)).timestamp(),
                    exp: exp.timestamp(),
                },
                &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            )
            .unwrap()
        };

        let just_expired = sign(now - Duration::seconds(30));
        assert!(matches!(verify_token(&config, &just_expired), Err(ApiError::InvalidToken)));

        let still_valid = sign(now + Duration::seconds(30));
        assert!(verify_token(&config, &still_valid).is_ok());
    }

    #[test]
    fn hashing_with_a_mutated_bad_cost_is_a_server_error() {
        let mut config = test_config();
        config.hash_memory_kib = 1;
        assert!(matches!(hash_password(&config, "pw123456"), Err(ApiError::Server(_))));
    }

    #[test]
    fn session_cookie_attributes() {
        let mut config = test_config();
        let c = session_cookie(&config, "tok".into());

        assert_eq!(c.name(), "blogcraft_auth");
        assert_eq!(c.value(), "tok");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.path(), Some("/"));
        assert_eq!(c.max_age(), Some(cookie::time::Duration::days(3)));
        assert_ne!(c.secure(), Some(true));

        config.environment = crate::config::Environment::Production;
        assert_eq!(session_cookie(&config, "tok".into()).secure(), Some(true));
    }

    #[test]
    fn clearing_cookie_expires_immediately() {
        let c = clearing_cookie(&test_config());
        assert_eq!(c.value(), "");
        assert_eq!(c.max_age(), Some(cookie::time::Duration::ZERO));
        assert_eq!(c.path(), Some("/"));
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let state = test_state();
        let registered = register(&state, creds("a@x.com", "pw123456")).await.unwrap();
        let logged_in = authenticate(&state, creds("a@x.com", "pw123456")).await.unwrap();

        assert_eq!(registered, logged_in);

        let stored = state.db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert_ne!(stored.password, "pw123456");
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let state = test_state();
        register(&state, creds("a@x.com", "pw123456")).await.unwrap();

        let err = register(&state, creds("a@x.com", "different")).await.unwrap_err();
        assert!(matches!(err, ApiError::DuplicateEmail));

        // The first registration's password still wins.
        let stored = state.db.get_user_by_email("a@x.com").unwrap().unwrap();
        assert!(verify_password("pw123456", &stored.password).unwrap());
        assert!(!verify_password("different", &stored.password).unwrap());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let state = test_state();
        register(&state, creds("a@x.com", "pw123456")).await.unwrap();

        let wrong_password = authenticate(&state, creds("a@x.com", "nope")).await.unwrap_err();
        let unknown_email = authenticate(&state, creds("b@x.com", "pw123456")).await.unwrap_err();

        assert!(matches!(wrong_password, ApiError::InvalidCredentials));
        assert!(matches!(unknown_email, ApiError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn missing_credentials_fail_validation() {
        let state = test_state();
        for bad in [
            Credentials::default(),
            creds("", "pw123456"),
            creds("a@x.com", ""),
            Credentials {
                email: Some("a@x.com".into()),
                password: None,
            },
        ] {
            let err = register(&state, bad).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
        assert!(matches!(
            authenticate(&state, Credentials::default()).await,
            Err(ApiError::Validation(_))
        ));
        assert!(state.db.get_user_by_email("a@x.com").unwrap().is_none());
        assert!(state.db.get_user_by_email("").unwrap().is_none());
    }
}
