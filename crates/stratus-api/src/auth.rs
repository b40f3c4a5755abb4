use std::net::SocketAddr;
use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::{ConnectInfo, Extension, State}, http::{HeaderMap, StatusCode}, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use stratus_assistant::{ChatClient, ChatEngine};
use stratus_db::Database;
use stratus_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use stratus_types::models::{ActivityKind, Role};
use stratus_weather::WeatherClient;

use crate::activity;
use crate::error::{ApiError, AppJson, blocking};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub weather: WeatherClient,
    pub chat: ChatClient,
    pub engine: ChatEngine,
    pub templates: minijinja::Environment<'static>,
}

/// Browser sessions ride in this cookie; API clients may send the same token
/// as a bearer header instead.
pub const SESSION_COOKIE: &str = "stratus_token";

pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();

    // Validate input
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::bad_request("Username must be 3-32 characters"));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::bad_request("A valid email address is required"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::bad_request("Password must be at least 8 characters"));
    }

    {
        let st = state.clone();
        let email = email.clone();
        let username = username.clone();
        let (by_email, by_username) = blocking(move || -> anyhow::Result<_> {
            Ok((
                st.db.get_user_by_email(&email)?,
                st.db.get_user_by_username(&username)?,
            ))
        })
        .await??;
        if by_email.is_some() {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        if by_username.is_some() {
            return Err(ApiError::Conflict("Username already taken".into()));
        }
    }

    // Hash password with Argon2id
    let password_hash = hash_password(&req.password)?;

    let user_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();

    {
        let st = state.clone();
        let username = username.clone();
        let email = email.clone();
        let ttl = state.session_ttl_hours;
        let ip = activity::client_ip(&headers, Some(peer));
        let ua = activity::user_agent(&headers);
        blocking(move || -> anyhow::Result<()> {
            st.db.create_user(
                &user_id.to_string(),
                &username,
                &email,
                &password_hash,
                Role::User.as_str(),
            )?;
            st.db.create_session(&session_id.to_string(), &user_id.to_string(), ttl)?;
            activity::record(
                &st.db,
                user_id,
                ActivityKind::Signup,
                &format!("New user {email} registered"),
                ip.as_deref(),
                ua.as_deref(),
                None,
            );
            Ok(())
        })
        .await??;
    }

    let token = create_token(
        &state.jwt_secret,
        user_id,
        &username,
        Role::User,
        session_id,
        state.session_ttl_hours,
    )?;

    let jar = jar.add(session_cookie(token.clone()));

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            success: true,
            user_id,
            username,
            role: Role::User,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identifier = req.email.trim().to_string();

    let user = {
        let st = state.clone();
        let email = identifier.to_lowercase();
        let username = identifier.clone();
        blocking(move || -> anyhow::Result<_> {
            match st.db.get_user_by_email(&email)? {
                Some(user) => Ok(Some(user)),
                // The form field doubles as a username for non-email logins
                None => st.db.get_user_by_username(&username),
            }
        })
        .await??
    }
    .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored password hash is invalid: {e}"))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("user id is not a uuid: {e}"))?;
    let role = Role::parse(&user.role)
        .ok_or_else(|| anyhow::anyhow!("unknown role in database: {}", user.role))?;

    let session_id = Uuid::new_v4();
    {
        let st = state.clone();
        let ttl = state.session_ttl_hours;
        let email = user.email.clone();
        let ip = activity::client_ip(&headers, Some(peer));
        let ua = activity::user_agent(&headers);
        blocking(move || -> anyhow::Result<()> {
            st.db.create_session(&session_id.to_string(), &user_id.to_string(), ttl)?;
            st.db.touch_last_active(&user_id.to_string())?;
            activity::record(
                &st.db,
                user_id,
                ActivityKind::Login,
                &format!("User {email} logged in"),
                ip.as_deref(),
                ua.as_deref(),
                None,
            );
            Ok(())
        })
        .await??;
    }

    let token = create_token(
        &state.jwt_secret,
        user_id,
        &user.username,
        role,
        session_id,
        state.session_ttl_hours,
    )?;

    let jar = jar.add(session_cookie(token.clone()));

    Ok((
        jar,
        Json(AuthResponse {
            success: true,
            user_id,
            username: user.username,
            role,
            token,
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let ip = activity::client_ip(&headers, Some(peer));
    let ua = activity::user_agent(&headers);
    blocking(move || -> anyhow::Result<()> {
        // Record before the session row disappears
        activity::record(
            &st.db,
            claims.sub,
            ActivityKind::Logout,
            &format!("User {} logged out", claims.username),
            ip.as_deref(),
            ua.as_deref(),
            None,
        );
        st.db.delete_session(&claims.sid.to_string())?;
        Ok(())
    })
    .await??;

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());

    Ok((
        jar,
        Json(serde_json::json!({ "success": true, "message": "Logged out" })),
    ))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?
        .to_string())
}

fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    role: Role,
    session_id: Uuid,
    ttl_hours: i64,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        sid: session_id,
        exp: (chrono::Utc::now() + chrono::Duration::hours(ttl_hours)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}
