use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use minijinja::{Environment, context};

use stratus_types::api::Claims;
use stratus_types::models::Role;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::authenticate;

/// Templates ship inside the binary. Parse errors surface at boot, not on
/// first render.
pub fn build_templates() -> anyhow::Result<Environment<'static>> {
    let mut env = Environment::new();
    for (name, source) in [
        ("base.html", include_str!("../templates/base.html")),
        ("home.html", include_str!("../templates/home.html")),
        ("signin.html", include_str!("../templates/signin.html")),
        ("signup.html", include_str!("../templates/signup.html")),
        ("dashboard.html", include_str!("../templates/dashboard.html")),
        ("chat.html", include_str!("../templates/chat.html")),
        ("forecast.html", include_str!("../templates/forecast.html")),
        ("alerts.html", include_str!("../templates/alerts.html")),
        ("health_tips.html", include_str!("../templates/health_tips.html")),
        ("settings.html", include_str!("../templates/settings.html")),
        ("admin.html", include_str!("../templates/admin.html")),
        ("admin_users.html", include_str!("../templates/admin_users.html")),
        ("admin_alerts.html", include_str!("../templates/admin_alerts.html")),
        ("admin_map.html", include_str!("../templates/admin_map.html")),
        ("admin_chat.html", include_str!("../templates/admin_chat.html")),
    ] {
        env.add_template(name, source)?;
    }
    Ok(env)
}

pub async fn home(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    match authenticate(&state, &headers).await {
        Some(claims) => Ok(role_home(&claims).into_response()),
        None => Ok(render(&state, "home.html", context! {})?.into_response()),
    }
}

pub async fn signin_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match authenticate(&state, &headers).await {
        Some(claims) => Ok(role_home(&claims).into_response()),
        None => Ok(render(&state, "signin.html", context! {})?.into_response()),
    }
}

pub async fn signup_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match authenticate(&state, &headers).await {
        Some(claims) => Ok(role_home(&claims).into_response()),
        None => Ok(render(&state, "signup.html", context! {})?.into_response()),
    }
}

pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(claims) = authenticate(&state, &headers).await else {
        return Ok(Redirect::to("/signin").into_response());
    };
    // Admins land on their own dashboard
    if claims.role == Role::Admin {
        return Ok(Redirect::to("/admin").into_response());
    }
    Ok(render_page(&state, "dashboard.html", &claims)?.into_response())
}

pub async fn chat_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    user_page(&state, &headers, "chat.html").await
}

pub async fn forecast_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    user_page(&state, &headers, "forecast.html").await
}

pub async fn alerts_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    user_page(&state, &headers, "alerts.html").await
}

pub async fn health_tips_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    user_page(&state, &headers, "health_tips.html").await
}

pub async fn settings_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    user_page(&state, &headers, "settings.html").await
}

pub async fn admin_home(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    admin_page(&state, &headers, "admin.html").await
}

pub async fn admin_users_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    admin_page(&state, &headers, "admin_users.html").await
}

pub async fn admin_alerts_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    admin_page(&state, &headers, "admin_alerts.html").await
}

pub async fn admin_map_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    admin_page(&state, &headers, "admin_map.html").await
}

pub async fn admin_chat_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    admin_page(&state, &headers, "admin_chat.html").await
}

async fn user_page(
    state: &AppState,
    headers: &HeaderMap,
    template: &str,
) -> Result<Response, ApiError> {
    let Some(claims) = authenticate(state, headers).await else {
        return Ok(Redirect::to("/signin").into_response());
    };
    Ok(render_page(state, template, &claims)?.into_response())
}

async fn admin_page(
    state: &AppState,
    headers: &HeaderMap,
    template: &str,
) -> Result<Response, ApiError> {
    let Some(claims) = authenticate(state, headers).await else {
        return Ok(Redirect::to("/signin").into_response());
    };
    if claims.role != Role::Admin {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    Ok(render_page(state, template, &claims)?.into_response())
}

fn role_home(claims: &Claims) -> Redirect {
    match claims.role {
        Role::Admin => Redirect::to("/admin"),
        Role::User => Redirect::to("/dashboard"),
    }
}

fn render_page(state: &AppState, name: &str, claims: &Claims) -> Result<Html<String>, ApiError> {
    render(
        state,
        name,
        context! {
            username => claims.username,
            role => claims.role.as_str(),
        },
    )
}

fn render(state: &AppState, name: &str, ctx: minijinja::Value) -> Result<Html<String>, ApiError> {
    let template = state
        .templates
        .get_template(name)
        .map_err(anyhow::Error::from)?;
    let html = template.render(ctx).map_err(anyhow::Error::from)?;
    Ok(Html(html))
}
