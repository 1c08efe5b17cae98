//! Private area: onboarding gate, navigation and the onboarding form.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, FormFailure};
use super::messages::{Lang, Message};
use super::page;
use crate::models::{Country, Record, User};
use crate::pipeline::{onboarding_gate, RequestContext};
use crate::store::Query;
use crate::utils::{
    capitalize, format_to_e164, generate_invite_code, iso_to_emoji, normalize_path,
};
use crate::AppState;

/// Account types a new user may pick during onboarding
const ACCOUNT_TYPES: &[&str] = &["Propietario", "Inquilino"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub label: &'static str,
    pub icon: &'static str,
    pub path: &'static str,
}

const fn item(label: &'static str, icon: &'static str, path: &'static str) -> NavItem {
    NavItem { label, icon, path }
}

pub fn nav_items(owner: bool, lang: Lang) -> Vec<NavItem> {
    match (owner, lang) {
        (true, Lang::Es) => vec![
            item("Inicio", "home", "/"),
            item("Unidades", "domain", "/units"),
            item("Mantenimiento", "home_repair_service", "/requests"),
            item("Mi cuenta", "account_circle", "/account"),
        ],
        (true, Lang::En) => vec![
            item("Home", "home", "/"),
            item("Units", "domain", "/units"),
            item("Maintenance", "home_repair_service", "/requests"),
            item("My account", "account_circle", "/account"),
        ],
        (false, Lang::Es) => vec![
            item("Inicio", "home", "/"),
            item("Unidad", "villa", "/unit"),
            item("Solicitudes", "sell", "/requests"),
            item("Cuenta", "account_circle", "/account"),
        ],
        (false, Lang::En) => vec![
            item("Home", "home", "/"),
            item("Unit", "villa", "/unit"),
            item("Requests", "sell", "/requests"),
            item("Account", "account_circle", "/account"),
        ],
    }
}

/// Layout middleware for the private area
pub async fn onboarding_guard(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identities = ctx.session()?.get_identities().await?;
    let path = normalize_path(request.uri().path());

    if let Some(redirect) = onboarding_gate(path, &identities, &state.config.access) {
        return Ok(redirect.into_response());
    }
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct LayoutData {
    #[serde(rename = "appUser")]
    app_user: Option<Value>,
    items: Vec<NavItem>,
    config: crate::pipeline::RequestConfig,
    /// Allow-listed identity/data service headers seen while building the page
    #[serde(rename = "transportHeaders")]
    transport_headers: BTreeMap<String, String>,
}

/// Shared data for every private page
async fn layout_data(ctx: &RequestContext) -> Result<LayoutData, ApiError> {
    let session = ctx.session()?;
    let identities = session.get_identities().await?;
    let config = ctx.preferences();
    let owner = identities.app_user.as_ref().is_some_and(User::is_owner);

    Ok(LayoutData {
        app_user: identities.app_user.as_ref().map(User::to_json),
        items: nav_items(owner, Lang::from(&config)),
        config,
        transport_headers: session.cookies().transport_headers(),
    })
}

async fn private_page(ctx: RequestContext, title: &str) -> Result<Response, ApiError> {
    page::render(title, &layout_data(&ctx).await?)
}

pub async fn home(ctx: RequestContext) -> Result<Response, ApiError> {
    private_page(ctx, "Inicio").await
}

pub async fn units(ctx: RequestContext) -> Result<Response, ApiError> {
    private_page(ctx, "Unidades").await
}

pub async fn unit(ctx: RequestContext) -> Result<Response, ApiError> {
    private_page(ctx, "Unidad").await
}

pub async fn requests(ctx: RequestContext) -> Result<Response, ApiError> {
    private_page(ctx, "Solicitudes").await
}

pub async fn account(ctx: RequestContext) -> Result<Response, ApiError> {
    private_page(ctx, "Cuenta").await
}

#[derive(Debug, Serialize)]
struct CountryOption {
    id: i64,
    name: String,
    phone_code: String,
    flag: String,
}

/// GET /onboarding: the identity being onboarded and the countries to pick from
pub async fn onboarding_page(ctx: RequestContext) -> Result<Response, ApiError> {
    let session = ctx.session()?;
    let identities = session.get_identities().await?;

    let rows = session
        .data()
        .fetch_many(&Query::table("country").select("*,currency(*)"))
        .await?;
    let countries = rows
        .into_iter()
        .map(Country::from_json)
        .map(|country| {
            country.map(|c| CountryOption {
                flag: iso_to_emoji(&c.iso2),
                id: c.id,
                name: c.name,
                phone_code: c.phone_code,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    page::render(
        "Onboarding",
        &json!({
            "authUser": identities.auth_user,
            "countries": countries,
            "config": ctx.preferences(),
            "transportHeaders": session.cookies().transport_headers(),
        }),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct OnboardingForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub identity_card: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub country_id: String,
    #[serde(default)]
    pub account_type: String,
}

/// POST /onboarding: create the domain user for the signed-in identity
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
    Form(form): Form<OnboardingForm>,
) -> Result<Response, ApiError> {
    let lang = Lang::from(&ctx.preferences());
    let session = ctx.session()?;
    let identities = session.get_identities().await?;

    let email = identities
        .auth_user
        .as_ref()
        .and_then(|u| u.email.clone())
        .ok_or_else(|| ApiError::bad_request("Signed-in identity has no email"))?;

    let first_name = form.first_name.trim();
    let last_name = form.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() || form.phone.trim().is_empty() {
        return Ok(FormFailure::new(Message::MissingProfileFields.text(lang)).into_response());
    }
    if !ACCOUNT_TYPES.contains(&form.account_type.as_str()) {
        return Ok(FormFailure::new(Message::InvalidAccountType.text(lang)).into_response());
    }
    let Ok(country_id) = form.country_id.trim().parse::<i64>() else {
        return Ok(FormFailure::new(Message::UnknownCountry.text(lang)).into_response());
    };

    let row = session
        .data()
        .fetch_optional(&Query::table("country").eq("id", country_id))
        .await?;
    let Some(country) = row.map(Country::from_json).transpose()? else {
        return Ok(FormFailure::new(Message::UnknownCountry.text(lang)).into_response());
    };

    let identity_card = Some(form.identity_card.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    let created = session
        .data()
        .insert(
            "user",
            json!({
                "first_name": capitalize(first_name),
                "last_name": capitalize(last_name),
                "identity_card": identity_card,
                "phone": format_to_e164(&form.phone, &country.phone_code),
                "email": email,
                "account_type": form.account_type,
                "invite_code": generate_invite_code(),
                "country_id": country.id,
            }),
        )
        .await?;
    let user = User::from_json(created)?;

    info!(user_id = user.id, account_type = %user.account_type, "Onboarded user");
    Ok(Redirect::to(&state.config.access.home_path).into_response())
}
