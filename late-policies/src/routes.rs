//! HTTP route handlers for late policies
//!
//! HTML pages render Tera templates; mutating actions answer with a
//! `303 See Other` redirect and a flash cookie.

use crate::authorization::Caller;
use crate::flash::{self, Flash};
use crate::manager::{ActionOutcome, RequestContext};
use crate::model::{LatePolicyParams, PolicyId};
use crate::{AppError, AppResult, AppState};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Form, Json,
};
use tracing::{debug, error};

/// Render `template` for `caller`, consuming any pending flash.
fn render_page(
    state: &AppState,
    template: &str,
    mut context: tera::Context,
    caller: &Caller,
    headers: &HeaderMap,
) -> AppResult<Response> {
    let flash = Flash::from_headers(headers);
    context.insert("caller", caller);
    context.insert("flash", &flash);
    context.insert(
        "flash_lines",
        &flash.as_ref().map(Flash::lines).unwrap_or_default(),
    );

    let html = state.tera.render(template, &context).map_err(|e| {
        error!("Template rendering failed for {}: {}", template, e);
        AppError::from(e)
    })?;

    let mut response = Html(html).into_response();
    if flash.is_some() {
        response
            .headers_mut()
            .append(header::SET_COOKIE, flash::clear_cookie());
    }
    Ok(response)
}

fn outcome_response(outcome: ActionOutcome) -> Response {
    let mut response = Redirect::to(&outcome.redirect.path()).into_response();
    if let Some(cookie) = outcome.flash.as_ref().and_then(Flash::set_cookie) {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// GET /late_policies
#[axum::debug_handler]
pub async fn list_policies_html(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
) -> AppResult<Response> {
    debug!("Handling GET /late_policies for user {}", caller.user_id);
    let ctx = RequestContext::new(caller.clone());
    let policies = state.manager.list(&ctx).await?;

    let mut context = tera::Context::new();
    context.insert("policies", &policies);
    context.insert("current_page", &"late_policies");
    render_page(&state, "late_policies/index.html", context, &caller, &headers)
}

/// GET /api/late_policies
#[axum::debug_handler]
pub async fn list_policies_api(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> AppResult<Response> {
    debug!("Handling GET /api/late_policies for user {}", caller.user_id);
    let policies = state.manager.list(&RequestContext::new(caller)).await?;
    Ok(Json(policies).into_response())
}

/// GET /late_policies/:id
#[axum::debug_handler]
pub async fn show_policy_html(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<PolicyId>,
    headers: HeaderMap,
) -> AppResult<Response> {
    debug!("Handling GET /late_policies/{}", id);
    let ctx = RequestContext::for_policy(caller.clone(), id);
    let policy = state.manager.show(&ctx, id).await?;

    let mut context = tera::Context::new();
    context.insert("policy", &policy);
    context.insert("current_page", &"late_policies");
    render_page(&state, "late_policies/show.html", context, &caller, &headers)
}

/// GET /api/late_policies/:id
#[axum::debug_handler]
pub async fn show_policy_api(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<PolicyId>,
) -> AppResult<Response> {
    debug!("Handling GET /api/late_policies/{}", id);
    let ctx = RequestContext::for_policy(caller, id);
    let policy = state.manager.show(&ctx, id).await?;
    Ok(Json(policy).into_response())
}

/// GET /late_policies/new
#[axum::debug_handler]
pub async fn new_policy_html(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let ctx = RequestContext::new(caller.clone());
    let params = state.manager.new_form(&ctx).await?;

    let mut context = tera::Context::new();
    context.insert("form", &params);
    context.insert("form_action", &"/late_policies");
    context.insert("current_page", &"late_policies");
    render_page(&state, "late_policies/new.html", context, &caller, &headers)
}

/// GET /late_policies/:id/edit
#[axum::debug_handler]
pub async fn edit_policy_html(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<PolicyId>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let ctx = RequestContext::for_policy(caller.clone(), id);
    let policy = state.manager.edit_form(&ctx, id).await?;

    let mut context = tera::Context::new();
    context.insert("policy", &policy);
    context.insert("form", &LatePolicyParams::from(&policy));
    context.insert("form_action", &format!("/late_policies/{}", id));
    context.insert("current_page", &"late_policies");
    render_page(&state, "late_policies/edit.html", context, &caller, &headers)
}

/// POST /late_policies
#[axum::debug_handler]
pub async fn create_policy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Form(params): Form<LatePolicyParams>,
) -> AppResult<Response> {
    debug!("Handling POST /late_policies for user {}", caller.user_id);
    let outcome = state
        .manager
        .create(&RequestContext::new(caller), &params)
        .await?;
    Ok(outcome_response(outcome))
}

/// POST|PUT|PATCH /late_policies/:id
#[axum::debug_handler]
pub async fn update_policy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<PolicyId>,
    Form(params): Form<LatePolicyParams>,
) -> AppResult<Response> {
    debug!("Handling update of late policy {}", id);
    let ctx = RequestContext::for_policy(caller, id);
    let outcome = state.manager.update(&ctx, id, &params).await?;
    Ok(outcome_response(outcome))
}

/// DELETE /late_policies/:id, POST /late_policies/:id/delete
#[axum::debug_handler]
pub async fn destroy_policy(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<PolicyId>,
) -> AppResult<Response> {
    debug!("Handling delete of late policy {}", id);
    let ctx = RequestContext::for_policy(caller, id);
    let outcome = state.manager.destroy(&ctx, id).await?;
    Ok(outcome_response(outcome))
}
