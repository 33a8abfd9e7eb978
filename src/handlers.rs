use std::sync::Arc;

use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde::Serialize;
use serde_json::json;

use crate::auth::{Access, AccessGate, AdminUser, SessionStore};
use crate::center::{CreateForm, NotificationCenter};
use crate::error::CenterError;
use crate::filters::{FilterChange, NotificationFilters};
use crate::models::{Action, Envelope, Notification, User};

#[derive(Clone)]
pub struct AppState {
    pub center: Arc<NotificationCenter>,
    pub gate: AccessGate<dyn SessionStore>,
}

/// One list row: the record plus what the row shows and offers.
#[derive(Serialize)]
struct Entry<'a> {
    #[serde(flatten)]
    notification: &'a Notification,
    actions: Vec<Action>,
    status_color: &'static str,
    priority_color: &'static str,
    triggered_by: String,
}

impl<'a> From<&'a Notification> for Entry<'a> {
    fn from(n: &'a Notification) -> Self {
        Self {
            actions: n.actions(),
            status_color: n.status.badge_color(),
            priority_color: n.priority.badge_color(),
            triggered_by: n.display_name(),
            notification: n,
        }
    }
}

#[derive(Serialize)]
struct ConsoleView<'a> {
    notifications: Vec<Entry<'a>>,
    unread_count: u64,
    total: usize,
    filters: &'a NotificationFilters,
    has_previous: bool,
    has_next: bool,
    form: &'a CreateForm,
    can_submit: bool,
    user: &'a User,
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
}

/// Runs the access gate; non-admins are redirected instead of seeing an error.
async fn admit(state: &AppState, req: &HttpRequest) -> Result<AdminUser, HttpResponse> {
    match state.gate.check(bearer(req)).await {
        Access::Granted(admin) => Ok(admin),
        denied => {
            let target = denied.redirect_target().unwrap_or("/login");
            Err(HttpResponse::SeeOther()
                .insert_header((header::LOCATION, target))
                .finish())
        }
    }
}

fn render(state: &AppState, admin: &AdminUser, message: &str) -> HttpResponse {
    let snapshot = state.center.snapshot();
    let view = ConsoleView {
        notifications: snapshot.notifications.iter().map(Entry::from).collect(),
        unread_count: snapshot.unread_count,
        total: snapshot.total,
        filters: &snapshot.filters,
        has_previous: snapshot.has_previous,
        has_next: snapshot.has_next,
        form: &snapshot.form,
        can_submit: snapshot.can_submit,
        user: admin.user(),
    };
    HttpResponse::Ok().json(Envelope::ok(message, view).with_meta(snapshot.page_meta()))
}

fn failure(err: CenterError) -> HttpResponse {
    let body = Envelope::<()>::err(err.code(), &err.to_string());
    match err {
        CenterError::Form(_) => HttpResponse::UnprocessableEntity().json(body),
        CenterError::ActionUnavailable { .. } => HttpResponse::Conflict().json(body),
        CenterError::Service(_) => HttpResponse::BadGateway().json(body),
    }
}

// GET /api/v1/notifications
pub async fn list(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let admin = match admit(&state, &req).await {
        Ok(admin) => admin,
        Err(redirect) => return redirect,
    };
    render(&state, &admin, "notifications")
}

// POST /api/v1/notifications/filters
pub async fn set_filter(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<FilterChange>,
) -> HttpResponse {
    let admin = match admit(&state, &req).await {
        Ok(admin) => admin,
        Err(redirect) => return redirect,
    };
    state.center.set_filter(body.into_inner()).await;
    render(&state, &admin, "filters_applied")
}

// POST /api/v1/notifications/refresh
pub async fn refresh(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let admin = match admit(&state, &req).await {
        Ok(admin) => admin,
        Err(redirect) => return redirect,
    };
    state.center.refresh().await;
    render(&state, &admin, "refreshed")
}

// POST /api/v1/notifications/{id}/read
pub async fn mark_read(state: web::Data<AppState>, req: HttpRequest, id: web::Path<i64>) -> HttpResponse {
    let admin = match admit(&state, &req).await {
        Ok(admin) => admin,
        Err(redirect) => return redirect,
    };
    match state.center.mark_as_read(id.into_inner()).await {
        Ok(()) => render(&state, &admin, "marked_read"),
        Err(e) => failure(e),
    }
}

// POST /api/v1/notifications/{id}/archive
pub async fn mark_archived(state: web::Data<AppState>, req: HttpRequest, id: web::Path<i64>) -> HttpResponse {
    let admin = match admit(&state, &req).await {
        Ok(admin) => admin,
        Err(redirect) => return redirect,
    };
    match state.center.mark_as_archived(id.into_inner()).await {
        Ok(()) => render(&state, &admin, "archived"),
        Err(e) => failure(e),
    }
}

// POST /api/v1/notifications
pub async fn create(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateForm>,
) -> HttpResponse {
    let admin = match admit(&state, &req).await {
        Ok(admin) => admin,
        Err(redirect) => return redirect,
    };
    match state.center.submit(body.into_inner(), &admin).await {
        Ok(created) => HttpResponse::Created().json(Envelope::ok("created", created)),
        Err(e) => failure(e),
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health)).service(
        web::scope("/api/v1/notifications")
            .route("", web::get().to(list))
            .route("", web::post().to(create))
            .route("/filters", web::post().to(set_filter))
            .route("/refresh", web::post().to(refresh))
            .route("/{id}/read", web::post().to(mark_read))
            .route("/{id}/archive", web::post().to(mark_archived)),
    );
}
