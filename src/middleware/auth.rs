use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, Uri, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;

use crate::{AppState, models::Session, utils::session_from_headers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    Admin,
}

/// 网关对单个请求的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin(String),
    RedirectToDashboard(String),
    RejectCsrf,
}

impl IntoResponse for GateDecision {
    fn into_response(self) -> Response {
        match self {
            GateDecision::Allow => StatusCode::OK.into_response(),
            GateDecision::RedirectToLogin(to) | GateDecision::RedirectToDashboard(to) => {
                Redirect::temporary(&to).into_response()
            }
            GateDecision::RejectCsrf => (
                StatusCode::FORBIDDEN,
                Json(json!({ "error": "CSRF validation failed" })),
            )
                .into_response(),
        }
    }
}

/// 按路径前缀划分路由类别，以及各类重定向目标
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub public_exact: Vec<String>,
    pub public_prefixes: Vec<String>,
    pub admin_prefixes: Vec<String>,
    /// 无需登录即可进入的管理路径，未登录时与非管理员同样退回仪表盘
    pub admin_open_prefixes: Vec<String>,
    pub api_prefix: String,
    pub auth_prefix: String,
    pub login_path: String,
    pub dashboard_path: String,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        RoutePolicy {
            public_exact: owned(&["/"]),
            // API 路由在网关层放行，由处理器返回 JSON 错误
            public_prefixes: owned(&[
                "/auth/",
                "/api/",
                "/blog",
                "/privacy-policy",
                "/contact-us",
                "/terms-of-service",
                "/_next",
                "/favicon",
            ]),
            admin_prefixes: owned(&["/admin", "/dev"]),
            admin_open_prefixes: owned(&["/dev/"]),
            api_prefix: "/api/".into(),
            auth_prefix: "/auth/".into(),
            login_path: "/auth/login".into(),
            dashboard_path: "/dashboard".into(),
        }
    }
}

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

/// 取 Origin 的 `host[:port]`，省略协议默认端口；不是绝对 URL 时返回 None
fn origin_host(origin: &str) -> Option<String> {
    let uri: Uri = origin.trim().parse().ok()?;
    let scheme = uri.scheme_str()?;
    let authority = uri.authority()?;
    let host = authority.host().to_ascii_lowercase();
    match authority.port_u16() {
        Some(port) if Some(port) != default_port(scheme) => Some(format!("{host}:{port}")),
        _ => Some(host),
    }
}

impl RoutePolicy {
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.admin_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            RouteClass::Admin
        } else if self.public_exact.iter().any(|p| p == path)
            || self.public_prefixes.iter().any(|p| path.starts_with(p.as_str()))
        {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }

    /// 修改数据的 API 请求，Origin 必须与 Host 一致；缺少 Origin 或 Host 时放行
    pub fn csrf_violation(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        if !path.starts_with(self.api_prefix.as_str()) || !is_mutating(method) {
            return false;
        }

        let origin = headers.get(header::ORIGIN).and_then(|h| h.to_str().ok());
        let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());

        match (origin, host) {
            (Some(origin), Some(host)) => match origin_host(origin) {
                Some(origin_host) => !origin_host.eq_ignore_ascii_case(host.trim()),
                None => true,
            },
            _ => false,
        }
    }

    pub fn decide(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
        session: Option<&Session>,
    ) -> GateDecision {
        if self.csrf_violation(method, path, headers) {
            return GateDecision::RejectCsrf;
        }

        let unauthorized = || {
            GateDecision::RedirectToDashboard(format!("{}?error=unauthorized", self.dashboard_path))
        };

        match (self.classify(path), session) {
            (RouteClass::Admin, None)
                if self.admin_open_prefixes.iter().any(|p| path.starts_with(p.as_str())) =>
            {
                unauthorized()
            }
            (RouteClass::Admin, None) | (RouteClass::Protected, None) => {
                GateDecision::RedirectToLogin(self.login_path.clone())
            }
            (RouteClass::Admin, Some(session)) if !session.is_admin() => unauthorized(),
            // 已登录用户无需再访问登录/注册页
            (RouteClass::Public, Some(_)) if path.starts_with(self.auth_prefix.as_str()) => {
                GateDecision::RedirectToDashboard(self.dashboard_path.clone())
            }
            _ => GateDecision::Allow,
        }
    }
}

/// 网关中间件：解析会话，执行 CSRF 与路由权限检查，
/// 并通过请求扩展把会话交给后续处理器
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = session_from_headers(
        request.headers(),
        &state.config.session_cookie,
        &state.config.session_secret,
    );

    let decision = state.route_policy.decide(
        request.method(),
        request.uri().path(),
        request.headers(),
        session.as_ref(),
    );

    match decision {
        GateDecision::Allow => {
            if let Some(session) = session {
                request.extensions_mut().insert(session);
            }
            next.run(request).await
        }
        GateDecision::RejectCsrf => {
            tracing::warn!(
                method = %request.method(),
                path = request.uri().path(),
                "CSRF validation failed"
            );
            decision.into_response()
        }
        redirect => {
            tracing::debug!(path = request.uri().path(), decision = ?redirect, "Redirecting request");
            redirect.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use axum::http::HeaderValue;

    fn session(role: Role) -> Session {
        Session {
            user_id: "u1".into(),
            role,
            email: None,
        }
    }

    fn headers(origin: Option<&'static str>, host: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static(host));
        if let Some(origin) = origin {
            headers.insert(header::ORIGIN, HeaderValue::from_static(origin));
        }
        headers
    }

    #[test]
    fn classifies_by_prefix() {
        let policy = RoutePolicy::default();
        assert_eq!(policy.classify("/"), RouteClass::Public);
        assert_eq!(policy.classify("/blog/post-1"), RouteClass::Public);
        assert_eq!(policy.classify("/api/users"), RouteClass::Public);
        assert_eq!(policy.classify("/dashboard"), RouteClass::Protected);
        assert_eq!(policy.classify("/profile"), RouteClass::Protected);
        assert_eq!(policy.classify("/admin/users"), RouteClass::Admin);
        assert_eq!(policy.classify("/dev/logger"), RouteClass::Admin);
    }

    #[test]
    fn unauthenticated_protected_goes_to_login() {
        let policy = RoutePolicy::default();
        let d = policy.decide(&Method::GET, "/dashboard", &HeaderMap::new(), None);
        assert_eq!(d, GateDecision::RedirectToLogin("/auth/login".into()));
        let d = policy.decide(&Method::GET, "/admin", &HeaderMap::new(), None);
        assert_eq!(d, GateDecision::RedirectToLogin("/auth/login".into()));
    }

    #[test]
    fn signed_out_dev_tools_go_to_dashboard() {
        let policy = RoutePolicy::default();
        let d = policy.decide(&Method::GET, "/dev/logger", &HeaderMap::new(), None);
        assert_eq!(
            d,
            GateDecision::RedirectToDashboard("/dashboard?error=unauthorized".into())
        );
        // 不带斜杠的 /dev 仍需先登录
        let d = policy.decide(&Method::GET, "/dev", &HeaderMap::new(), None);
        assert_eq!(d, GateDecision::RedirectToLogin("/auth/login".into()));
        let admin = session(Role::Admin);
        let d = policy.decide(&Method::GET, "/dev/logger", &HeaderMap::new(), Some(&admin));
        assert_eq!(d, GateDecision::Allow);
    }

    #[test]
    fn non_admin_is_sent_back_to_dashboard() {
        let policy = RoutePolicy::default();
        let user = session(Role::Moderator);
        let d = policy.decide(&Method::GET, "/admin", &HeaderMap::new(), Some(&user));
        assert_eq!(
            d,
            GateDecision::RedirectToDashboard("/dashboard?error=unauthorized".into())
        );
        let admin = session(Role::Admin);
        let d = policy.decide(&Method::GET, "/admin", &HeaderMap::new(), Some(&admin));
        assert_eq!(d, GateDecision::Allow);
    }

    #[test]
    fn signed_in_users_skip_auth_pages() {
        let policy = RoutePolicy::default();
        let user = session(Role::User);
        let d = policy.decide(&Method::GET, "/auth/login", &HeaderMap::new(), Some(&user));
        assert_eq!(d, GateDecision::RedirectToDashboard("/dashboard".into()));
        let d = policy.decide(&Method::GET, "/auth/login", &HeaderMap::new(), None);
        assert_eq!(d, GateDecision::Allow);
    }

    #[test]
    fn csrf_rejects_foreign_origin_on_mutating_api_calls() {
        let policy = RoutePolicy::default();
        let h = headers(Some("https://evil.example"), "app.example");
        assert_eq!(
            policy.decide(&Method::POST, "/api/users", &h, None),
            GateDecision::RejectCsrf
        );
        // 安全方法和非 API 路径不检查
        assert_eq!(policy.decide(&Method::GET, "/api/users", &h, None), GateDecision::Allow);
        assert!(!policy.csrf_violation(&Method::POST, "/blog", &h));
    }

    #[test]
    fn csrf_allows_missing_or_matching_origin() {
        let policy = RoutePolicy::default();
        assert!(!policy.csrf_violation(&Method::POST, "/api/users", &headers(None, "app.example")));
        assert!(!policy.csrf_violation(
            &Method::DELETE,
            "/api/users/1",
            &headers(Some("https://app.example"), "app.example")
        ));
        assert!(!policy.csrf_violation(
            &Method::PUT,
            "/api/users/1",
            &headers(Some("http://localhost:3000"), "localhost:3000")
        ));
        assert!(!policy.csrf_violation(
            &Method::PATCH,
            "/api/users/1",
            &headers(Some("https://App.Example:443"), "app.example")
        ));
    }

    #[test]
    fn csrf_rejects_port_mismatch_and_garbage_origin() {
        let policy = RoutePolicy::default();
        assert!(policy.csrf_violation(
            &Method::POST,
            "/api/users",
            &headers(Some("http://localhost:4000"), "localhost:3000")
        ));
        assert!(policy.csrf_violation(&Method::POST, "/api/users", &headers(Some("null"), "app.example")));
    }
}
