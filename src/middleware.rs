use actix_web::{dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform}, Error, http::header};
use futures_util::future::{ok, Ready, LocalBoxFuture};
use tracing::Instrument;
use uuid::Uuid;

const HEADER: &str = "x-correlation-id";

/// Tags every console request with a correlation id (taken from the caller
/// when present) and runs the handler inside a span carrying it.
pub struct CorrelationId;

impl<S, B> Transform<S, ServiceRequest> for CorrelationId
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CorrelationIdMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(CorrelationIdMiddleware { service })
    }
}

pub struct CorrelationIdMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for CorrelationIdMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header_name = header::HeaderName::from_static(HEADER);
        let cid = req.headers().get(&header_name)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let span = tracing::info_span!(
            "request",
            correlation_id = %cid,
            method = %req.method(),
            path = %req.path(),
        );

        let fut = span.in_scope(|| self.service.call(req));
        Box::pin(async move {
            let mut res = fut.await?;
            res.headers_mut().insert(
                header_name,
                header::HeaderValue::from_str(&cid).unwrap_or_else(|_| header::HeaderValue::from_static("invalid")),
            );
            Ok(res)
        }.instrument(span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[actix_web::test]
    async fn echoes_caller_id_or_mints_one() {
        let app = test::init_service(
            App::new()
                .wrap(CorrelationId)
                .route("/ping", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let req = test::TestRequest::get().uri("/ping").insert_header((HEADER, "abc-123")).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.headers().get(HEADER).unwrap(), "abc-123");

        let req = test::TestRequest::get().uri("/ping").to_request();
        let res = test::call_service(&app, req).await;
        let minted = res.headers().get(HEADER).unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(minted).is_ok());
    }
}
