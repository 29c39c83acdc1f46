use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    time::Instant,
};
use tracing::{debug, info, warn};

/// Logs one line per completed HTTP request with method, path, status
/// and latency. WebSocket upgrades are logged once at upgrade time; the
/// long-lived connection itself logs through the session.
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggingService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingService { service }))
    }
}

pub struct RequestLoggingService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let peer = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        debug!(method = %method, path = %path, peer = %peer, "request received");

        let fut = self.service.call(req);

        Box::pin(async move {
            let result = fut.await;
            let latency_ms = started.elapsed().as_millis();

            match &result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_server_error() {
                        warn!(
                            method = %method,
                            path = %path,
                            status = %status,
                            latency_ms = %latency_ms,
                            "request completed with server error"
                        );
                    } else {
                        info!(
                            method = %method,
                            path = %path,
                            status = %status,
                            latency_ms = %latency_ms,
                            "request completed"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        method = %method,
                        path = %path,
                        latency_ms = %latency_ms,
                        error = %err,
                        "request failed"
                    );
                }
            }

            result
        })
    }
}
