use axum::http::{HeaderValue, Request, Response, StatusCode, header::WWW_AUTHENTICATE};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that adds a `WWW-Authenticate: Bearer` challenge to 401 responses
#[derive(Clone, Default)]
pub struct WwwAuthenticateLayer;

impl WwwAuthenticateLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for WwwAuthenticateLayer {
    type Service = WwwAuthenticateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        WwwAuthenticateService { inner }
    }
}

#[derive(Clone)]
pub struct WwwAuthenticateService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for WwwAuthenticateService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = WwwAuthenticateFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        WwwAuthenticateFuture {
            future: self.inner.call(request),
        }
    }
}

pin_project! {
    /// Future that adds the challenge once the inner response is known
    pub struct WwwAuthenticateFuture<F> {
        #[pin]
        future: F,
    }
}

impl<F, ResBody, E> Future for WwwAuthenticateFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ResBody>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.future.poll(cx) {
            Poll::Ready(Ok(mut response)) => {
                if response.status() == StatusCode::UNAUTHORIZED
                    && !response.headers().contains_key(WWW_AUTHENTICATE)
                {
                    response
                        .headers_mut()
                        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                }
                Poll::Ready(Ok(response))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use tower::ServiceExt;

    async fn status_of(uri: &str) -> Response<Body> {
        let app = Router::new()
            .route("/open", axum::routing::get(|| async { "open" }))
            .route(
                "/closed",
                axum::routing::get(|| async { (StatusCode::UNAUTHORIZED, "closed") }),
            )
            .layer(WwwAuthenticateLayer::new());

        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn adds_bearer_challenge_to_unauthorized_responses() {
        let response = status_of("/closed").await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE),
            Some(&HeaderValue::from_static("Bearer"))
        );
    }

    #[tokio::test]
    async fn leaves_other_responses_alone() {
        let response = status_of("/open").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
