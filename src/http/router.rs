use crate::{
    http::{request::RequestInfo, response::ResponseDescriptor, static_files},
    Method, StaticRoot, StatusCode,
};

pub(crate) const HELLO: &[u8] = b"Hello";
pub(crate) const ROUTE_NOT_FOUND: &[u8] = b"Route Not Found";
pub(crate) const UNSUPPORTED_METHOD: &[u8] = b"This request method is currently unsupported";

/// Every destination a request can be routed to.
///
/// | Method     | API   | Path     | Route                 |
/// |------------|-------|----------|-----------------------|
/// | `GET`      | yes   | `/`      | [`Root`](Route::Root) |
/// | `POST`     | yes   | `/echo`  | [`Echo`](Route::Echo) |
/// | `GET/POST` | yes   | other    | [`NotFound`](Route::NotFound) |
/// | other      | yes   | any      | [`UnsupportedMethod`](Route::UnsupportedMethod) |
/// | `GET`      | no    | any      | [`StaticFile`](Route::StaticFile) |
/// | other      | no    | any      | [`UnsupportedMethod`](Route::UnsupportedMethod) |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    Echo,
    NotFound,
    UnsupportedMethod,
    StaticFile,
}

impl Route {
    /// `path` is the normalized path, already stripped of its `/api` prefix.
    #[inline]
    pub fn resolve(method: Option<Method>, is_api: bool, path: &[u8]) -> Self {
        match (method, is_api, path) {
            (Some(Method::Get), true, b"/") => Route::Root,
            (Some(Method::Post), true, b"/echo") => Route::Echo,
            (Some(Method::Get | Method::Post), true, _) => Route::NotFound,
            (_, true, _) => Route::UnsupportedMethod,

            (Some(Method::Get), false, _) => Route::StaticFile,
            (_, false, _) => Route::UnsupportedMethod,
        }
    }
}

/// Builds the response for a fully parsed request with a resolved path.
///
/// The `Connection` header of every response follows the request's
/// keep-alive flag.
pub fn handle(request: &RequestInfo<'_>, root: &StaticRoot) -> ResponseDescriptor {
    let route = Route::resolve(request.method(), request.is_api(), request.normalized_path());

    let response = match route {
        Route::Root => ResponseDescriptor::text(StatusCode::Ok, HELLO),
        Route::Echo => ResponseDescriptor::text(StatusCode::Ok, request.body()),
        Route::NotFound => ResponseDescriptor::text(StatusCode::NotFound, ROUTE_NOT_FOUND),
        Route::UnsupportedMethod => {
            ResponseDescriptor::text(StatusCode::MethodNotAllowed, UNSUPPORTED_METHOD)
        }
        Route::StaticFile => static_files::serve(root, request.normalized_path()),
    };

    response.keep_alive(request.is_keep_alive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{http::response::Body, limits::ReqLimits};
    use memchr::memmem;
    use tempfile::TempDir;

    fn with_request<R>(raw: &str, f: impl FnOnce(&RequestInfo<'_>) -> R) -> R {
        let bytes = raw.as_bytes();
        let end = memmem::find(bytes, b"\r\n\r\n").unwrap();

        let mut req = RequestInfo::parse(&bytes[..end + 2], &ReqLimits::default()).unwrap();
        req.extract_body(&bytes[end + 4..]);
        req.resolve_path().unwrap();
        f(&req)
    }

    fn owned(resp: &ResponseDescriptor) -> &[u8] {
        match resp.body() {
            Body::Owned(bytes) => bytes,
            Body::File { .. } => panic!("expected owned body"),
        }
    }

    #[test]
    fn resolve_routes() {
        use Method::*;

        #[rustfmt::skip]
        let cases = [
            (Some(Get),     true,  "/",         Route::Root),
            (Some(Post),    true,  "/echo",     Route::Echo),
            (Some(Get),     true,  "/echo",     Route::NotFound),
            (Some(Post),    true,  "/",         Route::NotFound),
            (Some(Get),     true,  "/missing",  Route::NotFound),
            (Some(Put),     true,  "/echo",     Route::UnsupportedMethod),
            (Some(Delete),  true,  "/",         Route::UnsupportedMethod),
            (None,          true,  "/",         Route::UnsupportedMethod),

            (Some(Get),     false, "/",         Route::StaticFile),
            (Some(Get),     false, "/echo",     Route::StaticFile),
            (Some(Post),    false, "/echo",     Route::UnsupportedMethod),
            (Some(Head),    false, "/",         Route::UnsupportedMethod),
            (None,          false, "/a.html",   Route::UnsupportedMethod),
        ];

        for (method, is_api, path, expected) in cases {
            assert_eq!(
                Route::resolve(method, is_api, path.as_bytes()),
                expected,
                "{method:?} api={is_api} {path}"
            );
        }
    }

    #[test]
    fn api_responses() {
        let dir = TempDir::new().unwrap();
        let root = StaticRoot::open(dir.path()).unwrap();

        #[rustfmt::skip]
        let cases = [
            ("GET /api HTTP/1.1\r\nHost: x\r\n\r\n",                          200, "Hello"),
            ("GET /api/ HTTP/1.1\r\nHost: x\r\n\r\n",                         200, "Hello"),
            ("GET /api/x/.. HTTP/1.1\r\nHost: x\r\n\r\n",                     200, "Hello"),
            ("POST /api/echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello",     200, "hello"),
            ("POST /api/echo HTTP/1.1\r\nContent-Length: 0\r\n\r\n",          200, ""),
            ("POST /api/%65cho HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi",      200, "hi"),
            ("GET /api/nothing HTTP/1.1\r\nHost: x\r\n\r\n",                  404, "Route Not Found"),
            ("PUT /api/echo HTTP/1.1\r\nHost: x\r\n\r\n",                     405, "This request method is currently unsupported"),
            ("BREW /api HTTP/1.1\r\nHost: x\r\n\r\n",                         405, "This request method is currently unsupported"),
            ("POST /index.html HTTP/1.1\r\nHost: x\r\n\r\n",                  405, "This request method is currently unsupported"),
        ];

        for (raw, status, body) in cases {
            with_request(raw, |req| {
                let resp = handle(req, &root);

                assert_eq!(resp.status().as_u16(), status, "{raw}");
                assert_eq!(owned(&resp), body.as_bytes(), "{raw}");
                assert_eq!(resp.get_content_type(), Some("text/plain"));
            });
        }
    }

    #[test]
    fn connection_follows_request() {
        let dir = TempDir::new().unwrap();
        let root = StaticRoot::open(dir.path()).unwrap();

        #[rustfmt::skip]
        let cases = [
            ("GET /api HTTP/1.1\r\nHost: x\r\n\r\n",                      false),
            ("GET /api HTTP/1.1\r\nConnection: close\r\n\r\n",            true),
            ("GET /api/none HTTP/1.1\r\nConnection: Close\r\n\r\n",       true),
            ("GET /missing HTTP/1.1\r\nConnection: close\r\n\r\n",        true),
            ("GET /missing HTTP/1.1\r\nConnection: keep-alive\r\n\r\n",   false),
        ];

        for (raw, should_close) in cases {
            with_request(raw, |req| {
                assert_eq!(handle(req, &root).should_close(), should_close, "{raw}");
            });
        }
    }

    #[test]
    fn static_branch() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();
        let root = StaticRoot::open(dir.path()).unwrap();

        with_request("GET / HTTP/1.1\r\nHost: x\r\n\r\n", |req| {
            let resp = handle(req, &root);
            assert_eq!(resp.status(), StatusCode::Ok);
            assert_eq!(resp.get_content_type(), Some("text/html"));
            assert_eq!(resp.content_length(), 11);
        });

        with_request("GET /nope.css HTTP/1.1\r\nHost: x\r\n\r\n", |req| {
            assert_eq!(handle(req, &root).status(), StatusCode::NotFound);
        });
    }
}
