use brrtrest::resource::{view_decorator, view_fn, ViewDecorator, ViewFn};
use brrtrest::{
    Api, ApiError, App, ErrorSpec, RegisterOptions, Request, ResourceArgs, ResourceDef,
};
use http::Method;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

mod common;
use common::resources::{empty, hello_world, todo, xml};

fn serve(api: &Api) -> App {
    let app = App::new("test");
    api.init_app(&app).unwrap();
    app
}

fn recording(label: &'static str, trace: &Arc<Mutex<Vec<&'static str>>>) -> ViewDecorator {
    let trace = Arc::clone(trace);
    view_decorator(move |inner: ViewFn| {
        let trace = Arc::clone(&trace);
        view_fn(move |request: &Request| {
            trace.lock().push(label);
            inner(request)
        })
    })
}

#[test]
fn test_get_is_rendered_as_json() {
    let api = Api::default();
    api.add_resource(&hello_world(), &["/", "/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    for path in ["/", "/hello"] {
        let resp = app.handle(Request::get(path).accept("application/json"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.get_header("content-type"), Some("application/json"));
        assert_eq!(resp.body_text(), r#"{"hello":"world"}"#);
    }
}

#[test]
fn test_empty_payload_is_an_empty_object() {
    let api = Api::default();
    api.add_resource(&empty(), &["/empty"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/empty"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_text(), "{}");
}

#[test]
fn test_unacceptable_type_falls_back_to_default() {
    let api = Api::default();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/hello").accept("application/xml"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
}

#[test]
fn test_unacceptable_type_without_default_is_406() {
    let api = Api::builder().default_mediatype(None).build();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/hello").accept("application/xml"));
    assert_eq!(resp.status, 406);
    // the error itself is rendered with the first registered representation
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
    let body = resp.body_json().unwrap();
    assert!(body["message"].as_str().unwrap().contains("not acceptable"));
}

#[test]
fn test_registered_representation_is_negotiated() {
    let api = Api::default();
    api.representation("application/xml", xml);
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/hello").accept("application/xml"));
    assert_eq!(resp.get_header("content-type"), Some("application/xml"));
    assert_eq!(resp.body_text(), r#"<data>{"hello":"world"}</data>"#);

    let resp = app.handle(Request::get("/hello").accept("application/xml;q=0.5, application/json"));
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
}

#[test]
fn test_equal_quality_prefers_registration_order() {
    let api = Api::builder().representation("application/xml", xml).build();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/hello").accept("application/xml, application/json"));
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
}

#[test]
fn test_status_and_headers_reach_the_response() {
    let api = Api::default();
    api.add_resource(&todo(), &["/todos"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::new(Method::POST, "/todos"));
    assert_eq!(resp.status, 201);
    assert_eq!(resp.get_header("location"), Some("/todos/1"));
    assert_eq!(resp.body_json(), Some(json!({"created": true})));
}

#[test]
fn test_registration_args_build_the_instance() {
    let api = Api::builder().prefix("/api").build();
    let options = RegisterOptions::endpoint("todo")
        .with_args(ResourceArgs::default().named("owner", "ada"));
    api.add_resource(&todo(), &["/todos/{id}"], options).unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/api/todos/42"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_json(), Some(json!({"id": "42", "owner": "ada"})));
}

#[test]
fn test_unauthorized_carries_challenge() {
    #[derive(Default)]
    struct Secret;
    let secret = ResourceDef::of::<Secret>()
        .get(|_, _| Err(ApiError::abort(401)))
        .build();

    let api = Api::builder()
        .serve_challenge_on_401(true)
        .realm("test")
        .build();
    api.add_resource(&secret, &["/secret"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/secret"));
    assert_eq!(resp.status, 401);
    assert_eq!(resp.get_header("www-authenticate"), Some("Basic realm=\"test\""));
    assert_eq!(resp.body_json(), Some(json!({"message": "Unauthorized"})));
}

#[test]
fn test_no_challenge_unless_enabled() {
    #[derive(Default)]
    struct Secret;
    let secret = ResourceDef::of::<Secret>()
        .get(|_, _| Err(ApiError::abort(401)))
        .build();

    let api = Api::default();
    api.add_resource(&secret, &["/secret"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/secret"));
    assert_eq!(resp.status, 401);
    assert!(resp.get_header("www-authenticate").is_none());
}

#[test]
fn test_custom_error_map() {
    #[derive(Default)]
    struct Taken;
    let taken = ResourceDef::of::<Taken>()
        .post(|_, _| Err(ApiError::abort(409)))
        .build();

    let api = Api::builder()
        .error(
            "Conflict",
            ErrorSpec::new()
                .message("A user with that username already exists.")
                .status(409)
                .field("extra", "here"),
        )
        .build();
    api.add_resource(&taken, &["/users"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::new(Method::POST, "/users"));
    assert_eq!(resp.status, 409);
    assert_eq!(
        resp.body_json(),
        Some(json!({
            "message": "A user with that username already exists.",
            "extra": "here"
        }))
    );
}

#[test]
fn test_handler_failure_is_rendered_by_the_api() {
    #[derive(Default)]
    struct Broken;
    let broken = ResourceDef::of::<Broken>()
        .get(|_, _| Err(ApiError::internal("database unavailable")))
        .build();

    let api = Api::default();
    api.add_resource(&broken, &["/broken"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/broken"));
    assert_eq!(resp.status, 500);
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
    let body = resp.body_json().unwrap();
    assert!(body["message"].as_str().unwrap().contains("database unavailable"));
}

#[test]
fn test_unknown_routes_are_left_to_the_host() {
    let api = Api::default();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/missing"));
    assert_eq!(resp.status, 404);
    let body = resp.body_json().unwrap();
    assert!(body.get("error").is_some());
    assert!(body.get("message").is_none());
}

#[test]
fn test_catch_all_404s() {
    let api = Api::builder().catch_all_404s(true).build();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/missing"));
    assert_eq!(resp.status, 404);
    let body = resp.body_json().unwrap();
    assert!(body.get("message").is_some());
}

#[test]
fn test_errors_of_foreign_endpoints_are_left_to_the_host() {
    let api = Api::default();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);
    app.route("/plain", "plain", vec![Method::GET], |_request: &Request| {
        Err(ApiError::abort(418))
    })
    .unwrap();

    let resp = app.handle(Request::get("/plain"));
    assert_eq!(resp.status, 418);
    assert!(resp.body_json().unwrap().get("error").is_some());
}

#[test]
fn test_decorators_wrap_every_resource() {
    let trace = Arc::new(Mutex::new(Vec::new()));
    let api = Api::builder()
        .decorator(recording("first", &trace))
        .decorator(recording("second", &trace))
        .build();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/hello"));
    assert_eq!(resp.status, 200);
    // the last decorator listed is the outermost
    assert_eq!(*trace.lock(), vec!["second", "first"]);
}

#[test]
fn test_head_is_served_by_get_without_body() {
    let api = Api::default();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::new(Method::HEAD, "/hello"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
    assert!(resp.body.is_empty());
}

#[test]
fn test_unimplemented_verb_is_405() {
    let api = Api::default();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::new(Method::DELETE, "/hello"));
    assert_eq!(resp.status, 405);
    let allow = resp.get_header("allow").unwrap();
    assert!(allow.contains("GET"));
    assert!(allow.contains("HEAD"));
}

#[test]
fn test_resource_representation_wins_over_api() {
    #[derive(Default)]
    struct Report;
    let report = ResourceDef::of::<Report>()
        .get(|_, _| Ok(json!({"rows": 2}).into()))
        .representation("text/csv", |payload: Value, status, _| {
            Ok(brrtrest::Response::text(status, format!("rows\n{}", payload["rows"])))
        })
        .build();

    let api = Api::default();
    api.add_resource(&report, &["/report"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/report").accept("text/csv"));
    assert_eq!(resp.get_header("content-type"), Some("text/csv"));
    assert_eq!(resp.body_text(), "rows\n2");

    let resp = app.handle(Request::get("/report").accept("application/json"));
    assert_eq!(resp.body_text(), r#"{"rows":2}"#);
}

#[test]
fn test_resources_queue_until_init() {
    let app = App::new("test");
    let api = Api::builder().prefix("/v1").build();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    assert!(app.url_map().is_empty());

    api.init_app(&app).unwrap();
    assert_eq!(
        app.url_map(),
        vec![("/v1/hello".to_string(), "helloworld".to_string())]
    );

    api.add_resource(&empty(), &["/empty"], RegisterOptions::default())
        .unwrap();
    assert_eq!(app.url_map().len(), 2);
    assert_eq!(api.endpoints(), vec!["empty", "helloworld"]);
}

#[test]
fn test_init_app_twice_fails() {
    let api = Api::default();
    let app = serve(&api);
    assert!(matches!(
        api.init_app(&app),
        Err(ApiError::AlreadyRegistered { .. })
    ));
}

#[test]
fn test_url_for_resource() {
    let api = Api::builder().prefix("/api").build();
    let todo = todo();
    api.add_resource(&todo, &["/todos/{id}"], RegisterOptions::default())
        .unwrap();
    let _app = serve(&api);

    let url = api
        .url_for(&todo, &[("id".to_string(), "3".to_string())])
        .unwrap();
    assert_eq!(url, "/api/todos/3");

    let url = api
        .url_for(
            &todo,
            &[
                ("id".to_string(), "3".to_string()),
                ("page".to_string(), "2".to_string()),
            ],
        )
        .unwrap();
    assert_eq!(url, "/api/todos/3?page=2");
}

#[test]
fn test_endpoint_conflict() {
    let api = Api::default();
    let _app = serve(&api);
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::endpoint("shared"))
        .unwrap();

    let err = api
        .add_resource(&empty(), &["/empty"], RegisterOptions::endpoint("shared"))
        .unwrap_err();
    match err {
        ApiError::EndpointConflict {
            endpoint,
            existing,
            attempted,
        } => {
            assert_eq!(endpoint, "shared");
            assert_eq!(existing, "HelloWorld");
            assert_eq!(attempted, "Empty");
        }
        other => panic!("expected EndpointConflict, got {other:?}"),
    }
}

#[test]
fn test_same_resource_under_more_urls_is_not_a_conflict() {
    let api = Api::default();
    let app = serve(&api);
    let hello = hello_world();
    api.add_resource(&hello, &["/hello"], RegisterOptions::endpoint("hello"))
        .unwrap();
    api.add_resource(&hello, &["/hi"], RegisterOptions::endpoint("hello"))
        .unwrap();

    assert_eq!(app.handle(Request::get("/hello")).status, 200);
    assert_eq!(app.handle(Request::get("/hi")).status, 200);
}

#[test]
fn test_endpoint_taken_by_plain_view_conflicts() {
    let api = Api::default();
    let app = serve(&api);
    app.route("/plain", "plain", vec![Method::GET], |_request: &Request| {
        Ok(json!("plain").into())
    })
    .unwrap();

    let err = api
        .add_resource(&hello_world(), &["/hello"], RegisterOptions::endpoint("plain"))
        .unwrap_err();
    assert!(matches!(err, ApiError::EndpointConflict { .. }));
}

#[test]
fn test_resource_decorator_form() {
    let api = Api::default();
    let app = serve(&api);

    let hello = api.resource(&["/decorated"], RegisterOptions::default())(hello_world()).unwrap();
    assert_eq!(hello.name(), "HelloWorld");
    assert_eq!(app.handle(Request::get("/decorated")).status, 200);
}

#[test]
fn test_mediatypes_by_quality() {
    let api = Api::default();
    let req = Request::get("/").accept("text/html;q=0.2, application/json, application/xml;q=0.9");
    assert_eq!(
        api.mediatypes(&req),
        vec!["application/json", "application/xml", "text/html"]
    );
}

#[test]
fn test_string_payload_is_json_encoded() {
    #[derive(Default)]
    struct Greeting;
    let greeting = ResourceDef::of::<Greeting>()
        .get(|_, _| Ok(json!("hi").into()))
        .build();

    let api = Api::default();
    api.add_resource(&greeting, &["/greeting"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    assert_eq!(app.handle(Request::get("/greeting")).body_text(), "\"hi\"");
}

#[test]
fn test_repeated_handler_headers_are_all_sent() {
    #[derive(Default)]
    struct Login;
    let login = ResourceDef::of::<Login>()
        .get(|_, _| {
            Ok(brrtrest::Reply::data(json!({}))
                .header("Set-Cookie", "a=1")
                .header("Set-Cookie", "b=2"))
        })
        .build();
    let api = Api::default();
    api.add_resource(&login, &["/login"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/login"));
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.get_headers("set-cookie").collect::<Vec<_>>(),
        vec!["a=1", "b=2"]
    );
}

#[test]
fn test_mixed_case_default_mediatype_is_served() {
    let api = Api::builder()
        .default_mediatype(Some("Application/JSON"))
        .build();
    api.add_resource(&hello_world(), &["/hello"], RegisterOptions::default())
        .unwrap();
    let app = serve(&api);

    let resp = app.handle(Request::get("/hello").accept("application/xml"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.get_header("content-type"), Some("application/json"));
    assert_eq!(resp.body_json(), Some(json!({"hello": "world"})));
}
