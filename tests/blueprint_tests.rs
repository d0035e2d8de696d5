use brrtrest::{
    Api, ApiError, App, Blueprint, BlueprintOptions, RegisterOptions, Request, ResourceDef,
    UrlPartOrder,
};
use serde_json::json;

mod common;
use common::resources::{empty, hello_world};

fn hello() -> RegisterOptions {
    RegisterOptions::endpoint("hello")
}

fn rules(app: &App) -> Vec<(String, String)> {
    app.url_map()
}

#[test]
fn test_api_prefix_inside_blueprint() {
    let app = App::new("app");
    let bp = Blueprint::new("test");
    let api = Api::builder().prefix("/api").build();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&hello_world(), &["/hi"], hello()).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    assert_eq!(
        rules(&app),
        vec![("/api/hi".to_string(), "test.hello".to_string())]
    );
    let resp = app.handle(Request::get("/api/hi"));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body_json(), Some(json!({"hello": "world"})));
}

#[test]
fn test_blueprint_prefix() {
    let app = App::new("app");
    let bp = Blueprint::new("test").url_prefix("/bp");
    let api = Api::default();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&hello_world(), &["/hi"], hello()).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    assert_eq!(
        rules(&app),
        vec![("/bp/hi".to_string(), "test.hello".to_string())]
    );
}

#[test]
fn test_registration_prefix_overrides_blueprint_prefix() {
    let app = App::new("app");
    let bp = Blueprint::new("test").url_prefix("/bp");
    let api = Api::default();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&hello_world(), &["/hi"], hello()).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::url_prefix("/reg"))
        .unwrap();

    assert_eq!(rules(&app)[0].0, "/reg/hi");
    assert_eq!(app.handle(Request::get("/reg/hi")).status, 200);
    assert_eq!(app.handle(Request::get("/bp/hi")).status, 404);
}

#[test]
fn test_default_part_order_is_blueprint_api_endpoint() {
    let app = App::new("app");
    let bp = Blueprint::new("test").url_prefix("/bp");
    let api = Api::builder().prefix("/api").build();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&hello_world(), &["/hi"], hello()).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    assert_eq!(rules(&app)[0].0, "/bp/api/hi");
}

#[test]
fn test_custom_part_order() {
    let app = App::new("app");
    let bp = Blueprint::new("test").url_prefix("/bp");
    let order: UrlPartOrder = "aeb".parse().unwrap();
    let api = Api::builder().prefix("/api").url_part_order(order).build();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&hello_world(), &["/hi"], hello()).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    assert_eq!(rules(&app)[0].0, "/api/hi/bp");
}

#[test]
fn test_resources_added_before_init_blueprint() {
    let app = App::new("app");
    let bp = Blueprint::new("test").url_prefix("/bp");
    let api = Api::builder().prefix("/api").build();
    api.add_resource(&hello_world(), &["/hi"], hello()).unwrap();
    api.init_blueprint(&bp).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    assert_eq!(
        rules(&app),
        vec![("/bp/api/hi".to_string(), "test.hello".to_string())]
    );
}

#[test]
fn test_resources_added_after_blueprint_registration_keep_prefixes() {
    let app = App::new("app");
    let bp = Blueprint::new("test").url_prefix("/bp");
    let api = Api::builder().prefix("/api").build();
    api.init_blueprint(&bp).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();
    assert!(rules(&app).is_empty());

    api.add_resource(&empty(), &["/late"], RegisterOptions::default())
        .unwrap();
    assert_eq!(
        rules(&app),
        vec![("/bp/api/late".to_string(), "test.empty".to_string())]
    );
    assert_eq!(app.handle(Request::get("/bp/api/late")).status, 200);
}

#[test]
fn test_nothing_is_routed_before_blueprint_registration() {
    let app = App::new("app");
    let bp = Blueprint::new("test");
    let api = Api::default();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&hello_world(), &["/hi"], hello()).unwrap();

    assert!(rules(&app).is_empty());
    assert_eq!(app.handle(Request::get("/hi")).status, 404);
    assert!(matches!(
        api.url_for(&hello_world(), &[]),
        Err(ApiError::Unbound)
    ));
}

#[test]
fn test_url_for_goes_through_the_app() {
    let app = App::new("app");
    let bp = Blueprint::new("test").url_prefix("/bp");
    let api = Api::builder().prefix("/api").build();
    let hello_def = hello_world();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&hello_def, &["/hi"], hello()).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    assert_eq!(api.url_for(&hello_def, &[]).unwrap(), "/bp/api/hi");
    assert_eq!(app.url_for("test.hello", &[]).unwrap(), "/bp/api/hi");
}

#[test]
fn test_blueprint_url_defaults_fill_placeholders() {
    #[derive(Default)]
    struct Page;
    let page = ResourceDef::of::<Page>()
        .get(|_, call| Ok(json!({ "lang": call.path_param("lang") }).into()))
        .build();

    let app = App::new("app");
    let bp = Blueprint::new("docs").url_default("lang", "en");
    let api = Api::default();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&page, &["/{lang}/page"], RegisterOptions::default())
        .unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    assert_eq!(api.url_for(&page, &[]).unwrap(), "/en/page");
    let resp = app.handle(Request::get("/fr/page"));
    assert_eq!(resp.body_json(), Some(json!({"lang": "fr"})));
}

#[test]
fn test_errors_inside_blueprint_are_rendered_by_the_api() {
    #[derive(Default)]
    struct Gone;
    let gone = ResourceDef::of::<Gone>()
        .get(|_, _| Err(ApiError::abort(404)))
        .build();

    let app = App::new("app");
    let bp = Blueprint::new("test");
    let api = Api::default();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&gone, &["/gone"], RegisterOptions::default())
        .unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    let resp = app.handle(Request::get("/gone"));
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body_json(), Some(json!({"message": "Not Found"})));
    assert_eq!(api.endpoints(), vec!["test.gone"]);
}

#[test]
fn test_second_blueprint_registration_fails() {
    let app = App::new("app");
    let bp = Blueprint::new("test");
    let api = Api::default();
    api.init_blueprint(&bp).unwrap();
    api.add_resource(&hello_world(), &["/hi"], hello()).unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    let err = app
        .register_blueprint(&bp, BlueprintOptions::url_prefix("/again"))
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::AlreadyRegistered {
            mount: "test".to_string()
        }
    );
    assert_eq!(rules(&app).len(), 1);
}

#[test]
fn test_init_blueprint_twice_fails() {
    let bp = Blueprint::new("test");
    let other = Blueprint::new("other");
    let api = Api::default();
    api.init_blueprint(&bp).unwrap();
    assert!(matches!(
        api.init_blueprint(&other),
        Err(ApiError::AlreadyRegistered { .. })
    ));
    assert!(matches!(
        api.init_app(&App::new("app")),
        Err(ApiError::AlreadyRegistered { .. })
    ));
}

#[test]
fn test_two_apis_share_one_blueprint() {
    let app = App::new("app");
    let bp = Blueprint::new("test").url_prefix("/bp");
    let v1 = Api::builder().prefix("/v1").build();
    let v2 = Api::builder().prefix("/v2").build();
    v1.init_blueprint(&bp).unwrap();
    v2.init_blueprint(&bp).unwrap();
    v1.add_resource(&hello_world(), &["/hi"], RegisterOptions::endpoint("hello_v1"))
        .unwrap();
    v2.add_resource(&hello_world(), &["/hi"], RegisterOptions::endpoint("hello_v2"))
        .unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    let mut paths: Vec<String> = rules(&app).into_iter().map(|(rule, _)| rule).collect();
    paths.sort();
    assert_eq!(paths, vec!["/bp/v1/hi", "/bp/v2/hi"]);
    assert_eq!(app.handle(Request::get("/bp/v2/hi")).status, 200);
}

#[test]
fn test_blueprint_records_rules_of_plain_views() {
    use brrtrest::resource::View;
    use brrtrest::{RouteOptions, RoutePath, RouteSink};
    use http::Method;

    let app = App::new("app");
    let bp = Blueprint::new("static").url_prefix("/static");
    let view = View::new("ping", vec![Method::GET], |_request: &Request| {
        Ok(json!("pong").into())
    });
    bp.add_url_rule(RoutePath::from("/ping"), "ping", view, RouteOptions::default())
        .unwrap();
    app.register_blueprint(&bp, BlueprintOptions::default())
        .unwrap();

    assert_eq!(
        rules(&app),
        vec![("/static/ping".to_string(), "static.ping".to_string())]
    );
    assert_eq!(app.handle(Request::get("/static/ping")).body_text(), "pong");
}
