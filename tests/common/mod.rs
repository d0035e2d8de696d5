#![allow(dead_code)]

pub mod resources {
    use brrtrest::{ApiError, ResourceArgs, ResourceDef, Response};
    use serde_json::{json, Value};

    #[derive(Default)]
    pub struct HelloWorld;

    /// `GET` answers `{"hello": "world"}`.
    pub fn hello_world() -> ResourceDef {
        ResourceDef::of::<HelloWorld>()
            .get(|_, _| Ok(json!({"hello": "world"}).into()))
            .build()
    }

    #[derive(Default)]
    pub struct Empty;

    /// `GET` answers an empty object.
    pub fn empty() -> ResourceDef {
        ResourceDef::of::<Empty>()
            .get(|_, _| Ok(json!({}).into()))
            .build()
    }

    pub struct Todo {
        pub owner: String,
    }

    /// Todo items; the owner comes from the `owner` registration argument.
    pub fn todo() -> ResourceDef {
        ResourceDef::builder(|args: &ResourceArgs| {
            let owner = args
                .kwarg("owner")
                .and_then(Value::as_str)
                .unwrap_or("nobody")
                .to_string();
            Ok::<_, ApiError>(Todo { owner })
        })
        .get(|todo, call| {
            let id = call.path_param("id").unwrap_or("all").to_string();
            Ok(json!({ "id": id, "owner": todo.owner }).into())
        })
        .post(|_, _| {
            Ok(brrtrest::Reply::with_status(json!({"created": true}), 201)
                .header("Location", "/todos/1"))
        })
        .build()
    }

    pub fn xml(payload: Value, status: u16, _headers: brrtrest::server::HeaderVec) -> Result<Response, ApiError> {
        Ok(Response::text(status, format!("<data>{payload}</data>")))
    }
}
