//! HTTP rendering of service outcomes.

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};
use interactor_core::Outcome;
use serde_json::json;

/// Renders `outcome` as a JSON response.
///
/// Success bodies are `{"success": true, "data": ...}` with `success_code`;
/// failure bodies are `{"success": false, "errors": {...}, "error_messages": [...]}`
/// with `failure_code`.
#[must_use]
pub fn respond_with(
    outcome: &Outcome,
    success_code: StatusCode,
    failure_code: StatusCode,
) -> Response<String> {
    let (status, body) = if outcome.success() {
        let data = outcome
            .data()
            .map_or(serde_json::Value::Null, serde_json::Value::from);
        (success_code, json!({ "success": true, "data": data }))
    } else {
        (
            failure_code,
            json!({
                "success": false,
                "errors": outcome.errors(),
                "error_messages": outcome.error_messages(),
            }),
        )
    };

    let mut response = Response::new(body.to_string());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use interactor_core::validation::presence;
    use interactor_core::{args, ServiceClass, Value};

    use super::*;

    fn echo() -> std::sync::Arc<ServiceClass> {
        ServiceClass::define("Echo", |d| {
            d.input("text");
            d.validates(presence("text"));
            d.perform(|ctx| Ok(ctx.get("text").cloned().unwrap_or(Value::Null)));
        })
        .unwrap()
    }

    fn body(response: &Response<String>) -> serde_json::Value {
        serde_json::from_str(response.body()).unwrap()
    }

    #[test]
    fn success_renders_data_with_success_code() {
        let outcome = echo().call(args([("text", "hi")])).unwrap();
        let response = respond_with(&outcome, StatusCode::CREATED, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body(&response), json!({ "success": true, "data": "hi" }));
    }

    #[test]
    fn failure_renders_errors_with_failure_code() {
        let outcome = echo().call(args([("text", "")])).unwrap();
        let response = respond_with(&outcome, StatusCode::OK, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body(&response);
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"]["text"][0], "can't be blank");
        assert_eq!(body["error_messages"][0], "Text can't be blank");
    }
}
