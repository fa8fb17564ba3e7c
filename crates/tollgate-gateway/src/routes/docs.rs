//! API documentation page.

use axum::{response::Html, routing::get, Router};

use crate::pipeline::EndpointPolicy;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/docs", get(docs))
}

async fn docs() -> Html<String> {
    let rows: String = EndpointPolicy::standard()
        .rules()
        .iter()
        .map(|rule| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                rule.method, rule.template, rule.required
            )
        })
        .collect();

    Html(format!(
        "<!doctype html><html><head><title>Tollgate API</title></head><body>\
         <h1>Tollgate API</h1>\
         <p>Authenticate with <code>Authorization: Bearer &lt;token&gt;</code>, \
         <code>Authorization: ApiKey &lt;key&gt;</code> or <code>X-API-Key</code>.</p>\
         <table><tr><th>Method</th><th>Path</th><th>Scope</th></tr>{rows}</table>\
         </body></html>"
    ))
}
