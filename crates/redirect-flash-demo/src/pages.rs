// File: src/pages.rs
// Purpose: Contact form handlers showing the flash-and-redirect round-trip

use crate::AppState;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use maud::{html, Markup, DOCTYPE};
use redirect_flash::{
    Cookie, InputValue, MessageBag, RedirectError, RedirectResponse, RequestContext, ViewErrorBag,
};

fn layout(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { (title) }
            }
            body {
                (content)
            }
        }
    }
}

fn old(ctx: &RequestContext, key: &str) -> String {
    ctx.session()
        .and_then(|s| s.old_input(Some(key)))
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn field_error(errors: &ViewErrorBag, key: &str) -> Markup {
    html! {
        @if let Some(message) = errors.first(key) {
            p.error { (message) }
        }
    }
}

pub async fn home(State(state): State<AppState>) -> Response {
    match state.redirector.to("/contact") {
        Ok(redirect) => redirect.into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn show_contact(ctx: RequestContext) -> Html<String> {
    let errors = ctx.session().map(|s| s.errors()).unwrap_or_default();

    let page = layout(
        "Contact",
        html! {
            h1 { "Contact us" }
            form #contact-form method="post" action="/contact" enctype="multipart/form-data" {
                label { "Name" input name="name" value=(old(&ctx, "name")); }
                (field_error(&errors, "name"))
                label { "Email" input name="email" value=(old(&ctx, "email")); }
                (field_error(&errors, "email"))
                label { "Message" textarea name="message" { (old(&ctx, "message")) } }
                (field_error(&errors, "message"))
                label { "Attachment" input type="file" name="attachment"; }
                button type="submit" { "Send" }
            }
        },
    );
    Html(page.into_string())
}

fn validate(ctx: &RequestContext) -> MessageBag {
    let text = |key: &str| {
        ctx.get(key)
            .and_then(InputValue::as_str)
            .map(str::trim)
            .unwrap_or("")
            .to_string()
    };

    let mut errors = MessageBag::new();
    errors.add_if(text("name").is_empty(), "name", "Name is required");
    errors.add_if(!text("email").contains('@'), "email", "Invalid email");
    errors.add_if(
        text("message").chars().count() < 10,
        "message",
        "Message must be at least 10 characters",
    );
    errors
}

fn contact_redirect<'r>(
    state: &AppState,
    ctx: &'r RequestContext,
    errors: &MessageBag,
) -> Result<RedirectResponse<'r>, RedirectError> {
    if errors.is_empty() {
        let attached = ctx.file("attachment").map(|f| f.file_name.clone());
        return Ok(state
            .redirector
            .to("/thanks")?
            .with_request(ctx)
            .with("status", "Thanks, we got your message")?
            .with("attachment", attached)?
            .with_cookie(Cookie::new("contacted", "1")));
    }

    Ok(state
        .redirector
        .back(ctx)?
        .with_errors(errors)?
        .only_input(&["name", "email", "message", "attachment"])?
        .with_fragment("contact-form"))
}

pub async fn store_contact(State(state): State<AppState>, ctx: RequestContext) -> Response {
    let errors = validate(&ctx);
    if !errors.is_empty() {
        tracing::info!("Contact form rejected with {} error(s)", errors.count());
    }

    match contact_redirect(&state, &ctx, &errors) {
        Ok(redirect) => redirect.into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn thanks(ctx: RequestContext) -> Html<String> {
    let status: Option<String> = ctx.session().and_then(|s| s.get("status"));
    let attachment: Option<String> = ctx.session().and_then(|s| s.get("attachment"));

    let page = layout(
        "Thanks",
        html! {
            @match status {
                Some(status) => p.status { (status) },
                None => p { "Nothing to see here." },
            }
            @if let Some(name) = attachment {
                p { "Received " (name) }
            }
            a href="/contact" { "Back to the form" }
        },
    );
    Html(page.into_string())
}
