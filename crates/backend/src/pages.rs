//! Server-rendered HTML pages.
//!
//! Pages are thin shells: poll content is filled in client-side from the
//! mount points below, so rendering only needs the session chrome and the
//! poll identifier.

use shared_types::Flash;

/// Per-request data every page shows.
pub struct PageContext<'a> {
    pub flashes: &'a [Flash],
    /// Email of the logged in user
    pub email: Option<&'a str>,
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(ctx: &PageContext<'_>, title: &str, body: &str) -> String {
    let nav = match ctx.email {
        Some(email) => format!(
            r#"<span class="user">{}</span> <a href="/dashboard">Dashboard</a> <a href="/logout">Logout</a>"#,
            escape(email)
        ),
        None => r#"<a href="/login">Login</a>"#.to_string(),
    };

    let flashes: String = ctx
        .flashes
        .iter()
        .map(|f| {
            format!(
                r#"<div class="flash flash-{}">{}</div>"#,
                f.kind.as_str(),
                escape(&f.message)
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - Votr</title>
<link rel="stylesheet" href="/static/css/votr.css">
</head>
<body>
<nav><a href="/">Votr</a> <a href="/new_poll">New poll</a> {nav}</nav>
{flashes}
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

pub fn home(ctx: &PageContext<'_>) -> String {
    let body = match ctx.email {
        Some(_) => r#"<h1>Welcome back</h1>
<p><a href="/new_poll">Create a poll</a> or head to your <a href="/dashboard">dashboard</a>.</p>"#
            .to_string(),
        None => r#"<h1>Votr</h1>
<p>Create polls and share them anywhere.</p>
<p><a class="button" href="/login">Sign in to get started</a></p>"#
            .to_string(),
    };
    layout(ctx, "Home", &body)
}

pub fn new_poll(ctx: &PageContext<'_>) -> String {
    let body = r#"<h1>New poll</h1>
<div id="new-poll"></div>"#;
    layout(ctx, "New poll", body)
}

pub fn poll(ctx: &PageContext<'_>, unique_id: &str) -> String {
    let body = format!(
        r#"<div id="poll" data-poll-id="{}"></div>"#,
        escape(unique_id)
    );
    layout(ctx, "Poll", &body)
}

/// Chrome-less poll widget meant for iframes.
pub fn embed(unique_id: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<link rel="stylesheet" href="/static/css/votr.css">
</head>
<body class="embed">
<div id="poll" data-poll-id="{}" data-embed="true"></div>
</body>
</html>
"#,
        escape(unique_id)
    )
}

pub fn dashboard(ctx: &PageContext<'_>) -> String {
    let body = r#"<h1>Dashboard</h1>
<div id="dashboard"></div>"#;
    layout(ctx, "Dashboard", body)
}
