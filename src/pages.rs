/// Server-rendered HTML pages
///
/// Small format!-based templates; no client-side state. Submitted values are
/// echoed back into form fields on validation failure, so everything user
/// controlled goes through `escape`.
use crate::validation::FieldError;

/// Escape text for interpolation into HTML bodies and attribute values
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{} · Vestibule</title>
</head>
<body>
<main>
{}
</main>
</body>
</html>"#,
        escape(title),
        body
    )
}

fn errors_html(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let items: String = errors
        .iter()
        .map(|e| format!("    <li class=\"error\">{}</li>\n", escape(&e.message)))
        .collect();

    format!("  <ul class=\"messages\">\n{}  </ul>\n", items)
}

fn notice_html(notice: Option<&str>) -> String {
    match notice.and_then(notice_text) {
        Some(text) => format!("  <p class=\"notice\">{}</p>\n", text),
        None => String::new(),
    }
}

/// Map a `notice` query parameter to its user-visible text
fn notice_text(code: &str) -> Option<&'static str> {
    match code {
        "registered" => {
            Some("Account created successfully. Check your email to activate your account.")
        }
        "activated" => Some("Account activated successfully. You can now log in."),
        "password-reset" => {
            Some("Password reset successfully. You can now log in with your new password.")
        }
        "logged-out" => Some("Logged out successfully."),
        _ => None,
    }
}

pub fn home_page(username: Option<&str>) -> String {
    let body = match username {
        Some(name) => format!(
            r#"  <h1>Welcome, {}</h1>
  <form method="post" action="/logout">
    <button type="submit">Log out</button>
  </form>
"#,
            escape(name)
        ),
        None => r#"  <h1>Welcome</h1>
  <p><a href="/login">Log in</a> or <a href="/register">register</a>.</p>
"#
        .to_string(),
    };

    layout("Home", &body)
}

pub fn register_page(errors: &[FieldError], email: &str, username: &str, name: &str) -> String {
    let body = format!(
        r#"  <h1>Register</h1>
{}  <form method="post" action="/register">
    <label>Email <input type="email" name="email" value="{}"></label>
    <label>Username <input type="text" name="username" value="{}"></label>
    <label>Full name <input type="text" name="name" value="{}"></label>
    <label>Password <input type="password" name="password"></label>
    <label>Confirm password <input type="password" name="password2"></label>
    <button type="submit">Register</button>
  </form>
  <p>Already have an account? <a href="/login">Log in</a>.</p>
"#,
        errors_html(errors),
        escape(email),
        escape(username),
        escape(name)
    );

    layout("Register", &body)
}

pub fn login_page(errors: &[FieldError], username: &str, notice: Option<&str>) -> String {
    let body = format!(
        r#"  <h1>Log in</h1>
{}{}  <form method="post" action="/login">
    <label>Username <input type="text" name="username" value="{}"></label>
    <label>Password <input type="password" name="password"></label>
    <button type="submit">Log in</button>
  </form>
  <p><a href="/request-reset-email">Forgot your password?</a></p>
  <p>No account yet? <a href="/register">Register</a>.</p>
"#,
        notice_html(notice),
        errors_html(errors),
        escape(username)
    );

    layout("Log in", &body)
}

pub fn activation_failed_page() -> String {
    let body = r#"  <h1>Activation failed</h1>
  <p class="error">The activation link is invalid or has expired.</p>
  <p><a href="/register">Register again</a> to receive a new link.</p>
"#;

    layout("Activation failed", body)
}

fn request_reset_form(extra: &str) -> String {
    format!(
        r#"  <h1>Reset your password</h1>
{}  <form method="post" action="/request-reset-email">
    <label>Email <input type="email" name="email"></label>
    <button type="submit">Send reset link</button>
  </form>
  <p><a href="/login">Back to login</a></p>
"#,
        extra
    )
}

pub fn request_reset_page(error: Option<&str>) -> String {
    let extra = match error {
        Some(message) => format!("  <p class=\"error\">{}</p>\n", escape(message)),
        None => String::new(),
    };

    layout("Reset password", &request_reset_form(&extra))
}

/// Rendered identically whether or not the email matched an account
pub fn reset_email_sent_page() -> String {
    let extra =
        "  <p class=\"notice\">We have sent you an email with instructions on how to reset your password.</p>\n";

    layout("Reset password", &request_reset_form(extra))
}

pub fn reset_link_invalid_page() -> String {
    let extra =
        "  <p class=\"error\">The password reset link is invalid. Please request a new one.</p>\n";

    layout("Reset password", &request_reset_form(extra))
}

pub fn set_new_password_page(uid: &str, token: &str, errors: &[FieldError]) -> String {
    let body = format!(
        r#"  <h1>Set a new password</h1>
{}  <form method="post" action="/set-new-password/{}/{}">
    <label>New password <input type="password" name="password"></label>
    <label>Confirm password <input type="password" name="password2"></label>
    <button type="submit">Set password</button>
  </form>
"#,
        errors_html(errors),
        escape(uid),
        escape(token)
    );

    layout("Set new password", &body)
}

pub fn error_page(message: &str) -> String {
    let body = format!(
        r#"  <h1>Error</h1>
  <p class="error">{}</p>
  <p><a href="/">Back to home</a></p>
"#,
        escape(message)
    );

    layout("Error", &body)
}

pub fn not_found_page() -> String {
    let body = r#"  <h1>Page not found</h1>
  <p><a href="/">Back to home</a></p>
"#;

    layout("Not found", body)
}
