//! HTML pages rendered with `format!` — no templating engine.
//!
//! Every piece of user-supplied content passes through `escape` before it is
//! interpolated. Post bodies keep their line breaks via `<br>`.

use crate::store::{Comment, Post, User};

/// Escape text for interpolation into HTML.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escaped content with newlines turned into `<br>`.
fn multiline(text: &str) -> String {
    escape(text).replace('\n', "<br>")
}

fn fmt_date(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn base_style() -> &'static str {
    r#"
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
        font-family: Georgia, 'Times New Roman', serif;
        background: #fafaf7; color: #2b2b2b;
        max-width: 720px; margin: 0 auto; padding: 24px 16px;
    }
    nav { display: flex; gap: 16px; align-items: baseline; margin-bottom: 32px;
          border-bottom: 2px solid #2b2b2b; padding-bottom: 12px; }
    nav .brand { font-size: 24px; font-weight: 700; }
    nav a { color: #2b2b2b; text-decoration: none; font-size: 15px; }
    nav a:hover { text-decoration: underline; }
    nav .spacer { flex: 1; }
    .post { margin-bottom: 28px; }
    .post h2 { font-size: 22px; margin-bottom: 4px; }
    .post h2 a { color: #2b2b2b; text-decoration: none; }
    .post h2 a:hover { text-decoration: underline; }
    .meta { font-size: 13px; color: #777; margin-bottom: 8px; }
    .content { font-size: 16px; line-height: 1.6; }
    .error { background: #fdeaea; color: #a33; border: 1px solid #e6b8b8;
             padding: 10px 14px; border-radius: 4px; font-size: 14px; margin-bottom: 16px; }
    .form-group { margin-bottom: 14px; }
    .form-group label { display: block; font-size: 14px; margin-bottom: 4px; }
    .form-group input, .form-group textarea {
        width: 100%; padding: 8px 10px; border: 1px solid #bbb;
        border-radius: 4px; font-size: 15px; font-family: inherit;
    }
    .form-group textarea { min-height: 180px; }
    .btn { padding: 8px 18px; border: 1px solid #2b2b2b; border-radius: 4px;
           background: #2b2b2b; color: #fff; font-size: 14px; cursor: pointer; }
    .btn:hover { background: #555; }
    .btn-plain { background: transparent; color: #2b2b2b; }
    .actions { display: flex; gap: 8px; margin: 12px 0; }
    .actions form { display: inline; }
    .comment { border-left: 3px solid #ddd; padding: 6px 12px; margin-bottom: 12px; }
    .comment .meta { margin-bottom: 2px; }
    .muted { color: #777; font-size: 14px; }
    "#
}

/// Shared page shell: HTML head, stylesheet, and navigation bar.
fn layout(title: &str, viewer: Option<&User>, body: &str) -> String {
    let account_links = match viewer {
        Some(user) => format!(
            r#"<span class="muted">{}</span> <a href="/dashboard">Dashboard</a> <a href="/logout">Log out</a>"#,
            escape(&user.username)
        ),
        None => r#"<a href="/login">Log in</a> <a href="/signup">Sign up</a>"#.to_owned(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title} - inkpost</title>
<style>{style}</style>
</head><body>
<nav>
  <span class="brand"><a href="/blog">inkpost</a></span>
  <a href="/blog">Blog</a>
  <a href="/blog/newpost">New post</a>
  <span class="spacer"></span>
  {account_links}
</nav>
{body}
</body></html>"#,
        title = escape(title),
        style = base_style(),
    )
}

fn error_block(error: Option<&str>) -> String {
    error
        .map(|e| format!(r#"<div class="error">{}</div>"#, escape(e)))
        .unwrap_or_default()
}

fn post_summary(post: &Post) -> String {
    let updated = if post.last_modified != post.created_at {
        format!(" (updated {})", fmt_date(post.last_modified))
    } else {
        String::new()
    };
    format!(
        r#"<div class="post">
  <h2><a href="/blog/{id}">{subject}</a></h2>
  <div class="meta">by {author} on {date}{updated}</div>
  <div class="content">{content}</div>
</div>"#,
        id = post.id,
        subject = escape(&post.subject),
        author = escape(&post.author_name),
        date = fmt_date(post.created_at),
        content = multiline(&post.content),
    )
}

/// GET /blog — front page.
pub fn render_front(viewer: Option<&User>, posts: &[Post]) -> String {
    let body = if posts.is_empty() {
        r#"<p class="muted">Nothing here yet. Be the first to write something.</p>"#.to_owned()
    } else {
        posts.iter().map(post_summary).collect::<Vec<_>>().join("\n")
    };
    layout("Blog", viewer, &body)
}

/// GET /blog/{id} — permalink with comments and likes.
pub fn render_post(
    viewer: Option<&User>,
    post: &Post,
    comments: &[Comment],
    like_count: i64,
    viewer_liked: bool,
    error: Option<&str>,
) -> String {
    let mut actions = String::new();
    if let Some(user) = viewer {
        if user.id == post.author_id {
            actions = format!(
                r#"<div class="actions">
  <a class="btn btn-plain" href="/blog/{id}/edit">Edit</a>
  <form method="POST" action="/blog/{id}/delete"><button class="btn" type="submit">Delete</button></form>
</div>"#,
                id = post.id,
            );
        } else {
            let (action, label) = if viewer_liked {
                ("unlike", "Unlike")
            } else {
                ("like", "Like")
            };
            actions = format!(
                r#"<div class="actions">
  <form method="POST" action="/blog/{id}/{action}"><button class="btn btn-plain" type="submit">{label}</button></form>
</div>"#,
                id = post.id,
            );
        }
    }

    let comment_list = comments
        .iter()
        .map(|c| {
            let delete = if viewer.is_some_and(|u| u.id == c.author_id) {
                format!(
                    r#" <form method="POST" action="/comment/{}/delete" style="display:inline"><button class="btn btn-plain" type="submit">delete</button></form>"#,
                    c.id
                )
            } else {
                String::new()
            };
            format!(
                r#"<div class="comment">
  <div class="meta">{author} on {date}{delete}</div>
  <div class="content">{content}</div>
</div>"#,
                author = escape(&c.author_name),
                date = fmt_date(c.created_at),
                content = multiline(&c.content),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let comment_form = if viewer.is_some() {
        format!(
            r#"<form method="POST" action="/blog/{}/comment">
  <div class="form-group"><textarea name="content" style="min-height:80px" placeholder="Add a comment"></textarea></div>
  <button class="btn" type="submit">Comment</button>
</form>"#,
            post.id
        )
    } else {
        r#"<p class="muted"><a href="/login">Log in</a> to comment.</p>"#.to_owned()
    };

    let body = format!(
        r#"{error}{summary}
<div class="meta">{likes} like(s)</div>
{actions}
<h3>Comments</h3>
{comment_list}
{comment_form}"#,
        error = error_block(error),
        summary = post_summary(post),
        likes = like_count,
    );
    layout(&post.subject, viewer, &body)
}

/// Shared form for new-post and edit-post pages.
pub fn render_post_form(
    viewer: &User,
    title: &str,
    action: &str,
    subject: &str,
    content: &str,
    error: Option<&str>,
) -> String {
    let body = format!(
        r#"{error}<h2>{title}</h2>
<form method="POST" action="{action}">
  <div class="form-group">
    <label>Subject</label>
    <input type="text" name="subject" value="{subject}">
  </div>
  <div class="form-group">
    <label>Content</label>
    <textarea name="content">{content}</textarea>
  </div>
  <button class="btn" type="submit">Save</button>
</form>"#,
        error = error_block(error),
        title = escape(title),
        action = escape(action),
        subject = escape(subject),
        content = escape(content),
    );
    layout(title, Some(viewer), &body)
}

/// GET /signup — registration form, re-rendered with an error on failure.
pub fn render_signup(username: &str, email: &str, error: Option<&str>) -> String {
    let body = format!(
        r#"{error}<h2>Sign up</h2>
<form method="POST" action="/signup">
  <div class="form-group">
    <label>Username</label>
    <input type="text" name="username" value="{username}" autocomplete="username">
  </div>
  <div class="form-group">
    <label>Password</label>
    <input type="password" name="password" autocomplete="new-password">
  </div>
  <div class="form-group">
    <label>Confirm password</label>
    <input type="password" name="verify" autocomplete="new-password">
  </div>
  <div class="form-group">
    <label>Email (optional)</label>
    <input type="text" name="email" value="{email}">
  </div>
  <button class="btn" type="submit">Create account</button>
</form>
<p class="muted">Already have an account? <a href="/login">Log in</a></p>"#,
        error = error_block(error),
        username = escape(username),
        email = escape(email),
    );
    layout("Sign up", None, &body)
}

/// GET /login — login form, re-rendered with an error on failure.
pub fn render_login(error: Option<&str>) -> String {
    let body = format!(
        r#"{error}<h2>Log in</h2>
<form method="POST" action="/login">
  <div class="form-group">
    <label>Username</label>
    <input type="text" name="username" autocomplete="username">
  </div>
  <div class="form-group">
    <label>Password</label>
    <input type="password" name="password" autocomplete="current-password">
  </div>
  <button class="btn" type="submit">Log in</button>
</form>
<p class="muted">No account yet? <a href="/signup">Sign up</a></p>"#,
        error = error_block(error),
    );
    layout("Log in", None, &body)
}

/// GET /dashboard — the user's own posts.
pub fn render_dashboard(user: &User, posts: &[Post]) -> String {
    let list = if posts.is_empty() {
        r#"<p class="muted">You haven't written anything yet. <a href="/blog/newpost">Write your first post.</a></p>"#
            .to_owned()
    } else {
        posts.iter().map(post_summary).collect::<Vec<_>>().join("\n")
    };
    let body = format!(
        "<h2>Welcome, {}!</h2>\n<p class=\"muted\">Member since {}</p>\n{list}",
        escape(&user.username),
        fmt_date(user.created_at),
    );
    layout("Dashboard", Some(user), &body)
}

/// Plain status pages.
pub fn render_message(title: &str, message: &str) -> String {
    let body = format!(
        "<h2>{}</h2>\n<p class=\"muted\">{}</p>",
        escape(title),
        escape(message)
    );
    layout(title, None, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: i64, name: &str) -> User {
        User {
            id,
            username: name.into(),
            digest: "x,SALT".into(),
            email: None,
            created_at: 0,
        }
    }

    fn post(id: i64, author: &User, subject: &str, content: &str) -> Post {
        Post {
            id,
            author_id: author.id,
            author_name: author.username.clone(),
            subject: subject.into(),
            content: content.into(),
            created_at: 1_700_000_000,
            last_modified: 1_700_000_000,
        }
    }

    #[test]
    fn escape_neutralizes_html() {
        assert_eq!(
            escape(r#"<script>alert("x")</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape("a & b"), "a &amp; b");
    }

    #[test]
    fn post_content_is_escaped_and_line_broken() {
        let alice = user(1, "alice");
        let p = post(1, &alice, "<b>title</b>", "line one\nline <two>");
        let html = render_front(None, &[p]);
        assert!(html.contains("&lt;b&gt;title&lt;/b&gt;"));
        assert!(html.contains("line one<br>line &lt;two&gt;"));
        assert!(!html.contains("<b>title</b>"));
    }

    #[test]
    fn front_page_links_posts() {
        let alice = user(1, "alice");
        let html = render_front(None, &[post(7, &alice, "Hello", "body")]);
        assert!(html.contains(r#"href="/blog/7""#));
        assert!(html.contains("by alice"));
    }

    #[test]
    fn nav_reflects_login_state() {
        let alice = user(1, "alice");
        let anon = render_front(None, &[]);
        assert!(anon.contains(r#"href="/login""#));
        let logged_in = render_front(Some(&alice), &[]);
        assert!(logged_in.contains(r#"href="/logout""#));
        assert!(logged_in.contains("alice"));
    }

    #[test]
    fn author_sees_edit_and_delete_not_like() {
        let alice = user(1, "alice");
        let p = post(3, &alice, "mine", "body");
        let html = render_post(Some(&alice), &p, &[], 0, false, None);
        assert!(html.contains("/blog/3/edit"));
        assert!(html.contains("/blog/3/delete"));
        assert!(!html.contains("/blog/3/like"));
    }

    #[test]
    fn non_author_sees_like_toggle() {
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        let p = post(3, &alice, "hers", "body");
        let html = render_post(Some(&bob), &p, &[], 2, false, None);
        assert!(html.contains("/blog/3/like"));
        let html = render_post(Some(&bob), &p, &[], 2, true, None);
        assert!(html.contains("/blog/3/unlike"));
    }

    #[test]
    fn error_block_renders_when_present() {
        let html = render_login(Some("Invalid username or password."));
        assert!(html.contains(r#"<div class="error">Invalid username or password.</div>"#));
        let html = render_login(None);
        assert!(!html.contains(r#"<div class="error">"#));
    }

    #[test]
    fn signup_form_preserves_username_on_error() {
        let html = render_signup("alice", "a@example.com", Some("Passwords did not match."));
        assert!(html.contains(r#"value="alice""#));
        assert!(html.contains(r#"value="a@example.com""#));
        assert!(html.contains("Passwords did not match."));
    }

    #[test]
    fn dashboard_greets_user() {
        let alice = user(1, "alice");
        let html = render_dashboard(&alice, &[]);
        assert!(html.contains("Welcome, alice!"));
    }
}
