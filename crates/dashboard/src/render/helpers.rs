//! Template helper functions.
//!
//! Helpers never see the HTTP request. Everything request-specific is copied
//! into a [`HelperContext`] once, and the functions registered on a render
//! environment read from that value only.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, Error, ErrorKind};

use common::{Checkin, CoreSnapshot, Message, Service, User};

use crate::auth::{Access, ServerSecrets};

/// Scheme of the mobile-app setup link.
pub const SETUP_SCHEME: &str = "pulseboard";

/// Everything the helper table needs to know about one request.
#[derive(Debug, Clone)]
pub struct HelperContext {
    pub access: Access,
    /// Request path and query, as shown by `URL()`.
    pub url: String,
    pub version: String,
    pub core: Arc<CoreSnapshot>,
    pub use_cdn: bool,
    /// Setup deep link; only present for fully authenticated callers.
    pub setup_link: Option<String>,
    pub utc_offset: FixedOffset,
}

impl HelperContext {
    /// Build the context for a caller holding `access`.
    pub fn new(
        access: Access,
        url: impl Into<String>,
        core: Arc<CoreSnapshot>,
        secrets: Option<&ServerSecrets>,
        use_cdn: bool,
    ) -> Self {
        let setup_link = secrets
            .filter(|_| access.full)
            .map(|s| setup_link(&s.domain, &s.api_secret));
        let utc_offset = secrets
            .and_then(|s| hours_to_offset(s.timezone))
            .unwrap_or_else(|| Utc.fix());
        Self {
            access,
            url: url.into(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            core,
            use_cdn,
            setup_link,
            utc_offset,
        }
    }

    /// Register the full page helper table on `env`.
    pub fn register(&self, env: &mut Environment<'_>) {
        register_escaping(env);
        register_formatting(env, self.utc_offset);
        register_constructors(env);

        let access = self.access;
        env.add_function("Auth", move || access.full);
        env.add_function("IsUser", move || access.user);
        env.add_function("IsAdmin", move || access.admin);

        let version = self.version.clone();
        env.add_function("VERSION", move || version.clone());

        let url = self.url.clone();
        env.add_function("URL", move || url.clone());

        let use_cdn = self.use_cdn;
        env.add_function("USE_CDN", move || use_cdn);

        let link = self.setup_link.clone().unwrap_or_default();
        env.add_function("QrAuth", move || link.clone());

        let core = Arc::clone(&self.core);
        env.add_function("CoreApp", move || Value::from_serialize(&*core));

        self.register_services(env);

        // Placeholders; always empty.
        env.add_function("CHART_DATA", || "");
        env.add_function("Error", || "");

        env.add_function("len", len);
        env.add_function("IsNil", |v: Value| v.is_none() || v.is_undefined());
        env.add_function("Type", describe);
    }

    /// Register the reduced table used for standalone script responses.
    pub fn register_script(&self, env: &mut Environment<'_>) {
        env.add_function("safe", |s: String| Value::from_safe_string(s));
        self.register_services(env);
    }

    fn register_services(&self, env: &mut Environment<'_>) {
        let core = Arc::clone(&self.core);
        env.add_function("Services", move || Value::from_serialize(&core.services));
    }
}

fn register_escaping(env: &mut Environment<'_>) {
    env.add_function("safe", |s: String| Value::from_safe_string(s));
    env.add_function("safeURL", |s: String| Value::from_safe_string(s));
    env.add_function("js", |v: Value| Value::from_safe_string(v.to_string()));
    env.add_function("ToJSON", |v: Value| -> Result<Value, Error> {
        serde_json::to_string(&v)
            .map(|json| Value::from_safe_string(escape_json_for_html(&json)))
            .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("ToJSON: {e}")))
    });
}

/// Replace the characters that can end a `<script>` element or an attribute
/// with their JSON unicode escapes. The result is still valid JSON.
pub fn escape_json_for_html(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\'' => out.push_str("\\u0027"),
            c => out.push(c),
        }
    }
    out
}

fn register_formatting(env: &mut Environment<'_>, offset: FixedOffset) {
    env.add_function("ToString", |v: Value| v.to_string());
    env.add_function("underscore", |s: String| underscore(&s));
    env.add_function("Duration", |secs: f64| format_duration(secs));
    env.add_function("Ago", |t: String| -> Result<String, Error> {
        Ok(time_ago(parse_time(&t)?, Utc::now()))
    });
    env.add_function("ToUnix", |t: String| -> Result<i64, Error> {
        Ok(parse_time(&t)?.timestamp())
    });
    env.add_function("FromUnix", move |ts: i64| -> Result<String, Error> {
        from_unix(ts, offset).ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "FromUnix: timestamp out of range")
        })
    });
}

fn register_constructors(env: &mut Environment<'_>) {
    env.add_function("NewService", || Value::from_serialize(Service::default()));
    env.add_function("NewUser", || Value::from_serialize(User::default()));
    env.add_function("NewCheckin", || Value::from_serialize(Checkin::default()));
    env.add_function("NewMessage", || Value::from_serialize(Message::default()));
}

fn len(v: Value) -> Result<usize, Error> {
    if v.is_none() || v.is_undefined() {
        return Ok(0);
    }
    v.len()
        .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, format!("len() of {}", v.kind())))
}

/// Kind of a template value followed by its attribute names, if it has any.
fn describe(v: Value) -> Vec<String> {
    let mut out = vec![v.kind().to_string()];
    if v.kind() == ValueKind::Map {
        if let Ok(keys) = v.try_iter() {
            out.extend(keys.map(|k| k.to_string()));
        }
    }
    out
}

fn parse_time(t: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(t)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::new(ErrorKind::InvalidOperation, format!("invalid timestamp {t:?}: {e}"))
        })
}

/// Convert an hour offset (fractions allowed) to a chrono offset.
pub fn hours_to_offset(hours: f32) -> Option<FixedOffset> {
    FixedOffset::east_opt((hours * 3600.0).round() as i32)
}

/// `pulseboard://setup?domain=…&api=…` with both values form-encoded.
pub fn setup_link(domain: &str, secret: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("domain", domain)
        .append_pair("api", secret)
        .finish();
    format!("{SETUP_SCHEME}://setup?{query}")
}

/// Lowercase, replace whitespace and `!`, `/`, `'` with `_`, then drop one
/// leading and one trailing underscore.
pub fn underscore(s: &str) -> String {
    let replaced: String = s
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_whitespace() || matches!(c, '!' | '/' | '\'') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.strip_prefix('_').unwrap_or(&replaced);
    trimmed.strip_suffix('_').unwrap_or(trimmed).to_owned()
}

/// Largest whole unit of a duration given in seconds.
pub fn format_duration(secs: f64) -> String {
    const UNITS: [(f64, &str); 4] = [
        (86_400.0, "day"),
        (3_600.0, "hour"),
        (60.0, "minute"),
        (1.0, "second"),
    ];
    for (size, unit) in UNITS {
        if secs >= size {
            let n = (secs / size).floor() as u64;
            return plural(n, unit);
        }
    }
    format!("{} ms", (secs * 1000.0).round() as i64)
}

/// Relative description of `then` as seen at `now`.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 0 {
        return "in the future".into();
    }
    if secs < 1 {
        return "just now".into();
    }
    const UNITS: [(i64, &str); 6] = [
        (31_536_000, "year"),
        (2_592_000, "month"),
        (86_400, "day"),
        (3_600, "hour"),
        (60, "minute"),
        (1, "second"),
    ];
    for (size, unit) in UNITS {
        if secs >= size {
            return format!("{} ago", plural((secs / size) as u64, unit));
        }
    }
    "just now".into()
}

/// Format a unix timestamp as `Monday, January 02` in `offset`.
pub fn from_unix(ts: i64, offset: FixedOffset) -> Option<String> {
    let utc = DateTime::<Utc>::from_timestamp(ts, 0)?;
    Some(utc.with_timezone(&offset).format("%A, %B %d").to_string())
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    fn ctx(access: Access) -> HelperContext {
        let core = CoreSnapshot {
            name: "Acme Status".into(),
            services: vec![
                Service { name: "api".into(), ..Default::default() },
                Service { name: "web".into(), ..Default::default() },
            ],
            ..Default::default()
        };
        let secrets = ServerSecrets {
            api_key: "k".into(),
            api_secret: "s3cret&more".into(),
            domain: "https://status.example.com".into(),
            timezone: -5.0,
        };
        HelperContext::new(access, "/dashboard?x=1", Arc::new(core), Some(&secrets), true)
    }

    fn render(helpers: &HelperContext, source: &str) -> String {
        let mut env = Environment::new();
        helpers.register(&mut env);
        env.render_str(source, context! {}).unwrap()
    }

    #[test]
    fn auth_helpers_reflect_access() {
        let access = Access { read: true, full: true, admin: false, user: true };
        let out = render(&ctx(access), "{{ Auth() }} {{ IsUser() }} {{ IsAdmin() }}");
        assert_eq!(out, "true true false");
    }

    #[test]
    fn core_and_services() {
        let out = render(
            &ctx(Access::default()),
            "{{ CoreApp().name }}:{{ len(Services()) }}:{% for s in Services() %}{{ s.name }},{% endfor %}",
        );
        assert_eq!(out, "Acme Status:2:api,web,");
    }

    #[test]
    fn request_url_and_flags() {
        let out = render(&ctx(Access::default()), "{{ URL() }} {{ USE_CDN() }}");
        assert_eq!(out, "/dashboard?x=1 true");
    }

    #[test]
    fn version_is_crate_version() {
        let out = render(&ctx(Access::default()), "{{ VERSION() }}");
        assert_eq!(out, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn setup_link_only_for_full_access() {
        let anon = render(&ctx(Access::default()), "[{{ QrAuth() }}]");
        assert_eq!(anon, "[]");

        let full = Access { full: true, read: true, ..Default::default() };
        let out = render(&ctx(full), "{{ QrAuth() }}");
        assert_eq!(
            out,
            "pulseboard://setup?domain=https%3A%2F%2Fstatus.example.com&api=s3cret%26more"
        );
    }

    #[test]
    fn nil_and_len() {
        let out = render(
            &ctx(Access::default()),
            "{{ IsNil(none) }} {{ IsNil(missing) }} {{ IsNil(1) }} {{ len(missing) }}",
        );
        assert_eq!(out, "true true false 0");
    }

    #[test]
    fn len_of_scalar_is_error() {
        let mut env = Environment::new();
        ctx(Access::default()).register(&mut env);
        assert!(env.render_str("{{ len(3) }}", context! {}).is_err());
    }

    #[test]
    fn empty_record_constructors() {
        let out = render(
            &ctx(Access::default()),
            "{{ NewService().id }}|{{ NewUser().username }}|{{ NewCheckin().interval }}|{{ NewMessage().title }}",
        );
        assert_eq!(out, "0||0|");
    }

    #[test]
    fn to_json_cannot_close_a_script_element() {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| minijinja::AutoEscape::Html);
        ctx(Access::default()).register(&mut env);
        let out = env
            .render_str(
                r#"<script>var s = {{ ToJSON({"name": "</script><b>Tom & Jerry's</b>"}) }};</script>"#,
                context! {},
            )
            .unwrap();
        assert_eq!(
            out,
            r#"<script>var s = {"name":"\u003c/script\u003e\u003cb\u003eTom \u0026 Jerry\u0027s\u003c/b\u003e"};</script>"#
        );
        assert_eq!(out.matches("</script>").count(), 1);
    }

    #[test]
    fn escaped_json_still_parses() {
        let escaped = escape_json_for_html(r#"{"a":"<&'>"}"#);
        let back: serde_json::Value = serde_json::from_str(&escaped).unwrap();
        assert_eq!(back["a"], "<&'>");
    }

    #[test]
    fn legacy_placeholders_render_empty() {
        let out = render(&ctx(Access::default()), "[{{ CHART_DATA() }}|{{ Error() }}]");
        assert_eq!(out, "[|]");
    }

    #[test]
    fn type_lists_kind_and_attributes() {
        let out = render(&ctx(Access::default()), "{{ Type(NewUser())|join(',') }}");
        assert!(out.starts_with("map,"));
        assert!(out.contains("username"));
        assert_eq!(render(&ctx(Access::default()), "{{ Type('x')|join(',') }}"), "string");
    }

    #[test]
    fn from_unix_uses_configured_offset() {
        // 2024-03-01T03:00:00Z is still February 29th at UTC-5.
        let out = render(&ctx(Access::default()), "{{ FromUnix(1709262000) }}");
        assert_eq!(out, "Thursday, February 29");
    }

    #[test]
    fn to_unix_parses_rfc3339() {
        let out = render(&ctx(Access::default()), "{{ ToUnix('2024-03-01T03:00:00Z') }}");
        assert_eq!(out, "1709262000");
        let mut env = Environment::new();
        ctx(Access::default()).register(&mut env);
        assert!(env.render_str("{{ ToUnix('yesterday') }}", context! {}).is_err());
    }

    #[test]
    fn script_table_is_reduced() {
        let mut env = Environment::new();
        ctx(Access::default()).register_script(&mut env);
        assert_eq!(env.render_str("{{ len(Services()) }}", context! {}).ok(), None);
        assert_eq!(
            env.render_str("{{ Services()|length }}{{ safe('<i>') }}", context! {}).unwrap(),
            "2<i>"
        );
    }

    #[test]
    fn underscore_cases() {
        assert_eq!(underscore("Google DNS"), "google_dns");
        assert_eq!(underscore(" Hello World! "), "hello_world_");
        assert_eq!(underscore("a/b's"), "a_b_s");
    }

    #[test]
    fn duration_units() {
        assert_eq!(format_duration(0.25), "250 ms");
        assert_eq!(format_duration(1.0), "1 second");
        assert_eq!(format_duration(45.0), "45 seconds");
        assert_eq!(format_duration(125.0), "2 minutes");
        assert_eq!(format_duration(3_600.0), "1 hour");
        assert_eq!(format_duration(200_000.0), "2 days");
    }

    #[test]
    fn ago_units() {
        let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
        let now = at("2024-03-01T12:00:00Z");
        assert_eq!(time_ago(at("2024-03-01T12:00:00Z"), now), "just now");
        assert_eq!(time_ago(at("2024-03-01T11:59:30Z"), now), "30 seconds ago");
        assert_eq!(time_ago(at("2024-03-01T11:00:00Z"), now), "1 hour ago");
        assert_eq!(time_ago(at("2024-02-27T12:00:00Z"), now), "3 days ago");
        assert_eq!(time_ago(at("2024-03-02T12:00:00Z"), now), "in the future");
    }

    #[test]
    fn offsets_from_hours() {
        assert_eq!(hours_to_offset(5.5).unwrap().local_minus_utc(), 19_800);
        assert_eq!(hours_to_offset(-8.0).unwrap().local_minus_utc(), -28_800);
    }
}
