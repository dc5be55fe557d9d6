use chrono::{DateTime, Utc};
use url::Url;

use crate::domain::entities::application::ApplicationKind;

const BRAND_NAME: &str = "Community";

fn origin_label(app_origin: &str) -> String {
    Url::parse(app_origin)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()))
        .unwrap_or_else(|| app_origin.to_string())
}

fn greeting(full_name: Option<&str>) -> String {
    match full_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("Hi {},", escape_html(name)),
        None => "Hi,".to_string(),
    }
}

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%B %-d, %Y").to_string()
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn primary_button(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{url}" style="display:inline-block;padding:12px 18px;background-color:#111827;color:#ffffff;text-decoration:none;border-radius:8px;font-weight:600;">{label}</a>"#
    )
}

pub fn trial_started_email(
    app_origin: &str,
    full_name: Option<&str>,
    ends_at: Option<DateTime<Utc>>,
    dashboard_url: &str,
) -> (String, String) {
    let subject = "Your premium trial has started".to_string();
    let headline = "Welcome aboard";
    let lead = match ends_at {
        Some(end) => format!(
            "{} your premium trial is active until <strong>{}</strong>.",
            greeting(full_name),
            format_date(end)
        ),
        None => format!("{} your premium trial is active.", greeting(full_name)),
    };
    let button = primary_button(dashboard_url, "Explore the community");
    let body = format!(
        r#"{button}<p style="margin:12px 0 0;color:#374151;">Courses, mentoring sessions and the community feed are all open to you during the trial.</p>"#
    );
    let reason = "you signed in for the first time";

    let html = wrap_email(app_origin, headline, &lead, &body, reason, None);
    (subject, html)
}

pub fn application_approved_email(
    app_origin: &str,
    kind: ApplicationKind,
    full_name: Option<&str>,
    ends_at: Option<DateTime<Utc>>,
    dashboard_url: &str,
) -> (String, String) {
    let (subject, headline, extra) = match kind {
        ApplicationKind::Member => (
            "Your membership application was approved",
            "You're in!",
            "Your membership is active and comes with a premium trial.",
        ),
        ApplicationKind::Mentor => (
            "Your mentor application was approved",
            "Welcome, mentor!",
            "Your mentor profile is live. Members can now book sessions with you.",
        ),
    };
    let lead = format!("{} {}", greeting(full_name), extra);
    let until = ends_at
        .map(|end| {
            format!(
                r#"<p style="margin:12px 0 0;color:#374151;">Premium access runs until {}.</p>"#,
                format_date(end)
            )
        })
        .unwrap_or_default();
    let button = primary_button(dashboard_url, "Go to your dashboard");
    let body = format!("{button}{until}");
    let reason = format!("you submitted a {} application", kind.label());

    let html = wrap_email(app_origin, headline, &lead, &body, &reason, None);
    (subject.to_string(), html)
}

pub fn application_rejected_email(
    app_origin: &str,
    kind: ApplicationKind,
    full_name: Option<&str>,
    admin_notes: Option<&str>,
) -> (String, String) {
    let subject = format!("Update on your {} application", kind.label());
    let headline = "Application update";
    let lead = format!(
        "{} thank you for applying. We are not able to approve your {} application at this time.",
        greeting(full_name),
        kind.label()
    );
    let notes = admin_notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| {
            format!(
                r#"<p style="margin:12px 0 0;color:#374151;">Note from the team: {}</p>"#,
                escape_html(n)
            )
        })
        .unwrap_or_default();
    let reason = format!("you submitted a {} application", kind.label());

    let html = wrap_email(app_origin, headline, &lead, &notes, &reason, None);
    (subject, html)
}

pub fn wrap_email(
    app_origin: &str,
    headline: &str,
    lead: &str,
    body_html: &str,
    reason: &str,
    footer_note: Option<&str>,
) -> String {
    let origin = origin_label(app_origin);
    let reason_label = "Why you got this email";
    let ignore_line = "If you didn't expect this, you can safely ignore it.";
    let sent_by = "Sent by";

    let footer_note = footer_note
        .map(|note| {
            format!(
                r#"<p style="margin:8px 0 0;color:#4b5563;font-size:13px;">{}</p>"#,
                note
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <body style="background:#f8fafc;margin:0;padding:24px;font-family:Arial,Helvetica,sans-serif;">
    <div style="max-width:560px;margin:0 auto;background:#ffffff;border:1px solid #e5e7eb;border-radius:12px;padding:24px;">
      <div style="font-size:12px;letter-spacing:0.08em;text-transform:uppercase;color:#6b7280;">{brand} - {origin}</div>
      <h1 style="margin:12px 0 8px;font-size:22px;color:#111827;">{headline}</h1>
      <p style="margin:0 0 12px;font-size:15px;color:#111827;line-height:1.6;">{lead}</p>
      {body_html}
      <div style="margin-top:20px;padding-top:16px;border-top:1px solid #e5e7eb;">
        <p style="margin:0 0 6px;font-size:13px;color:#4b5563;">{reason_label}: {reason}.</p>
        <p style="margin:0;font-size:13px;color:#4b5563;">{ignore_line}</p>
        {footer_note}
      </div>
      <p style="margin:14px 0 4px;font-size:12px;color:#9ca3af;">{sent_by} {brand} - {origin}</p>
    </div>
  </body>
</html>
"#,
        brand = BRAND_NAME,
        origin = origin,
        headline = headline,
        lead = lead,
        body_html = body_html,
        reason = reason,
        reason_label = reason_label,
        ignore_line = ignore_line,
        sent_by = sent_by,
        footer_note = footer_note,
    )
}
