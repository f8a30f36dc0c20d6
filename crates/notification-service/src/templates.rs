use portfolio_core::numeric::round2;
use portfolio_core::InvestmentSummary;
use rust_decimal::Decimal;

use crate::{Notification, NotificationKind};

const NBSP: char = '\u{a0}';

/// Norwegian krone formatting: `1 234,56 kr` with non-breaking spaces.
pub fn format_nok(value: Decimal) -> String {
    let rounded = round2(value);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(NBSP);
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{sign}{grouped},{frac_part}{NBSP}kr")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// First row with the largest signed difference.
fn furthest_from_target(rows: &[InvestmentSummary]) -> Option<&InvestmentSummary> {
    rows.iter().fold(None, |best, row| match best {
        Some(b) if b.difference >= row.difference => Some(b),
        _ => Some(row),
    })
}

fn render_card(row: &InvestmentSummary) -> String {
    let (border, badge) = if row.rebalance {
        ("#ef4444", "Rebalanser")
    } else {
        ("#22c55e", "OK")
    };
    format!(
        r#"<div style="border-left:4px solid {border};margin:12px 20px;padding:8px 16px;background:#f8fafc;border-radius:4px;">
  <h2 style="margin:0 0 8px;font-size:16px;border-bottom:1px solid #e2e8f0;">{name} <span style="color:{border};font-size:12px;">{badge}</span></h2>
  <p style="margin:4px 0;">Markedsverdi: <strong>{market_value}</strong></p>
  <p style="margin:4px 0;">Nåværende allokering: <strong>{current}%</strong></p>
  <p style="margin:4px 0;">Ønsket allokering: <strong>{wanted}%</strong></p>
  <p style="margin:4px 0;">Nåværende differanse: <strong>{difference}%</strong></p>
  <p style="margin:4px 0;">Maksimum differanse: <strong>{max_diff}%</strong></p>
  <p style="margin:4px 0;">Å handle for: <strong>{to_trade}</strong></p>
</div>"#,
        name = escape(&row.equity_type),
        market_value = format_nok(row.market_value),
        current = row.current_share,
        wanted = row.wanted_share,
        difference = row.difference,
        max_diff = row.max_diff_to_rebalance,
        to_trade = format_nok(row.to_trade),
    )
}

fn render_summary(title: &str, rows: &[InvestmentSummary], total_value: Decimal, since_last: Decimal) -> String {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.market_value.cmp(&a.market_value));

    let cards: String = sorted.iter().map(render_card).collect();
    let furthest = furthest_from_target(rows)
        .map(|row| escape(&row.equity_type))
        .unwrap_or_else(|| "-".to_string());
    let since_color = if since_last.is_sign_negative() { "#ef4444" } else { "#22c55e" };

    format!(
        r#"<div style="background:#1e293b;color:#fff;padding:12px 20px;font-size:18px;font-weight:700;">{title}</div>
<table style="width:100%;border-collapse:collapse;">
  <tr><td style="padding:8px 20px;color:#94a3b8;">Total verdi</td><td style="padding:8px 12px;font-weight:600;">{total}</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 20px;color:#94a3b8;">Siden sist</td><td style="padding:8px 12px;font-weight:600;color:{since_color};">{since}</td></tr>
  <tr><td style="padding:8px 20px;color:#94a3b8;">Lengst fra mål</td><td style="padding:8px 12px;font-weight:600;">{furthest}</td></tr>
</table>
{cards}"#,
        title = escape(title),
        total = format_nok(total_value),
        since = format_nok(since_last),
    )
}

pub struct EmailTemplate;

impl EmailTemplate {
    pub fn render(notification: &Notification) -> String {
        let body_content = match &notification.kind {
            NotificationKind::PortfolioSummary {
                rows,
                total_value,
                since_last,
            } => render_summary("Porteføljeoppdatering", rows, *total_value, *since_last),
            NotificationKind::AccountSummary {
                account_name,
                rows,
                total_value,
                since_last,
            } => render_summary(account_name, rows, *total_value, *since_last),
            NotificationKind::AccessKeyExpiring {
                account_name,
                expires_at,
            } => format!(
                r#"<div style="background:#f97316;color:#fff;padding:12px 20px;font-size:18px;font-weight:700;">Access key expiring soon</div>
<div style="padding:16px 20px;">
  <p style="color:#334155;margin:0;">The access key for <strong>{name}</strong> expires {date}. Create a new key and update the account.</p>
</div>"#,
                name = escape(account_name),
                date = expires_at.format("%Y-%m-%d"),
            ),
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;box-shadow:0 1px 3px rgba(0,0,0,0.1);">
      <tr><td>
        {body_content}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">Sent at {ts} UTC</p>
      </td></tr>
    </table>
  </td></tr>
</table>
</body>
</html>"#,
            ts = notification.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}
