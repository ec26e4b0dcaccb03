//! Plain-text reports for the `*/terminal` routes and the operator CLI.

use chrono::{DateTime, Utc};

use super::client::Chat;
use super::service::StatusReport;
use crate::clock;

/// Steps shown next to a QR code.
pub const QR_INSTRUCTIONS: [&str; 5] = [
    "1. Open WhatsApp on your phone",
    "2. Go to Settings > Linked Devices",
    "3. Tap \"Link a Device\"",
    "4. Scan the QR code above",
    "5. Wait for authentication...",
];

/// `GET /status/terminal`. `api_base` is the public URL of the messaging
/// routes, e.g. `http://localhost:3060/api/whatsapp`.
pub fn status_report(
    report: &StatusReport,
    last_activity: Option<DateTime<Utc>>,
    api_base: &str,
) -> String {
    let mut out = String::from("\n📱 WhatsApp Status Report\n========================\n");
    out.push_str(&format!("Status: {}\n", report.status));
    out.push_str(&format!("Ready: {}\n", if report.is_ready { "✅ Yes" } else { "❌ No" }));
    let auto_start = if report.auto_start_enabled {
        "✅ Enabled"
    } else {
        "❌ Disabled"
    };
    out.push_str(&format!("Auto-start: {auto_start}\n"));
    if let Some(phone) = &report.phone_number {
        out.push_str(&format!("Phone: {phone}\n"));
    }
    if report.uptime_seconds > 0 {
        let secs = report.uptime_seconds;
        out.push_str(&format!("Uptime: {}h {}m {}s\n", secs / 3600, (secs % 3600) / 60, secs % 60));
    }
    if let Some(at) = last_activity {
        out.push_str(&format!("Last Activity: {}\n", clock::local_display(at)));
    }
    if report.has_qr_code {
        out.push_str("QR Code: Available (scan to link)\n");
    }
    out.push_str("\n🔗 API Endpoints:\n");
    out.push_str(&format!("- Status: {api_base}/status\n"));
    out.push_str(&format!("- QR Code: {api_base}/qr\n"));
    out.push_str(&format!("- Send Message: {api_base}/send-message\n"));
    out.push_str(&format!("- Check Number: {api_base}/check-number\n"));
    out
}

/// `GET /qr/terminal`.
pub fn qr_report(qr_code: Option<&str>, api_base: &str) -> String {
    let Some(qr) = qr_code else {
        let path = api_base
            .find("/api/")
            .map_or(api_base, |at| &api_base[at..]);
        return format!(
            "❌ No QR code available. Please start the WhatsApp client first.\n\n\
             Use: POST {path}/start"
        );
    };
    let mut out = String::from("\n📱 WhatsApp QR Code\n==================\n\n");
    out.push_str("Scan this QR code with your WhatsApp mobile app:\n\n");
    out.push_str(&format!("{qr}\n\n"));
    out.push_str("💡 Instructions:\n");
    for step in QR_INSTRUCTIONS {
        out.push_str(&format!("{step}\n"));
    }
    out.push_str("\n🔗 Alternative: Use the QR endpoint with qrcode-terminal\n");
    out.push_str("   npm install -g qrcode-terminal\n");
    out.push_str(&format!("   qrcode-terminal \"{qr}\"\n"));
    out
}

/// `GET /chats/terminal`. Last messages are cut to 50 characters.
pub fn chats_report(chats: &[Chat]) -> String {
    let mut out = String::from("\n💬 WhatsApp Chats\n================\n\n");
    out.push_str(&format!("Total Chats: {}\n\n", chats.len()));
    if chats.is_empty() {
        out.push_str("No chats available.\n");
        return out;
    }
    for (index, chat) in chats.iter().enumerate() {
        let name = chat.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Unknown");
        out.push_str(&format!("{}. {name}\n", index + 1));
        out.push_str(&format!("   ID: {}\n", chat.id));
        out.push_str(&format!("   Type: {}\n", if chat.is_group { "Group" } else { "Individual" }));
        out.push_str(&format!("   Unread: {}\n", chat.unread_count));
        if let Some(last) = &chat.last_message {
            let preview: String = last.body.chars().take(50).collect();
            let ellipsis = if last.body.chars().count() > 50 { "..." } else { "" };
            out.push_str(&format!("   Last: {preview}{ellipsis}\n"));
        }
        out.push('\n');
    }
    out
}
