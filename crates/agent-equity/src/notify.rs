//! Email delivery of batch summaries
//!
//! After a watchlist run the summary goes out as an HTML overview with the
//! summary document and the first reports attached.

use crate::agents::Action;
use crate::config::EmailConfig;
use crate::data::bare_code;
use crate::engine::batch::{BatchReport, BatchSummary};
use crate::error::{EquityError, Result};
use crate::report::format::environment;
use chrono::{DateTime, FixedOffset};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Detailed reports attached per message
const MAX_ATTACHED_REPORTS: usize = 10;
const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

const EMAIL_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <style>
        body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .header { background: #667eea; color: white; padding: 20px; text-align: center; border-radius: 10px; }
        .stats { display: flex; justify-content: space-around; margin: 20px 0; }
        .stock-table { width: 100%; border-collapse: collapse; }
        .stock-table th, .stock-table td { padding: 10px; text-align: left; border-bottom: 1px solid #ddd; }
        .action-buy { color: #28a745; font-weight: bold; }
        .action-hold { color: #ffc107; font-weight: bold; }
        .action-sell { color: #dc3545; font-weight: bold; }
        .warning { background: #fff3cd; padding: 15px; border-radius: 8px; margin: 20px 0; }
    </style>
</head>
<body>
    <div class="header">
        <h1>📊 每日股票分析报告</h1>
        <p>{{ date }}</p>
    </div>

    <h2>📋 分析概览</h2>
    <p><strong>分析股票数量:</strong> {{ entries | length }} / {{ requested }} 只</p>
    <p><strong>报告生成时间:</strong> {{ generated_at }}</p>

    <div class="stats">
        <div>🟢 买入推荐: {{ counts.buy }}</div>
        <div>🟡 持有建议: {{ counts.hold }}</div>
        <div>🔴 卖出建议: {{ counts.sell }}</div>
    </div>

    <h2>📈 详细分析结果</h2>
    <table class="stock-table">
        <thead>
            <tr><th>股票代码</th><th>股票名称</th><th>操作建议</th><th>决策信心</th><th>风险等级</th></tr>
        </thead>
        <tbody>
{%- for entry in entries %}
            <tr>
                <td>{{ entry.symbol }}</td>
                <td>{{ entry.name }}</td>
                <td class="{{ entry.class }}">{{ entry.action | na }}</td>
                <td>{{ entry.confidence | na }}/10</td>
                <td>{{ entry.risk_level | na }}</td>
            </tr>
{%- endfor %}
        </tbody>
    </table>
{%- if failures %}

    <h2>❌ 分析失败</h2>
    <ul>
{%- for failure in failures %}
        <li>{{ failure.symbol }}: {{ failure.error }}</li>
{%- endfor %}
    </ul>
{%- endif %}

    <div class="warning">
        <p>本报告由AI系统自动生成，仅供参考，不构成投资建议。投资有风险，决策需谨慎。</p>
    </div>
    <p>📎 附件包含汇总报告及 {{ attached }} 份详细分析报告</p>
</body>
</html>
"#;

fn notify_error(err: impl Display) -> EquityError {
    EquityError::NotifyError(err.to_string())
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| EquityError::NotifyError(format!("invalid address {address}: {e}")))
}

fn action_class(action: Option<Action>) -> &'static str {
    match action {
        Some(Action::Buy) => "action-buy",
        Some(Action::Hold) => "action-hold",
        Some(Action::Sell) => "action-sell",
        None => "",
    }
}

/// Subject line for a summary generated at `date`
pub fn subject(date: &DateTime<FixedOffset>) -> String {
    format!("📊 每日股票分析报告 - {}", date.format("%Y年%m月%d日"))
}

/// HTML overview of `summary`; `attached` is the number of attached reports
pub fn render_body(summary: &BatchSummary, attached: usize) -> Result<String> {
    let entries: Vec<_> = summary
        .entries
        .iter()
        .map(|entry| {
            json!({
                "symbol": entry.symbol,
                "name": entry.name,
                "action": entry.action,
                "class": action_class(entry.action),
                "confidence": entry.confidence,
                "risk_level": entry.risk_level,
            })
        })
        .collect();
    let vars = json!({
        "date": summary.generated_at.format("%Y年%m月%d日").to_string(),
        "generated_at": summary.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        "requested": summary.requested,
        "entries": entries,
        "counts": summary.counts(),
        "failures": summary.failures,
        "attached": attached,
    });

    let mut env = environment();
    env.add_template("email.html", EMAIL_TEMPLATE)?;
    Ok(env
        .get_template("email.html")?
        .render(minijinja::Value::from_serialize(&vars))?)
}

/// Files attached to the message of `report`, with their attachment names
fn attachments(report: &BatchReport) -> Vec<(String, PathBuf)> {
    let summary = report.summary_path.iter().map(|path| {
        let name = path.file_name().map_or_else(
            || "summary.md".to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        (name, path.clone())
    });
    let reports = report
        .results
        .iter()
        .take(MAX_ATTACHED_REPORTS)
        .map(|result| {
            let path = &result.report.markdown;
            let file = path.file_name().map_or_else(
                || "analysis.md".to_string(),
                |n| n.to_string_lossy().into_owned(),
            );
            (
                format!("{}_{file}", bare_code(result.symbol())),
                path.clone(),
            )
        });
    summary.chain(reports).collect()
}

async fn attachment(name: String, path: &Path) -> Result<SinglePart> {
    let body = tokio::fs::read(path).await?;
    let content_type = ContentType::parse(MARKDOWN_CONTENT_TYPE).map_err(notify_error)?;
    Ok(Attachment::new(name).body(body, content_type))
}

/// Sends batch summaries over SMTP with STARTTLS
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    config: EmailConfig,
    sender: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailNotifier {
    /// `None` when delivery is disabled or the settings are incomplete
    pub fn from_config(config: &EmailConfig) -> Result<Option<Self>> {
        if !config.enabled {
            info!("Email delivery disabled");
            return Ok(None);
        }
        if !config.is_complete() {
            warn!("Email delivery enabled but sender, password or recipients are missing");
            return Ok(None);
        }

        let sender = mailbox(config.sender.as_deref().unwrap_or_default())?;
        let recipients = config
            .recipients
            .iter()
            .map(String::as_str)
            .map(mailbox)
            .collect::<Result<Vec<_>>>()?;
        info!(sender = %sender, recipients = recipients.len(), "Email delivery enabled");

        Ok(Some(Self {
            config: config.clone(),
            sender,
            recipients,
        }))
    }

    /// Assemble the message for `report`
    ///
    /// Attachments that cannot be read are skipped with a warning.
    pub async fn compose(&self, report: &BatchReport) -> Result<Message> {
        let summary = report
            .summary
            .as_ref()
            .ok_or_else(|| notify_error("batch produced no summary"))?;

        let files = attachments(report);
        let attached_reports = files.len() - usize::from(report.summary_path.is_some());
        let mut parts = MultiPart::mixed()
            .singlepart(SinglePart::html(render_body(summary, attached_reports)?));
        for (name, path) in files {
            match attachment(name, &path).await {
                Ok(part) => parts = parts.singlepart(part),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping attachment"),
            }
        }

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(subject(&summary.generated_at));
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        builder.multipart(parts).map_err(notify_error)
    }

    /// Compose and deliver the message for `report`
    #[instrument(skip_all, fields(server = %self.config.smtp_server))]
    pub async fn send(&self, report: &BatchReport) -> Result<()> {
        let message = self.compose(report).await?;
        let credentials = Credentials::new(
            self.sender.email.to_string(),
            self.config.password.clone().unwrap_or_default(),
        );
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)
            .map_err(notify_error)?
            .port(self.config.smtp_port)
            .credentials(credentials)
            .build();

        mailer.send(message).await.map_err(notify_error)?;
        info!(
            recipients = self.recipients.len(),
            analysed = report.succeeded(),
            "Batch summary emailed"
        );
        Ok(())
    }
}
