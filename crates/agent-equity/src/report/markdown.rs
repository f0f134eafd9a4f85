//! Markdown reports with a JSON mirror
//!
//! Layout under the report directory:
//!
//! ```text
//! README.md                       index of the latest reports
//! summary_YYYY-MM-DD_HHMMSS.md    batch summaries
//! {code}/YYYY-MM-DD/analysis_HHMMSS.md
//! {code}/YYYY-MM-DD/analysis_HHMMSS.json
//! ```

use crate::agents::role::number_text;
use crate::config::EquityConfig;
use crate::data::{bare_code, china_now};
use crate::engine::batch::BatchSummary;
use crate::engine::result::{AnalysisDraft, ReportArtifact};
use crate::error::{EquityError, Result};
use crate::report::ReportRenderer;
use crate::report::format::environment;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Dates listed per security in the index
const INDEX_DATES: usize = 5;
const TIMESTAMP_FORMAT: &str = "%Y年%m月%d日 %H:%M:%S";

const ANALYSIS_TEMPLATE: &str = r"{% macro raw(result) -%}
> ⚠️ 结构化输出不可用（{{ result.degraded }}），以下为原始输出：

```text
{{ result.raw_response }}
```
{%- endmacro -%}
# {{ mode_emoji }} 股票投资分析报告 - {{ mode_label }}

---

## 📋 基本信息

**生成时间**: {{ generated_at }}
**分析类型**: {{ mode_emoji }} {{ mode_label }}
**股票代码**: {{ symbol }}
**股票名称**: {{ name }}
**所属行业**: {{ industry }}
**当前价格**: ¥{{ price }}
**涨跌幅**: {{ pct_chg }}%
**分析耗时**: {{ duration }}秒

---

## 🎯 投资决策 (核心结论)

### 💼 交易建议
- **操作建议**: {{ decision.action | action_marker }} **{{ decision.action | na }}**
- **仓位建议**: {{ decision.position_size | na }}
- **目标价位**: {{ decision.target_price | na }}
- **止损价位**: {{ decision.stop_loss | na }}
- **持有周期**: {{ decision.holding_period | na }}
- **决策信心**: {{ decision.confidence | confidence_bar }} ({{ decision.confidence | na }}/10)

### 📝 决策理由
{{ decision.reasoning | na }}

### 🔑 关键因素
{{ decision.key_factors | bullets }}

### ⚠️ 主要风险
{{ decision.risks | bullets }}
{%- if decision.raw_response %}

{{ raw(decision) }}
{%- endif %}

---

## 🛡️ 风险评估

### ⚠️ 风险等级
- **总体风险**: {{ risk.overall_risk_level | risk_marker }} **{{ risk.overall_risk_level | na }}**
- **风险评分**: {{ risk.risk_score | risk_bar }} ({{ risk.risk_score | na }}/10)
- **建议最大仓位**: {{ risk.max_position_size | na }}

### 📊 风险细分
{%- for dimension in risk_dimensions %}
- **{{ dimension.label }}**: {{ dimension.text }}
{%- else %}
- 无
{%- endfor %}

### 🎯 风险控制建议
{{ risk.risk_control_suggestions | bullets }}

### 👁️ 监控要点
{{ risk.monitoring_points | bullets }}
{%- if risk.raw_response %}

{{ raw(risk) }}
{%- endif %}

---

## 📈 技术分析
{% if technical.degraded %}
{{ raw(technical) }}
{% else %}
**评分**: {{ technical.technical_score | na }}/10

### 趋势判断
{{ technical.trend | na }}

### 成交量分析
{{ technical.volume_analysis | na }}

### 支撑和阻力
{{ technical.support_resistance | na }}

### 短期展望
{{ technical.short_term_outlook | na }}

### 中期展望
{{ technical.medium_term_outlook | na }}

### 💡 技术面总结
{{ technical.summary | na }}
{% endif %}
---

## 💰 基本面分析
{% if fundamental.degraded %}
{{ raw(fundamental) }}
{% else %}
**评分**: {{ fundamental.fundamental_score | na }}/10

### 盈利能力
{{ fundamental.profitability | na }}

### 财务健康度
{{ fundamental.financial_health | na }}

### 盈利质量
{{ fundamental.profitability_quality | na }}

### 现金流分析
{{ fundamental.cash_flow | na }}

### 估值分析
{{ fundamental.valuation | na }}

### 💡 基本面总结
{{ fundamental.summary | na }}
{% endif %}
---

## 📰 新闻分析
{% if news.degraded %}
{{ raw(news) }}
{% else %}
**评分**: {{ news.news_score | na }}/10
**市场情绪**: {{ news.sentiment | na }}

### 关键事件
{{ news.key_events | na }}

### 影响分析
{{ news.impact_analysis | na }}

### 💡 新闻面总结
{{ news.summary | na }}
{% endif %}
---

## ⚖️ 多空辩论

### 🐂 看涨观点 (信心指数: {{ bull.bull_confidence | na }}/10)
{% if bull.degraded %}
{{ raw(bull) }}
{% else %}
**上涨潜力**: {{ bull.upside_potential | na }}

**买入论点**: {{ bull.buy_thesis | na }}

**利好因素**:
{{ bull.bull_points | bullets }}

**催化剂**:
{{ bull.catalysts | bullets }}
{% endif %}
### 🐻 看跌观点 (担忧指数: {{ bear.bear_confidence | na }}/10)
{% if bear.degraded %}
{{ raw(bear) }}
{% else %}
**下跌风险**: {{ bear.downside_risk | na }}

**卖出论点**: {{ bear.sell_thesis | na }}

**风险因素**:
{{ bear.bear_points | bullets }}

**负面催化剂**:
{{ bear.negative_catalysts | bullets }}
{% endif %}
### 🗣️ 辩论过程
{% for turn in turns %}
**第{{ turn.round }}轮 · {{ turn.label }}**{% if turn.degraded %} (⚠️ {{ turn.degraded }}){% endif %}

{{ turn.content }}
{% endfor %}
### 🎯 辩论总结
{% if not synthesis %}
- 无
{% elif synthesis.degraded %}
{{ raw(synthesis) }}
{% else %}
**看涨核心论点**: {{ synthesis.bull_key_points | na }}

**看跌核心论点**: {{ synthesis.bear_key_points | na }}

**最有说服力的观点**: {{ synthesis.most_convincing | na }}

**关键分歧**: {{ synthesis.key_disagreements | na }}

**平衡观点**: {{ synthesis.balanced_view | na }}

**建议倾向**: {{ synthesis.recommendation_lean | na }}

**信心等级**: {{ synthesis.confidence_level | na }}/10
{% endif %}
---

## ⚠️ 风险提示

本报告由AI多智能体系统自动生成，仅供参考，不构成投资建议。

**重要提示**:
- 股市有风险，投资需谨慎
- 请结合自身风险承受能力做出投资决策
- 建议咨询专业投资顾问
- 过往表现不代表未来收益

---

## 📌 报告信息

- **分析模型**: {{ model }}
- **数据来源**: Tushare
- **生成时间**: {{ generated_at }}

---

*本报告由自动化投资分析系统生成*
";

const SUMMARY_TEMPLATE: &str = r"# 📊 批量股票分析汇总报告

**生成时间**: {{ generated_at }}
**请求数量**: {{ requested }} 只股票
**分析数量**: {{ entries | length }} 只股票

---

## 📋 分析结果概览

| 股票代码 | 股票名称 | 操作建议 | 决策信心 | 风险等级 | 报告链接 |
|---------|---------|---------|---------|---------|---------|
{%- for entry in entries %}
| {{ entry.symbol }} | {{ entry.name }} | {{ entry.action | action_marker }} {{ entry.action | na }} | {{ entry.confidence | na }}/10 | {{ entry.risk_level | risk_marker }} {{ entry.risk_level | na }} | [{{ entry.symbol }}]({{ entry.link }}) |
{%- endfor %}

---

## 🎯 投资建议统计

- 🟢 买入: {{ counts.buy }} 只
- 🟡 持有: {{ counts.hold }} 只
- 🔴 卖出: {{ counts.sell }} 只
{%- if counts.unknown %}
- ⚪ 未知: {{ counts.unknown }} 只
{%- endif %}
{%- if failures %}

---

## ❌ 分析失败

{%- for failure in failures %}
- {{ failure.symbol }}: {{ failure.error }}
{%- endfor %}
{%- endif %}

---

*本汇总报告由自动化投资分析系统生成*
";

const INDEX_TEMPLATE: &str = r"# 📊 股票分析报告目录

**最后更新**: {{ updated_at }}

## 📁 目录结构说明

```
reports/
├── README.md                    # 本索引文件
├── summary_YYYY-MM-DD_HHMMSS.md # 批量汇总报告
└── 股票代码/
    └── YYYY-MM-DD/
        ├── analysis_HHMMSS.md   # 分析报告(Markdown)
        └── analysis_HHMMSS.json # 分析数据(JSON)
```

## 📈 股票分析报告
{% for stock in stocks %}
### 📊 {{ stock.code }}
{% for report in stock.reports %}
- [{{ report.date }}]({{ report.link }}) - 最新分析报告
{%- endfor %}
{% else %}
- 暂无报告
{% endfor %}
---

*本目录由AI股票分析系统自动维护*
";

#[derive(Debug, Serialize)]
struct IndexedReport {
    date: String,
    link: String,
}

#[derive(Debug, Serialize)]
struct IndexedStock {
    code: String,
    reports: Vec<IndexedReport>,
}

/// Writes reports as markdown plus JSON under one directory
#[derive(Debug, Clone)]
pub struct MarkdownReportWriter {
    dir: PathBuf,
    model: String,
}

impl MarkdownReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            model: "DeepSeek".to_string(),
        }
    }

    pub fn from_config(config: &EquityConfig) -> Self {
        Self::new(config.report_dir.clone()).with_model(config.model.clone())
    }

    /// Model name printed in the report footer
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render the markdown body of one analysis
    pub fn render_markdown(&self, draft: &AnalysisDraft<'_>) -> Result<String> {
        let ctx = draft.context;
        let quote = ctx.quote.as_ref();
        let turns: Vec<_> = draft
            .debate
            .turns()
            .iter()
            .map(|turn| {
                json!({
                    "round": turn.round,
                    "label": turn.side.label(),
                    "content": turn.content,
                    "degraded": turn.degraded.map(|cause| cause.to_string()),
                })
            })
            .collect();
        let dimensions: Vec<_> = draft
            .risk
            .dimensions()
            .into_iter()
            .map(|(label, text)| json!({"label": label, "text": text}))
            .collect();

        let vars = json!({
            "mode_emoji": draft.mode.emoji(),
            "mode_label": draft.mode.label(),
            "generated_at": draft.analyzed_at.format(TIMESTAMP_FORMAT).to_string(),
            "duration": format!("{:.1}", draft.duration.as_secs_f64()),
            "symbol": ctx.symbol,
            "name": ctx.name(),
            "industry": ctx.industry(),
            "price": number_text(quote.map(|q| q.close)),
            "pct_chg": number_text(quote.and_then(|q| q.pct_chg)),
            "decision": draft.decision,
            "risk": draft.risk,
            "risk_dimensions": dimensions,
            "technical": draft.analysts.technical,
            "fundamental": draft.analysts.fundamental,
            "news": draft.analysts.news,
            "bull": draft.debate.bull_initial,
            "bear": draft.debate.bear_initial,
            "turns": turns,
            "synthesis": draft.debate.synthesis(),
            "model": self.model,
        });
        Ok(environment().render_str(ANALYSIS_TEMPLATE, minijinja::Value::from_serialize(&vars))?)
    }

    /// Render the markdown body of a batch summary
    pub fn render_summary_markdown(&self, summary: &BatchSummary) -> Result<String> {
        let entries: Vec<_> = summary
            .entries
            .iter()
            .map(|entry| {
                json!({
                    "symbol": entry.symbol,
                    "name": entry.name,
                    "action": entry.action,
                    "confidence": entry.confidence,
                    "risk_level": entry.risk_level,
                    "link": self.relative_link(&entry.report),
                })
            })
            .collect();
        let vars = json!({
            "generated_at": summary.generated_at.format(TIMESTAMP_FORMAT).to_string(),
            "requested": summary.requested,
            "entries": entries,
            "counts": summary.counts(),
            "failures": summary.failures,
        });
        Ok(environment().render_str(SUMMARY_TEMPLATE, minijinja::Value::from_serialize(&vars))?)
    }

    /// Regenerate `README.md` from the reports on disk
    pub async fn write_index(&self) -> Result<PathBuf> {
        let stocks = self.scan().await?;
        let vars = json!({
            "updated_at": china_now().format(TIMESTAMP_FORMAT).to_string(),
            "stocks": stocks,
        });
        let body =
            environment().render_str(INDEX_TEMPLATE, minijinja::Value::from_serialize(&vars))?;
        let path = self.dir.join("README.md");
        tokio::fs::write(&path, body).await?;
        info!(path = %path.display(), "Report index updated");
        Ok(path)
    }

    async fn scan(&self) -> Result<Vec<IndexedStock>> {
        let mut codes = list_dirs(&self.dir).await?;
        codes.sort();

        let mut stocks = Vec::with_capacity(codes.len());
        for code in codes {
            let stock_dir = self.dir.join(&code);
            let mut dates = list_dirs(&stock_dir).await?;
            dates.sort_unstable_by(|a, b| b.cmp(a));

            let mut reports = Vec::new();
            for date in dates.into_iter().take(INDEX_DATES) {
                if let Some(latest) = latest_markdown(&stock_dir.join(&date)).await? {
                    reports.push(IndexedReport {
                        link: format!("{code}/{date}/{latest}"),
                        date,
                    });
                }
            }
            if !reports.is_empty() {
                stocks.push(IndexedStock { code, reports });
            }
        }
        Ok(stocks)
    }

    fn relative_link(&self, report: &Path) -> String {
        report
            .strip_prefix(&self.dir)
            .unwrap_or(report)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[async_trait]
impl ReportRenderer for MarkdownReportWriter {
    async fn render(&self, draft: &AnalysisDraft<'_>) -> Result<ReportArtifact> {
        let date_dir = self
            .dir
            .join(bare_code(&draft.context.symbol))
            .join(draft.analyzed_at.format("%Y-%m-%d").to_string());
        tokio::fs::create_dir_all(&date_dir)
            .await
            .map_err(|e| report_error(&date_dir, &e))?;

        let stem = format!("analysis_{}", draft.analyzed_at.format("%H%M%S"));
        let markdown = date_dir.join(format!("{stem}.md"));
        let json = date_dir.join(format!("{stem}.json"));

        write_file(&markdown, self.render_markdown(draft)?.into_bytes()).await?;
        write_file(&json, serde_json::to_vec_pretty(draft)?).await?;

        info!(
            markdown = %markdown.display(),
            json = %json.display(),
            "Report written"
        );
        Ok(ReportArtifact { markdown, json })
    }

    async fn render_summary(&self, summary: &BatchSummary) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| report_error(&self.dir, &e))?;
        let path = self.dir.join(format!(
            "summary_{}.md",
            summary.generated_at.format("%Y-%m-%d_%H%M%S")
        ));
        write_file(&path, self.render_summary_markdown(summary)?.into_bytes()).await?;
        info!(path = %path.display(), "Summary written");

        if let Err(e) = self.write_index().await {
            warn!(error = %e, "Failed to update report index");
        }
        Ok(path)
    }
}

fn report_error(path: &Path, err: &std::io::Error) -> EquityError {
    EquityError::ReportError(format!("{}: {err}", path.display()))
}

async fn write_file(path: &Path, body: Vec<u8>) -> Result<()> {
    tokio::fs::write(path, body)
        .await
        .map_err(|e| report_error(path, &e))
}

/// Names of the visible subdirectories of `dir`
async fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && entry.file_type().await?.is_dir() {
            names.push(name);
        }
    }
    Ok(names)
}

async fn latest_markdown(dir: &Path) -> Result<Option<String>> {
    let mut latest: Option<String> = None;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if Path::new(&name).extension().is_some_and(|ext| ext == "md")
            && latest
                .as_deref()
                .is_none_or(|current| name.as_str() > current)
        {
            latest = Some(name);
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Action, RiskLevel};
    use crate::engine::batch::{ItemFailure, SummaryEntry};
    use crate::testing::{sample_analysis, sample_context};
    use agent_runtime::{DegradeCause, RoleResult};

    #[tokio::test]
    async fn test_render_writes_markdown_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkdownReportWriter::new(dir.path());
        let ctx = sample_context("600519.SH", 3);
        let parts = sample_analysis(&ctx);

        let artifact = writer.render(&parts.draft()).await.unwrap();

        let relative = artifact.markdown.strip_prefix(dir.path()).unwrap();
        assert!(relative.starts_with("600519"));
        assert_eq!(artifact.json.extension().unwrap(), "json");

        let markdown = tokio::fs::read_to_string(&artifact.markdown).await.unwrap();
        assert!(markdown.contains("**股票名称**: 贵州茅台"));
        assert!(markdown.contains("🟢 **买入**"));
        assert!(markdown.contains("████████░░ (8/10)"));
        assert!(markdown.contains("**第1轮 · 看跌方**"));
        assert!(markdown.contains("**建议倾向**: 偏看涨"));

        let json: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&artifact.json).await.unwrap())
                .unwrap();
        assert_eq!(json["trading_decision"]["action"], "买入");
        assert_eq!(json["stock_data"]["ts_code"], "600519.SH");
        assert_eq!(
            json["debate_results"]["debate_rounds"][0]["speaker"],
            "bear"
        );
    }

    #[tokio::test]
    async fn test_degraded_sections_show_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkdownReportWriter::new(dir.path());
        let ctx = sample_context("600519.SH", 3);
        let mut parts = sample_analysis(&ctx);
        parts.analysts.technical =
            RoleResult::degraded("均线粘合，方向不明", DegradeCause::Unparseable);

        let markdown = writer.render_markdown(&parts.draft()).unwrap();
        assert!(markdown.contains("结构化输出不可用（unparseable）"));
        assert!(markdown.contains("均线粘合，方向不明"));
    }

    #[tokio::test]
    async fn test_summary_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let writer = MarkdownReportWriter::new(dir.path());
        let ctx = sample_context("600519.SH", 3);
        let artifact = writer.render(&sample_analysis(&ctx).draft()).await.unwrap();

        let summary = BatchSummary {
            generated_at: china_now(),
            requested: 2,
            entries: vec![SummaryEntry {
                symbol: "600519.SH".to_string(),
                name: "贵州茅台".to_string(),
                action: Some(Action::Buy),
                confidence: Some(8),
                risk_level: Some(RiskLevel::Medium),
                report: artifact.markdown.clone(),
            }],
            failures: vec![ItemFailure {
                symbol: "000858.SZ".to_string(),
                error: "Data source error: timeout".to_string(),
            }],
        };
        let path = writer.render_summary(&summary).await.unwrap();
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(body.contains("| 600519.SH | 贵州茅台 | 🟢 买入 | 8/10 | 🟡 中 |"));
        assert!(body.contains("- 🟢 买入: 1 只"));
        assert!(body.contains("- 000858.SZ: Data source error: timeout"));
        assert!(body.contains("](600519/"));

        let index = tokio::fs::read_to_string(dir.path().join("README.md"))
            .await
            .unwrap();
        assert!(index.contains("### 📊 600519"));
        assert!(index.contains("analysis_"));
    }

    #[tokio::test]
    async fn test_unwritable_report_dir_is_report_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("reports");
        tokio::fs::write(&blocker, b"not a directory")
            .await
            .unwrap();

        let writer = MarkdownReportWriter::new(&blocker);
        let ctx = sample_context("600519.SH", 3);
        let err = writer
            .render(&sample_analysis(&ctx).draft())
            .await
            .unwrap_err();
        assert!(matches!(err, EquityError::ReportError(ref msg) if msg.contains("reports")));
    }
}
