//! Terminal tables

use agent_equity::data::model::{NOT_AVAILABLE, StockContext};
use agent_equity::{AnalysisResult, BatchReport};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Latest quote of a freshly collected context
pub fn quote_table(ctx: &StockContext) -> Table {
    let mut table = table(&["名称", "代码", "行业", "收盘价", "涨跌幅", "成交量(手)"]);
    let quote = ctx.quote.as_ref().or_else(|| ctx.daily.last());
    table.add_row(vec![
        ctx.name().to_string(),
        ctx.symbol.clone(),
        ctx.industry().to_string(),
        or_na(quote.map(|q| format!("{:.2}", q.close))),
        or_na(quote.and_then(|q| q.pct_chg).map(|p| format!("{p:+.2}%"))),
        or_na(quote.and_then(|q| q.vol).map(|v| format!("{v:.0}"))),
    ]);
    table
}

fn result_row(result: &AnalysisResult) -> Vec<String> {
    vec![
        result.symbol().to_string(),
        result.name().to_string(),
        result.decision.action_label().to_string(),
        or_na(result.decision.confidence.map(|c| format!("{c}/10"))),
        result.risk.level_label().to_string(),
        result.report.markdown.display().to_string(),
    ]
}

/// One row per analysed security
pub fn results_table(results: &[AnalysisResult]) -> Table {
    let mut table = table(&["代码", "名称", "操作", "信心", "风险", "报告"]);
    for result in results {
        table.add_row(result_row(result));
    }
    table
}

/// Batch outcome: successes, then failures
pub fn batch_table(report: &BatchReport) -> Table {
    let mut table = results_table(&report.results);
    for failure in &report.failures {
        table.add_row(vec![
            failure.symbol.clone(),
            NOT_AVAILABLE.to_string(),
            "失败".to_string(),
            NOT_AVAILABLE.to_string(),
            NOT_AVAILABLE.to_string(),
            failure.error.clone(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_equity::data::china_now;
    use agent_equity::data::model::{DailyBar, StockProfile};
    use agent_equity::engine::ItemFailure;

    fn context() -> StockContext {
        let mut ctx = StockContext::new("600519.SH", china_now());
        ctx.profile = Some(StockProfile {
            ts_code: "600519.SH".to_string(),
            name: "贵州茅台".to_string(),
            area: None,
            industry: Some("白酒".to_string()),
            market: None,
            list_date: None,
        });
        ctx.quote = Some(DailyBar {
            ts_code: "600519.SH".to_string(),
            trade_date: "20240116".to_string(),
            open: 1700.0,
            high: 1720.0,
            low: 1695.0,
            close: 1714.0,
            pre_close: Some(1700.0),
            change: Some(14.0),
            pct_chg: Some(0.82),
            vol: Some(25_000.0),
            amount: None,
        });
        ctx
    }

    #[test]
    fn test_quote_table() {
        let rendered = quote_table(&context()).to_string();
        assert!(rendered.contains("贵州茅台"));
        assert!(rendered.contains("1714.00"));
        assert!(rendered.contains("+0.82%"));
        assert!(rendered.contains("25000"));
    }

    #[test]
    fn test_quote_table_without_data() {
        let ctx = StockContext::new("000001.SZ", china_now());
        let rendered = quote_table(&ctx).to_string();
        assert!(rendered.contains("000001.SZ"));
        assert!(rendered.contains(NOT_AVAILABLE));
    }

    #[test]
    fn test_batch_table_lists_failures() {
        let report = BatchReport {
            results: Vec::new(),
            failures: vec![ItemFailure {
                symbol: "000002.SZ".to_string(),
                error: "market data unavailable".to_string(),
            }],
            summary: None,
            summary_path: None,
        };
        let rendered = batch_table(&report).to_string();
        assert!(rendered.contains("000002.SZ"));
        assert!(rendered.contains("失败"));
        assert!(rendered.contains("market data unavailable"));
    }
}
