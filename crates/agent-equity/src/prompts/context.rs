//! Context templates sent as the user message of each role call
//!
//! Templates are MiniJinja strings. Structured values are passed as-is and
//! printed with the `pretty` filter, which renders indented JSON.

use minijinja::Environment;
use serde::Serialize;
use tracing::warn;

pub const TECHNICAL: &str = r"
股票代码: {{ symbol }}
股票名称: {{ name }}
所属行业: {{ industry }}
数据获取时间: {{ fetched_at }}
是否交易时间: {% if trading %}是{% else %}否{% endif %}

最新行情:
- 收盘价: {{ close }}
- 涨跌幅: {{ pct_chg }}%
- 成交量: {{ vol }}手
- 成交额: {{ amount }}千元

近期行情数据（最近{{ daily | length }}个交易日）:
{{ daily | pretty }}
{%- if intraday %}

盘中数据（最近1小时）:
{{ intraday | pretty }}
{%- endif %}
";

pub const FUNDAMENTAL: &str = r"
股票代码: {{ symbol }}
股票名称: {{ name }}
所属行业: {{ industry }}
上市日期: {{ list_date }}

财务数据:
{{ statements | pretty }}

财务指标:
{{ indicators | pretty }}
";

pub const NEWS: &str = r"
股票代码: {{ symbol }}
股票名称: {{ name }}

近期相关新闻:
{{ news | pretty }}
";

pub const RESEARCH: &str = r"
股票信息:
- 代码: {{ symbol }}
- 名称: {{ name }}
- 行业: {{ industry }}

各分析师观点:
技术分析: {{ technical | pretty }}

基本面分析: {{ fundamental | pretty }}

新闻分析: {{ news | pretty }}
";

pub const REBUTTAL: &str = r"
股票: {{ name }} ({{ symbol }})

你的初始观点（{{ side }}）:
{{ own | pretty }}

对方观点:
{{ opponent | pretty }}

辩论历史:
{{ history | pretty }}
";

pub const SYNTHESIS: &str = r"
股票: {{ name }} ({{ symbol }})

看涨观点:
{{ bull | pretty }}

看跌观点:
{{ bear | pretty }}

完整辩论过程:
{{ history | pretty }}
";

pub const TRADER: &str = r"
股票信息:
- 代码: {{ symbol }}
- 名称: {{ name }}
- 行业: {{ industry }}
- 当前价格: {{ price }}元

分析师团队意见:
{{ analysts | pretty }}

研究员辩论结果:
{{ debate | pretty }}
";

pub const RISK: &str = r"
股票信息:
- 代码: {{ symbol }}
- 名称: {{ name }}
- 行业: {{ industry }}

交易决策:
{{ decision | pretty }}

完整分析:
{{ analysis | pretty }}
";

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("pretty", |value: minijinja::Value| {
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    });
    env
}

/// Render `template` with `vars`
///
/// Templates are static, so a render failure is a programming error. It is
/// logged and the variables are sent as JSON instead, keeping role calls
/// infallible.
pub fn render<S: Serialize>(name: &str, template: &str, vars: &S) -> String {
    let env = environment();
    match env.render_str(template, minijinja::Value::from_serialize(vars)) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!(template = name, error = %e, "Context template failed to render");
            serde_json::to_string_pretty(vars).unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_pretty_filter() {
        let rendered = render(
            "news",
            NEWS,
            &json!({
                "symbol": "600519.SH",
                "name": "贵州茅台",
                "news": [{"title": "业绩预告", "content": "净利润增长"}]
            }),
        );
        assert!(rendered.contains("股票代码: 600519.SH"));
        assert!(rendered.contains("\"title\": \"业绩预告\""));
    }

    #[test]
    fn test_technical_intraday_is_optional() {
        let vars = json!({
            "symbol": "600519.SH",
            "name": "贵州茅台",
            "industry": "白酒",
            "fetched_at": "2024-03-04T10:00:00+08:00",
            "trading": false,
            "close": "1700",
            "pct_chg": "0.5",
            "vol": "1000",
            "amount": "N/A",
            "daily": [{"trade_date": "20240304"}],
            "intraday": null
        });
        let rendered = render("technical", TECHNICAL, &vars);
        assert!(rendered.contains("是否交易时间: 否"));
        assert!(rendered.contains("最近1个交易日"));
        assert!(!rendered.contains("盘中数据"));

        let mut vars = vars;
        vars["trading"] = json!(true);
        vars["intraday"] = json!([{"trade_time": "2024-03-04 10:00:00"}]);
        let rendered = render("technical", TECHNICAL, &vars);
        assert!(rendered.contains("盘中数据（最近1小时）"));
    }

    #[test]
    fn test_render_rebuttal_prompt() {
        let prompt = render(
            "rebuttal",
            crate::prompts::system::REBUTTAL,
            &json!({"side": "看跌方"}),
        );
        assert!(prompt.starts_with("你是看跌方的代表"));
    }

    #[test]
    fn test_render_failure_falls_back_to_json() {
        let rendered = render("broken", "{% if %}", &json!({"symbol": "600519.SH"}));
        assert!(rendered.contains("600519.SH"));
    }
}
