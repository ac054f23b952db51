//! Fixed prompt templates with `{name}` placeholders.

use crate::domain::recommendation::Tone;
use crate::domain::ticker::Ticker;
use crate::heuristics::HeuristicFlag;

const RECOMMENDATION_TEMPLATE: &str = "\
You are a financial analyst. Given the financial data below for the company with ticker symbol {ticker},
provide a Buy/Sell/Hold recommendation and justify your reasoning in a {tone} tone.

Start your answer with these two lines:
Recommendation: <BUY|SELL|HOLD>
Confidence: <0-100>%

Financial Data:
{financial_data}

Recommendation:";

const VERIFIER_TEMPLATE: &str = "\
You are a senior investment verifier. Another analyst produced the recommendation below for {ticker}.
Cross-check it against the financial data, the recent news and the automated risk flags.
Accept the recommendation if the evidence supports it, otherwise revise it.

Financial Data:
{financial_data}

Recent News:
{news_summary}

Automated Risk Flags:
{flags}

Analyst Recommendation:
{recommendation}

Respond in exactly this format:
Final Verdict: <BUY|SELL|HOLD>
Confidence Score: <0-100>%
Justification: <one paragraph>
Supporting Headlines:
1. <headline>
2. <headline>
3. <headline>";

const VERIFIER_SYSTEM: &str = "You verify stock recommendations. Be skeptical, cite only headlines that appear in the provided news, and never invent figures.";

/// A template whose `{name}` placeholders are filled by [`PromptTemplate::render`].
///
/// Placeholders without a supplied value are left as literal text.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    text: &'static str,
}

impl PromptTemplate {
    pub const fn new(text: &'static str) -> Self {
        Self { text }
    }

    pub fn recommendation() -> Self {
        Self::new(RECOMMENDATION_TEMPLATE)
    }

    pub fn verifier() -> Self {
        Self::new(VERIFIER_TEMPLATE)
    }

    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let name = &after[..close];
            match vars.iter().find(|(k, _)| *k == name) {
                Some((_, value)) => out.push_str(value),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        out
    }
}

pub fn recommendation_prompt(ticker: &Ticker, tone: Tone, financial_data: &str) -> String {
    PromptTemplate::recommendation().render(&[
        ("ticker", ticker.as_str()),
        ("tone", tone.as_str()),
        ("financial_data", financial_data),
    ])
}

pub struct VerifierInputs<'a> {
    pub ticker: &'a Ticker,
    pub financial_data: &'a str,
    pub news_summary: &'a str,
    pub recommendation: &'a str,
    pub flags: &'a [HeuristicFlag],
}

pub fn verifier_prompt(inputs: &VerifierInputs<'_>) -> String {
    let flags = render_flags(inputs.flags);
    PromptTemplate::verifier().render(&[
        ("ticker", inputs.ticker.as_str()),
        ("financial_data", inputs.financial_data),
        ("news_summary", inputs.news_summary),
        ("recommendation", inputs.recommendation),
        ("flags", flags.as_str()),
    ])
}

pub fn verifier_system() -> &'static str {
    VERIFIER_SYSTEM
}

fn render_flags(flags: &[HeuristicFlag]) -> String {
    if flags.is_empty() {
        return "None".to_string();
    }
    flags
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n")
}
