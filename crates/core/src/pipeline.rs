//! fetch → flag → recommend → verify → extract, for one ticker.
//!
//! [`Pipeline::run`] always returns a report. Fetch failures are rendered
//! into the prompts as text; model failures turn the report's status into
//! `error`.

use crate::config::{env_flag, env_or};
use crate::domain::contract::{verification_schema, VERIFICATION_SCHEMA_NAME};
use crate::domain::financials::FinancialSnapshot;
use crate::domain::news::NewsFeed;
use crate::domain::recommendation::{RecommendationLabel, RecommendationResult, Tone};
use crate::domain::report::{AnalysisReport, RunMode};
use crate::domain::ticker::Ticker;
use crate::domain::verification::{
    VerificationResult, MAX_SUPPORTING_HEADLINES,
};
use crate::extract;
use crate::fetch::mock::{MockFetcher, MOCK_RECOMMENDATION};
use crate::fetch::MarketDataFetcher;
use crate::heuristics::{HeuristicFlag, HeuristicRules};
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{CompletionRequest, LlmClient, StructuredOutput};
use crate::prompt::{self, VerifierInputs};
use anyhow::Context;
use uuid::Uuid;

const DEFAULT_RECOMMENDATION_TEMPERATURE: f32 = 0.7;
const DEFAULT_VERIFICATION_TEMPERATURE: f32 = 0.3;
const DEFAULT_NEWS_MAX_ITEMS: usize = 5;
const DEFAULT_NEWS_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub recommendation_temperature: f32,
    pub verification_temperature: f32,
    /// Ask the verifier for a JSON payload in addition to prose.
    pub structured_verification: bool,
    pub news_max_items: usize,
    pub news_excerpt_chars: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            recommendation_temperature: DEFAULT_RECOMMENDATION_TEMPERATURE,
            verification_temperature: DEFAULT_VERIFICATION_TEMPERATURE,
            structured_verification: true,
            news_max_items: DEFAULT_NEWS_MAX_ITEMS,
            news_excerpt_chars: DEFAULT_NEWS_EXCERPT_CHARS,
        }
    }
}

impl PipelineOptions {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            recommendation_temperature: env_or(
                "RECOMMENDATION_TEMPERATURE",
                d.recommendation_temperature,
            ),
            verification_temperature: env_or("VERIFICATION_TEMPERATURE", d.verification_temperature),
            structured_verification: env_flag("VERIFY_STRUCTURED_OUTPUT", d.structured_verification),
            news_max_items: env_or("NEWS_MAX_ITEMS", d.news_max_items),
            news_excerpt_chars: env_or("NEWS_EXCERPT_CHARS", d.news_excerpt_chars),
        }
    }
}

pub struct Pipeline<'a> {
    llm: &'a dyn LlmClient,
    fetcher: &'a dyn MarketDataFetcher,
    rules: HeuristicRules,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        fetcher: &'a dyn MarketDataFetcher,
        rules: HeuristicRules,
        options: PipelineOptions,
    ) -> Self {
        Self {
            llm,
            fetcher,
            rules,
            options,
        }
    }

    pub async fn run(&self, raw_ticker: &str, tone: Tone, mode: RunMode) -> AnalysisReport {
        let run_id = Uuid::new_v4();
        let ticker = Ticker::new(raw_ticker);
        let fetcher: &dyn MarketDataFetcher = match mode {
            RunMode::Live => self.fetcher,
            RunMode::Mock => &MockFetcher,
        };

        tracing::info!(
            %run_id,
            %ticker,
            %tone,
            ?mode,
            source = fetcher.source_name(),
            provider = %self.llm.provider(),
            model = self.llm.model(),
            "analysis started"
        );

        let (financials, financials_error) = match fetcher.fetch_financials(&ticker).await {
            Ok(snapshot) => (Some(snapshot), None),
            Err(err) => {
                tracing::warn!(%run_id, %ticker, error = %err, "financial data fetch failed; continuing");
                (None, Some(err.to_string()))
            }
        };
        let financial_data = financial_prompt_text(financials.as_ref(), financials_error.as_deref());

        let recommendation = match mode {
            RunMode::Live => self.recommend(&ticker, tone, &financial_data).await,
            RunMode::Mock => RecommendationResult::success(
                ticker.clone(),
                tone,
                MOCK_RECOMMENDATION.to_string(),
                Some(RecommendationLabel::Buy),
                None,
            ),
        };

        let mut report = AnalysisReport::begin(run_id, ticker.clone(), tone, mode, recommendation);
        report.financials = financials;
        report.financials_error = financials_error;

        if let Some(err) = report.recommendation.error.clone() {
            tracing::error!(%run_id, %ticker, error = %err, "recommendation failed");
            report.llm_raw_error = report.recommendation.llm_raw_error.clone();
            report.fail(err);
            return report;
        }

        let news = match fetcher.fetch_news(&ticker).await {
            Ok(items) => NewsFeed::Items(items),
            Err(err) => {
                tracing::warn!(%run_id, %ticker, error = %err, "news fetch failed; continuing");
                report.news_error = Some(err.to_string());
                NewsFeed::Unavailable(err.to_string())
            }
        };

        report.flags = self
            .rules
            .evaluate(report.financials.as_ref(), &news.searchable_text());
        if !report.flags.is_empty() {
            tracing::info!(%run_id, %ticker, flags = report.flags.len(), "heuristic flags raised");
        }

        let original = report.recommendation.analysis.clone();
        match self
            .verify(&ticker, &financial_data, &news, &original, report.flags.clone())
            .await
        {
            Ok(verification) => {
                tracing::info!(
                    %run_id,
                    %ticker,
                    verdict = %verification.verdict,
                    confidence = %verification.confidence,
                    extraction = ?verification.extraction,
                    "analysis finished"
                );
                report.attach_verification(verification);
            }
            Err(err) => {
                tracing::error!(%run_id, %ticker, error = %err, "verification failed");
                report.llm_raw_error = LlmDiagnosticsError::raw_from(&err);
                report.fail(format!("{err:#}"));
            }
        }

        report
    }

    /// First model pass. Failures are folded into the result.
    pub async fn recommend(
        &self,
        ticker: &Ticker,
        tone: Tone,
        financial_data: &str,
    ) -> RecommendationResult {
        let prompt = prompt::recommendation_prompt(ticker, tone, financial_data);
        let req = CompletionRequest::new(prompt, self.options.recommendation_temperature);

        match self.llm.complete(req).await {
            Ok(completion) => {
                let analysis = completion.display_text();
                let label = extract::recommendation_label(&analysis);
                let confidence = extract::recommendation_confidence(&analysis);
                if label.is_none() {
                    tracing::warn!(%ticker, "recommendation did not state BUY, SELL or HOLD");
                }
                RecommendationResult::success(ticker.clone(), tone, analysis, label, confidence)
            }
            Err(err) => {
                let raw = LlmDiagnosticsError::raw_from(&err);
                RecommendationResult::failed(
                    ticker.clone(),
                    tone,
                    format!("{:#}", err.context("recommendation request failed")),
                )
                .with_llm_raw_error(raw)
            }
        }
    }

    /// Second model pass over the same data plus the flags.
    pub async fn verify(
        &self,
        ticker: &Ticker,
        financial_data: &str,
        news: &NewsFeed,
        recommendation: &str,
        flags: Vec<HeuristicFlag>,
    ) -> anyhow::Result<VerificationResult> {
        let news_summary = news.summary(self.options.news_max_items, self.options.news_excerpt_chars);
        let prompt = prompt::verifier_prompt(&VerifierInputs {
            ticker,
            financial_data,
            news_summary: &news_summary,
            recommendation,
            flags: &flags,
        });

        let mut req = CompletionRequest::new(prompt, self.options.verification_temperature)
            .with_system(prompt::verifier_system());
        if self.options.structured_verification {
            req = req.with_structured(StructuredOutput {
                name: VERIFICATION_SCHEMA_NAME,
                description: "Emit the final verification verdict as structured JSON",
                schema: verification_schema(),
            });
        }

        let completion = self
            .llm
            .complete(req)
            .await
            .context("verification request failed")?;

        let raw_output = completion.display_text();
        let extracted = extract::extract_verification(&raw_output, completion.structured.as_ref());

        let verification = VerificationResult::assemble(
            ticker.clone(),
            recommendation.to_string(),
            extracted,
            news.headlines(MAX_SUPPORTING_HEADLINES),
            flags,
            raw_output,
        );
        if verification.is_uncertain() {
            tracing::warn!(%ticker, "verifier response had no recognisable verdict");
        }
        Ok(verification)
    }
}

fn financial_prompt_text(snapshot: Option<&FinancialSnapshot>, error: Option<&str>) -> String {
    match (snapshot, error) {
        (Some(s), _) if !s.is_empty() => s.to_prompt_text(),
        (Some(_), _) => "No financial data available.".to_string(),
        (None, Some(err)) => format!("Financial data unavailable. (Error: {err})"),
        (None, None) => "No financial data available.".to_string(),
    }
}
