use anyhow::Context;
use clap::{Parser, ValueEnum};
use sentimint_core::domain::recommendation::Tone;
use sentimint_core::domain::report::{AnalysisReport, RunMode};
use sentimint_core::fetch::mock::MockFetcher;
use sentimint_core::fetch::{HttpJsonFetcher, MarketDataFetcher};
use sentimint_core::heuristics::HeuristicRules;
use sentimint_core::pipeline::{Pipeline, PipelineOptions};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "sentimint", about = "Verified Buy/Sell/Hold call for a stock ticker")]
struct Args {
    /// Ticker symbol, e.g. TSLA.
    ticker: String,

    /// Voice of the initial recommendation.
    #[arg(long, value_enum, default_value_t = ToneArg::Formal)]
    tone: ToneArg,

    /// Use fixed financials and a fixed recommendation. Only the verifier calls the model.
    #[arg(long)]
    mock: bool,

    /// Report format written to stdout.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Do not ask the verifier for structured output; scrape its prose instead.
    #[arg(long)]
    prose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ToneArg {
    Formal,
    Direct,
    Conversational,
}

impl From<ToneArg> for Tone {
    fn from(t: ToneArg) -> Self {
        match t {
            ToneArg::Formal => Tone::Formal,
            ToneArg::Direct => Tone::Direct,
            ToneArg::Conversational => Tone::Conversational,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Kv,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = sentimint_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let llm = match sentimint_core::llm::client_from_settings(&settings) {
        Ok(client) => client,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            return Err(err.context("LLM client configuration failed"));
        }
    };

    let fetcher: Box<dyn MarketDataFetcher> = if args.mock {
        Box::new(MockFetcher)
    } else {
        match HttpJsonFetcher::from_settings(&settings) {
            Ok(f) => Box::new(f),
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                return Err(err.context("data provider configuration failed"));
            }
        }
    };

    let mut options = PipelineOptions::from_env();
    if args.prose {
        options.structured_verification = false;
    }

    let mode = if args.mock {
        RunMode::Mock
    } else {
        RunMode::Live
    };

    let pipeline = Pipeline::new(
        llm.as_ref(),
        fetcher.as_ref(),
        HeuristicRules::from_env(),
        options,
    );
    let report = pipeline.run(&args.ticker, args.tone.into(), mode).await;

    log_outcome(&report);

    if let Some(err) = &report.error {
        sentry_anyhow::capture_anyhow(&anyhow::anyhow!(
            "analysis run {} for {} failed: {err}",
            report.run_id,
            report.ticker
        ));
    }

    match args.format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("failed to serialize report")?;
            println!("{json}");
        }
        OutputFormat::Kv => print!("{}", report.to_key_value()),
    }

    Ok(())
}

fn log_outcome(report: &AnalysisReport) {
    match &report.error {
        None => tracing::info!(
            run_id = %report.run_id,
            ticker = %report.ticker,
            verdict = %report.verdict,
            confidence = %report.confidence,
            "run finished"
        ),
        Some(err) => tracing::error!(
            run_id = %report.run_id,
            ticker = %report.ticker,
            error = %err,
            raw_error = report.llm_raw_error.is_some(),
            "run failed"
        ),
    }
}

fn init_sentry(settings: &sentimint_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use sentimint_core::domain::recommendation::RecommendationResult;
    use sentimint_core::domain::ticker::Ticker;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged(report: &AnalysisReport) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || log_outcome(report));
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn report(ticker: &str) -> AnalysisReport {
        let t = Ticker::new(ticker);
        let rec = RecommendationResult::success(t.clone(), Tone::Formal, "BUY".into(), None, None);
        AnalysisReport::begin(uuid::Uuid::nil(), t, Tone::Formal, RunMode::Mock, rec)
    }

    #[test]
    fn logs_finished_and_failed_runs() {
        let line = logged(&report("TSLA"));
        assert!(line.contains("run finished"));
        assert!(line.contains("ticker=TSLA"));
        assert!(line.contains("verdict=UNCERTAIN"));

        let mut failed = report("AAPL");
        failed.fail("verification request failed: timeout".into());
        let line = logged(&failed);
        assert!(line.contains("ERROR"));
        assert!(line.contains("run failed"));
        assert!(line.contains("verification request failed: timeout"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let args =
            Args::try_parse_from(["sentimint", "tsla", "--tone", "conversational", "--mock", "--format", "kv"])
                .unwrap();
        assert_eq!(args.ticker, "tsla");
        assert!(matches!(args.tone, ToneArg::Conversational));
        assert!(args.mock);
        assert!(matches!(args.format, OutputFormat::Kv));
        assert!(!args.prose);
    }

    #[test]
    fn defaults_to_formal_json() {
        let args = Args::try_parse_from(["sentimint", "AAPL"]).unwrap();
        assert_eq!(Tone::from(args.tone), Tone::Formal);
        assert!(matches!(args.format, OutputFormat::Json));
        assert!(Args::try_parse_from(["sentimint"]).is_err());
        assert!(Args::try_parse_from(["sentimint", "AAPL", "--tone", "sarcastic"]).is_err());
    }
}
