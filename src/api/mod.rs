use std::fmt::Write as _;
use std::net::SocketAddr;
use std::ops::RangeInclusive;

use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;

use crate::core::{
    Archetype, DIVIDEND_THRESHOLD, FertilitySolveConfig, FertilitySolveResult, ProjectionResult,
    ProjectionSummary, SimulationParameters, SolveError, run_projection,
    solve_replacement_fertility,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const TFR_RANGE: RangeInclusive<f64> = 0.5..=6.0;
const AVG_BIRTH_AGE_RANGE: RangeInclusive<u32> = 18..=40;
const RETIRE_AGE_RANGE: RangeInclusive<u32> = 50..=80;
const LIFE_EXPECTANCY_RANGE: RangeInclusive<u32> = 50..=100;
const YEARS_RANGE: RangeInclusive<u32> = 1..=1000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliArchetype {
    Young,
    Balanced,
    Old,
}

impl From<CliArchetype> for Archetype {
    fn from(value: CliArchetype) -> Self {
        match value {
            CliArchetype::Young => Archetype::Young,
            CliArchetype::Balanced => Archetype::Balanced,
            CliArchetype::Old => Archetype::Old,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiArchetype {
    #[serde(alias = "Young", alias = "developing")]
    Young,
    #[serde(alias = "Balanced", alias = "stable")]
    Balanced,
    #[serde(alias = "Old", alias = "shrinking")]
    Old,
}

impl From<ApiArchetype> for CliArchetype {
    fn from(value: ApiArchetype) -> Self {
        match value {
            ApiArchetype::Young => CliArchetype::Young,
            ApiArchetype::Balanced => CliArchetype::Balanced,
            ApiArchetype::Old => CliArchetype::Old,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    archetype: Option<ApiArchetype>,
    tfr: Option<f64>,
    avg_birth_age: Option<u32>,
    retire_age: Option<u32>,
    life_expectancy: Option<u32>,
    years: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "demography",
    about = "Cohort-aging population projection (fertility, aging, mortality cutoff)",
    after_help = "Run `demography serve [port]` to start the web interface instead."
)]
struct Cli {
    #[arg(
        long,
        value_enum,
        default_value_t = CliArchetype::Young,
        help = "Starting population structure"
    )]
    archetype: CliArchetype,
    #[arg(long, default_value_t = 2.4, help = "Total fertility rate, 0.5 to 6.0")]
    tfr: f64,
    #[arg(long, default_value_t = 28, help = "Average age at birth, 18 to 40")]
    avg_birth_age: u32,
    #[arg(long, default_value_t = 65, help = "Retirement age, 50 to 80")]
    retire_age: u32,
    #[arg(
        long,
        default_value_t = 75,
        help = "Age at which everyone dies, 50 to 100"
    )]
    life_expectancy: u32,
    #[arg(long, default_value_t = 300, help = "Number of years to project")]
    years: u32,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    #[arg(
        long,
        help = "Also search for the fertility rate that keeps the population size unchanged"
    )]
    solve_replacement: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("--tfr must be between 0.5 and 6.0, got {0}")]
    FertilityRate(f64),
    #[error("--avg-birth-age must be between 18 and 40, got {0}")]
    AverageBirthAge(u32),
    #[error("--retire-age must be between 50 and 80, got {0}")]
    RetirementAge(u32),
    #[error("--life-expectancy must be between 50 and 100, got {0}")]
    LifeExpectancy(u32),
    #[error("--years must be between 1 and 1000, got {0}")]
    Years(u32),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Args(#[from] clap::Error),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error("replacement fertility search failed: {0}")]
    Solve(#[from] SolveError),
    #[error("failed to encode JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    parameters: SimulationParameters,
    dividend_threshold: f64,
    years: Vec<u32>,
    total_population: Vec<f64>,
    dependency_ratio: Vec<f64>,
    summary: ProjectionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    replacement: Option<FertilitySolveResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplacementResponse {
    parameters: SimulationParameters,
    #[serde(flatten)]
    solve: FertilitySolveResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_params(cli: &Cli) -> Result<SimulationParameters, ParameterError> {
    if !TFR_RANGE.contains(&cli.tfr) {
        return Err(ParameterError::FertilityRate(cli.tfr));
    }
    if !AVG_BIRTH_AGE_RANGE.contains(&cli.avg_birth_age) {
        return Err(ParameterError::AverageBirthAge(cli.avg_birth_age));
    }
    if !RETIRE_AGE_RANGE.contains(&cli.retire_age) {
        return Err(ParameterError::RetirementAge(cli.retire_age));
    }
    if !LIFE_EXPECTANCY_RANGE.contains(&cli.life_expectancy) {
        return Err(ParameterError::LifeExpectancy(cli.life_expectancy));
    }
    if !YEARS_RANGE.contains(&cli.years) {
        return Err(ParameterError::Years(cli.years));
    }

    Ok(SimulationParameters {
        archetype: cli.archetype.into(),
        total_fertility_rate: cli.tfr,
        average_birth_age: cli.avg_birth_age as f64,
        retirement_age: cli.retire_age,
        life_expectancy: cli.life_expectancy,
        years_to_project: cli.years,
        ..SimulationParameters::default()
    })
}

/// Parses `args` (program name first), runs one projection and renders it in
/// the requested format.
pub fn run_cli<I, T>(args: I) -> Result<String, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    let params = build_params(&cli)?;
    let result = run_projection(&params);
    let replacement = if cli.solve_replacement {
        Some(solve_replacement_fertility(
            &params,
            FertilitySolveConfig::default(),
        )?)
    } else {
        None
    };

    let output = match cli.format {
        OutputFormat::Table => render_table(&result, replacement.as_ref()),
        OutputFormat::Csv => render_csv(&result),
        OutputFormat::Json => {
            let response = build_simulate_response(&result, replacement);
            format!("{}\n", serde_json::to_string_pretty(&response)?)
        }
    };
    Ok(output)
}

fn render_table(result: &ProjectionResult, replacement: Option<&FertilitySolveResult>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>5}  {:>14}  {:>12}", "year", "population", "dependency %");
    for s in &result.snapshots {
        let marker = if s.dependency_ratio > 0.0 && s.dependency_ratio < DIVIDEND_THRESHOLD {
            " *"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "{:>5}  {:>14.1}  {:>12.2}{marker}",
            s.year, s.total_population, s.dependency_ratio
        );
    }

    let summary = result.summary();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "population: {:.1} -> {:.1} (peak {:.1} in year {})",
        summary.initial_population,
        summary.final_population,
        summary.peak_population,
        summary.peak_population_year
    );
    if let (Some(ratio), Some(year)) = (
        summary.min_dependency_ratio,
        summary.min_dependency_ratio_year,
    ) {
        let _ = writeln!(out, "lowest dependency ratio: {ratio:.2}% in year {year}");
    }
    let _ = writeln!(
        out,
        "years below {DIVIDEND_THRESHOLD}% dependency (*): {}",
        summary.dividend_years
    );
    if let Some(year) = summary.extinction_year {
        let _ = writeln!(out, "population reached zero in year {year}");
    }
    if let Some(solve) = replacement {
        match solve.solved_tfr {
            Some(tfr) => {
                let _ = writeln!(out, "replacement fertility rate: {tfr:.3}");
            }
            None => {
                let _ = writeln!(out, "replacement fertility rate: {}", solve.message);
            }
        }
    }
    out
}

fn render_csv(result: &ProjectionResult) -> String {
    let mut out = String::from("year,total_population,dependency_ratio\n");
    for s in &result.snapshots {
        let _ = writeln!(
            out,
            "{},{},{}",
            s.year, s.total_population, s.dependency_ratio
        );
    }
    out
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("demography HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/replacement",
            get(replacement_get_handler).post(replacement_post_handler),
        )
        .fallback(not_found_handler)
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    payload: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => simulate_handler_impl(payload),
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

async fn simulate_post_handler(payload: Result<Json<SimulatePayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => simulate_handler_impl(payload),
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

async fn replacement_get_handler(
    payload: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    match payload {
        Ok(Query(payload)) => replacement_handler_impl(payload),
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

async fn replacement_post_handler(
    payload: Result<Json<SimulatePayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => replacement_handler_impl(payload),
        Err(rejection) => error_response(StatusCode::BAD_REQUEST, &rejection.body_text()),
    }
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let params = match params_from_payload(payload) {
        Ok(params) => params,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    debug!("simulate request: {params:?}");
    let result = run_projection(&params);
    json_response(StatusCode::OK, build_simulate_response(&result, None))
}

fn replacement_handler_impl(payload: SimulatePayload) -> Response {
    let params = match params_from_payload(payload) {
        Ok(params) => params,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    match solve_replacement_fertility(&params, FertilitySolveConfig::default()) {
        Ok(solve) => json_response(
            StatusCode::OK,
            ReplacementResponse {
                parameters: params,
                solve,
            },
        ),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn params_from_payload(payload: SimulatePayload) -> Result<SimulationParameters, ParameterError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.archetype {
        cli.archetype = v.into();
    }
    if let Some(v) = payload.tfr {
        cli.tfr = v;
    }
    if let Some(v) = payload.avg_birth_age {
        cli.avg_birth_age = v;
    }
    if let Some(v) = payload.retire_age {
        cli.retire_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }
    if let Some(v) = payload.years {
        cli.years = v;
    }

    build_params(&cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        archetype: CliArchetype::Young,
        tfr: 2.4,
        avg_birth_age: 28,
        retire_age: 65,
        life_expectancy: 75,
        years: 300,
        format: OutputFormat::Json,
        solve_replacement: false,
    }
}

fn build_simulate_response(
    result: &ProjectionResult,
    replacement: Option<FertilitySolveResult>,
) -> SimulateResponse {
    SimulateResponse {
        parameters: result.parameters.clone(),
        dividend_threshold: DIVIDEND_THRESHOLD,
        years: result.years(),
        total_population: result.total_population(),
        dependency_ratio: result.dependency_ratio(),
        summary: result.summary(),
        replacement,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    fn payload_from_json(json: &str) -> SimulatePayload {
        serde_json::from_str(json).expect("payload should deserialize")
    }

    fn query(uri: &str) -> Result<Query<SimulatePayload>, QueryRejection> {
        let uri: axum::http::Uri = uri.parse().expect("valid uri");
        Query::try_from_uri(&uri)
    }

    fn json_body(body: &str) -> Result<Json<SimulatePayload>, JsonRejection> {
        Json::from_bytes(body.as_bytes())
    }

    fn assert_no_store(response: &Response) {
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(&b"no-store"[..])
        );
    }

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    /// Serves the router on an ephemeral port and returns the lowercased raw
    /// HTTP response for one GET.
    async fn http_get(path: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router()).await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.expect("connect");
        let request =
            format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.expect("write request");
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.expect("read response");
        raw.to_ascii_lowercase()
    }

    #[test]
    fn defaults_match_original_slider_positions() {
        let params = build_params(&sample_cli()).expect("valid defaults");
        assert_eq!(params.archetype, Archetype::Young);
        assert_approx(params.total_fertility_rate, 2.4);
        assert_approx(params.average_birth_age, 28.0);
        assert_eq!(params.retirement_age, 65);
        assert_eq!(params.life_expectancy, 75);
        assert_eq!(params.years_to_project, 300);
        assert_eq!(params.working_age_lower_bound, 15);
        assert_eq!(params.max_age_horizon, 120);
        assert_approx(params.initial_population, 10_000.0);
    }

    #[test]
    fn cli_parser_defaults_agree_with_api_defaults() {
        let cli = Cli::try_parse_from(["demography"]).expect("defaults parse");
        let from_args = build_params(&cli).expect("valid");
        let from_api = build_params(&sample_cli()).expect("valid");
        assert_eq!(from_args.archetype, from_api.archetype);
        assert_approx(from_args.total_fertility_rate, from_api.total_fertility_rate);
        assert_eq!(from_args.retirement_age, from_api.retirement_age);
        assert_eq!(from_args.life_expectancy, from_api.life_expectancy);
        assert_eq!(from_args.years_to_project, from_api.years_to_project);
        assert_eq!(cli.format, OutputFormat::Table);
    }

    #[test]
    fn cli_parser_reads_flags() {
        let cli = Cli::try_parse_from([
            "demography",
            "--archetype",
            "old",
            "--tfr",
            "1.6",
            "--avg-birth-age",
            "32",
            "--retire-age",
            "67",
            "--life-expectancy",
            "90",
            "--years",
            "50",
            "--format",
            "csv",
        ])
        .expect("flags parse");
        let params = build_params(&cli).expect("valid");
        assert_eq!(params.archetype, Archetype::Old);
        assert_approx(params.total_fertility_rate, 1.6);
        assert_approx(params.average_birth_age, 32.0);
        assert_eq!(params.retirement_age, 67);
        assert_eq!(params.life_expectancy, 90);
        assert_eq!(params.years_to_project, 50);
        assert_eq!(cli.format, OutputFormat::Csv);
    }

    #[test]
    fn build_params_rejects_out_of_range_values() {
        let mut cli = sample_cli();
        cli.tfr = 0.4;
        assert_eq!(build_params(&cli).unwrap_err(), ParameterError::FertilityRate(0.4));

        let mut cli = sample_cli();
        cli.tfr = f64::NAN;
        let err = build_params(&cli).expect_err("must reject NaN");
        assert!(err.to_string().contains("--tfr"));

        let mut cli = sample_cli();
        cli.avg_birth_age = 41;
        assert_eq!(build_params(&cli).unwrap_err(), ParameterError::AverageBirthAge(41));

        let mut cli = sample_cli();
        cli.retire_age = 49;
        assert_eq!(build_params(&cli).unwrap_err(), ParameterError::RetirementAge(49));

        let mut cli = sample_cli();
        cli.life_expectancy = 101;
        assert_eq!(build_params(&cli).unwrap_err(), ParameterError::LifeExpectancy(101));

        let mut cli = sample_cli();
        cli.years = 0;
        assert_eq!(build_params(&cli).unwrap_err(), ParameterError::Years(0));
    }

    #[test]
    fn build_params_accepts_range_edges() {
        let mut cli = sample_cli();
        cli.tfr = 6.0;
        cli.avg_birth_age = 18;
        cli.retire_age = 80;
        cli.life_expectancy = 50;
        assert!(build_params(&cli).is_ok());

        cli.tfr = 0.5;
        cli.avg_birth_age = 40;
        cli.retire_age = 50;
        cli.life_expectancy = 100;
        assert!(build_params(&cli).is_ok());
    }

    #[test]
    fn payload_parses_web_keys() {
        let json = r#"{
          "archetype": "balanced",
          "tfr": 1.8,
          "avgBirthAge": 31,
          "retireAge": 70,
          "lifeExpectancy": 85,
          "years": 120
        }"#;
        let params = params_from_payload(payload_from_json(json)).expect("valid payload");
        assert_eq!(params.archetype, Archetype::Balanced);
        assert_approx(params.total_fertility_rate, 1.8);
        assert_approx(params.average_birth_age, 31.0);
        assert_eq!(params.retirement_age, 70);
        assert_eq!(params.life_expectancy, 85);
        assert_eq!(params.years_to_project, 120);
    }

    #[test]
    fn payload_accepts_archetype_aliases_and_partial_payloads() {
        let payload = payload_from_json(r#"{ "archetype": "shrinking" }"#);
        let params = params_from_payload(payload).expect("alias");
        assert_eq!(params.archetype, Archetype::Old);
        assert_approx(params.total_fertility_rate, 2.4);

        let params = params_from_payload(payload_from_json("{}")).expect("empty payload");
        assert_eq!(params.archetype, Archetype::Young);
    }

    #[tokio::test]
    async fn simulate_get_returns_series_with_no_store() {
        let request = query("/api/simulate?archetype=balanced&years=5");
        let response = simulate_get_handler(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_no_store(&response);
        let body = read_json(response).await;
        assert_eq!(body["years"].as_array().map(Vec::len), Some(5));
        assert_eq!(body["parameters"]["archetype"], "balanced");
    }

    #[tokio::test]
    async fn simulate_get_rejects_unknown_archetype_as_json_error() {
        let response = simulate_get_handler(query("/api/simulate?archetype=ancient")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_no_store(&response);
        let body = read_json(response).await;
        let msg = body["error"].as_str().expect("error message");
        assert!(msg.contains("ancient"), "got {msg}");
    }

    #[tokio::test]
    async fn simulate_get_reports_out_of_range_parameter() {
        let response = simulate_get_handler(query("/api/simulate?retireAge=90")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_no_store(&response);
        let body = read_json(response).await;
        assert_eq!(body["error"], "--retire-age must be between 50 and 80, got 90");
    }

    #[tokio::test]
    async fn simulate_post_rejects_mistyped_body_as_json_error() {
        let response = simulate_post_handler(json_body(r#"{ "tfr": "x" }"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_no_store(&response);
        let body = read_json(response).await;
        assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));
    }

    #[tokio::test]
    async fn replacement_handlers_map_malformed_payloads_to_bad_request() {
        let response = replacement_post_handler(json_body("{ not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(response).await["error"].is_string());

        let response = replacement_get_handler(query("/api/replacement?years=-3")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(read_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn replacement_post_solves_balanced_population() {
        let response = replacement_post_handler(json_body(r#"{ "archetype": "stable" }"#)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_no_store(&response);
        let body = read_json(response).await;
        let tfr = body["solvedTfr"].as_f64().expect("solved tfr");
        assert!((tfr - 2.0).abs() < 1e-2, "got {tfr}");
    }

    #[tokio::test]
    async fn router_answers_unknown_paths_with_json_404() {
        let raw = http_get("/missing").await;
        assert!(raw.starts_with("http/1.1 404"), "got {raw}");
        assert!(raw.contains("cache-control: no-store"));
        assert!(raw.contains("content-type: application/json"));
        assert!(raw.contains(r#"{"error":"not found"}"#));
    }

    #[tokio::test]
    async fn router_serves_assets_and_api_without_caching() {
        for (path, content_type) in [
            ("/", "text/html"),
            ("/index.html", "text/html"),
            ("/styles.css", "text/css"),
            ("/app.js", "application/javascript"),
            ("/api/simulate?years=3", "application/json"),
        ] {
            let raw = http_get(path).await;
            assert!(raw.starts_with("http/1.1 200"), "{path}: {raw}");
            assert!(raw.contains("cache-control: no-store"), "{path}");
            assert!(raw.contains(&format!("content-type: {content_type}")), "{path}");
        }
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let mut cli = sample_cli();
        cli.years = 10;
        let params = build_params(&cli).expect("valid");
        let result = run_projection(&params);
        let response = build_simulate_response(&result, None);

        assert_eq!(response.years.len(), 10);
        assert_eq!(response.total_population.len(), 10);
        assert_eq!(response.dependency_ratio.len(), 10);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"years\""));
        assert!(json.contains("\"totalPopulation\""));
        assert!(json.contains("\"dependencyRatio\""));
        assert!(json.contains("\"dividendThreshold\":50.0"));
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"peakPopulation\""));
        assert!(json.contains("\"archetype\":\"young\""));
        assert!(!json.contains("\"replacement\""));
    }

    #[test]
    fn replacement_response_flattens_solver_fields() {
        let mut cli = sample_cli();
        cli.archetype = CliArchetype::Balanced;
        let params = build_params(&cli).expect("valid");
        let solve = solve_replacement_fertility(&params, FertilitySolveConfig::default())
            .expect("must solve");
        let response = ReplacementResponse {
            parameters: params,
            solve,
        };
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"solvedTfr\""));
        assert!(json.contains("\"feasible\":true"));
        assert!(json.contains("\"parameters\""));
    }

    #[test]
    fn run_cli_renders_csv_rows() {
        let output = run_cli(["demography", "--years", "3", "--format", "csv"]).expect("runs");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "year,total_population,dependency_ratio");
        assert!(lines[1].starts_with("0,"));
        assert!(lines[3].starts_with("2,"));
    }

    #[test]
    fn run_cli_renders_table_with_summary() {
        let output = run_cli(["demography", "--years", "5", "--archetype", "balanced"])
            .expect("runs");
        assert!(output.contains("dependency %"));
        assert!(output.contains("population: 10000.0"));
        assert!(output.contains("years below 50% dependency"));
        assert_eq!(output.lines().filter(|l| l.trim_start().starts_with('4')).count(), 1);
    }

    #[test]
    fn run_cli_json_includes_replacement_when_requested() {
        let output = run_cli([
            "demography",
            "--archetype",
            "balanced",
            "--years",
            "100",
            "--format",
            "json",
            "--solve-replacement",
        ])
        .expect("runs");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        let tfr = value["replacement"]["solvedTfr"]
            .as_f64()
            .expect("solved tfr");
        assert!((tfr - 2.0).abs() < 1e-2, "got {tfr}");
        assert_eq!(value["years"].as_array().map(Vec::len), Some(100));
    }

    #[test]
    fn run_cli_surfaces_parameter_errors() {
        let err = run_cli(["demography", "--life-expectancy", "20"]).expect_err("must reject");
        assert!(matches!(err, CliError::Parameter(ParameterError::LifeExpectancy(20))));

        let err = run_cli(["demography", "--archetype", "ancient"]).expect_err("must reject");
        assert!(matches!(err, CliError::Args(_)));
    }
}
