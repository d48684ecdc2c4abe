use crate::console::format_ratio;
use crate::processor::PcrReport;
use crate::refresh::Refresher;
use crate::rules::Signal;
use anyhow::Result;
use axum::{
    extract::State,
    response::{Html, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::info;

// -----------------------------------------------
// API RESPONSE MODELS
// -----------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub processing_time_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub has_report: bool,
}

// -----------------------------------------------
// APPLICATION STATE
// -----------------------------------------------

#[derive(Default)]
struct Latest {
    report: Option<PcrReport>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    latest: Arc<RwLock<Latest>>,
    refresh_secs: u64,
}

impl AppState {
    pub fn new(refresh_secs: u64) -> Self {
        Self {
            latest: Arc::new(RwLock::new(Latest::default())),
            refresh_secs,
        }
    }

    /// Record the outcome of a refresh tick. A failed tick keeps the previous
    /// report so the page doesn't go blank on a transient outage.
    pub async fn publish(&self, outcome: Result<PcrReport>) {
        let mut latest = self.latest.write().await;
        match outcome {
            Ok(report) => {
                latest.report = Some(report);
                latest.error = None;
            }
            Err(e) => latest.error = Some(format!("{:#}", e)),
        }
    }
}

// -----------------------------------------------
// API HANDLERS
// -----------------------------------------------

/// GET /api/pcr - Latest PCR report
async fn get_pcr(State(app_state): State<AppState>) -> Json<ApiResponse<PcrReport>> {
    let start_time = Instant::now();
    let latest = app_state.latest.read().await;

    let error = match (&latest.report, &latest.error) {
        (_, Some(e)) => Some(e.clone()),
        (None, None) => Some("No data yet, waiting for the first refresh".to_string()),
        (Some(_), None) => None,
    };

    Json(ApiResponse {
        success: latest.report.is_some() && latest.error.is_none(),
        data: latest.report.clone(),
        error,
        processing_time_ms: Some(start_time.elapsed().as_millis() as u64),
    })
}

/// GET /api/health
async fn get_health(State(app_state): State<AppState>) -> Json<HealthResponse> {
    let latest = app_state.latest.read().await;
    Json(HealthResponse {
        status: "ok",
        has_report: latest.report.is_some(),
    })
}

/// GET / - Auto-refreshing HTML dashboard
async fn get_dashboard(State(app_state): State<AppState>) -> Html<String> {
    let latest = app_state.latest.read().await;
    Html(render_dashboard(latest.report.as_ref(), latest.error.as_deref(), app_state.refresh_secs))
}

// -----------------------------------------------
// HTML RENDERING
// -----------------------------------------------

fn signal_color(signal: Signal) -> &'static str {
    match signal {
        Signal::StrongBullish => "#1b873f",
        Signal::StrongBearish => "#c62828",
        Signal::Neutral => "#9a6700",
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_dashboard(report: Option<&PcrReport>, error: Option<&str>, refresh_secs: u64) -> String {
    let mut body = String::new();

    if let Some(e) = error {
        let _ = write!(body, "<p class=\"error\">Last refresh failed: {}</p>", escape_html(e));
    }

    match report {
        None => body.push_str("<p>Waiting for the first option chain snapshot...</p>"),
        Some(report) => {
            let analysis = &report.analysis;
            let _ = write!(
                body,
                "<h2>{} <small>{}</small></h2>\
                 <p>Underlying {:.2} &middot; NSE time {} &middot; updated {}</p>\
                 <div class=\"metrics\">\
                 <div><span>Put OI</span><b>{}</b></div>\
                 <div><span>Call OI</span><b>{}</b></div>\
                 <div><span>PCR</span><b>{}</b></div>\
                 <div><span>PCR (OI Change)</span><b>{}</b></div>\
                 </div>\
                 <h3 style=\"color:{}\">{}</h3>",
                escape_html(&report.symbol),
                escape_html(&report.expiry),
                report.underlying_value,
                escape_html(&report.timestamp),
                report.generated_at.format("%H:%M:%S"),
                analysis.totals.put_oi,
                analysis.totals.call_oi,
                format_ratio(&analysis.aggregate.put_call_ratio_oi),
                format_ratio(&analysis.aggregate.put_call_ratio_oi_change),
                signal_color(analysis.signal),
                analysis.signal.label(),
            );

            body.push_str(
                "<table><tr><th>Strike</th><th>Call OI</th><th>Put OI</th>\
                 <th>Call Chg</th><th>Put Chg</th><th>PCR</th><th>PCR Chg</th></tr>",
            );
            for row in &analysis.strikes {
                let _ = write!(
                    body,
                    "<tr><td>{:.2}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    row.strike_price,
                    row.call_oi,
                    row.put_oi,
                    row.call_oi_change,
                    row.put_oi_change,
                    format_ratio(&row.pcr),
                    format_ratio(&row.pcr_oi_change),
                );
            }
            body.push_str("</table>");
        }
    }

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta http-equiv=\"refresh\" content=\"{}\">\
         <title>PCR Dashboard</title>\
         <style>body{{font-family:sans-serif;margin:2em}}\
         .metrics{{display:flex;gap:2em}}.metrics span{{display:block;color:#666}}\
         table{{border-collapse:collapse}}td,th{{padding:4px 10px;text-align:right;border-bottom:1px solid #ddd}}\
         .error{{color:#c62828}}</style></head>\
         <body><h1>Put/Call Ratio</h1>{}</body></html>",
        refresh_secs, body
    )
}

// -----------------------------------------------
// SERVER SETUP
// -----------------------------------------------

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(get_dashboard))
        .route("/api/pcr", get(get_pcr))
        .route("/api/health", get(get_health))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Serve the dashboard while a background task keeps the report fresh
pub async fn start_server(port: u16, refresher: Refresher) -> Result<()> {
    let app_state = AppState::new(refresher.interval().as_secs());

    let publisher = app_state.clone();
    tokio::spawn(async move {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let loop_handle = tokio::spawn(async move {
            refresher.run(move |outcome| {
                let _ = tx.send(outcome);
            }).await;
        });

        while let Some(outcome) = rx.recv().await {
            publisher.publish(outcome).await;
        }
        loop_handle.abort();
    });

    let app = router(app_state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("PCR dashboard running on http://{}", addr);
    println!("🚀 PCR Dashboard running on http://{}", addr);
    println!("📋 Available endpoints:");
    println!("   GET  /");
    println!("   GET  /api/pcr");
    println!("   GET  /api/health");
    println!();

    axum::serve(listener, app).await?;
    Ok(())
}
