use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;

use restaurant_scraper_lib::swiggy::SwiggyScraper;
use restaurant_scraper_lib::{logger, Browser, Chrome, RunLogger, Settings, Site};

mod job_manager;
use job_manager::JobManager;

const DEFAULT_COUNT: usize = 10;

struct AppState {
    job_manager: Arc<JobManager>,
}

#[derive(Deserialize)]
struct JobRequest {
    site: String,
    source: String,
    count: Option<usize>,
}

#[derive(Deserialize)]
struct LocationQuery {
    q: String,
}

#[get("/api/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("Server is running")
}

#[post("/api/jobs")]
async fn create_job(body: web::Json<JobRequest>, data: web::Data<AppState>) -> impl Responder {
    let req = body.into_inner();
    let site: Site = match req.site.parse() {
        Ok(site) => site,
        Err(e) => return HttpResponse::BadRequest().json(e),
    };
    if req.source.trim().is_empty() {
        return HttpResponse::BadRequest().json("source must not be empty");
    }
    let count = req.count.unwrap_or(DEFAULT_COUNT);
    let job_id = data.job_manager.start_job(site, req.source.trim().to_string(), count);

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "job_id": job_id,
        "message": format!("Scraping {} restaurants from {}.", count, site),
    }))
}

#[get("/api/status/{job_id}")]
async fn get_status(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();
    let jobs = match data.job_manager.jobs.lock() {
        Ok(jobs) => jobs,
        Err(poisoned) => poisoned.into_inner(),
    };

    match jobs.get(&job_id) {
        Some(job) => HttpResponse::Ok().json(job),
        None => HttpResponse::NotFound().json("Job not found"),
    }
}

#[get("/api/download/{job_id}")]
async fn download_result(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();
    let Some(output) = data.job_manager.output_file(&job_id) else {
        return HttpResponse::NotFound().body("Result file not generated yet.");
    };
    let filename = Path::new(&output)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.csv", job_id));

    match std::fs::read(&output) {
        Ok(content) => HttpResponse::Ok()
            .content_type("text/csv")
            .append_header(("Content-Disposition", format!("attachment; filename=\"{}\"", filename)))
            .body(content),
        Err(e) => {
            log::error!("Could not read {}: {}", output, e);
            HttpResponse::NotFound().body("Result file not generated yet.")
        }
    }
}

#[post("/api/pause/{job_id}")]
async fn pause_job(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();
    if data.job_manager.send_control(&job_id, "pause") {
        HttpResponse::Ok().json("Job paused")
    } else {
        HttpResponse::NotFound().json("Job not found")
    }
}

#[post("/api/resume/{job_id}")]
async fn resume_job(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();
    if data.job_manager.send_control(&job_id, "resume") {
        HttpResponse::Ok().json("Job resumed")
    } else {
        HttpResponse::NotFound().json("Job not found")
    }
}

#[post("/api/stop/{job_id}")]
async fn stop_job(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();
    if data.job_manager.send_control(&job_id, "stop") {
        HttpResponse::Ok().json("Job stopped")
    } else {
        HttpResponse::NotFound().json("Job not found")
    }
}

/// Location suggestions need their own short browser session; it runs on
/// the blocking pool.
#[get("/api/swiggy/locations")]
async fn swiggy_locations(query: web::Query<LocationQuery>, data: web::Data<AppState>) -> impl Responder {
    let q = query.into_inner().q;
    if q.trim().is_empty() {
        return HttpResponse::BadRequest().json("q must not be empty");
    }
    let settings = data.job_manager.settings().clone();
    let result = web::block(move || search_locations(&settings, &q)).await;

    match result {
        Ok(Ok(labels)) => HttpResponse::Ok().json(labels),
        Ok(Err(e)) => {
            log::error!("Location search failed: {}", e);
            HttpResponse::BadGateway().json(e)
        }
        Err(e) => HttpResponse::InternalServerError().json(e.to_string()),
    }
}

fn search_locations(settings: &Settings, query: &str) -> Result<Vec<String>, String> {
    let browser = Chrome::launch(settings).map_err(|e| e.to_string())?;
    let scraper = SwiggyScraper::new(&browser, settings.timing(), RunLogger::new("swiggy"));
    let labels = scraper.search_locations(query).map_err(|e| e.to_string());
    if let Err(e) = browser.close() {
        log::warn!("Failed to close browser session: {}", e);
    }
    labels
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    logger::init();

    let settings = Settings::load();
    let job_manager = Arc::new(JobManager::new(settings));
    let state = web::Data::new(AppState { job_manager });

    log::info!("Starting Web Server at http://0.0.0.0:8080");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .service(health_check)
            .service(create_job)
            .service(get_status)
            .service(download_result)
            .service(pause_job)
            .service(resume_job)
            .service(stop_job)
            .service(swiggy_locations)
            .service(actix_files::Files::new("/", "./frontend").index_file("index.html"))
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
